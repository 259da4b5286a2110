//! Typed message surface between renderer windows and the shell.
//!
//! Both directions use `{"type": "<message-name>", "payload": ...}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::character::SpotlightCharacter;
use crate::id::RecordId;
use crate::map::{CombatToken, DisplayedMap, MapBroadcast};
use crate::records::{MapRecord, Monster, Shop, Song};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Main,
    Player,
    Panoramic,
}

impl WindowKind {
    pub const ALL: [WindowKind; 3] = [WindowKind::Main, WindowKind::Player, WindowKind::Panoramic];

    pub fn as_str(self) -> &'static str {
        match self {
            WindowKind::Main => "main",
            WindowKind::Player => "player",
            WindowKind::Panoramic => "panoramic",
        }
    }

    /// Renderer route the window loads.
    pub fn route(self) -> &'static str {
        match self {
            WindowKind::Main => "/",
            WindowKind::Player => "/player-view",
            WindowKind::Panoramic => "/panoramic-view",
        }
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SongPriority {
    #[default]
    Encounter,
    Map,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowDimensions {
    pub width: f64,
    pub height: f64,
}

/// Renderer → shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ShellRequest {
    OpenPlayerWindow,
    OpenPanoramicViewWindow(Option<DisplayedMap>),
    DisplayMapPlayerWindow(DisplayedMap),
    SetCurrentPreviewMap(DisplayedMap),
    GetCurrentPreviewMap,
    TokensUpdated(Vec<CombatToken>),
    UpdatePanoramicCharacter(Option<SpotlightCharacter>),
    ClearPanoramicCharacter,
    RequestPanoramicData,
    RequestPanoramicCharacter,
    PlayerWindowMapChanged(DisplayedMap),
    PlayerWindowResize(WindowDimensions),
    GetSongPriority,
    SetSongPriority(SongPriority),
    SaveMaps(Vec<MapRecord>),
    SaveMonsters(Vec<Monster>),
    SaveShops(Vec<Shop>),
    LoadMaps,
    LoadMonsters,
    LoadShops,
    LoadSongs,
    /// New song fields; the backend assigns the identity.
    AddSong(Map<String, Value>),
    EditSong(Song),
    DeleteSong(RecordId),
    GetMapsImagesPath,
    /// File name inside the maps image directory; empty or absent is a no-op.
    DeleteMapImage(Option<String>),
}

impl ShellRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ShellRequest::OpenPlayerWindow => "open-player-window",
            ShellRequest::OpenPanoramicViewWindow(_) => "open-panoramic-view-window",
            ShellRequest::DisplayMapPlayerWindow(_) => "display-map-player-window",
            ShellRequest::SetCurrentPreviewMap(_) => "set-current-preview-map",
            ShellRequest::GetCurrentPreviewMap => "get-current-preview-map",
            ShellRequest::TokensUpdated(_) => "tokens-updated",
            ShellRequest::UpdatePanoramicCharacter(_) => "update-panoramic-character",
            ShellRequest::ClearPanoramicCharacter => "clear-panoramic-character",
            ShellRequest::RequestPanoramicData => "request-panoramic-data",
            ShellRequest::RequestPanoramicCharacter => "request-panoramic-character",
            ShellRequest::PlayerWindowMapChanged(_) => "player-window-map-changed",
            ShellRequest::PlayerWindowResize(_) => "player-window-resize",
            ShellRequest::GetSongPriority => "get-song-priority",
            ShellRequest::SetSongPriority(_) => "set-song-priority",
            ShellRequest::SaveMaps(_) => "save-maps",
            ShellRequest::SaveMonsters(_) => "save-monsters",
            ShellRequest::SaveShops(_) => "save-shops",
            ShellRequest::LoadMaps => "load-maps",
            ShellRequest::LoadMonsters => "load-monsters",
            ShellRequest::LoadShops => "load-shops",
            ShellRequest::LoadSongs => "load-songs",
            ShellRequest::AddSong(_) => "add-song",
            ShellRequest::EditSong(_) => "edit-song",
            ShellRequest::DeleteSong(_) => "delete-song",
            ShellRequest::GetMapsImagesPath => "get-maps-images-path",
            ShellRequest::DeleteMapImage(_) => "delete-map-image",
        }
    }
}

/// Shell → renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ShellEvent {
    UpdatePlayerMap(MapBroadcast),
    UpdatePanoramicView(MapBroadcast),
    PanoramicCharacterChanged(Option<SpotlightCharacter>),
    ClearPanoramicCharacter,
    SetPanoramicBackgroundColor(String),
    UpdateMasterPreview(MapBroadcast),
    TokensUpdated(Vec<CombatToken>),
    PlayerWindowDimensions(WindowDimensions),
}

impl ShellEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ShellEvent::UpdatePlayerMap(_) => "update-player-map",
            ShellEvent::UpdatePanoramicView(_) => "update-panoramic-view",
            ShellEvent::PanoramicCharacterChanged(_) => "panoramic-character-changed",
            ShellEvent::ClearPanoramicCharacter => "clear-panoramic-character",
            ShellEvent::SetPanoramicBackgroundColor(_) => "set-panoramic-background-color",
            ShellEvent::UpdateMasterPreview(_) => "update-master-preview",
            ShellEvent::TokensUpdated(_) => "tokens-updated",
            ShellEvent::PlayerWindowDimensions(_) => "player-window-dimensions",
        }
    }
}

/// Body of a request/reply message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShellReply {
    CurrentPreviewMap(Option<DisplayedMap>),
    SongPriority { priority: SongPriority },
    Maps { maps: Vec<MapRecord> },
    Monsters { monsters: Vec<Monster> },
    Shops { shops: Vec<Shop> },
    Songs { songs: Vec<Song> },
    /// Identity the backend assigned to a new song.
    SongAdded { id: Option<RecordId> },
    MapsImagesPath { path: String },
}
