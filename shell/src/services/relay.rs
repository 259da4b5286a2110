use std::sync::Arc;

use serde_json::Value;
use tablero_shared::{
    MapRecord, Monster, RecordId, Shop, ShellReply, ShellRequest, Song, Syncable, WindowKind,
};
use tracing::{debug, info, warn};

use crate::backend::{BackendError, CollectionBackend};
use crate::persistence::StoreError;
use crate::services::sync::{fetch_collection, sync_collection};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("backend unavailable: {0}")]
    Backend(#[from] BackendError),
    #[error("local storage failed: {0}")]
    Store(#[from] StoreError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Routes one renderer message. Request/reply messages return `Some`.
pub async fn dispatch(
    state: &AppState,
    from: WindowKind,
    request: ShellRequest,
) -> Result<Option<ShellReply>, RelayError> {
    debug!(window = %from, message = request.name(), "message received");
    let coordinator = &state.coordinator;
    match request {
        ShellRequest::OpenPlayerWindow => coordinator.open_player_window().await,
        ShellRequest::OpenPanoramicViewWindow(map) => coordinator.open_panoramic_window(map).await,
        ShellRequest::DisplayMapPlayerWindow(map) => coordinator.display_map_to_players(map).await,
        ShellRequest::SetCurrentPreviewMap(map) => coordinator.set_current_preview_map(map).await,
        ShellRequest::GetCurrentPreviewMap => {
            let map = coordinator.current_preview_map().await;
            return Ok(Some(ShellReply::CurrentPreviewMap(map)));
        }
        ShellRequest::TokensUpdated(tokens) => coordinator.notify_tokens_updated(tokens).await,
        ShellRequest::UpdatePanoramicCharacter(character) => {
            coordinator.update_spotlight(character).await;
        }
        ShellRequest::ClearPanoramicCharacter => coordinator.update_spotlight(None).await,
        ShellRequest::RequestPanoramicData => coordinator.request_panoramic_data().await,
        ShellRequest::RequestPanoramicCharacter => {
            coordinator.request_spotlight_character(from).await;
        }
        ShellRequest::PlayerWindowMapChanged(map) => {
            coordinator.player_window_map_changed(map).await;
        }
        ShellRequest::PlayerWindowResize(dimensions) => {
            coordinator.player_window_resized(dimensions).await;
        }
        ShellRequest::GetSongPriority => {
            let priority = state.settings.read().await.song_priority;
            return Ok(Some(ShellReply::SongPriority { priority }));
        }
        ShellRequest::SetSongPriority(priority) => {
            let settings = {
                let mut settings = state.settings.write().await;
                settings.song_priority = priority;
                *settings
            };
            state.store.save_settings(&settings).await?;
        }
        ShellRequest::SaveMaps(maps) => spawn_sync(state.backend.clone(), maps),
        ShellRequest::SaveMonsters(monsters) => spawn_sync(state.backend.clone(), monsters),
        ShellRequest::SaveShops(shops) => spawn_sync(state.backend.clone(), shops),
        ShellRequest::LoadMaps => {
            let mut maps = fetch_collection::<MapRecord>(state.backend.as_ref()).await?;
            for map in &mut maps {
                map.resolve_image_urls();
            }
            return Ok(Some(ShellReply::Maps { maps }));
        }
        ShellRequest::LoadMonsters => {
            let monsters = fetch_collection::<Monster>(state.backend.as_ref()).await?;
            return Ok(Some(ShellReply::Monsters { monsters }));
        }
        ShellRequest::LoadShops => {
            let shops = fetch_collection::<Shop>(state.backend.as_ref()).await?;
            return Ok(Some(ShellReply::Shops { shops }));
        }
        ShellRequest::LoadSongs => {
            let songs = fetch_collection::<Song>(state.backend.as_ref()).await?;
            return Ok(Some(ShellReply::Songs { songs }));
        }
        ShellRequest::AddSong(fields) => {
            let answer = state
                .backend
                .create(Song::COLLECTION, &Value::Object(fields))
                .await?;
            let id = answer
                .get("id")
                .and_then(|id| serde_json::from_value::<RecordId>(id.clone()).ok());
            info!(id = ?id, "song added");
            return Ok(Some(ShellReply::SongAdded { id }));
        }
        ShellRequest::EditSong(song) => {
            let payload = serde_json::to_value(&song)
                .map_err(|e| RelayError::InvalidRequest(format!("song {}: {e}", song.id)))?;
            state
                .backend
                .update(Song::COLLECTION, &song.id.key(), &payload)
                .await?;
        }
        ShellRequest::DeleteSong(id) => {
            state.backend.delete(Song::COLLECTION, &id.key()).await?;
        }
        ShellRequest::GetMapsImagesPath => {
            let path = state.store.maps_images_dir().display().to_string();
            return Ok(Some(ShellReply::MapsImagesPath { path }));
        }
        ShellRequest::DeleteMapImage(file_name) => {
            let Some(file_name) = file_name.filter(|name| !name.is_empty()) else {
                return Ok(None);
            };
            if !is_bare_file_name(&file_name) {
                return Err(RelayError::InvalidRequest(format!(
                    "not a file name: {file_name}"
                )));
            }
            if !state.store.delete_map_image(&file_name).await? {
                debug!(file = %file_name, "map image already gone");
            }
        }
    }
    Ok(None)
}

/// A single path component that stays inside its directory.
fn is_bare_file_name(name: &str) -> bool {
    name != "." && name != ".." && !name.contains(['/', '\\']) && !name.contains('\0')
}

/// Save messages are fire-and-forget; the renderer never waits on the sync.
fn spawn_sync<T: Syncable>(backend: Arc<dyn CollectionBackend>, records: Vec<T>) {
    tokio::spawn(async move {
        if let Err(e) = sync_collection(backend.as_ref(), &records).await {
            warn!(collection = T::COLLECTION, error = %e, "collection sync aborted");
        }
    });
}
