use std::sync::Arc;

use tablero_shared::{
    CombatToken, DisplayedMap, MapBroadcast, ShellEvent, SpotlightCharacter, WindowDimensions,
    WindowKind,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::NEUTRAL_BACKGROUND_COLOR;
use crate::persistence::FileStore;
use crate::state::{MapChange, ShowState};
use crate::windows::{WindowHost, WindowLink, WindowSet};

/// Process-wide authority over the open windows, the displayed map and the
/// spotlighted character. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Coordinator {
    show: Arc<RwLock<ShowState>>,
    windows: Arc<Mutex<WindowSet>>,
    host: Arc<dyn WindowHost>,
    store: FileStore,
    /// Serializes map installs so the file on disk matches the last map made
    /// current. Taken before `show` and `windows`.
    persist: Arc<Mutex<()>>,
}

impl Coordinator {
    pub fn new(store: FileStore, host: Arc<dyn WindowHost>) -> Self {
        let current_map = store.load_current_map();
        Self {
            show: Arc::new(RwLock::new(ShowState::new(current_map))),
            windows: Arc::new(Mutex::new(WindowSet::default())),
            host,
            store,
            persist: Arc::new(Mutex::new(())),
        }
    }

    pub async fn open_main_window(&self) {
        self.open_window(WindowKind::Main).await;
    }

    pub async fn open_player_window(&self) {
        self.open_window(WindowKind::Player).await;
    }

    pub async fn open_panoramic_window(&self, map: Option<DisplayedMap>) {
        if let Some(map) = map {
            self.install_map(map).await;
        }
        self.open_window(WindowKind::Panoramic).await;
    }

    /// Broadcasts `map` to every player-facing window and the master preview.
    pub async fn display_map_to_players(&self, map: DisplayedMap) {
        self.install_map(map.clone()).await;

        let broadcast = MapBroadcast::new(map);
        let panoramic = if broadcast.map.panoramic_data_url().is_some() {
            ShellEvent::UpdatePanoramicView(broadcast.clone().with_panoramic())
        } else {
            ShellEvent::SetPanoramicBackgroundColor(NEUTRAL_BACKGROUND_COLOR.to_string())
        };

        let mut windows = self.windows.lock().await;
        windows.send(WindowKind::Player, ShellEvent::UpdatePlayerMap(broadcast.clone()));
        windows.send(WindowKind::Panoramic, panoramic);
        windows.send(WindowKind::Main, ShellEvent::UpdateMasterPreview(broadcast));
    }

    /// Records `map` as current without pushing it to the players.
    pub async fn set_current_preview_map(&self, mut map: DisplayedMap) {
        if let Some(panoramic) = map.panoramic_view_data.as_mut() {
            panoramic.strip_data_uri();
        }
        self.install_map(map).await;
    }

    pub async fn current_preview_map(&self) -> Option<DisplayedMap> {
        self.show.read().await.current_map().cloned()
    }

    pub async fn spotlight(&self) -> Option<SpotlightCharacter> {
        self.show.read().await.spotlight().cloned()
    }

    pub async fn update_spotlight(&self, character: Option<SpotlightCharacter>) {
        self.show.write().await.set_spotlight(character.clone());
        let delivered = self
            .windows
            .lock()
            .await
            .broadcast(&ShellEvent::PanoramicCharacterChanged(character));
        info!(windows = delivered, "spotlight character updated");
    }

    pub async fn notify_tokens_updated(&self, tokens: Vec<CombatToken>) {
        self.send(WindowKind::Player, ShellEvent::TokensUpdated(tokens))
            .await;
    }

    /// Re-pushes the panoramic background and spotlight to the panoramic window.
    pub async fn request_panoramic_data(&self) {
        let (map, spotlight) = {
            let show = self.show.read().await;
            (show.current_map().cloned(), show.spotlight().cloned())
        };
        let mut windows = self.windows.lock().await;
        if !windows.is_open(WindowKind::Panoramic) {
            return;
        }
        if let Some(event) = map.and_then(panoramic_view_event) {
            windows.send(WindowKind::Panoramic, event);
        }
        windows.send(
            WindowKind::Panoramic,
            ShellEvent::PanoramicCharacterChanged(spotlight),
        );
    }

    pub async fn request_spotlight_character(&self, requester: WindowKind) {
        let spotlight = self.spotlight().await;
        self.send(requester, ShellEvent::PanoramicCharacterChanged(spotlight))
            .await;
    }

    pub async fn player_window_map_changed(&self, map: DisplayedMap) {
        self.send(
            WindowKind::Main,
            ShellEvent::UpdateMasterPreview(MapBroadcast::new(map)),
        )
        .await;
    }

    pub async fn player_window_resized(&self, dimensions: WindowDimensions) {
        self.send(WindowKind::Main, ShellEvent::PlayerWindowDimensions(dimensions))
            .await;
    }

    /// A renderer finished loading; bring it up to date.
    pub async fn window_ready(&self, kind: WindowKind) {
        let (map, spotlight) = {
            let show = self.show.read().await;
            (show.current_map().cloned(), show.spotlight().cloned())
        };
        let mut windows = self.windows.lock().await;
        match kind {
            WindowKind::Main => {}
            WindowKind::Player => {
                if let Some(map) = map {
                    windows.send(kind, ShellEvent::UpdatePlayerMap(MapBroadcast::new(map)));
                }
            }
            WindowKind::Panoramic => {
                if let Some(event) = map.and_then(panoramic_view_event) {
                    windows.send(kind, event);
                }
                if spotlight.is_some() {
                    windows.send(kind, ShellEvent::PanoramicCharacterChanged(spotlight));
                }
            }
        }
    }

    /// Registers a window that opened on its own, replacing any previous one.
    pub async fn adopt_window(&self, kind: WindowKind, link: WindowLink) {
        self.windows.lock().await.open(kind, link);
        info!(window = %kind, "window attached");
    }

    pub async fn close_window(&self, kind: WindowKind) {
        let mut windows = self.windows.lock().await;
        if windows.close(kind) {
            info!(window = %kind, "window closed");
        }
        if kind == WindowKind::Main {
            close_auxiliary(&mut windows);
        }
    }

    /// The renderer behind link `id` went away.
    pub async fn window_closed(&self, kind: WindowKind, id: u64) {
        let mut windows = self.windows.lock().await;
        if !windows.close_link(kind, id) {
            return;
        }
        info!(window = %kind, "window closed by renderer");
        if kind == WindowKind::Main {
            close_auxiliary(&mut windows);
        }
    }

    pub async fn is_open(&self, kind: WindowKind) -> bool {
        self.windows.lock().await.is_open(kind)
    }

    pub async fn open_windows(&self) -> Vec<WindowKind> {
        self.windows.lock().await.open_kinds()
    }

    async fn open_window(&self, kind: WindowKind) -> bool {
        let mut windows = self.windows.lock().await;
        if windows.is_open(kind) {
            self.host.focus(kind);
            return false;
        }
        match self.host.create(kind) {
            Ok(link) => {
                windows.open(kind, link);
                info!(window = %kind, "window opened");
                true
            }
            Err(e) => {
                warn!(error = %e, window = %kind, "failed to open window");
                false
            }
        }
    }

    /// Makes `map` current, clearing the spotlight on identity change, and
    /// persists it.
    async fn install_map(&self, map: DisplayedMap) {
        let _persist = self.persist.lock().await;
        let change = self.show.write().await.replace_map(map.clone());
        if change == MapChange::NewMap {
            let mut windows = self.windows.lock().await;
            windows.broadcast(&ShellEvent::PanoramicCharacterChanged(None));
            windows.send(WindowKind::Panoramic, ShellEvent::ClearPanoramicCharacter);
        }
        if let Err(e) = self.store.save_current_map(&map).await {
            warn!(error = %e, map_id = %map.id, "failed to persist current map");
        }
    }

    async fn send(&self, kind: WindowKind, event: ShellEvent) -> bool {
        self.windows.lock().await.send(kind, event)
    }
}

fn close_auxiliary(windows: &mut WindowSet) {
    for kind in [WindowKind::Player, WindowKind::Panoramic] {
        if windows.close(kind) {
            info!(window = %kind, "window closed with main window");
        }
    }
}

fn panoramic_view_event(map: DisplayedMap) -> Option<ShellEvent> {
    map.panoramic_data_url()?;
    Some(ShellEvent::UpdatePanoramicView(
        MapBroadcast::new(map).with_panoramic(),
    ))
}
