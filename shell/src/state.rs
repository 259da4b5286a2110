use std::sync::Arc;

use tablero_shared::{DisplayedMap, SpotlightCharacter, WindowKind};
use tokio::sync::RwLock;

use crate::backend::CollectionBackend;
use crate::config::renderer_url;
use crate::persistence::{FileStore, Settings};
use crate::services::coordinator::Coordinator;
use crate::windows::{SseWindowHost, WindowInbox, WindowLink};

/// What the players currently see: the displayed map and the character
/// spotlighted on the panoramic window.
#[derive(Debug, Default)]
pub struct ShowState {
    current_map: Option<DisplayedMap>,
    spotlight: Option<SpotlightCharacter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapChange {
    SameMap,
    /// Identity changed; the spotlight was cleared.
    NewMap,
}

impl ShowState {
    pub fn new(current_map: Option<DisplayedMap>) -> Self {
        Self {
            current_map,
            spotlight: None,
        }
    }

    pub fn current_map(&self) -> Option<&DisplayedMap> {
        self.current_map.as_ref()
    }

    pub fn spotlight(&self) -> Option<&SpotlightCharacter> {
        self.spotlight.as_ref()
    }

    pub fn replace_map(&mut self, map: DisplayedMap) -> MapChange {
        let same = self
            .current_map
            .as_ref()
            .is_some_and(|current| current.id.same_as(&map.id));
        self.current_map = Some(map);
        if same {
            MapChange::SameMap
        } else {
            self.spotlight = None;
            MapChange::NewMap
        }
    }

    pub fn set_spotlight(&mut self, character: Option<SpotlightCharacter>) {
        self.spotlight = character;
    }
}

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub window_host: Arc<SseWindowHost>,
    pub backend: Arc<dyn CollectionBackend>,
    pub store: FileStore,
    pub settings: Arc<RwLock<Settings>>,
}

impl AppState {
    pub fn new(store: FileStore, backend: Arc<dyn CollectionBackend>) -> Self {
        let window_host = Arc::new(SseWindowHost::new(renderer_url()));
        let coordinator = Coordinator::new(store.clone(), window_host.clone());
        let settings = store.load_settings();
        Self {
            coordinator,
            window_host,
            backend,
            store,
            settings: Arc::new(RwLock::new(settings)),
        }
    }

    /// Connects a renderer's event stream to its window slot. A renderer
    /// that attaches without a pending window (e.g. after a reload) opens
    /// the slot itself.
    pub async fn attach_window(&self, kind: WindowKind) -> (u64, WindowInbox) {
        if let Some(pending) = self.window_host.take_pending(kind) {
            return pending;
        }
        let (link, inbox) = WindowLink::channel();
        let id = link.id();
        self.coordinator.adopt_window(kind, link).await;
        (id, inbox)
    }
}
