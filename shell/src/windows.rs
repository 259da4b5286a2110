use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tablero_shared::{ShellEvent, WindowKind};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub type WindowInbox = mpsc::UnboundedReceiver<ShellEvent>;

static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("window host cannot create {0} window: {1}")]
    Create(WindowKind, String),
}

/// Windowing abstraction: creates renderer windows and raises existing ones.
pub trait WindowHost: Send + Sync {
    fn create(&self, kind: WindowKind) -> Result<WindowLink, WindowError>;
    fn focus(&self, kind: WindowKind);
}

/// Outbound channel to one renderer window. Dropping every clone of the
/// link ends the renderer's event stream.
#[derive(Debug, Clone)]
pub struct WindowLink {
    id: u64,
    outbox: mpsc::UnboundedSender<ShellEvent>,
}

impl WindowLink {
    pub fn channel() -> (Self, WindowInbox) {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let id = NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed);
        (Self { id, outbox }, inbox)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// False once the renderer side is gone.
    pub fn is_alive(&self) -> bool {
        !self.outbox.is_closed()
    }

    fn send(&self, event: ShellEvent) -> bool {
        self.outbox.send(event).is_ok()
    }
}

#[derive(Debug, Default)]
enum WindowSlot {
    #[default]
    Closed,
    Open(WindowLink),
}

/// One `Closed | Open` slot per window kind.
#[derive(Debug, Default)]
pub struct WindowSet {
    slots: HashMap<WindowKind, WindowSlot>,
}

impl WindowSet {
    pub fn is_open(&self, kind: WindowKind) -> bool {
        matches!(self.slots.get(&kind), Some(WindowSlot::Open(link)) if link.is_alive())
    }

    pub fn open(&mut self, kind: WindowKind, link: WindowLink) {
        self.slots.insert(kind, WindowSlot::Open(link));
    }

    /// Drops the link for `kind`. Returns whether the window was open.
    pub fn close(&mut self, kind: WindowKind) -> bool {
        matches!(
            self.slots.insert(kind, WindowSlot::Closed),
            Some(WindowSlot::Open(_))
        )
    }

    /// Closes `kind` only if it is still served by link `id`.
    pub fn close_link(&mut self, kind: WindowKind, id: u64) -> bool {
        match self.slots.get(&kind) {
            Some(WindowSlot::Open(link)) if link.id() == id => self.close(kind),
            _ => false,
        }
    }

    /// Delivers `event` if `kind` is open; a dead link is cleared instead.
    pub fn send(&mut self, kind: WindowKind, event: ShellEvent) -> bool {
        let Some(WindowSlot::Open(link)) = self.slots.get(&kind) else {
            return false;
        };
        if link.is_alive() && link.send(event) {
            return true;
        }
        debug!(window = %kind, "dropping link to destroyed window");
        self.close(kind);
        false
    }

    pub fn broadcast(&mut self, event: &ShellEvent) -> usize {
        WindowKind::ALL
            .into_iter()
            .filter(|kind| self.send(*kind, event.clone()))
            .count()
    }

    pub fn open_kinds(&self) -> Vec<WindowKind> {
        WindowKind::ALL
            .into_iter()
            .filter(|kind| self.is_open(*kind))
            .collect()
    }
}

/// Host for renderers that attach over HTTP.
///
/// `create` parks the receiving end of a fresh link until the renderer
/// connects its event stream.
#[derive(Debug)]
pub struct SseWindowHost {
    renderer_url: String,
    pending: DashMap<WindowKind, (u64, WindowInbox)>,
}

impl SseWindowHost {
    pub fn new(renderer_url: impl Into<String>) -> Self {
        Self {
            renderer_url: renderer_url.into(),
            pending: DashMap::new(),
        }
    }

    pub fn window_url(&self, kind: WindowKind) -> String {
        format!("{}{}", self.renderer_url, kind.route())
    }

    pub fn take_pending(&self, kind: WindowKind) -> Option<(u64, WindowInbox)> {
        self.pending.remove(&kind).map(|(_, pending)| pending)
    }
}

impl WindowHost for SseWindowHost {
    fn create(&self, kind: WindowKind) -> Result<WindowLink, WindowError> {
        let url = reqwest::Url::parse(&self.window_url(kind))
            .map_err(|e| WindowError::Create(kind, e.to_string()))?;
        let (link, inbox) = WindowLink::channel();
        self.pending.insert(kind, (link.id(), inbox));
        info!(window = %kind, %url, "window created; waiting for renderer");
        Ok(link)
    }

    fn focus(&self, kind: WindowKind) {
        debug!(window = %kind, "window already open; focusing");
    }
}
