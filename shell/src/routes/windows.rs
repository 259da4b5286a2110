use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use futures::stream::Stream;
use tablero_shared::{ShellRequest, WindowKind};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::warn;

use crate::config::SSE_KEEPALIVE_SECS;
use crate::services::coordinator::Coordinator;
use crate::services::relay::{self, RelayError};
use crate::state::AppState;

/// Event stream of one renderer window. Attaching counts as the window
/// having loaded; the stream ending closes the window.
pub async fn window_events(
    State(state): State<AppState>,
    Path(kind): Path<WindowKind>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (link_id, inbox) = state.attach_window(kind).await;
    let guard = CloseGuard {
        coordinator: state.coordinator.clone(),
        kind,
        link_id,
    };
    state.coordinator.window_ready(kind).await;

    let stream = async_stream::stream! {
        let _guard = guard;
        let mut events = UnboundedReceiverStream::new(inbox);
        while let Some(event) = events.next().await {
            match serde_json::to_string(&event) {
                Ok(data) => yield Ok(Event::default().event(event.name()).data(data)),
                Err(e) => {
                    warn!(window = %kind, event = event.name(), error = %e, "failed to encode event; dropping");
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keep-alive"),
    )
}

pub async fn post_message(
    State(state): State<AppState>,
    Path(kind): Path<WindowKind>,
    Json(request): Json<ShellRequest>,
) -> Response {
    let name = request.name();
    match relay::dispatch(&state, kind, request).await {
        Ok(Some(reply)) => Json(reply).into_response(),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            warn!(window = %kind, message = name, error = %e, "message failed");
            let status = match &e {
                RelayError::Backend(_) => StatusCode::BAD_GATEWAY,
                RelayError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            };
            (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
        }
    }
}

/// Tells the coordinator when a renderer's stream is dropped.
struct CloseGuard {
    coordinator: Coordinator,
    kind: WindowKind,
    link_id: u64,
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        let coordinator = self.coordinator.clone();
        let (kind, link_id) = (self.kind, self.link_id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { coordinator.window_closed(kind, link_id).await });
            }
            Err(_) => warn!(window = %kind, "runtime gone; window close not recorded"),
        }
    }
}
