use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/windows/{kind}/events",
            get(routes::windows::window_events),
        )
        .route(
            "/api/windows/{kind}/messages",
            post(routes::windows::post_message),
        )
        .route("/api/health", get(routes::api::health))
        // Renderers are served from their own dev-server origin.
        .layer(CorsLayer::permissive())
        .with_state(state)
}
