use axum::Json;
use axum::extract::State;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let open_windows = state.coordinator.open_windows().await;
    let current_map = state.coordinator.current_preview_map().await;
    let spotlight = state.coordinator.spotlight().await;
    Json(serde_json::json!({
        "status": "ok",
        "open_windows": open_windows,
        "current_map_id": current_map.map(|map| map.id),
        "spotlight_id": spotlight.map(|character| character.id),
        "data_dir": state.store.root().display().to_string(),
    }))
}
