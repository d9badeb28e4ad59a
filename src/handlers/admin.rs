use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use chatai_bridge::handler::HandlerInfo;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct BackendUpdate {
    pub base_url: String,
}

// Swap the Ollama base address; running streams keep their connection
pub async fn backend_handler(
    State(state): State<Arc<AppState>>,
    Json(update): Json<BackendUpdate>,
) -> Result<StatusCode, (StatusCode, String)> {
    if update.base_url.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "base_url must not be empty".to_string()));
    }
    state.handler.config().set_base_url(&update.base_url);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handlers_info_handler(State(state): State<Arc<AppState>>) -> Json<Vec<HandlerInfo>> {
    Json(state.registry.describe())
}
