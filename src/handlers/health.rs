use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;

use chatai_bridge::ChatAiHandler;

use crate::state::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "connected": state.handler.is_connected(),
        "backend": state.handler.config().base_url().as_str(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
