use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;

use chatai_bridge::{BridgeError, ChatAiHandler, RequestIdentifiers};

use crate::state::AppState;

// Results are published on the response queue, only the count comes back
pub async fn models_handler(
    State(state): State<Arc<AppState>>,
    Json(identifiers): Json<RequestIdentifiers>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    match state.handler.request_available_models(&identifiers).await {
        Ok(count) => Ok(Json(serde_json::json!({ "published": count }))),
        Err(BridgeError::NotConnected) => {
            Err((StatusCode::SERVICE_UNAVAILABLE, "handler not connected".to_string()))
        }
        Err(e) => Err((StatusCode::BAD_GATEWAY, e.to_string())),
    }
}
