use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use chatai_bridge::models::ChatInteraction;
use chatai_bridge::{BridgeError, ChatAiHandler, PromptOptions, RequestIdentifiers};

use crate::state::{AppState, PendingAnswer, REQUEST_ID_KEY};

#[derive(Deserialize)]
pub struct PromptRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub hidden_prompt: Option<String>,
    #[serde(default)]
    pub request_identifiers: RequestIdentifiers,
    #[serde(flatten)]
    pub options: PromptOptions,
}

// Records the pending turn, then hands the prompt to the worker pool
pub async fn prompt_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PromptRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), (StatusCode, String)> {
    let PromptRequest {
        model,
        prompt,
        hidden_prompt,
        request_identifiers,
        options,
    } = payload;

    let Some(action) = options.action.as_ref() else {
        return Err((StatusCode::BAD_REQUEST, "missing action".to_string()));
    };
    let key = action.conversation_key();

    let request_id = state.next_request_id();
    let identifiers = request_identifiers.with(REQUEST_ID_KEY, request_id);

    let mut turn = ChatInteraction::pending(prompt.clone());
    turn.hidden_prompt = hidden_prompt;
    state.store.record(key.clone(), turn);
    state.pending.insert(
        request_id,
        PendingAnswer {
            key,
            text: String::new(),
        },
    );

    match state
        .handler
        .dispatch_prompt(&model, &prompt, identifiers, options)
    {
        Ok(()) => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "bridge_request_id": request_id })),
        )),
        Err(e) => {
            // the turn was never sent, keep it out of later transcripts
            if let Some((_, pending)) = state.pending.remove(&request_id) {
                state.store.discard_pending(&pending.key);
            }
            let status = match e {
                BridgeError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
                BridgeError::QueueFull => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_REQUEST,
            };
            Err((status, e.to_string()))
        }
    }
}
