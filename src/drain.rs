use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use chatai_bridge::ResponseEvent;

use crate::state::{AppState, REQUEST_ID_KEY};

// Stand-in for the push channel: logs events and stores finished answers
pub async fn drain_events(
    mut rx: mpsc::UnboundedReceiver<ResponseEvent>,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) {
    info!("response drain started");

    loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            _ = shutdown.cancelled(), if !shutdown.is_cancelled() => {
                // stop accepting events, keep the ones already queued
                rx.close();
                continue;
            }
        };
        let Some(event) = event else { break };

        let request_id = event
            .identifiers
            .get(REQUEST_ID_KEY)
            .and_then(|v| v.as_u64());

        let Some(request_id) = request_id else {
            // model listings and foreign requests
            info!(answer = ?event.answer, chat_key = %event.chat_key, "event");
            continue;
        };

        if !event.ended {
            if let Some(answer) = &event.answer
                && let Some(mut pending) = state.pending.get_mut(&request_id)
            {
                pending.text.push_str(answer);
            }
            debug!(request_id, delta = ?event.answer, "delta");
            continue;
        }

        if let Some((_, pending)) = state.pending.remove(&request_id) {
            if pending.text.is_empty() {
                info!(request_id, "request ended without an answer");
                continue;
            }
            let length = pending.text.len();
            let stored = state.store.complete_pending(&pending.key, pending.text);
            info!(request_id, length, stored, "answer complete");
        }
    }

    info!("response drain stopped");
}
