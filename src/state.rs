use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chatai_bridge::models::ConversationKey;
use chatai_bridge::{HandlerRegistry, InMemoryStore, OllamaHandler};

// Identifier key the server adds so the drain can find the conversation
pub const REQUEST_ID_KEY: &str = "bridge_request_id";

// Answer being assembled from delta events
pub struct PendingAnswer {
    pub key: ConversationKey,
    pub text: String,
}

// app's shared state
pub struct AppState {
    pub handler: Arc<OllamaHandler>,
    pub registry: HandlerRegistry,
    pub store: Arc<InMemoryStore>,
    pub pending: DashMap<u64, PendingAnswer>,
    next_request_id: AtomicU64,
}

impl AppState {
    pub fn new(
        handler: Arc<OllamaHandler>,
        registry: HandlerRegistry,
        store: Arc<InMemoryStore>,
    ) -> Self {
        Self {
            handler,
            registry,
            store,
            pending: DashMap::new(),
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }
}
