use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::HandlerConfig;
use crate::error::{BridgeError, Result};
use crate::metrics::{DISPATCH_REJECTED, MODEL_LISTINGS, PROMPTS_DISPATCHED};
use crate::models::{PromptExtras, PromptOptions, RequestIdentifiers, ResponseEvent};
use crate::queue::ResponseQueue;
use crate::store::InteractionStore;
use crate::transport::ChatTransport;
use crate::worker::{PromptJob, WorkerContext, WorkerPool};

/// Capability set shared by every chat backend variant.
#[async_trait]
pub trait ChatAiHandler: Send + Sync {
    /// Key identifying the backend in every published event.
    fn chat_key(&self) -> &'static str;

    fn name(&self) -> &'static str;

    /// Display name of a model, the raw key when unknown.
    fn model_name(&self, model_key: &str) -> String;

    fn copy_paste(&self) -> bool;

    fn private_key_required(&self) -> bool;

    fn is_connected(&self) -> bool;

    fn connect(&self);

    async fn disconnect(&self);

    /// Publishes one event per model available on the backend.
    async fn request_available_models(&self, identifiers: &RequestIdentifiers) -> Result<usize>;

    /// Queues a prompt and returns at once; results arrive on the response queue.
    fn dispatch_prompt(
        &self,
        model: &str,
        prompt: &str,
        identifiers: RequestIdentifiers,
        options: PromptOptions,
    ) -> Result<()>;
}

pub const OLLAMA_CHAT_KEY: &str = "OLLAMA";

const MODEL_DISPLAY_NAMES: &[(&str, &str)] = &[
    ("mistral", "Most capable model."),
    ("llama3", "Llama 3"),
    ("llava", "LLaVA (vision)"),
];

/// Ollama backend variant.
pub struct OllamaHandler {
    config: Arc<HandlerConfig>,
    client: reqwest::Client,
    store: Arc<dyn InteractionStore>,
    queue: Arc<dyn ResponseQueue>,
    pool: Mutex<Option<WorkerPool>>,
}

impl OllamaHandler {
    pub fn new(
        config: Arc<HandlerConfig>,
        store: Arc<dyn InteractionStore>,
        queue: Arc<dyn ResponseQueue>,
    ) -> Self {
        Self::with_client(config, store, queue, reqwest::Client::new())
    }

    pub fn with_client(
        config: Arc<HandlerConfig>,
        store: Arc<dyn InteractionStore>,
        queue: Arc<dyn ResponseQueue>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            config,
            client,
            store,
            queue,
            pool: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Arc<HandlerConfig> {
        &self.config
    }

    fn reject(&self, err: BridgeError) -> Result<()> {
        DISPATCH_REJECTED.inc();
        Err(err)
    }
}

#[async_trait]
impl ChatAiHandler for OllamaHandler {
    fn chat_key(&self) -> &'static str {
        OLLAMA_CHAT_KEY
    }

    fn name(&self) -> &'static str {
        "Ollama Remote AI service"
    }

    fn model_name(&self, model_key: &str) -> String {
        MODEL_DISPLAY_NAMES
            .iter()
            .find(|(key, _)| *key == model_key)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| model_key.to_string())
    }

    fn copy_paste(&self) -> bool {
        false
    }

    fn private_key_required(&self) -> bool {
        false
    }

    fn is_connected(&self) -> bool {
        self.pool.lock().is_some()
    }

    fn connect(&self) {
        let mut pool = self.pool.lock();
        if pool.is_some() {
            warn!("already connected");
            return;
        }

        let ctx = Arc::new(WorkerContext {
            chat_key: self.chat_key(),
            config: Arc::clone(&self.config),
            client: self.client.clone(),
            store: Arc::clone(&self.store),
            queue: Arc::clone(&self.queue),
        });
        *pool = Some(WorkerPool::spawn(
            self.config.pool_size,
            self.config.queue_capacity,
            ctx,
        ));
        info!(chat_key = self.chat_key(), "handler connected");
    }

    async fn disconnect(&self) {
        // take the pool out before awaiting so the lock is not held
        let pool = self.pool.lock().take();
        match pool {
            Some(pool) => {
                pool.shutdown().await;
                info!(chat_key = self.chat_key(), "handler disconnected");
            }
            None => warn!("not connected"),
        }
    }

    async fn request_available_models(&self, identifiers: &RequestIdentifiers) -> Result<usize> {
        if !self.is_connected() {
            warn!("cannot request available models, not connected");
            return Err(BridgeError::NotConnected);
        }
        MODEL_LISTINGS.inc();

        let base_url = self.config.base_url();
        let transport = ChatTransport::new(self.client.clone(), self.config.request_timeout);
        let names = match transport.list_models(&base_url).await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, %base_url, "error fetching models");
                return Err(e);
            }
        };

        debug!(count = names.len(), "models available");
        let count = names.len();
        for name in names {
            self.queue
                .publish(ResponseEvent::model_listing(identifiers, self.chat_key(), name));
        }
        Ok(count)
    }

    fn dispatch_prompt(
        &self,
        model: &str,
        prompt: &str,
        identifiers: RequestIdentifiers,
        options: PromptOptions,
    ) -> Result<()> {
        let guard = self.pool.lock();
        let Some(pool) = guard.as_ref() else {
            warn!("cannot send prompt, not connected");
            return self.reject(BridgeError::NotConnected);
        };

        let extras = PromptExtras::from_options(&options);
        let Some(action) = options.action else {
            warn!("cannot send prompt without any action");
            return self.reject(BridgeError::MissingAction);
        };
        if model != action.model_key {
            debug!(model, action_model = %action.model_key, "action model takes precedence");
        }

        let job = PromptJob {
            action,
            prompt: prompt.to_string(),
            identifiers,
            extras,
        };
        match pool.submit(job) {
            Ok(()) => {
                PROMPTS_DISPATCHED.inc();
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "prompt refused by worker pool");
                self.reject(e)
            }
        }
    }
}

/// Enumerates the backend variants known to the application.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<&'static str, Arc<dyn ChatAiHandler>>,
}

// Capability metadata as exposed to clients
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct HandlerInfo {
    pub chat_key: &'static str,
    pub name: &'static str,
    pub copy_paste: bool,
    pub private_key_required: bool,
    pub connected: bool,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ChatAiHandler>) {
        self.handlers.insert(handler.chat_key(), handler);
    }

    pub fn get(&self, chat_key: &str) -> Option<Arc<dyn ChatAiHandler>> {
        self.handlers.get(chat_key).cloned()
    }

    pub fn describe(&self) -> Vec<HandlerInfo> {
        self.handlers
            .values()
            .map(|h| HandlerInfo {
                chat_key: h.chat_key(),
                name: h.name(),
                copy_paste: h.copy_paste(),
                private_key_required: h.private_key_required(),
                connected: h.is_connected(),
            })
            .collect()
    }

    pub async fn disconnect_all(&self) {
        for handler in self.handlers.values() {
            if handler.is_connected() {
                handler.disconnect().await;
            }
        }
    }
}
