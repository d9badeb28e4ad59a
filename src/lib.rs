//! Streaming bridge between exam chat prompts and an Ollama backend.
//!
//! A connected [`handler::OllamaHandler`] rebuilds the conversation for each
//! prompt, streams the model's answer and republishes it as
//! [`models::ResponseEvent`]s on a shared [`queue::ResponseQueue`].

pub mod config;
pub mod conversation;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod request;
pub mod store;
pub mod transport;
pub mod worker;

pub use config::HandlerConfig;
pub use error::{BridgeError, Result};
pub use handler::{ChatAiHandler, HandlerRegistry, OllamaHandler};
pub use models::{
    AskAction, ChatInteraction, PromptOptions, RequestIdentifiers, ResponseEvent,
};
pub use queue::{ResponseQueue, response_queue};
pub use store::{InMemoryStore, InteractionStore};
