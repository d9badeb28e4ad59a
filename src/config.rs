use arc_swap::ArcSwap;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const DEFAULT_TEMPERATURE: f64 = 0.6;
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "chatai-bridge")]
#[command(about = "Streaming bridge between exam chat prompts and Ollama")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Ollama base address, can be changed later through PUT /admin/backend
    #[arg(short, long, default_value = DEFAULT_BASE_URL)]
    pub ollama_url: String,

    // Number of prompt workers
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    pub pool_size: usize,

    // Prompts waiting for a worker before dispatch is refused
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    // Seconds allowed to issue a call (connect + response headers)
    #[arg(long, default_value_t = 30)]
    pub request_timeout: u64,

    // Seconds allowed to read a whole streamed answer
    #[arg(long, default_value_t = 600)]
    pub stream_timeout: u64,

    // Most recent interactions replayed to the model
    #[arg(long, default_value_t = DEFAULT_HISTORY_WINDOW)]
    pub history_window: usize,

    // Publish nothing when a call cannot be issued (no terminal event)
    #[arg(long, default_value_t = false)]
    pub skip_early_terminal: bool,
}

impl Args {
    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            pool_size: self.pool_size.max(1),
            queue_capacity: self.queue_capacity.max(1),
            request_timeout: Duration::from_secs(self.request_timeout),
            stream_timeout: Duration::from_secs(self.stream_timeout),
            history_window: self.history_window,
            always_terminate: !self.skip_early_terminal,
            ..HandlerConfig::new(normalize_base_url(&self.ollama_url))
        }
    }
}

/// Runtime configuration of a handler.
///
/// Everything but the base address is fixed once the handler is connected.
/// The base address may be replaced at any time; workers read it when they
/// send, so a swap applies to the next outbound call.
#[derive(Debug)]
pub struct HandlerConfig {
    base_url: ArcSwap<String>,
    pub pool_size: usize,
    pub queue_capacity: usize,
    pub request_timeout: Duration,
    pub stream_timeout: Duration,
    pub history_window: usize,
    pub system_prompt: String,
    pub temperature: f64,
    pub always_terminate: bool,
}

impl HandlerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: ArcSwap::from_pointee(base_url.into()),
            pool_size: DEFAULT_POOL_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            request_timeout: Duration::from_secs(30),
            stream_timeout: Duration::from_secs(600),
            history_window: DEFAULT_HISTORY_WINDOW,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            always_terminate: true,
        }
    }

    pub fn base_url(&self) -> Arc<String> {
        self.base_url.load_full()
    }

    // Admin operation; last writer wins
    pub fn set_base_url(&self, base_url: &str) {
        let normalized = normalize_base_url(base_url);
        tracing::info!(base_url = %normalized, "backend base address updated");
        self.base_url.store(Arc::new(normalized));
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

// add http:// if not present, drop trailing slashes
pub fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}
