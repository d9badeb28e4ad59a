use lazy_static::lazy_static;
use prometheus::{
    Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram,
};

lazy_static! {
    pub static ref PROMPTS_DISPATCHED: Counter =
        register_counter!("chatai_prompts_dispatched_total", "Prompts submitted to the worker pool").unwrap();
    pub static ref DISPATCH_REJECTED: Counter =
        register_counter!("chatai_dispatch_rejected_total", "Prompts refused before reaching a worker").unwrap();
    pub static ref CALL_FAILURES: Counter =
        register_counter!("chatai_call_failures_total", "Chat calls that failed before or during streaming").unwrap();
    pub static ref DELTAS_PUBLISHED: Counter =
        register_counter!("chatai_deltas_published_total", "Delta events published").unwrap();
    pub static ref TERMINALS_PUBLISHED: Counter =
        register_counter!("chatai_terminal_events_total", "Terminal events published").unwrap();
    pub static ref MODEL_LISTINGS: Counter =
        register_counter!("chatai_model_listings_total", "Model listing requests").unwrap();
    pub static ref ACTIVE_JOBS: Gauge =
        register_gauge!("chatai_active_jobs", "Prompt jobs currently running").unwrap();
    pub static ref STREAM_LATENCY: Histogram = register_histogram!(
        "chatai_stream_duration_seconds",
        "Time from job start to terminal event"
    )
    .unwrap();
}
