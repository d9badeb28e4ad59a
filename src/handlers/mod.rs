mod admin;
mod health;
mod metrics;
mod models;
mod prompt;

pub use admin::{backend_handler, handlers_info_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use models::models_handler;
pub use prompt::prompt_handler;
