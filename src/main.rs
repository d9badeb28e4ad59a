use axum::{
    Router,
    routing::{get, post, put},
};
use clap::Parser; // for cli
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chatai_bridge::config::Args;
use chatai_bridge::{
    ChatAiHandler, HandlerRegistry, InMemoryStore, OllamaHandler, response_queue,
};

mod drain;
mod handlers;
mod state;

use handlers::{
    backend_handler, handlers_info_handler, health_handler, metrics_handler, models_handler,
    prompt_handler,
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // parse cli arguments
    let args = Args::parse();
    let config = Arc::new(args.handler_config());

    let (queue_tx, queue_rx) = response_queue();
    let store = Arc::new(InMemoryStore::new());

    let handler = Arc::new(OllamaHandler::new(
        Arc::clone(&config),
        store.clone(),
        Arc::new(queue_tx),
    ));
    handler.connect();

    let mut registry = HandlerRegistry::new();
    registry.register(handler.clone());

    let state = Arc::new(AppState::new(handler, registry, store));

    // the drain stands in for the push channel toward browsers
    let drain_shutdown = CancellationToken::new();
    let drain = tokio::spawn(drain::drain_events(
        queue_rx,
        Arc::clone(&state),
        drain_shutdown.clone(),
    ));

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/handlers", get(handlers_info_handler))
        .route("/api/models", post(models_handler))
        .route("/api/prompt", post(prompt_handler))
        .route("/admin/backend", put(backend_handler))
        .with_state(Arc::clone(&state));

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(port = args.port, "bridge listening");
    info!(backend = %config.base_url(), pool_size = config.pool_size, "forwarding to Ollama");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    // running jobs finish first so their terminal events reach the drain
    state.registry.disconnect_all().await;
    drain_shutdown.cancel();
    if let Err(e) = drain.await {
        tracing::error!(error = %e, "response drain ended abnormally");
    }
    Ok(())
}
