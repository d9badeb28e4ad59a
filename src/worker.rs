use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::HandlerConfig;
use crate::conversation::transcript;
use crate::error::{BridgeError, Result};
use crate::metrics::{
    ACTIVE_JOBS, CALL_FAILURES, DELTAS_PUBLISHED, STREAM_LATENCY, TERMINALS_PUBLISHED,
};
use crate::models::{AskAction, PromptExtras, RequestIdentifiers, ResponseEvent};
use crate::queue::ResponseQueue;
use crate::request::build_chat_request;
use crate::store::InteractionStore;
use crate::transport::ChatTransport;

// One dispatched prompt waiting for a worker
pub struct PromptJob {
    pub action: AskAction,
    pub prompt: String,
    pub identifiers: RequestIdentifiers,
    pub extras: PromptExtras,
}

/// Everything a prompt job needs, shared by all workers of a pool.
pub struct WorkerContext {
    pub chat_key: &'static str,
    pub config: Arc<HandlerConfig>,
    pub client: reqwest::Client,
    pub store: Arc<dyn InteractionStore>,
    pub queue: Arc<dyn ResponseQueue>,
}

impl WorkerContext {
    fn publish_terminal(&self, identifiers: &RequestIdentifiers, model: &str) {
        self.queue
            .publish(ResponseEvent::terminal(identifiers, self.chat_key, model));
        TERMINALS_PUBLISHED.inc();
    }

    // Terminal event for a request that never finished its streaming loop
    fn publish_early_terminal(&self, identifiers: &RequestIdentifiers, model: &str) {
        if self.config.always_terminate {
            self.publish_terminal(identifiers, model);
        }
    }

    /// Runs one prompt end to end: history, request, streamed call, events.
    ///
    /// Events for the job are published from this task only, so their queue
    /// order is the order of the remote stream and the terminal event comes
    /// last.
    pub async fn run(&self, job: PromptJob) {
        let started = Instant::now();
        let model = job.action.model_key.as_str();

        let key = job.action.conversation_key();
        let history = match self
            .store
            .last_interactions(&key, self.config.history_window)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                error!(error = %e, chat_id = %key.chat_id, "cannot load conversation history");
                CALL_FAILURES.inc();
                self.publish_early_terminal(&job.identifiers, model);
                return;
            }
        };

        let messages = transcript(&history, &job.prompt);
        let request = build_chat_request(&self.config, &job.action, messages, &job.extras);

        // read at send time so admin updates apply to the next call
        let base_url = self.config.base_url();
        let transport = ChatTransport::new(self.client.clone(), self.config.request_timeout);

        let mut deltas = match transport.open_chat(&base_url, &request).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, %base_url, model, "chat call could not be issued");
                CALL_FAILURES.inc();
                self.publish_early_terminal(&job.identifiers, model);
                return;
            }
        };

        let streamed = tokio::time::timeout(self.config.stream_timeout, async {
            let mut count = 0usize;
            while let Some(item) = deltas.next().await {
                match item {
                    Ok(content) => {
                        self.queue.publish(ResponseEvent::delta(
                            &job.identifiers,
                            self.chat_key,
                            model,
                            content,
                        ));
                        DELTAS_PUBLISHED.inc();
                        count += 1;
                    }
                    Err(e) => {
                        error!(error = %e, model, "stream broke, abandoning it");
                        CALL_FAILURES.inc();
                        break;
                    }
                }
            }
            count
        })
        .await;

        match streamed {
            Ok(count) => debug!(model, deltas = count, "streaming response complete"),
            Err(_) => {
                warn!(model, timeout = ?self.config.stream_timeout, "stream deadline reached, abandoning it");
                CALL_FAILURES.inc();
            }
        }

        self.publish_terminal(&job.identifiers, model);
        STREAM_LATENCY.observe(started.elapsed().as_secs_f64());
    }
}

/// Fixed-size pool of prompt workers fed through a bounded queue.
pub struct WorkerPool {
    tx: mpsc::Sender<PromptJob>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(size: usize, capacity: usize, ctx: Arc<WorkerContext>) -> Self {
        let (tx, rx) = mpsc::channel::<PromptJob>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let cancel = CancellationToken::new();

        let workers = (0..size.max(1))
            .map(|id| {
                tokio::spawn(prompt_worker(
                    id,
                    Arc::clone(&rx),
                    Arc::clone(&ctx),
                    cancel.clone(),
                ))
            })
            .collect::<Vec<_>>();

        info!(workers = workers.len(), capacity, "worker pool started");
        Self {
            tx,
            cancel,
            workers,
        }
    }

    // Never waits for room in the queue
    pub fn submit(&self, job: PromptJob) -> Result<()> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => BridgeError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => BridgeError::PoolClosed,
        })
    }

    /// Cancels queued jobs and waits for running ones to finish.
    pub async fn shutdown(self) {
        let WorkerPool {
            tx,
            cancel,
            workers,
        } = self;

        cancel.cancel();
        drop(tx);

        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "prompt worker ended abnormally");
            }
        }
        info!("worker pool stopped");
    }
}

// Background worker -> takes jobs from the shared queue one at a time
async fn prompt_worker(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<PromptJob>>>,
    ctx: Arc<WorkerContext>,
    cancel: CancellationToken,
) {
    debug!(worker = id, "prompt worker started");

    loop {
        let job = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(job) = job else { break };

        if cancel.is_cancelled() {
            debug!(worker = id, model = %job.action.model_key, "job cancelled before start");
            ctx.publish_early_terminal(&job.identifiers, &job.action.model_key);
            continue;
        }

        // own task so a panicking job does not take the worker down
        let identifiers = job.identifiers.clone();
        let model = job.action.model_key.clone();
        ACTIVE_JOBS.inc();
        let job_ctx = Arc::clone(&ctx);
        let outcome = tokio::spawn(async move { job_ctx.run(job).await }).await;
        ACTIVE_JOBS.dec();

        if let Err(e) = outcome {
            error!(worker = id, error = %e, %model, "prompt job panicked");
            CALL_FAILURES.inc();
            ctx.publish_early_terminal(&identifiers, &model);
        }
    }

    debug!(worker = id, "prompt worker stopped");
}
