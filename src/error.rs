use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

// Everything the bridge can fail with. None of these are fatal to the process.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("handler is not connected")]
    NotConnected,

    #[error("prompt dispatched without an action")]
    MissingAction,

    #[error("worker queue is full")]
    QueueFull,

    #[error("worker pool is shut down")]
    PoolClosed,

    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("cannot connect to backend: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("cannot read stream line: {0}")]
    Lines(#[from] tokio_util::codec::LinesCodecError),

    #[error("invalid backend payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("interaction store failed: {0}")]
    Store(String),
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            BridgeError::Connect(err)
        } else {
            BridgeError::Transport(err)
        }
    }
}

impl BridgeError {
    // True for failures raised by a caller's misuse rather than the backend.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            BridgeError::NotConnected | BridgeError::MissingAction
        )
    }
}
