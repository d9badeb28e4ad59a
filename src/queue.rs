use tokio::sync::mpsc;
use tracing::warn;

use crate::models::ResponseEvent;

/// Multi-producer sink receiving every event the bridge produces.
///
/// Draining it toward clients happens elsewhere. Publishing must not block.
pub trait ResponseQueue: Send + Sync {
    fn publish(&self, event: ResponseEvent);
}

impl ResponseQueue for mpsc::UnboundedSender<ResponseEvent> {
    fn publish(&self, event: ResponseEvent) {
        if self.send(event).is_err() {
            warn!("response queue closed, event dropped");
        }
    }
}

impl ResponseQueue for mpsc::Sender<ResponseEvent> {
    fn publish(&self, event: ResponseEvent) {
        match self.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("response queue full, event dropped")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("response queue closed, event dropped")
            }
        }
    }
}

pub fn response_queue() -> (
    mpsc::UnboundedSender<ResponseEvent>,
    mpsc::UnboundedReceiver<ResponseEvent>,
) {
    mpsc::unbounded_channel()
}
