use crate::events::StreamEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sending half of a run's event stream.
///
/// A disconnected receiver does not stop the run; the first failed send is
/// logged and later ones are dropped silently.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    disconnected: Arc<AtomicBool>,
}

impl EventSink {
    #[must_use]
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            tx,
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a sink together with its receiving half.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub async fn emit(&self, event: StreamEvent) {
        let name = event.name();
        if self.tx.send(event).await.is_err() && !self.disconnected.swap(true, Ordering::Relaxed) {
            tracing::warn!(event = name, "event stream receiver gone, continuing run without client");
        }
    }

    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Relaxed)
    }
}
