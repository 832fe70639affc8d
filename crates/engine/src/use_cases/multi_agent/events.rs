//! Bounded event channel between a running session and its response body.

use roundtable_shared::StreamEvent;
use tokio::sync::mpsc;

/// The client went away; nothing more can be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("client disconnected")]
pub struct Disconnected;

/// Sending half of a session's event stream.
///
/// Backpressure: `send` waits while the buffer is full, so a slow client
/// slows the orchestrator down instead of growing memory.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl EventSink {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    pub async fn send(&self, event: StreamEvent) -> Result<(), Disconnected> {
        self.tx.send(event).await.map_err(|_| Disconnected)
    }

    /// Resolves once the receiving side has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
