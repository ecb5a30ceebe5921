//! Queue status snapshot, serializable for logs and tooling.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus<P> {
    /// Queued tasks, the active one included.
    pub pending: usize,
    /// Payload bytes not yet accepted by the transport, across all tasks.
    pub pending_bytes: usize,
    pub active: Option<ActiveTransfer<P>>,
}

/// Progress of the task at the head of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveTransfer<P> {
    pub destination: P,
    pub bytes_sent: usize,
    pub total_bytes: usize,
}

impl<P> QueueStatus<P> {
    pub fn is_idle(&self) -> bool {
        self.pending == 0
    }
}
