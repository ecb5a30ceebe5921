//! Send task: one payload on its way to one destination.

use std::fmt;

use bytes::Bytes;
use courier_core::wire::fragment_range;
use courier_core::SendError;

/// Called once when a send request reaches a terminal state. Receives the
/// original payload and destination back, plus the outcome.
pub type CompletionHandler<P> = Box<dyn FnOnce(Bytes, P, Result<(), SendError>) + Send>;

/// Progress record for a single queued payload.
///
/// `offset` only moves forward and never passes the payload length.
/// The handler is consumed by [`SendTask::finish`], so it cannot fire twice.
pub struct SendTask<P> {
    payload: Bytes,
    destination: P,
    offset: usize,
    completion_handler: Option<CompletionHandler<P>>,
}

impl<P> SendTask<P> {
    pub fn new(
        payload: Bytes,
        destination: P,
        completion_handler: Option<CompletionHandler<P>>,
    ) -> Self {
        Self {
            payload,
            destination,
            offset: 0,
            completion_handler,
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn destination(&self) -> &P {
        &self.destination
    }

    /// Bytes already accepted by the transport.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn total_bytes(&self) -> usize {
        self.payload.len()
    }

    pub fn sent_all_data(&self) -> bool {
        self.offset == self.payload.len()
    }

    /// The next slice of payload to write. Shares the payload's buffer.
    pub fn next_fragment(&self, max_fragment_size: usize) -> Bytes {
        self.payload
            .slice(fragment_range(self.payload.len(), self.offset, max_fragment_size))
    }

    /// Record that `written` more bytes were accepted.
    pub(crate) fn advance(&mut self, written: usize) {
        debug_assert!(self.offset + written <= self.payload.len());
        self.offset = (self.offset + written).min(self.payload.len());
    }

    /// Consume the task and report its outcome.
    pub(crate) fn finish(self, result: Result<(), SendError>) {
        if let Some(handler) = self.completion_handler {
            handler(self.payload, self.destination, result);
        }
    }
}

impl<P: fmt::Debug> fmt::Debug for SendTask<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendTask")
            .field("destination", &self.destination)
            .field("offset", &self.offset)
            .field("total_bytes", &self.payload.len())
            .field("has_handler", &self.completion_handler.is_some())
            .finish()
    }
}
