//! Errors surfaced to callers of the transfer queue.
//!
//! Transport backpressure is not an error: a rejected write pauses the
//! queue and is never reported.

/// Terminal failure of a send request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The destination was not connected at submission, or disconnected
    /// before its payload and end-of-data mark were fully written.
    #[error("remote peer not connected")]
    RemotePeerNotConnected,
}
