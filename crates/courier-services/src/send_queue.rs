//! Transfer queue: serializes send requests into one ordered pipeline.
//!
//! Requests are admitted in arrival order across all destinations. Only the
//! head task is ever advanced: its payload is cut into fragments no larger
//! than `max_fragment_size`, each handed to the transport, and then the
//! end-of-data mark is written. Only once the mark is accepted does the task
//! complete and the next one start.
//!
//! A rejected write leaves every counter untouched and stops the loop.
//! Calling [`TransferQueue::process`] again, typically when the transport
//! reports it can take more data, resumes from the exact same fragment.

use std::collections::VecDeque;
use std::fmt;

use bytes::Bytes;
use courier_core::{SendError, TransferConfig};

use crate::peer::ConnectedPeers;
use crate::send_task::{CompletionHandler, SendTask};
use crate::status::{ActiveTransfer, QueueStatus};
use crate::transport::FragmentTransport;

/// Where a processing pass stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Nothing left to send.
    Idle,
    /// The transport rejected a write. Call `process` again once it is ready.
    Stalled,
}

pub struct TransferQueue<P, T, C> {
    tasks: VecDeque<SendTask<P>>,
    transport: T,
    peers: C,
    max_fragment_size: usize,
    end_of_data_mark: Bytes,
}

impl<P, T, C> TransferQueue<P, T, C>
where
    P: Eq + fmt::Debug,
    T: FragmentTransport<P>,
    C: ConnectedPeers<P>,
{
    /// `config` is expected to have passed [`TransferConfig::validate`].
    pub fn new(config: &TransferConfig, transport: T, peers: C) -> Self {
        Self {
            tasks: VecDeque::new(),
            transport,
            peers,
            max_fragment_size: config.max_fragment_size.max(1),
            end_of_data_mark: Bytes::copy_from_slice(&config.end_of_data_mark),
        }
    }

    /// Admit a payload for `destination`.
    ///
    /// An unconnected destination fails immediately through the handler and
    /// never enters the queue. Otherwise the task is appended, and if it is
    /// the only one, processing starts right away.
    ///
    /// Returns the outcome of that processing pass, or `None` if admission
    /// did not run one.
    pub fn submit(
        &mut self,
        payload: Bytes,
        destination: P,
        completion_handler: Option<CompletionHandler<P>>,
    ) -> Option<ProcessOutcome> {
        if !self.peers.is_connected(&destination) {
            tracing::warn!(
                ?destination,
                payload_len = payload.len(),
                "send rejected, peer not connected"
            );
            if let Some(handler) = completion_handler {
                handler(payload, destination, Err(SendError::RemotePeerNotConnected));
            }
            return None;
        }

        tracing::debug!(
            ?destination,
            payload_len = payload.len(),
            queued_behind = self.tasks.len(),
            "send queued"
        );
        self.tasks
            .push_back(SendTask::new(payload, destination, completion_handler));

        (self.tasks.len() == 1).then(|| self.process())
    }

    /// Advance the head task as far as the transport allows, moving on to
    /// later tasks as each one completes.
    pub fn process(&mut self) -> ProcessOutcome {
        loop {
            let Some(task) = self.tasks.front_mut() else {
                return ProcessOutcome::Idle;
            };

            if task.sent_all_data() {
                if !self
                    .transport
                    .write_fragment(&self.end_of_data_mark, task.destination())
                {
                    tracing::trace!(destination = ?task.destination(), "end-of-data mark deferred");
                    return ProcessOutcome::Stalled;
                }
                if let Some(done) = self.tasks.pop_front() {
                    tracing::info!(
                        destination = ?done.destination(),
                        payload_len = done.total_bytes(),
                        remaining = self.tasks.len(),
                        "payload sent"
                    );
                    done.finish(Ok(()));
                }
                continue;
            }

            let fragment = task.next_fragment(self.max_fragment_size);
            if !self.transport.write_fragment(&fragment, task.destination()) {
                tracing::trace!(
                    destination = ?task.destination(),
                    offset = task.offset(),
                    "fragment deferred"
                );
                return ProcessOutcome::Stalled;
            }
            task.advance(fragment.len());
            tracing::debug!(
                destination = ?task.destination(),
                fragment_len = fragment.len(),
                offset = task.offset(),
                total = task.total_bytes(),
                "fragment sent"
            );
        }
    }

    /// Fail and remove every task addressed to `destination`, wherever it
    /// sits in the queue. Returns how many were removed.
    ///
    /// If the active task was among them, processing resumes with the new
    /// head.
    pub fn fail_tasks(&mut self, destination: &P) -> usize {
        let head_failed = self
            .tasks
            .front()
            .is_some_and(|t| t.destination() == destination);

        let (failed, kept): (VecDeque<_>, VecDeque<_>) = self
            .tasks
            .drain(..)
            .partition(|t| t.destination() == destination);
        self.tasks = kept;

        let count = failed.len();
        for task in failed {
            tracing::warn!(
                ?destination,
                bytes_sent = task.offset(),
                payload_len = task.total_bytes(),
                "send failed, peer disconnected"
            );
            task.finish(Err(SendError::RemotePeerNotConnected));
        }

        if head_failed {
            self.process();
        }
        count
    }

    /// Fail every queued task regardless of destination. Used on shutdown
    /// so no handler is left pending.
    pub fn fail_all(&mut self) -> usize {
        let count = self.tasks.len();
        for task in self.tasks.drain(..) {
            tracing::warn!(
                destination = ?task.destination(),
                bytes_sent = task.offset(),
                "send abandoned"
            );
            task.finish(Err(SendError::RemotePeerNotConnected));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of queued tasks for one destination, the active one included.
    pub fn pending_for(&self, destination: &P) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.destination() == destination)
            .count()
    }

    pub fn max_fragment_size(&self) -> usize {
        self.max_fragment_size
    }

    pub fn end_of_data_mark(&self) -> &Bytes {
        &self.end_of_data_mark
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn peers(&self) -> &C {
        &self.peers
    }

    pub fn peers_mut(&mut self) -> &mut C {
        &mut self.peers
    }
}

impl<P, T, C> TransferQueue<P, T, C>
where
    P: Eq + Clone + fmt::Debug,
    T: FragmentTransport<P>,
    C: ConnectedPeers<P>,
{
    pub fn status(&self) -> QueueStatus<P> {
        QueueStatus {
            pending: self.tasks.len(),
            pending_bytes: self
                .tasks
                .iter()
                .map(|t| t.total_bytes() - t.offset())
                .sum(),
            active: self.tasks.front().map(|t| ActiveTransfer {
                destination: t.destination().clone(),
                bytes_sent: t.offset(),
                total_bytes: t.total_bytes(),
            }),
        }
    }
}
