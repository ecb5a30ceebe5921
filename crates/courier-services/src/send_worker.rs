//! Send worker: owns the transfer queue on a single task and applies
//! commands to it one at a time.
//!
//! Everything that touches the queue (new sends, transport readiness, peer
//! connect/disconnect) arrives as a [`WorkerCommand`] on one channel, so
//! queue operations never interleave. [`SendHandle`] is the cloneable front
//! end that turns completion callbacks into awaitable results.

use std::fmt;
use std::hash::Hash;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use courier_core::{SendError, TransferConfig};

use crate::peer::PeerSet;
use crate::send_queue::{ProcessOutcome, TransferQueue};
use crate::send_task::CompletionHandler;
use crate::status::QueueStatus;
use crate::transport::FragmentTransport;

/// Failure as seen through a [`SendHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Send(#[from] SendError),
    #[error("send worker stopped")]
    WorkerStopped,
}

pub enum WorkerCommand<P> {
    /// Queue a payload.
    Send {
        payload: Bytes,
        destination: P,
        completion_handler: Option<CompletionHandler<P>>,
    },
    /// The transport can accept writes again.
    TransportReady,
    PeerConnected(P),
    /// The peer became unreachable; its queued sends fail.
    PeerLost(P),
    Status(oneshot::Sender<QueueStatus<P>>),
}

impl<P: fmt::Debug> fmt::Debug for WorkerCommand<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send {
                payload,
                destination,
                ..
            } => f
                .debug_struct("Send")
                .field("payload_len", &payload.len())
                .field("destination", destination)
                .finish(),
            Self::TransportReady => f.write_str("TransportReady"),
            Self::PeerConnected(p) => f.debug_tuple("PeerConnected").field(p).finish(),
            Self::PeerLost(p) => f.debug_tuple("PeerLost").field(p).finish(),
            Self::Status(_) => f.write_str("Status"),
        }
    }
}

pub struct SendWorker<P: Eq + Hash, T> {
    queue: TransferQueue<P, T, PeerSet<P>>,
    command_rx: mpsc::Receiver<WorkerCommand<P>>,
    stalled_tx: watch::Sender<bool>,
    shutdown: broadcast::Receiver<()>,
}

impl<P, T> SendWorker<P, T>
where
    P: Eq + Hash + Clone + fmt::Debug,
    T: FragmentTransport<P>,
{
    /// Build a worker and the handle that drives it. `command_buffer` is
    /// the command channel capacity (minimum 1).
    pub fn new(
        config: &TransferConfig,
        transport: T,
        peers: PeerSet<P>,
        command_buffer: usize,
        shutdown: broadcast::Receiver<()>,
    ) -> (Self, SendHandle<P>) {
        let (command_tx, command_rx) = mpsc::channel(command_buffer.max(1));
        let (stalled_tx, stalled_rx) = watch::channel(false);
        let worker = Self {
            queue: TransferQueue::new(config, transport, peers),
            command_rx,
            stalled_tx,
            shutdown,
        };
        let handle = SendHandle {
            command_tx,
            stalled_rx,
        };
        (worker, handle)
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("send worker shutting down");
                    break;
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.apply(cmd),
                        None => {
                            tracing::info!("all send handles dropped, send worker exiting");
                            break;
                        }
                    }
                }
            }
        }

        let abandoned = self.queue.fail_all();
        if abandoned > 0 {
            tracing::warn!(abandoned, "pending sends failed on worker exit");
        }
        self.stalled_tx.send_replace(false);
        Ok(())
    }

    fn apply(&mut self, cmd: WorkerCommand<P>) {
        tracing::trace!(?cmd, "send worker command");
        let outcome = match cmd {
            WorkerCommand::Send {
                payload,
                destination,
                completion_handler,
            } => self.queue.submit(payload, destination, completion_handler),
            WorkerCommand::TransportReady => Some(self.queue.process()),
            WorkerCommand::PeerConnected(peer) => {
                if self.queue.peers().connect(peer.clone()) {
                    tracing::info!(?peer, "peer connected");
                }
                None
            }
            WorkerCommand::PeerLost(peer) => {
                self.queue.peers().disconnect(&peer);
                let failed = self.queue.fail_tasks(&peer);
                tracing::info!(?peer, failed, "peer lost");
                // A surviving head is still waiting on the transport.
                self.queue.is_empty().then_some(ProcessOutcome::Idle)
            }
            WorkerCommand::Status(reply) => {
                let _ = reply.send(self.queue.status());
                None
            }
        };
        if let Some(outcome) = outcome {
            self.stalled_tx.send_replace(outcome == ProcessOutcome::Stalled);
        }
    }
}

/// Cloneable front end to a running [`SendWorker`].
pub struct SendHandle<P> {
    command_tx: mpsc::Sender<WorkerCommand<P>>,
    stalled_rx: watch::Receiver<bool>,
}

impl<P> Clone for SendHandle<P> {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            stalled_rx: self.stalled_rx.clone(),
        }
    }
}

impl<P: Send + 'static> SendHandle<P> {
    /// Send a payload and wait until it is fully written, end-of-data mark
    /// included. Returns the payload on success.
    pub async fn send(&self, payload: Bytes, destination: P) -> Result<Bytes, DispatchError> {
        let (tx, rx) = oneshot::channel();
        let handler: CompletionHandler<P> = Box::new(move |payload, _destination, result| {
            let _ = tx.send(result.map(|()| payload));
        });
        self.submit(payload, destination, Some(handler)).await?;
        match rx.await {
            Ok(result) => result.map_err(DispatchError::from),
            Err(_) => Err(DispatchError::WorkerStopped),
        }
    }

    /// Queue a payload without waiting for it to finish. Resolves once the
    /// worker has the request.
    ///
    /// If the worker is gone the handler still fires, with
    /// `RemotePeerNotConnected`, and `WorkerStopped` is returned.
    pub async fn submit(
        &self,
        payload: Bytes,
        destination: P,
        completion_handler: Option<CompletionHandler<P>>,
    ) -> Result<(), DispatchError> {
        let cmd = WorkerCommand::Send {
            payload,
            destination,
            completion_handler,
        };
        match self.command_tx.send(cmd).await {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendError(cmd)) => {
                if let WorkerCommand::Send {
                    payload,
                    destination,
                    completion_handler: Some(handler),
                } = cmd
                {
                    handler(payload, destination, Err(SendError::RemotePeerNotConnected));
                }
                Err(DispatchError::WorkerStopped)
            }
        }
    }

    pub async fn transport_ready(&self) -> Result<(), DispatchError> {
        self.command(WorkerCommand::TransportReady).await
    }

    pub async fn peer_connected(&self, peer: P) -> Result<(), DispatchError> {
        self.command(WorkerCommand::PeerConnected(peer)).await
    }

    pub async fn peer_lost(&self, peer: P) -> Result<(), DispatchError> {
        self.command(WorkerCommand::PeerLost(peer)).await
    }

    pub async fn status(&self) -> Result<QueueStatus<P>, DispatchError> {
        let (tx, rx) = oneshot::channel();
        self.command(WorkerCommand::Status(tx)).await?;
        rx.await.map_err(|_| DispatchError::WorkerStopped)
    }

    /// `true` while the worker has queued data waiting on the transport.
    pub fn stalled(&self) -> watch::Receiver<bool> {
        self.stalled_rx.clone()
    }

    async fn command(&self, cmd: WorkerCommand<P>) -> Result<(), DispatchError> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| DispatchError::WorkerStopped)
    }
}
