//! courier-services: the outbound transfer pipeline and its collaborators.

pub mod peer;
pub mod send_queue;
pub mod send_task;
pub mod send_worker;
pub mod status;
pub mod transport;
pub mod udp;

pub use peer::{ConnectedPeers, PeerEntry, PeerSet};
pub use send_queue::{ProcessOutcome, TransferQueue};
pub use send_task::{CompletionHandler, SendTask};
pub use send_worker::{DispatchError, SendHandle, SendWorker, WorkerCommand};
pub use status::{ActiveTransfer, QueueStatus};
pub use transport::FragmentTransport;
pub use udp::UdpTransport;
