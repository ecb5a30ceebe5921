//! UDP transport: one datagram per fragment.
//!
//! Writes use `try_send_to`, so a full socket buffer shows up as a rejected
//! write instead of blocking the worker. [`readiness_pump`] turns socket
//! writability back into `TransportReady` commands while the queue is
//! stalled.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::UdpSocket;

use crate::send_worker::SendHandle;
use crate::transport::FragmentTransport;

#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        Self { socket }
    }

    pub fn socket(&self) -> &Arc<UdpSocket> {
        &self.socket
    }

    /// Wait until the socket can likely accept another datagram.
    pub async fn ready(&self) -> io::Result<()> {
        self.socket.writable().await
    }
}

impl FragmentTransport<SocketAddr> for UdpTransport {
    fn write_fragment(&mut self, fragment: &[u8], destination: &SocketAddr) -> bool {
        match self.socket.try_send_to(fragment, *destination) {
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => false,
            Err(e) => {
                tracing::debug!(%destination, error = %e, "fragment write failed");
                false
            }
        }
    }
}

const RETRY_BACKOFF_MIN: Duration = Duration::from_millis(1);
const RETRY_BACKOFF_MAX: Duration = Duration::from_millis(200);

/// Feed `TransportReady` to the worker whenever it is stalled and the
/// socket becomes writable. Returns when the worker stops.
///
/// Also covers the window after bind where tokio has not yet seen the
/// socket as writable and `try_send_to` reports `WouldBlock`.
///
/// A writable socket does not mean the write will succeed: a hard send
/// error or a stuck destination rejects every attempt. When a pass moves
/// nothing, the next one is delayed, doubling up to `RETRY_BACKOFF_MAX`.
pub async fn readiness_pump(
    transport: UdpTransport,
    handle: SendHandle<SocketAddr>,
) -> anyhow::Result<()> {
    let mut stalled = handle.stalled();
    let mut backoff: Option<Duration> = None;
    loop {
        let closed = stalled.wait_for(|s| *s).await.is_err();
        if closed {
            return Ok(());
        }
        if let Some(delay) = backoff {
            tokio::time::sleep(delay).await;
        }
        transport
            .ready()
            .await
            .context("udp socket writability check failed")?;

        let Ok(before) = handle.status().await else {
            return Ok(());
        };
        if handle.transport_ready().await.is_err() {
            return Ok(());
        }
        let Ok(after) = handle.status().await else {
            return Ok(());
        };

        if after.is_idle() || after != before {
            backoff = None;
        } else {
            backoff = Some(next_backoff(backoff));
            tracing::debug!(
                destination = ?after.active.map(|a| a.destination),
                backoff_ms = backoff.map_or(0, |d| d.as_millis() as u64),
                "transport ready but no progress, backing off"
            );
        }
    }
}

fn next_backoff(current: Option<Duration>) -> Duration {
    current.map_or(RETRY_BACKOFF_MIN, |d| (d * 2).min(RETRY_BACKOFF_MAX))
}
