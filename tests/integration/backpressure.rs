use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use courier_core::SendError;
use courier_services::CompletionHandler;
use tokio::sync::oneshot;

use crate::*;

/// Rejects every `period`-th write attempt.
struct Flaky {
    inner: UdpTransport,
    period: usize,
    attempts: usize,
    rejections: Arc<AtomicUsize>,
}

impl FragmentTransport<SocketAddr> for Flaky {
    fn write_fragment(&mut self, fragment: &[u8], destination: &SocketAddr) -> bool {
        self.attempts += 1;
        if self.attempts % self.period == 0 {
            self.rejections.fetch_add(1, Ordering::SeqCst);
            return false;
        }
        self.inner.write_fragment(fragment, destination)
    }
}

/// Rejects everything while closed.
struct Gate {
    inner: UdpTransport,
    open: Arc<AtomicBool>,
}

impl FragmentTransport<SocketAddr> for Gate {
    fn write_fragment(&mut self, fragment: &[u8], destination: &SocketAddr) -> bool {
        self.open.load(Ordering::SeqCst) && self.inner.write_fragment(fragment, destination)
    }
}

fn oneshot_handler() -> (
    CompletionHandler<SocketAddr>,
    oneshot::Receiver<Result<(), SendError>>,
) {
    let (tx, rx) = oneshot::channel();
    let handler: CompletionHandler<SocketAddr> = Box::new(move |_, _, result| {
        let _ = tx.send(result);
    });
    (handler, rx)
}

#[tokio::test]
async fn test_readiness_pump_recovers_from_rejected_writes() -> Result<()> {
    let (rx, addr) = receiver().await?;
    let rejections = Arc::new(AtomicUsize::new(0));
    let counter = rejections.clone();
    let node = spawn_node(16, &[addr], move |udp| Flaky {
        inner: udp,
        period: 3,
        attempts: 0,
        rejections: counter,
    })
    .await?;

    let data = payload(500, 5);
    let sent = tokio::time::timeout(RECV_TIMEOUT, node.handle.send(Bytes::from(data.clone()), addr))
        .await
        .context("send never completed")??;
    assert_eq!(&sent[..], &data[..]);

    let (received, sizes) = receive_payload(&rx).await?;
    assert_eq!(received, data);
    assert_eq!(sizes.len(), 500usize.div_ceil(16));
    assert!(rejections.load(Ordering::SeqCst) > 0);

    Ok(())
}

#[tokio::test]
async fn test_peer_lost_mid_queue() -> Result<()> {
    let (rx_a, addr_a) = receiver().await?;
    let (rx_b, addr_b) = receiver().await?;
    let open = Arc::new(AtomicBool::new(false));
    let gate = open.clone();
    let node = spawn_node(8, &[addr_a, addr_b], move |udp| Gate {
        inner: udp,
        open: gate,
    })
    .await?;

    let (ha, done_a) = oneshot_handler();
    let (hb, done_b) = oneshot_handler();
    node.handle
        .submit(Bytes::from(payload(40, 1)), addr_a, Some(ha))
        .await?;
    node.handle
        .submit(Bytes::from(payload(24, 2)), addr_b, Some(hb))
        .await?;

    let status = node.handle.status().await?;
    assert_eq!(status.pending, 2);
    assert_eq!(status.active.map(|a| a.destination), Some(addr_a));

    node.handle.peer_lost(addr_a).await?;
    assert_eq!(done_a.await?, Err(SendError::RemotePeerNotConnected));

    // "b" is now the head but the gate is still closed.
    assert_eq!(node.handle.status().await?.pending, 1);

    open.store(true, Ordering::SeqCst);
    node.handle.transport_ready().await?;
    assert_eq!(done_b.await?, Ok(()));

    assert_eq!(receive_payload(&rx_b).await?.0, payload(24, 2));
    let mut buf = [0u8; 64];
    let nothing = tokio::time::timeout(Duration::from_millis(200), rx_a.recv(&mut buf)).await;
    assert!(nothing.is_err(), "lost peer should receive nothing");
    Ok(())
}

#[tokio::test]
async fn test_head_of_line_blocking_across_destinations() -> Result<()> {
    // One global queue: a send to "b" waits while "a" is stalled, even though
    // the transport would accept writes to "b".
    let (_rx_a, addr_a) = receiver().await?;
    let (_rx_b, addr_b) = receiver().await?;
    let node = spawn_node(8, &[addr_a, addr_b], move |udp| Selective {
        inner: udp,
        blocked: addr_a,
    })
    .await?;

    let (ha, _done_a) = oneshot_handler();
    let (hb, mut done_b) = oneshot_handler();
    node.handle
        .submit(Bytes::from(payload(16, 1)), addr_a, Some(ha))
        .await?;
    node.handle
        .submit(Bytes::from(payload(16, 2)), addr_b, Some(hb))
        .await?;
    node.handle.transport_ready().await?;

    let status = node.handle.status().await?;
    assert_eq!(status.pending, 2);
    assert!(done_b.try_recv().is_err());
    Ok(())
}

/// Counts every write attempt that reaches the socket.
struct Counting {
    inner: UdpTransport,
    attempts: Arc<AtomicUsize>,
}

impl FragmentTransport<SocketAddr> for Counting {
    fn write_fragment(&mut self, fragment: &[u8], destination: &SocketAddr) -> bool {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.inner.write_fragment(fragment, destination)
    }
}

#[tokio::test]
async fn test_hard_send_error_backs_off() -> Result<()> {
    // The node is bound to 127.0.0.1, so every write to an IPv6 peer fails
    // while the socket itself stays writable.
    let unreachable: SocketAddr = "[::1]:9".parse()?;
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let node = spawn_node(8, &[unreachable], move |udp| Counting {
        inner: udp,
        attempts: counter,
    })
    .await?;

    let (handler, done) = oneshot_handler();
    node.handle
        .submit(Bytes::from_static(b"x"), unreachable, Some(handler))
        .await?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let tried = attempts.load(Ordering::SeqCst);
    assert!(tried > 1, "pump never retried");
    assert!(tried < 100, "{tried} write attempts in 500ms");

    let status = node.handle.status().await?;
    assert_eq!(status.pending, 1);
    assert_eq!(status.active.map(|a| a.bytes_sent), Some(0));

    node.handle.peer_lost(unreachable).await?;
    assert_eq!(done.await?, Err(SendError::RemotePeerNotConnected));
    Ok(())
}

/// Rejects writes to one destination only.
struct Selective {
    inner: UdpTransport,
    blocked: SocketAddr,
}

impl FragmentTransport<SocketAddr> for Selective {
    fn write_fragment(&mut self, fragment: &[u8], destination: &SocketAddr) -> bool {
        *destination != self.blocked && self.inner.write_fragment(fragment, destination)
    }
}
