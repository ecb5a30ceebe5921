use bytes::Bytes;
use courier_core::SendError;
use courier_services::DispatchError;

use crate::*;

#[tokio::test]
async fn test_payloads_arrive_in_order_with_marks() -> Result<()> {
    let (rx, addr) = receiver().await?;
    let node = spawn_udp_node(64, &[addr]).await?;

    let payloads = [payload(1000, 1), Vec::new(), payload(57, 2), payload(64, 3)];
    for p in &payloads {
        let sent = node.handle.send(Bytes::from(p.clone()), addr).await?;
        assert_eq!(&sent[..], &p[..]);
    }

    for p in &payloads {
        let (received, sizes) = receive_payload(&rx).await?;
        assert_eq!(&received, p);
        assert_eq!(sizes.len(), p.len().div_ceil(64));
        assert!(sizes.iter().all(|&n| n <= 64));
    }
    Ok(())
}

#[tokio::test]
async fn test_ten_bytes_with_four_byte_fragments() -> Result<()> {
    let (rx, addr) = receiver().await?;
    let node = spawn_udp_node(4, &[addr]).await?;

    node.handle
        .send(Bytes::from_static(b"\x80\x81\x82\x83\x84\x85\x86\x87\x88\x89"), addr)
        .await?;

    let (received, sizes) = receive_payload(&rx).await?;
    assert_eq!(sizes, vec![4, 4, 2]);
    assert_eq!(received.len(), 10);
    Ok(())
}

#[tokio::test]
async fn test_two_destinations_each_get_their_payloads() -> Result<()> {
    let (rx_a, addr_a) = receiver().await?;
    let (rx_b, addr_b) = receiver().await?;
    let node = spawn_udp_node(32, &[addr_a, addr_b]).await?;

    let a = payload(300, 10);
    let b = payload(200, 20);
    let (ra, rb) = tokio::join!(
        node.handle.send(Bytes::from(a.clone()), addr_a),
        node.handle.send(Bytes::from(b.clone()), addr_b),
    );
    ra?;
    rb?;

    assert_eq!(receive_payload(&rx_a).await?.0, a);
    assert_eq!(receive_payload(&rx_b).await?.0, b);
    Ok(())
}

#[tokio::test]
async fn test_unconnected_peer_is_rejected() -> Result<()> {
    let (_rx, addr) = receiver().await?;
    let (_other, stranger) = receiver().await?;
    let node = spawn_udp_node(32, &[addr]).await?;

    let err = node
        .handle
        .send(Bytes::from_static(b"hi"), stranger)
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::Send(SendError::RemotePeerNotConnected));

    node.handle.peer_connected(stranger).await?;
    node.handle.send(Bytes::from_static(b"hi"), stranger).await?;
    Ok(())
}

#[tokio::test]
async fn test_shutdown_stops_worker() -> Result<()> {
    let (_rx, addr) = receiver().await?;
    let node = spawn_udp_node(32, &[addr]).await?;

    node.shutdown.send(())?;
    node.worker.await??;

    let err = node
        .handle
        .send(Bytes::from_static(b"late"), addr)
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::WorkerStopped);
    Ok(())
}
