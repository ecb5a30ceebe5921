//! courierd: sends files to a UDP peer using courier fragments.
//!
//! Usage: courierd <peer-addr> <file>...

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::net::UdpSocket;

use courier_core::CourierConfig;
use courier_services::udp::readiness_pump;
use courier_services::{PeerSet, SendWorker, UdpTransport};

mod transfer;

const USAGE: &str = "usage: courierd <peer-addr> <file>...";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = CourierConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = CourierConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        CourierConfig::default()
    });

    let mut args = std::env::args().skip(1);
    let peer: SocketAddr = args
        .next()
        .context(USAGE)?
        .parse()
        .context("invalid peer address")?;
    let files: Vec<PathBuf> = args.map(PathBuf::from).collect();
    if files.is_empty() {
        bail!(USAGE);
    }

    let bind = bind_addr(&config.network.bind, peer)?;
    let socket = Arc::new(
        UdpSocket::bind(bind)
            .await
            .with_context(|| format!("failed to bind {bind}"))?,
    );
    tracing::info!(
        local = %socket.local_addr()?,
        %peer,
        max_fragment_size = config.transfer.max_fragment_size,
        end_of_data_mark = %hex::encode(&config.transfer.end_of_data_mark),
        "courierd starting"
    );

    // UDP has no connection events; the peer is reachable for the whole run.
    let peers = PeerSet::new();
    peers.connect(peer);

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────
    let transport = UdpTransport::new(socket);
    let (worker, handle) = SendWorker::new(
        &config.transfer,
        transport.clone(),
        peers,
        config.worker.command_buffer,
        shutdown_tx.subscribe(),
    );
    let worker_task = tokio::spawn(worker.run());
    let pump_task = tokio::spawn(readiness_pump(transport, handle.clone()));

    // ── Wait for exit ────────────────────────────────────────────────────────
    // On ctrl-c the worker fails whatever is still queued, so the transfer
    // task always finishes.
    let summary = tokio::spawn(transfer::send_files(
        handle.clone(),
        peer,
        files,
        config.transfer.max_fragment_size,
    ))
    .await
    .context("transfer task panicked")?;

    if let Ok(status) = handle.status().await {
        tracing::info!(
            status = %serde_json::to_string(&status).unwrap_or_default(),
            "final queue status"
        );
    }
    let _ = shutdown_tx.send(());

    drop(handle);
    match worker_task.await {
        Ok(Err(e)) => tracing::error!(error = %e, "send worker failed"),
        Err(e) => tracing::error!(error = %e, "send worker panicked"),
        Ok(Ok(())) => {}
    }
    pump_task.abort();

    tracing::info!(sent = summary.sent, failed = summary.failed, "courierd done");
    if summary.failed > 0 {
        bail!("{} of {} transfers failed", summary.failed, summary.sent + summary.failed);
    }
    Ok(())
}

/// Resolve the local bind address. An address family that cannot reach the
/// peer is swapped for the unspecified address of the peer's family.
fn bind_addr(configured: &str, peer: SocketAddr) -> Result<SocketAddr> {
    let addr: SocketAddr = configured
        .parse()
        .with_context(|| format!("invalid bind address: {configured}"))?;
    if addr.is_ipv4() == peer.is_ipv4() {
        return Ok(addr);
    }
    let fallback = if peer.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, addr.port()))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, addr.port()))
    };
    tracing::warn!(%addr, %fallback, "bind address family does not match peer");
    Ok(fallback)
}
