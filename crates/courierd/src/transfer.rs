//! File transfer: reads files and pushes them through the send worker.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bytes::Bytes;

use courier_core::wire::fragment_count;
use courier_services::SendHandle;

/// Outcome of a batch of file sends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferSummary {
    pub sent: usize,
    pub failed: usize,
}

/// Send each file to `peer` in order, one payload per file.
///
/// A file that cannot be read or delivered is logged and counted as failed;
/// the remaining files are still attempted.
pub async fn send_files(
    handle: SendHandle<SocketAddr>,
    peer: SocketAddr,
    files: Vec<PathBuf>,
    max_fragment_size: usize,
) -> TransferSummary {
    let mut summary = TransferSummary::default();
    for path in files {
        match send_file(&handle, peer, &path, max_fragment_size).await {
            Ok(()) => summary.sent += 1,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "file transfer failed");
                summary.failed += 1;
            }
        }
    }
    summary
}

async fn send_file(
    handle: &SendHandle<SocketAddr>,
    peer: SocketAddr,
    path: &std::path::Path,
    max_fragment_size: usize,
) -> Result<()> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read file: {}", path.display()))?;
    let digest = blake3::hash(&data);
    let total_bytes = data.len();

    tracing::info!(
        path = %path.display(),
        %peer,
        total_bytes,
        fragments = fragment_count(total_bytes, max_fragment_size),
        blake3 = %hex::encode(&digest.as_bytes()[..8]),
        "file transfer started"
    );

    handle
        .send(Bytes::from(data), peer)
        .await
        .with_context(|| format!("failed to send {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        %peer,
        total_bytes,
        blake3 = %hex::encode(&digest.as_bytes()[..8]),
        "file transfer complete"
    );
    Ok(())
}
