//! Connected peer registry: which destinations are reachable right now.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

/// Membership test consulted when a send request is admitted.
pub trait ConnectedPeers<P> {
    fn is_connected(&self, peer: &P) -> bool;
}

impl<P: Eq + Hash> ConnectedPeers<P> for HashSet<P> {
    fn is_connected(&self, peer: &P) -> bool {
        self.contains(peer)
    }
}

/// Tracked state for a connected peer.
#[derive(Debug, Clone)]
pub struct PeerEntry {
    /// When the connection was reported.
    pub connected_at: Instant,
}

/// The peer set, shared between the connection manager and the send
/// worker. Cloning shares the underlying table.
#[derive(Debug)]
pub struct PeerSet<P: Eq + Hash> {
    peers: Arc<DashMap<P, PeerEntry>>,
}

impl<P: Eq + Hash> Clone for PeerSet<P> {
    fn clone(&self) -> Self {
        Self {
            peers: self.peers.clone(),
        }
    }
}

impl<P: Eq + Hash> Default for PeerSet<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Eq + Hash> PeerSet<P> {
    pub fn new() -> Self {
        Self {
            peers: Arc::new(DashMap::new()),
        }
    }

    /// Mark a peer connected. Returns false if it already was; the
    /// original `connected_at` is kept in that case.
    pub fn connect(&self, peer: P) -> bool {
        let mut inserted = false;
        self.peers.entry(peer).or_insert_with(|| {
            inserted = true;
            PeerEntry {
                connected_at: Instant::now(),
            }
        });
        inserted
    }

    /// Forget a peer. Returns false if it was not connected.
    pub fn disconnect(&self, peer: &P) -> bool {
        self.peers.remove(peer).is_some()
    }

    pub fn get(&self, peer: &P) -> Option<PeerEntry> {
        self.peers.get(peer).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl<P: Eq + Hash + Clone> PeerSet<P> {
    /// Snapshot of connected peers, in no particular order.
    pub fn peers(&self) -> Vec<P> {
        self.peers.iter().map(|e| e.key().clone()).collect()
    }
}

impl<P: Eq + Hash> ConnectedPeers<P> for PeerSet<P> {
    fn is_connected(&self, peer: &P) -> bool {
        self.peers.contains_key(peer)
    }
}
