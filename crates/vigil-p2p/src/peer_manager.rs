// PEER MANAGER
// Shared, mutable list of connected peers
//
// SAFETY INVARIANTS:
// 1. Peer ids are never reused within one process
// 2. The tick loop only ever try-locks the list; it must not stall on contention
// 3. No message is written to a socket while the list is locked (queues only)

use crate::{NetMessage, Peer, PeerId};
use log::{debug, info};
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Peers keyed by id; ordered so iteration is deterministic.
pub type PeerMap = BTreeMap<PeerId, Peer>;

#[derive(Debug, Clone, Default)]
pub struct PeerManager {
    peers: Arc<Mutex<PeerMap>>,
    next_id: Arc<AtomicU64>,
}

impl PeerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly connected peer. Returns its id and outbound queue.
    pub fn add_peer(
        &self,
        address: String,
        protocol_version: u32,
    ) -> (PeerId, mpsc::UnboundedReceiver<NetMessage>) {
        let id = PeerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (peer, rx) = Peer::new(id, address.clone(), protocol_version);
        self.peers.lock().insert(id, peer);
        info!("[PeerManager] connected {} ({}, version {})", id, address, protocol_version);
        (id, rx)
    }

    pub fn remove_peer(&self, id: PeerId) -> bool {
        let removed = self.peers.lock().remove(&id).is_some();
        if removed {
            info!("[PeerManager] disconnected {}", id);
        }
        removed
    }

    /// Non-blocking access to the peer list. `None` when another task holds it.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, PeerMap>> {
        self.peers.try_lock()
    }

    /// Blocking access for short, ingress-side operations.
    pub fn lock(&self) -> MutexGuard<'_, PeerMap> {
        self.peers.lock()
    }

    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn protocol_version(&self, id: PeerId) -> Option<u32> {
        self.peers.lock().get(&id).map(|p| p.protocol_version)
    }

    /// Drop peers whose connection task has gone away. Returns how many.
    pub fn remove_disconnected(&self) -> usize {
        let mut peers = self.peers.lock();
        let before = peers.len();
        peers.retain(|id, peer| {
            let connected = peer.is_connected();
            if !connected {
                info!("[PeerManager] {} queue closed, removing", id);
            }
            connected
        });
        before - peers.len()
    }

    /// Relay a message to every peer except `origin`. Returns how many were queued.
    pub fn broadcast(&self, message: &NetMessage, origin: Option<PeerId>) -> usize {
        let peers = self.peers.lock();
        let mut sent = 0;
        for peer in peers.values().filter(|p| Some(p.id) != origin) {
            peer.push_message(message.clone());
            sent += 1;
        }
        debug!("[PeerManager] relayed {} to {} peers", message.command(), sent);
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let manager = PeerManager::new();
        let (a, _ra) = manager.add_peer("a".into(), 70206);
        let (b, _rb) = manager.add_peer("b".into(), 70206);
        assert!(a < b);
        assert_eq!(manager.len(), 2);
        assert!(manager.remove_peer(a));
        assert!(!manager.remove_peer(a));
        let (c, _rc) = manager.add_peer("c".into(), 70206);
        assert!(c > b);
    }

    #[test]
    fn test_try_lock_fails_while_held() {
        let manager = PeerManager::new();
        let guard = manager.lock();
        assert!(manager.try_lock().is_none());
        drop(guard);
        assert!(manager.try_lock().is_some());
    }

    #[tokio::test]
    async fn test_broadcast_skips_origin() {
        let manager = PeerManager::new();
        let (a, mut ra) = manager.add_peer("a".into(), 70206);
        let (_b, mut rb) = manager.add_peer("b".into(), 70206);
        assert_eq!(manager.broadcast(&NetMessage::GetSporks, Some(a)), 1);
        assert_eq!(rb.recv().await, Some(NetMessage::GetSporks));
        assert!(ra.try_recv().is_err());
    }

    #[test]
    fn test_closed_queues_are_removed() {
        let manager = PeerManager::new();
        let (a, ra) = manager.add_peer("a".into(), 70206);
        let (b, _rb) = manager.add_peer("b".into(), 70205);
        assert_eq!(manager.remove_disconnected(), 0);
        drop(ra);
        assert_eq!(manager.remove_disconnected(), 1);
        assert_eq!(manager.protocol_version(a), None);
        assert_eq!(manager.protocol_version(b), Some(70205));
        assert_eq!(manager.protocol_version(PeerId(99)), None);
    }
}
