// NODE
// Routes peer messages into operator sync and instant locking, and drives
// both from a single heartbeat.
//
// SAFETY INVARIANTS:
// 1. Lock messages are ignored until the chain and the operator list are synced
// 2. Lock messages from peers below the minimum protocol version are ignored
// 3. Relays are sent after the engine lock is released
// 4. Lock order is sync, then peers; the engine lock is never held with either

use crate::config::NodeConfig;
use crate::environment::RosterSyncEnvironment;
use log::{debug, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use vigil_core::{BlockTip, LockCollateral, Transaction, VoteRecord};
use vigil_crypto::Hash256;
use vigil_instantsend::{InstantSendEngine, LockError, OperatorRoster, VoteContext};
use vigil_p2p::{decode_message, CodecError, NetMessage, PeerId, PeerManager};
use vigil_sync::{ChainTipObserver, InventoryTally, OperatorSync, SyncError, SyncItemKind};
use vigil_telemetry::NotificationSink;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("invalid node configuration: {0}")]
    Config(String),
}

/// Snapshot for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStatus {
    pub asset: &'static str,
    pub status: &'static str,
    pub progress: f64,
    pub locking_enabled: bool,
    pub completed_locks: u64,
    pub tracked_locks: usize,
    pub peers: usize,
}

pub struct Node {
    config: NodeConfig,
    peers: PeerManager,
    chain: Arc<ChainTipObserver>,
    roster: Arc<dyn OperatorRoster>,
    env: Arc<RosterSyncEnvironment>,
    sync: Mutex<OperatorSync>,
    instantsend: Mutex<InstantSendEngine>,
}

impl Node {
    pub fn new(
        config: NodeConfig,
        roster: Arc<dyn OperatorRoster>,
        sink: Arc<dyn NotificationSink>,
        now: i64,
    ) -> Result<Self, NodeError> {
        let local = config
            .local_operator()
            .map_err(|e| NodeError::Config(format!("{:#}", e)))?;
        let sync = OperatorSync::new(config.sync.clone(), config.network, sink.clone(), now);
        let instantsend = InstantSendEngine::new(config.instantsend.clone(), local, sink);
        Ok(Node {
            env: Arc::new(RosterSyncEnvironment::new(roster.clone())),
            peers: PeerManager::new(),
            chain: Arc::new(ChainTipObserver::new()),
            roster,
            sync: Mutex::new(sync),
            instantsend: Mutex::new(instantsend),
            config,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn peers(&self) -> &PeerManager {
        &self.peers
    }

    pub fn chain(&self) -> &Arc<ChainTipObserver> {
        &self.chain
    }

    pub fn environment(&self) -> &Arc<RosterSyncEnvironment> {
        &self.env
    }

    pub fn on_block_tip(&self, tip: BlockTip) {
        self.chain.updated_block_tip(tip);
    }

    /// Periodic housekeeping. Expired locks and closed peers are pruned on
    /// every call; the sync machine steps on its own divisor.
    pub fn heartbeat(&self, now: i64) -> Result<(), NodeError> {
        let pruned = self.instantsend.lock().prune(now);
        if pruned > 0 {
            debug!("[Node] pruned {} lock records", pruned);
        }
        self.peers.remove_disconnected();
        self.sync
            .lock()
            .heartbeat(now, &self.peers, &self.chain, self.env.as_ref())?;
        Ok(())
    }

    /// Lock messages are only processed once the chain and the operator list
    /// are synced. Regtest skips the chain condition.
    pub fn is_locking_enabled(&self) -> bool {
        let sync = self.sync.lock();
        let chain_ok = sync.blockchain_synced() || self.config.network.skips_chain_gate();
        chain_ok && sync.is_operator_list_synced()
    }

    /// Decode one frame received from `peer` and dispatch it.
    pub fn handle_frame(&self, peer: PeerId, frame: &[u8], now: i64) -> Result<(), NodeError> {
        let message = decode_message(frame).map_err(|e| {
            warn!("[Node] undecodable frame from {}: {}", peer, e);
            e
        })?;
        self.handle_message(peer, message, now)
    }

    pub fn handle_message(&self, peer: PeerId, message: NetMessage, now: i64) -> Result<(), NodeError> {
        match message {
            NetMessage::SyncStatusCount { item_kind, count } => {
                let kind = SyncItemKind::from_wire(item_kind)?;
                self.sync.lock().on_inventory_count(kind, count, now);
                Ok(())
            }
            NetMessage::LockRequest { tx, collateral } => {
                match self.lock_context(peer, now) {
                    Some(ctx) => self.on_lock_request(peer, tx, collateral, ctx),
                    None => Ok(()),
                }
            }
            NetMessage::LockVote(vote) => match self.lock_context(peer, now) {
                Some(ctx) => self.on_lock_vote(peer, vote, ctx),
                None => Ok(()),
            },
            other => {
                debug!("[Node] {} from {} handled elsewhere", other.command(), peer);
                Ok(())
            }
        }
    }

    /// Record a gossip item seen while syncing. Returns its sighting count.
    pub fn on_item_seen(&self, kind: SyncItemKind, hash: Hash256, now: i64) -> u32 {
        let times = self.sync.lock().on_item_seen(kind, hash, now);
        if times == 1 && kind == SyncItemKind::PaymentWinners {
            self.env.record_payment_vote();
        }
        times
    }

    pub fn inventory_tally(&self, kind: SyncItemKind) -> InventoryTally {
        self.sync.lock().inventory_tally(kind)
    }

    pub fn is_lock_final(&self, tx_hash: &Hash256) -> bool {
        self.instantsend.lock().is_final(tx_hash)
    }

    pub fn lock_signature_count(&self, tx_hash: &Hash256) -> usize {
        self.instantsend.lock().registry().signature_count(tx_hash)
    }

    pub fn status(&self) -> NodeStatus {
        let locking_enabled = self.is_locking_enabled();
        let (asset, status, progress) = {
            let sync = self.sync.lock();
            (sync.current_asset().name(), sync.status_text(), sync.progress())
        };
        let (completed_locks, tracked_locks) = {
            let engine = self.instantsend.lock();
            (engine.registry().completed_lock_count(), engine.registry().len())
        };
        NodeStatus {
            asset,
            status,
            progress,
            locking_enabled,
            completed_locks,
            tracked_locks,
            peers: self.peers.len(),
        }
    }

    fn lock_context(&self, peer: PeerId, now: i64) -> Option<VoteContext> {
        let min = self.config.instantsend.min_proto_version;
        match self.peers.protocol_version(peer) {
            Some(version) if version >= min => {}
            version => {
                debug!(
                    "[Node] ignoring lock message from {} (protocol {:?} < {})",
                    peer, version, min
                );
                return None;
            }
        }
        if !self.is_locking_enabled() {
            debug!("[Node] ignoring lock message from {} while syncing", peer);
            return None;
        }
        let tip_height = self.chain.height()?;
        Some(VoteContext { now, tip_height })
    }

    fn on_lock_request(
        &self,
        peer: PeerId,
        tx: Transaction,
        collateral: LockCollateral,
        ctx: VoteContext,
    ) -> Result<(), NodeError> {
        let result = self
            .instantsend
            .lock()
            .handle_lock_request(&tx, &collateral, self.roster.as_ref(), ctx);
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                if err.is_protocol_violation() {
                    warn!("[Node] peer {} sent invalid lock request: {}", peer, err);
                }
                return Err(err.into());
            }
        };
        if !outcome.is_new {
            return Ok(());
        }

        self.peers
            .broadcast(&NetMessage::LockRequest { tx, collateral }, Some(peer));
        if let Some(vote) = outcome.local_vote {
            self.peers.broadcast(&NetMessage::LockVote(vote), None);
        }
        Ok(())
    }

    fn on_lock_vote(&self, peer: PeerId, vote: VoteRecord, ctx: VoteContext) -> Result<(), NodeError> {
        let relay = match self
            .instantsend
            .lock()
            .handle_vote(vote.clone(), self.roster.as_ref(), ctx)
        {
            Ok(relay) => relay,
            Err(err) => {
                if err.is_protocol_violation() {
                    warn!("[Node] peer {} sent invalid vote: {}", peer, err);
                }
                return Err(err.into());
            }
        };
        if relay {
            self.peers.broadcast(&NetMessage::LockVote(vote), Some(peer));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_instantsend::InMemoryRoster;
    use vigil_telemetry::RecordingSink;

    #[test]
    fn test_half_configured_operator_is_rejected() {
        let mut config = NodeConfig::default();
        config.operator_secret_hex = Some("22".repeat(32));
        let result = Node::new(
            config,
            Arc::new(InMemoryRoster::new()),
            Arc::new(RecordingSink::new()),
            0,
        );
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn test_fresh_node_is_not_locking() {
        let node = Node::new(
            NodeConfig::default(),
            Arc::new(InMemoryRoster::new()),
            Arc::new(RecordingSink::new()),
            0,
        )
        .unwrap();
        let status = node.status();
        assert_eq!(status.asset, "SYNC_INITIAL");
        assert!(!status.locking_enabled);
        assert_eq!(status.peers, 0);
    }

    #[test]
    fn test_unknown_inventory_kind_is_an_error() {
        let node = Node::new(
            NodeConfig::default(),
            Arc::new(InMemoryRoster::new()),
            Arc::new(RecordingSink::new()),
            0,
        )
        .unwrap();
        let msg = NetMessage::SyncStatusCount {
            item_kind: 99,
            count: 1,
        };
        assert!(matches!(
            node.handle_message(PeerId(1), msg, 0),
            Err(NodeError::Sync(SyncError::UnknownAsset(99)))
        ));
    }
}
