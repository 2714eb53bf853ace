// SYNC STATE MACHINE
// Drives peers through sporks, operator list, payment winners and
// governance, one request per tick.
//
// SAFETY INVARIANTS:
// 1. Forward moves go through `SyncAsset::next`; nothing else advances the asset
// 2. A tick either advances, sends one request, or does nothing
// 3. Peer status counts are only accepted for the asset currently syncing
// 4. `reset` leaves no per-asset state behind

use crate::{ChainTipObserver, SyncAsset, SyncConfig, SyncEnvironment, SyncError, SyncItemKind};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use vigil_core::Network;
use vigil_crypto::Hash256;
use vigil_p2p::{NetMessage, PeerManager, PeerMap};
use vigil_telemetry::{Notification, NotificationSink};

/// Running total of item counts reported by peers for one item kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InventoryTally {
    pub sum: i64,
    pub reports: u32,
}

impl InventoryTally {
    /// Peers answered, and every answer was zero.
    pub fn is_empty_report(&self) -> bool {
        self.sum == 0 && self.reports > 0
    }

    pub fn average(&self) -> Option<f64> {
        (self.reports > 0).then(|| self.sum as f64 / self.reports as f64)
    }
}

pub struct OperatorSync {
    config: SyncConfig,
    network: Network,
    sink: Arc<dyn NotificationSink>,
    asset: SyncAsset,
    attempts: u32,
    asset_started_at: i64,
    reset_at: i64,
    last_progress: BTreeMap<SyncAsset, i64>,
    inventory: BTreeMap<SyncItemKind, InventoryTally>,
    seen: BTreeMap<SyncItemKind, HashMap<Hash256, u32>>,
    failed_at: Option<i64>,
    last_tick_at: Option<i64>,
    /// Latched once the tip is recent; only cleared after a host suspend.
    blockchain_synced: bool,
    heartbeats: u64,
}

impl OperatorSync {
    pub fn new(
        config: SyncConfig,
        network: Network,
        sink: Arc<dyn NotificationSink>,
        now: i64,
    ) -> Self {
        OperatorSync {
            config,
            network,
            sink,
            asset: SyncAsset::Initial,
            attempts: 0,
            asset_started_at: now,
            reset_at: now,
            last_progress: BTreeMap::new(),
            inventory: BTreeMap::new(),
            seen: BTreeMap::new(),
            failed_at: None,
            last_tick_at: None,
            blockchain_synced: false,
            heartbeats: 0,
        }
    }

    /// Restart sync from `Initial`, discarding all per-asset state here and
    /// in `env`.
    pub fn reset(&mut self, now: i64, env: &dyn SyncEnvironment) {
        info!("[OperatorSync] reset from {}", self.asset.name());
        self.asset = SyncAsset::Initial;
        self.attempts = 0;
        self.asset_started_at = now;
        self.reset_at = now;
        self.last_progress.clear();
        self.inventory.clear();
        self.seen.clear();
        self.failed_at = None;
        env.on_reset();
        self.sink
            .notify(Notification::SyncAssetChanged(self.asset.name().to_string()));
    }

    /// Called on every node heartbeat; runs `tick` on every
    /// `heartbeat_divisor`-th call, starting with the first.
    pub fn heartbeat(
        &mut self,
        now: i64,
        peers: &PeerManager,
        chain: &ChainTipObserver,
        env: &dyn SyncEnvironment,
    ) -> Result<bool, SyncError> {
        let due = self.heartbeats % self.config.heartbeat_divisor.max(1) == 0;
        self.heartbeats = self.heartbeats.wrapping_add(1);
        if !due {
            return Ok(false);
        }
        self.tick(now, peers, chain, env)?;
        Ok(true)
    }

    /// One sync step.
    pub fn tick(
        &mut self,
        now: i64,
        peers: &PeerManager,
        chain: &ChainTipObserver,
        env: &dyn SyncEnvironment,
    ) -> Result<(), SyncError> {
        if let Some(last) = self.last_tick_at {
            if now - last > self.config.suspend_reset_secs {
                warn!(
                    "[OperatorSync] {}s since last tick, host was likely suspended; restarting",
                    now - last
                );
                self.blockchain_synced = false;
                self.reset(now, env);
            }
        }
        self.last_tick_at = Some(now);

        let tip = match chain.current() {
            Some(tip) => tip,
            None => {
                debug!("[OperatorSync] no chain tip yet");
                return Ok(());
            }
        };

        let enabled = env.enabled_operator_count();
        match self.asset {
            SyncAsset::Finished if enabled == 0 => {
                info!("[OperatorSync] no enabled operators left, syncing again");
                self.reset(now, env);
            }
            SyncAsset::Finished => return Ok(()),
            SyncAsset::Failed => {
                let failed_at = self.failed_at.unwrap_or(self.asset_started_at);
                if now - failed_at > self.config.failure_cooldown_secs {
                    self.reset(now, env);
                } else {
                    return Ok(());
                }
            }
            _ => {}
        }

        let progress = self.progress();
        debug!(
            "[OperatorSync] tick asset={} attempt={} progress={:.3}",
            self.asset.name(),
            self.attempts,
            progress
        );
        self.sink.notify(Notification::SyncProgressChanged(progress));

        if self.asset == SyncAsset::Initial {
            clear_fulfilled_requests(peers);
            self.advance_asset(now)?;
        }

        let chain_ok = self.is_blockchain_synced(now, chain) || self.network.skips_chain_gate();
        if !chain_ok && self.asset > SyncAsset::Sporks {
            return Ok(());
        }

        let mut map = match peers.try_lock() {
            Some(map) => map,
            None => {
                debug!("[OperatorSync] peer list busy, skipping tick");
                return Ok(());
            }
        };

        if self.network.uses_quick_sync() {
            return self.quick_step(now, &mut map, env);
        }

        if self.asset == SyncAsset::Sporks && self.attempts > 0 && chain_ok {
            return self.advance_asset(now);
        }

        let spork_key = SyncAsset::Sporks.request_key().unwrap_or("spork-sync");
        for peer in map.values_mut() {
            // sporks are requested from every peer whatever the asset
            if !peer.has_fulfilled_request(spork_key) {
                peer.fulfilled_request(spork_key);
                peer.push_message(NetMessage::GetSporks);
                if self.asset == SyncAsset::Sporks {
                    self.attempts += 1;
                    if chain_ok {
                        self.advance_asset(now)?;
                    }
                    return Ok(());
                }
            }

            match self.asset {
                SyncAsset::OperatorList => {
                    if peer.protocol_version < self.config.min_payments_proto_version {
                        continue;
                    }
                    let estimated = env.estimated_operator_count(tip.height);
                    if enabled as f64 > estimated as f64 * self.config.list_completeness_ratio {
                        info!(
                            "[OperatorSync] operator list complete ({} of ~{})",
                            enabled, estimated
                        );
                        return self.advance_asset(now);
                    }
                    if self.is_asset_timed_out(now) {
                        return self.advance_asset(now);
                    }
                    if !self.claim_request(peer) {
                        continue;
                    }
                    peer.push_message(NetMessage::OperatorListRequest);
                    return Ok(());
                }
                SyncAsset::PaymentWinners => {
                    if peer.protocol_version < self.config.min_payments_proto_version {
                        continue;
                    }
                    if self.is_asset_timed_out(now) || env.has_enough_payment_data(enabled) {
                        return self.advance_asset(now);
                    }
                    if !self.claim_request(peer) {
                        continue;
                    }
                    peer.push_message(NetMessage::PaymentWinnersRequest {
                        known_operator_count: i32::try_from(enabled).unwrap_or(i32::MAX),
                    });
                    return Ok(());
                }
                SyncAsset::Governance => {
                    if peer.protocol_version < self.config.min_governance_proto_version {
                        continue;
                    }
                    if self.is_asset_timed_out(now) {
                        self.advance_asset(now)?;
                        env.on_governance_synced();
                        return Ok(());
                    }
                    if !self.claim_request(peer) {
                        continue;
                    }
                    peer.push_message(NetMessage::GovernanceSyncRequest {
                        filter_hash: Hash256::zero(),
                    });
                    return Ok(());
                }
                _ => {}
            }
        }

        let stalling = matches!(
            self.asset,
            SyncAsset::OperatorList | SyncAsset::PaymentWinners | SyncAsset::Governance
        );
        if stalling && now - self.asset_started_at > self.config.stall_failure_secs {
            self.fail(now);
        }
        Ok(())
    }

    /// Move to the next asset in the transition table.
    pub fn advance_asset(&mut self, now: i64) -> Result<(), SyncError> {
        let next = self.asset.next()?;
        info!("[OperatorSync] {} -> {}", self.asset.name(), next.name());

        self.last_progress.insert(self.asset, now);
        self.last_progress.insert(next, now);
        self.asset = next;
        self.attempts = 0;
        self.asset_started_at = now;

        self.sink
            .notify(Notification::SyncAssetChanged(next.name().to_string()));
        if next == SyncAsset::Finished {
            info!("[OperatorSync] sync finished");
            self.sink.notify(Notification::SyncProgressChanged(1.0));
        }
        Ok(())
    }

    /// A peer reports how many items of `kind` it holds. Returns whether the
    /// report was accepted.
    pub fn on_inventory_count(&mut self, kind: SyncItemKind, count: i32, now: i64) -> bool {
        if kind.asset() != self.asset {
            debug!(
                "[OperatorSync] ignoring {:?} count {} while syncing {}",
                kind,
                count,
                self.asset.name()
            );
            return false;
        }
        let tally = self.inventory.entry(kind).or_default();
        tally.sum += i64::from(count.max(0));
        tally.reports += 1;
        self.last_progress.insert(self.asset, now);
        debug!("[OperatorSync] inventory {:?} count {} accepted", kind, count);
        true
    }

    /// Record a gossip item. Returns how many times it has now been seen;
    /// only the first sighting counts as progress.
    ///
    /// Items are only tracked while their asset is still ahead of or at the
    /// current one; once finished, or for assets already passed, this
    /// returns 0 and records nothing. A kind holding `seen_items_limit`
    /// hashes reports further new hashes as first sightings without storing them.
    pub fn on_item_seen(&mut self, kind: SyncItemKind, hash: Hash256, now: i64) -> u32 {
        if self.asset == SyncAsset::Finished || kind.asset() < self.asset {
            return 0;
        }
        let limit = self.config.seen_items_limit;
        let seen = self.seen.entry(kind).or_default();
        let times = match seen.get_mut(&hash) {
            Some(times) => {
                *times += 1;
                *times
            }
            None => {
                if seen.len() < limit {
                    seen.insert(hash, 1);
                } else {
                    debug!("[OperatorSync] {:?} sightings full, not storing {}", kind, hash);
                }
                1
            }
        };
        if times == 1 {
            self.last_progress.insert(kind.asset(), now);
        }
        times
    }

    /// Whether the local chain is close enough to the network tip.
    pub fn is_blockchain_synced(&mut self, now: i64, chain: &ChainTipObserver) -> bool {
        if self.blockchain_synced {
            return true;
        }
        if chain.is_importing() {
            return false;
        }
        match chain.current() {
            Some(tip) if tip.age(now) <= self.config.tip_max_age_secs => {
                info!("[OperatorSync] blockchain synced at height {}", tip.height);
                self.blockchain_synced = true;
                true
            }
            _ => false,
        }
    }

    /// Latched chain-synced flag, without re-evaluating the tip.
    pub fn blockchain_synced(&self) -> bool {
        self.blockchain_synced
    }

    /// Fraction of sync completed, in [0, 1].
    pub fn progress(&self) -> f64 {
        match self.asset {
            SyncAsset::Finished => 1.0,
            SyncAsset::Failed | SyncAsset::Initial => 0.0,
            asset => {
                let per_asset = f64::from(self.config.attempts_per_asset.max(1));
                let total = f64::from(self.config.total_assets.max(1));
                let attempt = f64::from(self.attempts.min(self.config.attempts_per_asset));
                let done = (asset.stage() - 1) as f64 * per_asset;
                ((attempt + done) / (per_asset * total)).clamp(0.0, 1.0)
            }
        }
    }

    pub fn current_asset(&self) -> SyncAsset {
        self.asset
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn asset_started_at(&self) -> i64 {
        self.asset_started_at
    }

    pub fn failed_at(&self) -> Option<i64> {
        self.failed_at
    }

    pub fn is_synced(&self) -> bool {
        self.asset == SyncAsset::Finished
    }

    pub fn is_failed(&self) -> bool {
        self.asset == SyncAsset::Failed
    }

    pub fn is_operator_list_synced(&self) -> bool {
        matches!(
            self.asset,
            SyncAsset::PaymentWinners | SyncAsset::Governance | SyncAsset::Finished
        )
    }

    pub fn status_text(&self) -> &'static str {
        self.asset.status_text()
    }

    pub fn inventory_tally(&self, kind: SyncItemKind) -> InventoryTally {
        self.inventory.get(&kind).copied().unwrap_or_default()
    }

    pub fn is_governance_objects_empty(&self) -> bool {
        self.inventory_tally(SyncItemKind::GovernanceObjects).is_empty_report()
    }

    pub fn is_governance_final_empty(&self) -> bool {
        self.inventory_tally(SyncItemKind::GovernanceFinal).is_empty_report()
    }

    pub fn times_seen(&self, kind: SyncItemKind, hash: &Hash256) -> u32 {
        self.seen
            .get(&kind)
            .and_then(|m| m.get(hash))
            .copied()
            .unwrap_or(0)
    }

    pub fn last_progress_at(&self, asset: SyncAsset) -> i64 {
        self.last_progress.get(&asset).copied().unwrap_or(self.reset_at)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn network(&self) -> Network {
        self.network
    }

    fn is_asset_timed_out(&self, now: i64) -> bool {
        now - self.last_progress_at(self.asset) > self.config.asset_timeout_secs
    }

    /// Mark the current asset's request as sent to `peer`. `false` if it already was.
    fn claim_request(&mut self, peer: &mut vigil_p2p::Peer) -> bool {
        let key = match self.asset.request_key() {
            Some(key) => key,
            None => return false,
        };
        if peer.has_fulfilled_request(key) {
            return false;
        }
        peer.fulfilled_request(key);
        self.attempts += 1;
        true
    }

    fn fail(&mut self, now: i64) {
        warn!(
            "[OperatorSync] no usable peer for {} since {}, sync failed",
            self.asset.name(),
            self.asset_started_at
        );
        self.asset = SyncAsset::Failed;
        self.failed_at = Some(now);
        self.sink
            .notify(Notification::SyncAssetChanged(self.asset.name().to_string()));
    }

    /// Regtest shortcut: ask the first peer for everything over a few ticks, then finish.
    fn quick_step(
        &mut self,
        now: i64,
        peers: &mut PeerMap,
        env: &dyn SyncEnvironment,
    ) -> Result<(), SyncError> {
        let peer = match peers.values_mut().next() {
            Some(peer) => peer,
            None => return Ok(()),
        };
        match self.attempts {
            0..=2 => peer.push_message(NetMessage::GetSporks),
            3 => peer.push_message(NetMessage::OperatorListRequest),
            4 | 5 => {
                let enabled = env.enabled_operator_count();
                peer.push_message(NetMessage::PaymentWinnersRequest {
                    known_operator_count: i32::try_from(enabled).unwrap_or(i32::MAX),
                });
                peer.push_message(NetMessage::GovernanceSyncRequest {
                    filter_hash: Hash256::zero(),
                });
            }
            _ => {
                while self.asset != SyncAsset::Finished {
                    self.advance_asset(now)?;
                }
                env.on_governance_synced();
                return Ok(());
            }
        }
        self.attempts += 1;
        Ok(())
    }
}

/// Forget which peers were asked for what, so a new pass can ask again.
fn clear_fulfilled_requests(peers: &PeerManager) {
    match peers.try_lock() {
        Some(mut map) => {
            for peer in map.values_mut() {
                for key in SyncAsset::ALL.iter().filter_map(|a| a.request_key()) {
                    peer.clear_fulfilled_request(key);
                }
            }
        }
        None => debug!("[OperatorSync] peer list busy, fulfilled flags kept"),
    }
}
