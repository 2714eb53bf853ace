// INSTANT SEND ENGINE
// Message-level entry points: lock requests, votes, local voting.
//
// SAFETY INVARIANTS:
// 1. A request that failed validation is remembered and never re-validated
// 2. The local operator votes at most once per transaction
// 3. The local operator never votes for a transaction whose input a final lock already holds

use crate::{
    ConflictResolution, InstantSendConfig, LockError, LockRegistry, OperatorRoster, Settlement,
    VoteContext, VoteOutcome,
};
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use vigil_core::{LockCollateral, OutPoint, Transaction, VoteRecord};
use vigil_crypto::{sha256d, Hash256, OperatorKey};
use vigil_telemetry::{Notification, NotificationSink};

/// Identity this node votes with when it runs as an operator.
pub struct LocalOperator {
    pub collateral: OutPoint,
    key: OperatorKey,
}

impl LocalOperator {
    pub fn new(collateral: OutPoint, key: OperatorKey) -> Self {
        LocalOperator { collateral, key }
    }

    pub fn public_key(&self) -> vigil_crypto::PublicKey {
        self.key.public_key()
    }
}

impl fmt::Debug for LocalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalOperator")
            .field("collateral", &self.collateral)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequestOutcome {
    pub tx_hash: Hash256,
    /// False when the request had already been processed.
    pub is_new: bool,
    /// Vote cast by the local operator, to be relayed.
    pub local_vote: Option<VoteRecord>,
    pub conflicts: Vec<ConflictResolution>,
}

/// Whether `operator` belongs to the voting pool for `tx_hash`.
///
/// Each operator draws a score from `sha256d(tx_hash || operator)`; roughly
/// `signatures_total` of `operator_count` operators fall under the target.
/// Pools no larger than `signatures_total` always vote.
pub fn is_selected_voter(
    tx_hash: &Hash256,
    operator: &OutPoint,
    operator_count: usize,
    signatures_total: usize,
) -> bool {
    if operator_count <= signatures_total {
        return true;
    }
    let mut seed = Vec::with_capacity(32 + 36);
    seed.extend_from_slice(tx_hash.as_bytes());
    seed.extend_from_slice(&operator.to_bytes());
    let score = sha256d(&seed).high_u128();
    let target = (u128::MAX / operator_count as u128).saturating_mul(signatures_total as u128);
    score <= target
}

pub struct InstantSendEngine {
    registry: LockRegistry,
    local: Option<LocalOperator>,
    sink: Arc<dyn NotificationSink>,
}

impl InstantSendEngine {
    pub fn new(
        config: InstantSendConfig,
        local: Option<LocalOperator>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        if let Some(op) = &local {
            info!("[InstantSend] voting as operator {}", op.collateral);
        }
        InstantSendEngine {
            registry: LockRegistry::new(config),
            local,
            sink,
        }
    }

    pub fn registry(&self) -> &LockRegistry {
        &self.registry
    }

    pub fn config(&self) -> &InstantSendConfig {
        self.registry.config()
    }

    pub fn is_final(&self, tx_hash: &Hash256) -> bool {
        self.registry.is_final(tx_hash)
    }

    /// Validate a lock request, record its inputs and cast the local vote if selected.
    pub fn handle_lock_request(
        &mut self,
        tx: &Transaction,
        collateral: &LockCollateral,
        roster: &dyn OperatorRoster,
        ctx: VoteContext,
    ) -> Result<LockRequestOutcome, LockError> {
        let tx_hash = tx.hash();
        if let Some(err) = self.registry.rejection(&tx_hash, ctx.now) {
            debug!("[InstantSend] ignoring previously rejected request {}", tx_hash);
            return Err(err.clone());
        }
        if self.registry.get(&tx_hash).and_then(|r| r.inputs()).is_some() {
            return Ok(LockRequestOutcome {
                tx_hash,
                is_new: false,
                local_vote: None,
                conflicts: Vec::new(),
            });
        }

        if let Err(err) = self.validate_request(tx, collateral) {
            warn!("[InstantSend] rejected lock request {}: {}", tx_hash, err);
            self.registry.remember_rejection(tx_hash, err.clone(), ctx.now);
            return Err(err);
        }

        let settlement = self.registry.register_request(tx, ctx);
        self.publish(&settlement);

        let mut local_vote = self.create_local_vote(&tx_hash, roster, ctx);
        if let Some(vote) = local_vote.clone() {
            if let Err(err) = self.handle_vote(vote, roster, ctx) {
                warn!("[InstantSend] local vote on {} not counted: {}", tx_hash, err);
                local_vote = None;
            }
        }

        Ok(LockRequestOutcome {
            tx_hash,
            is_new: true,
            local_vote,
            conflicts: settlement.conflicts,
        })
    }

    /// Sign a vote for `tx_hash` when this node is an eligible, selected operator.
    pub fn create_local_vote(
        &self,
        tx_hash: &Hash256,
        roster: &dyn OperatorRoster,
        ctx: VoteContext,
    ) -> Option<VoteRecord> {
        let local = self.local.as_ref()?;
        let record = self.registry.get(tx_hash);

        if record.and_then(|r| r.vote_from(&local.collateral)).is_some() {
            return None;
        }
        if self.registry.detect_conflict(tx_hash).is_some() {
            debug!("[InstantSend] not voting on {}: input already locked", tx_hash);
            return None;
        }
        if !roster.is_eligible(&local.collateral, ctx.tip_height) {
            debug!("[InstantSend] local operator not eligible at height {}", ctx.tip_height);
            return None;
        }
        let pool = roster.enabled_count();
        if !is_selected_voter(tx_hash, &local.collateral, pool, self.config().signatures_total) {
            return None;
        }

        Some(VoteRecord::signed(*tx_hash, local.collateral, ctx.tip_height, &local.key))
    }

    /// Count a vote. Returns `true` when it was new and should be relayed.
    ///
    /// A differing repeat vote from the same operator is dropped quietly;
    /// every other rejection is returned to the caller.
    pub fn handle_vote(
        &mut self,
        vote: VoteRecord,
        roster: &dyn OperatorRoster,
        ctx: VoteContext,
    ) -> Result<bool, LockError> {
        let tx_hash = vote.tx_hash;
        match self.registry.submit_vote(vote, roster, ctx) {
            Ok(VoteOutcome::Counted { settlement, .. }) => {
                self.publish(&settlement);
                Ok(true)
            }
            Ok(VoteOutcome::AlreadyCounted) => Ok(false),
            Err(err @ LockError::DuplicateVote { .. }) => {
                debug!("[InstantSend] {}", err);
                Ok(false)
            }
            Err(err) => {
                debug!("[InstantSend] vote on {} rejected: {}", tx_hash, err);
                Err(err)
            }
        }
    }

    pub fn on_conflict_detected(&self, resolution: ConflictResolution) {
        self.sink.notify(Notification::LockConflict {
            winner: resolution.winner,
            loser: resolution.loser,
        });
    }

    pub fn prune(&mut self, now: i64) -> usize {
        let (pruned, settlement) = self.registry.prune(now);
        self.publish(&settlement);
        pruned
    }

    /// Notify every status change of one settlement.
    fn publish(&self, settlement: &Settlement) {
        for tx_hash in &settlement.finalized {
            self.sink.notify(Notification::LockFinalized(*tx_hash));
        }
        for resolution in &settlement.conflicts {
            self.on_conflict_detected(*resolution);
        }
    }

    fn validate_request(&self, tx: &Transaction, collateral: &LockCollateral) -> Result<(), LockError> {
        tx.check_well_formed()
            .map_err(|e| LockError::InvalidTransaction(e.to_string()))?;
        let minimum = self.config().min_fee;
        if collateral.fee < minimum {
            return Err(LockError::InsufficientCollateral {
                fee: collateral.fee,
                minimum,
            });
        }
        Ok(())
    }
}
