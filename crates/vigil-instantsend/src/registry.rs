// LOCK REGISTRY
// Owns every lock record and the index of inputs held by final locks.
//
// SAFETY INVARIANTS:
// 1. An operator contributes at most one vote per transaction
// 2. `locked_inputs` only ever points at records with status Final
// 3. Losing a conflict releases every input the loser held
// 4. Survivors are recomputed from scratch over every record at quorum,
//    ranked by (votes desc, hash asc), so they depend only on vote counts

use crate::{InstantSendConfig, LockError, LockRecord, LockStatus, OperatorRoster};
use log::{debug, info, warn};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use vigil_core::{OutPoint, Transaction, VoteRecord};
use vigil_crypto::Hash256;

/// Time and chain position a vote is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteContext {
    pub now: i64,
    pub tip_height: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictResolution {
    pub winner: Hash256,
    pub loser: Hash256,
}

/// Status changes made by one rebalance of the input index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settlement {
    /// Locks that lost their inputs to a higher-ranked lock in this pass.
    pub conflicts: Vec<ConflictResolution>,
    /// Locks that became final in this pass.
    pub finalized: Vec<Hash256>,
}

impl Settlement {
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty() && self.finalized.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote was new and has been counted.
    Counted {
        signatures: usize,
        /// This vote moved the record into final status.
        newly_final: bool,
        /// Every status change the vote caused, including on other locks.
        settlement: Settlement,
    },
    /// The identical vote was counted before; nothing changed.
    AlreadyCounted,
}

#[derive(Debug, Clone)]
struct RejectedRequest {
    error: LockError,
    expires_at: i64,
}

#[derive(Debug)]
pub struct LockRegistry {
    config: InstantSendConfig,
    locks: BTreeMap<Hash256, LockRecord>,
    /// Input -> final lock currently holding it.
    locked_inputs: BTreeMap<OutPoint, Hash256>,
    /// Requests that failed validation, kept so re-announcements are not re-checked.
    rejected: BTreeMap<Hash256, RejectedRequest>,
    completed_locks: u64,
    /// Seconds from record creation to each accepted vote, summed.
    vote_delay_total: i64,
    votes_counted: u64,
}

impl LockRegistry {
    pub fn new(config: InstantSendConfig) -> Self {
        LockRegistry {
            config,
            locks: BTreeMap::new(),
            locked_inputs: BTreeMap::new(),
            rejected: BTreeMap::new(),
            completed_locks: 0,
            vote_delay_total: 0,
            votes_counted: 0,
        }
    }

    pub fn config(&self) -> &InstantSendConfig {
        &self.config
    }

    /// Validate and count one vote.
    ///
    /// SAFETY: a differing second vote from the same operator is rejected
    /// with `DuplicateVote`; the identical vote is reported as `AlreadyCounted`.
    pub fn submit_vote(
        &mut self,
        vote: VoteRecord,
        roster: &dyn OperatorRoster,
        ctx: VoteContext,
    ) -> Result<VoteOutcome, LockError> {
        let operator = vote.operator;
        let tx_hash = vote.tx_hash;

        let identity = roster
            .get(&operator)
            .ok_or(LockError::IneligibleOperator { operator })?;
        vote.verify(&identity.public_key)
            .map_err(|_| LockError::InvalidSignature { operator })?;
        if !roster.is_eligible(&operator, vote.block_height)
            || identity.protocol_version < self.config.min_proto_version
        {
            return Err(LockError::IneligibleOperator { operator });
        }

        if let Some(existing) = self.locks.get(&tx_hash).and_then(|r| r.vote_from(&operator)) {
            if existing == &vote {
                return Ok(VoteOutcome::AlreadyCounted);
            }
            return Err(LockError::DuplicateVote { operator, tx_hash });
        }

        if vote.block_height.abs_diff(ctx.tip_height) > self.config.max_vote_height_drift {
            return Err(LockError::StaleVote {
                vote_height: vote.block_height,
                tip_height: ctx.tip_height,
            });
        }

        let config = &self.config;
        let record = self
            .locks
            .entry(tx_hash)
            .or_insert_with(|| LockRecord::new(tx_hash, vote.block_height, ctx.now, config));

        if record.is_timed_out(ctx.now) {
            return Err(LockError::Expired { tx_hash });
        }
        if record.signature_count() >= config.signatures_total {
            return Err(LockError::QuorumSaturated { tx_hash });
        }

        let was_final = record.is_final();
        let delay = ctx.now - record.created_at;
        record.push_vote(vote);
        let signatures = record.signature_count();
        self.vote_delay_total += delay;
        self.votes_counted += 1;
        debug!(
            "[InstantSend] vote from {} on {} ({}/{})",
            operator, tx_hash, signatures, config.signatures_required
        );

        let settlement = if signatures >= self.config.signatures_required {
            self.rebalance(ctx.now)
        } else {
            Settlement::default()
        };

        Ok(VoteOutcome::Counted {
            signatures,
            newly_final: !was_final && self.is_final(&tx_hash),
            settlement,
        })
    }

    /// Attach a lock request's inputs to its record, creating the record if
    /// no vote has arrived yet.
    pub fn register_request(&mut self, tx: &Transaction, ctx: VoteContext) -> Settlement {
        let tx_hash = tx.hash();
        let config = &self.config;
        let record = self
            .locks
            .entry(tx_hash)
            .or_insert_with(|| LockRecord::new(tx_hash, ctx.tip_height, ctx.now, config));

        if !record.set_inputs(tx.spent_outpoints()) {
            return Settlement::default();
        }
        if record.signature_count() < config.signatures_required {
            return Settlement::default();
        }
        self.rebalance(ctx.now)
    }

    pub fn is_final(&self, tx_hash: &Hash256) -> bool {
        self.locks.get(tx_hash).map(|r| r.is_final()).unwrap_or(false)
    }

    /// A different final lock already holding one of `tx_hash`'s inputs.
    pub fn detect_conflict(&self, tx_hash: &Hash256) -> Option<Hash256> {
        let inputs = self.locks.get(tx_hash)?.inputs()?;
        inputs.iter().find_map(|input| {
            self.locked_inputs
                .get(input)
                .filter(|holder| *holder != tx_hash && self.is_final(holder))
                .copied()
        })
    }

    /// Rank two locks sharing an input and settle the index around them.
    ///
    /// More signatures wins; on a tie the numerically lower hash wins. A
    /// loser still short of quorum is invalidated here; locks at quorum are
    /// placed by `rebalance`, so a pair winner that a third lock outranks on
    /// another input can still end up not final.
    pub fn resolve_conflict(
        &mut self,
        a: &Hash256,
        b: &Hash256,
        now: i64,
    ) -> Result<(ConflictResolution, Settlement), LockError> {
        let count_a = self.locks.get(a).ok_or(LockError::UnknownLock(*a))?.signature_count();
        let count_b = self.locks.get(b).ok_or(LockError::UnknownLock(*b))?.signature_count();
        let (winner, loser) = if outranks((count_a, a), (count_b, b)) {
            (*a, *b)
        } else {
            (*b, *a)
        };
        let resolution = ConflictResolution { winner, loser };

        let mut settlement = self.rebalance(now);
        let loser_pending = self
            .locks
            .get(&loser)
            .map(|r| r.status == LockStatus::Pending)
            .unwrap_or(false);
        if loser_pending && self.invalidate(&loser) {
            warn!(
                "[InstantSend] conflicting locks: {} wins over {} ({} vs {} signatures)",
                winner,
                loser,
                count_a.max(count_b),
                count_a.min(count_b)
            );
            settlement.conflicts.push(resolution);
        }
        Ok((resolution, settlement))
    }

    /// Recompute which locks hold their inputs.
    ///
    /// Every record at quorum is ranked by signature count, then by lower
    /// hash. Walking that ranking, a record whose inputs are all unclaimed
    /// takes them and is final; one that finds an input already claimed is
    /// invalidated. Records whose inputs are still unknown are final without
    /// claiming anything. Only status changes are reported.
    pub fn rebalance(&mut self, now: i64) -> Settlement {
        let required = self.config.signatures_required;
        let mut ranked: Vec<(usize, Hash256)> = self
            .locks
            .values()
            .filter(|r| r.signature_count() >= required)
            .map(|r| (r.signature_count(), r.tx_hash))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let mut holders: BTreeMap<OutPoint, Hash256> = BTreeMap::new();
        let mut admitted = Vec::new();
        let mut blocked = Vec::new();
        for (_, tx_hash) in ranked {
            let inputs = self
                .locks
                .get(&tx_hash)
                .and_then(|r| r.inputs())
                .unwrap_or(&[]);
            match inputs.iter().find_map(|input| holders.get(input).copied()) {
                Some(holder) => blocked.push((tx_hash, holder)),
                None => {
                    for input in inputs {
                        holders.insert(*input, tx_hash);
                    }
                    admitted.push(tx_hash);
                }
            }
        }
        self.locked_inputs = holders;

        let mut settlement = Settlement::default();
        for tx_hash in admitted {
            if self.mark_final(&tx_hash, now) {
                settlement.finalized.push(tx_hash);
            }
        }
        for (loser, winner) in blocked {
            if self.invalidate(&loser) {
                warn!(
                    "[InstantSend] conflicting locks: {} wins over {} ({} vs {} signatures)",
                    winner,
                    loser,
                    self.signature_count(&winner),
                    self.signature_count(&loser)
                );
                settlement.conflicts.push(ConflictResolution { winner, loser });
            }
        }
        settlement
    }

    /// Drop records past their retention window and release their inputs.
    /// Locks they were blocking may become final.
    pub fn prune(&mut self, now: i64) -> (usize, Settlement) {
        let expired: Vec<Hash256> = self
            .locks
            .iter()
            .filter(|(_, record)| record.is_expired(now))
            .map(|(hash, _)| *hash)
            .collect();

        for hash in &expired {
            self.locks.remove(hash);
        }
        self.rejected.retain(|_, r| r.expires_at > now);

        if expired.is_empty() {
            return (0, Settlement::default());
        }
        info!("[InstantSend] pruned {} expired locks", expired.len());
        (expired.len(), self.rebalance(now))
    }

    pub fn remember_rejection(&mut self, tx_hash: Hash256, error: LockError, now: i64) {
        let expires_at = now + self.config.lock_retention_secs;
        self.rejected.insert(tx_hash, RejectedRequest { error, expires_at });
    }

    pub fn rejection(&self, tx_hash: &Hash256, now: i64) -> Option<&LockError> {
        self.rejected
            .get(tx_hash)
            .filter(|r| r.expires_at > now)
            .map(|r| &r.error)
    }

    pub fn get(&self, tx_hash: &Hash256) -> Option<&LockRecord> {
        self.locks.get(tx_hash)
    }

    pub fn signature_count(&self, tx_hash: &Hash256) -> usize {
        self.locks.get(tx_hash).map(|r| r.signature_count()).unwrap_or(0)
    }

    /// Lock still short of quorum after its vote deadline.
    pub fn is_timed_out(&self, tx_hash: &Hash256, now: i64) -> bool {
        self.locks
            .get(tx_hash)
            .map(|r| r.status == LockStatus::Pending && r.is_timed_out(now))
            .unwrap_or(false)
    }

    pub fn locked_by(&self, input: &OutPoint) -> Option<Hash256> {
        self.locked_inputs.get(input).copied()
    }

    /// Locks that reached final status since startup.
    pub fn completed_lock_count(&self) -> u64 {
        self.completed_locks
    }

    /// Mean seconds between a record's creation and each vote it accepted.
    pub fn average_vote_time(&self) -> Option<f64> {
        if self.votes_counted == 0 {
            return None;
        }
        Some(self.vote_delay_total as f64 / self.votes_counted as f64)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Returns `true` if the record was not already final.
    fn mark_final(&mut self, tx_hash: &Hash256, now: i64) -> bool {
        let record = match self.locks.get_mut(tx_hash) {
            Some(record) if !record.is_final() => record,
            _ => return false,
        };
        record.status = LockStatus::Final;
        if record.finalized_at.is_none() {
            record.finalized_at = Some(now);
            self.completed_locks += 1;
        }
        info!(
            "[InstantSend] lock {} final with {} signatures",
            tx_hash,
            record.signature_count()
        );
        true
    }

    /// Returns `true` if the record was not already invalidated.
    fn invalidate(&mut self, tx_hash: &Hash256) -> bool {
        match self.locks.get_mut(tx_hash) {
            Some(record) if record.status != LockStatus::Invalidated => {
                record.status = LockStatus::Invalidated;
                true
            }
            _ => false,
        }
    }
}

/// Ranking order between two locks: more signatures, then lower hash.
fn outranks(a: (usize, &Hash256), b: (usize, &Hash256)) -> bool {
    match a.0.cmp(&b.0) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => a.1 <= b.1,
    }
}
