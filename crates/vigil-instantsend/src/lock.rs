// LOCK RECORD
// Votes collected for one transaction, plus its lifecycle timestamps.

use crate::InstantSendConfig;
use vigil_core::{OutPoint, VoteRecord};
use vigil_crypto::Hash256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    /// Collecting votes.
    Pending,
    /// Quorum reached and not beaten by a conflicting lock.
    Final,
    /// Lost a conflict; may still gather votes and win a later re-resolution.
    Invalidated,
}

#[derive(Debug, Clone)]
pub struct LockRecord {
    pub tx_hash: Hash256,
    /// Height the record was created at.
    pub block_height: u64,
    /// Accepted votes in arrival order; at most one per operator.
    votes: Vec<VoteRecord>,
    /// Outpoints spent by the transaction, once the lock request has been seen.
    inputs: Option<Vec<OutPoint>>,
    pub created_at: i64,
    pub expires_at: i64,
    pub vote_deadline: i64,
    pub status: LockStatus,
    /// Set when the record first reached final status.
    pub finalized_at: Option<i64>,
}

impl LockRecord {
    pub fn new(tx_hash: Hash256, block_height: u64, now: i64, config: &InstantSendConfig) -> Self {
        LockRecord {
            tx_hash,
            block_height,
            votes: Vec::new(),
            inputs: None,
            created_at: now,
            expires_at: now + config.lock_retention_secs,
            vote_deadline: now + config.vote_timeout_secs,
            status: LockStatus::Pending,
            finalized_at: None,
        }
    }

    pub fn signature_count(&self) -> usize {
        self.votes.len()
    }

    pub fn votes(&self) -> &[VoteRecord] {
        &self.votes
    }

    pub fn vote_from(&self, operator: &OutPoint) -> Option<&VoteRecord> {
        self.votes.iter().find(|v| &v.operator == operator)
    }

    pub fn inputs(&self) -> Option<&[OutPoint]> {
        self.inputs.as_deref()
    }

    pub fn is_final(&self) -> bool {
        self.status == LockStatus::Final
    }

    /// Past the vote deadline.
    pub fn is_timed_out(&self, now: i64) -> bool {
        now > self.vote_deadline
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    pub(crate) fn push_vote(&mut self, vote: VoteRecord) {
        self.votes.push(vote);
    }

    /// Records the spent outpoints. Returns `false` if they were already known.
    pub(crate) fn set_inputs(&mut self, inputs: Vec<OutPoint>) -> bool {
        if self.inputs.is_some() {
            return false;
        }
        self.inputs = Some(inputs);
        true
    }
}
