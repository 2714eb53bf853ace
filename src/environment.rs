// ROSTER-BACKED SYNC ENVIRONMENT
// Answers the sync machine's completeness questions from the operator roster.

use log::info;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use vigil_instantsend::OperatorRoster;
use vigil_sync::SyncEnvironment;

pub struct RosterSyncEnvironment {
    roster: Arc<dyn OperatorRoster>,
    /// Distinct payment-winner votes seen in the current sync pass.
    payment_votes: AtomicUsize,
    governance_synced: AtomicBool,
}

impl RosterSyncEnvironment {
    pub fn new(roster: Arc<dyn OperatorRoster>) -> Self {
        RosterSyncEnvironment {
            roster,
            payment_votes: AtomicUsize::new(0),
            governance_synced: AtomicBool::new(false),
        }
    }

    pub fn record_payment_vote(&self) {
        self.payment_votes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn payment_votes(&self) -> usize {
        self.payment_votes.load(Ordering::Relaxed)
    }

    /// Whether governance sync has completed at least once.
    pub fn is_governance_synced(&self) -> bool {
        self.governance_synced.load(Ordering::Acquire)
    }
}

impl SyncEnvironment for RosterSyncEnvironment {
    fn enabled_operator_count(&self) -> usize {
        self.roster.enabled_count()
    }

    /// Without a deterministic operator list the best estimate is every
    /// operator announced so far, enabled or not.
    fn estimated_operator_count(&self, _height: u64) -> usize {
        self.roster.total_count()
    }

    /// One winner vote per enabled operator.
    fn has_enough_payment_data(&self, enabled_operators: usize) -> bool {
        enabled_operators > 0 && self.payment_votes() >= enabled_operators
    }

    fn on_governance_synced(&self) {
        if !self.governance_synced.swap(true, Ordering::AcqRel) {
            info!("[Node] governance synced, local operator may activate");
        }
    }

    fn on_reset(&self) {
        self.payment_votes.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::OutPoint;
    use vigil_crypto::{sha256d, OperatorKey};
    use vigil_instantsend::{InMemoryRoster, OperatorIdentity};

    fn roster_with(enabled: usize, disabled: usize) -> Arc<InMemoryRoster> {
        let roster = Arc::new(InMemoryRoster::new());
        for i in 0..enabled + disabled {
            roster.upsert(OperatorIdentity {
                collateral: OutPoint::new(sha256d(&[i as u8]), 0),
                public_key: OperatorKey::from_secret_bytes(&[i as u8 + 1; 32]).public_key(),
                protocol_version: 70206,
                enabled: i < enabled,
            });
        }
        roster
    }

    #[test]
    fn test_counts_come_from_roster() {
        let env = RosterSyncEnvironment::new(roster_with(3, 2));
        assert_eq!(env.enabled_operator_count(), 3);
        assert_eq!(env.estimated_operator_count(1_000), 5);
    }

    #[test]
    fn test_payment_data_needs_a_vote_per_operator() {
        let env = RosterSyncEnvironment::new(roster_with(2, 0));
        assert!(!env.has_enough_payment_data(0));
        assert!(!env.has_enough_payment_data(2));
        env.record_payment_vote();
        env.record_payment_vote();
        assert!(env.has_enough_payment_data(2));
    }

    #[test]
    fn test_reset_forgets_payment_votes() {
        let env = RosterSyncEnvironment::new(roster_with(1, 0));
        env.record_payment_vote();
        assert!(env.has_enough_payment_data(1));
        env.on_reset();
        assert_eq!(env.payment_votes(), 0);
        assert!(!env.has_enough_payment_data(1));
    }

    #[test]
    fn test_governance_hook_latches() {
        let env = RosterSyncEnvironment::new(roster_with(0, 0));
        assert!(!env.is_governance_synced());
        env.on_governance_synced();
        env.on_governance_synced();
        assert!(env.is_governance_synced());
    }
}
