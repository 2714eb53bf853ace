use serde::{Deserialize, Serialize};
use vigil_core::{Amount, CENT};

/// Instant-lock protocol parameters.
///
/// With 6 of 10 signatures an attacker owning half of all operators still
/// has well under a 2% chance of assembling a quorum alone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InstantSendConfig {
    /// Votes needed for a lock to become final.
    pub signatures_required: usize,
    /// Target size of the voting pool per transaction.
    pub signatures_total: usize,
    /// How long a lock record is kept after creation.
    pub lock_retention_secs: i64,
    /// After this long no further votes are accepted for a record.
    pub vote_timeout_secs: i64,
    /// Largest accepted distance between a vote's height and the chain tip.
    pub max_vote_height_drift: u64,
    /// Minimum collateral fee for a lock request.
    pub min_fee: Amount,
    /// Lowest protocol version allowed to vote or relay lock messages.
    pub min_proto_version: u32,
}

impl Default for InstantSendConfig {
    fn default() -> Self {
        InstantSendConfig {
            signatures_required: 6,
            signatures_total: 10,
            lock_retention_secs: 60 * 60,
            vote_timeout_secs: 5 * 60,
            max_vote_height_drift: 24,
            min_fee: CENT,
            min_proto_version: 70103,
        }
    }
}
