use serde::{Deserialize, Serialize};

/// Sync timing and heuristics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Run one sync step every this many heartbeats.
    pub heartbeat_divisor: u64,
    /// Advance an asset when no progress was seen for this long.
    pub asset_timeout_secs: i64,
    /// Wait this long in Failed before starting over.
    pub failure_cooldown_secs: i64,
    /// A gap this long between ticks means the host slept; start over.
    pub suspend_reset_secs: i64,
    /// The chain counts as synced when the tip is at most this old.
    pub tip_max_age_secs: i64,
    pub attempts_per_asset: u32,
    pub total_assets: u32,
    /// Fraction of the estimated roster after which the list counts as complete.
    pub list_completeness_ratio: f64,
    /// An asset with no usable peer for this long fails the sync.
    pub stall_failure_secs: i64,
    pub min_payments_proto_version: u32,
    pub min_governance_proto_version: u32,
    /// Most distinct hashes remembered per item kind during one pass.
    pub seen_items_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            heartbeat_divisor: 6,
            asset_timeout_secs: 5,
            failure_cooldown_secs: 60,
            suspend_reset_secs: 60 * 60,
            tip_max_age_secs: 60 * 60,
            attempts_per_asset: 8,
            total_assets: 4,
            list_completeness_ratio: 0.9,
            stall_failure_secs: 60,
            min_payments_proto_version: 70103,
            min_governance_proto_version: 70103,
            seen_items_limit: 50_000,
        }
    }
}
