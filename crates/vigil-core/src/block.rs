use serde::{Deserialize, Serialize};
use vigil_crypto::Hash256;

/// Best block header as reported by the chain on every tip change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTip {
    pub height: u64,
    pub hash: Hash256,
    /// Header timestamp, unix seconds.
    pub time: i64,
}

impl BlockTip {
    pub fn new(height: u64, hash: Hash256, time: i64) -> Self {
        BlockTip { height, hash, time }
    }

    /// Age of the header relative to `now`. Negative for headers from the future.
    pub fn age(&self, now: i64) -> i64 {
        now - self.time
    }
}
