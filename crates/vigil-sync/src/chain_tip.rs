// CHAIN TIP OBSERVER
// Latest best-block header, pushed by the chain on every tip change.

use log::debug;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use vigil_core::BlockTip;

#[derive(Debug, Default)]
pub struct ChainTipObserver {
    tip: RwLock<Option<BlockTip>>,
    /// Block import or reindex in progress.
    importing: AtomicBool,
}

impl ChainTipObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updated_block_tip(&self, tip: BlockTip) {
        debug!("[ChainTip] height {} hash {:?}", tip.height, tip.hash);
        *self.tip.write() = Some(tip);
    }

    pub fn current(&self) -> Option<BlockTip> {
        *self.tip.read()
    }

    pub fn height(&self) -> Option<u64> {
        self.current().map(|t| t.height)
    }

    pub fn set_importing(&self, importing: bool) {
        self.importing.store(importing, Ordering::Relaxed);
    }

    pub fn is_importing(&self) -> bool {
        self.importing.load(Ordering::Relaxed)
    }
}
