// OPERATOR SYNC
// Sequences acquisition of network state from peers before the node
// takes part in operator duties or instant locking.
//
// SAFETY INVARIANTS:
// 1. Assets only move forward through the transition table, or drop to Failed / Initial
// 2. At most one outbound request per tick
// 3. The tick loop never blocks on the peer list

pub mod asset;
pub mod chain_tip;
pub mod config;
pub mod environment;
pub mod error;
pub mod state;

pub use asset::{SyncAsset, SyncItemKind};
pub use chain_tip::ChainTipObserver;
pub use config::SyncConfig;
pub use environment::SyncEnvironment;
pub use error::SyncError;
pub use state::{InventoryTally, OperatorSync};
