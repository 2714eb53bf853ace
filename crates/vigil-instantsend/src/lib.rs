// INSTANT SEND
// Operators vote to pre-confirm a transaction before it is mined.
//
// SAFETY INVARIANTS:
// 1. One counted vote per (operator, transaction)
// 2. A lock is final at `signatures_required` distinct valid votes
// 3. At most one final lock holds any input
// 4. Conflict resolution depends only on vote counts and hashes, never arrival order

pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod registry;
pub mod roster;

pub use config::InstantSendConfig;
pub use engine::{is_selected_voter, InstantSendEngine, LocalOperator, LockRequestOutcome};
pub use error::LockError;
pub use lock::{LockRecord, LockStatus};
pub use registry::{ConflictResolution, LockRegistry, Settlement, VoteContext, VoteOutcome};
pub use roster::{InMemoryRoster, OperatorIdentity, OperatorRoster};

pub use vigil_core::{LockCollateral, VoteRecord};
