pub mod block;
pub mod network;
pub mod transaction;
pub mod vote;

pub use block::BlockTip;
pub use network::Network;
pub use transaction::{Amount, OutPoint, Transaction, TxIn, TxOut, CENT, COIN, MAX_MONEY};
pub use vote::{LockCollateral, VoteRecord};

pub use vigil_crypto::Hash256;

use thiserror::Error;

/// Protocol version spoken by this node.
pub const PROTOCOL_VERSION: u32 = 70206;

/// Transaction-level validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Transaction has no inputs")]
    NoInputs,

    #[error("Transaction has no outputs")]
    NoOutputs,

    #[error("Input {0} is spent twice")]
    DuplicateInput(OutPoint),

    #[error("Output value out of range")]
    ValueOutOfRange,

    #[error("Transaction is not final (lock_time {0})")]
    NotFinal(u32),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),
}

/// Current wall-clock time in unix seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
