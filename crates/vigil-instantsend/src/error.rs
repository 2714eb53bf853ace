use thiserror::Error;
use vigil_core::{Amount, OutPoint};
use vigil_crypto::Hash256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Invalid signature from operator {operator}")]
    InvalidSignature { operator: OutPoint },

    #[error("Operator {operator} is not eligible to vote")]
    IneligibleOperator { operator: OutPoint },

    #[error("Operator {operator} already voted differently on {tx_hash}")]
    DuplicateVote { operator: OutPoint, tx_hash: Hash256 },

    #[error("Vote height {vote_height} too far from tip {tip_height}")]
    StaleVote { vote_height: u64, tip_height: u64 },

    #[error("Collateral fee {fee} below minimum {minimum}")]
    InsufficientCollateral { fee: Amount, minimum: Amount },

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Lock for {tx_hash} no longer accepts votes")]
    Expired { tx_hash: Hash256 },

    #[error("Lock for {tx_hash} already holds every allowed signature")]
    QuorumSaturated { tx_hash: Hash256 },

    #[error("No lock record for {0}")]
    UnknownLock(Hash256),
}

impl LockError {
    /// Whether the sending peer broke protocol rules (as opposed to racing a timeout).
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            LockError::InvalidSignature { .. }
                | LockError::IneligibleOperator { .. }
                | LockError::DuplicateVote { .. }
                | LockError::StaleVote { .. }
                | LockError::InsufficientCollateral { .. }
                | LockError::InvalidTransaction(_)
        )
    }
}
