use serde::{Deserialize, Serialize};
use vigil_core::{LockCollateral, Transaction, VoteRecord};
use vigil_crypto::Hash256;

/// Peer protocol messages handled by the sync and locking core.
///
/// Payloads of the spork, roster, payment and governance subsystems are
/// owned by those subsystems; only the requests and status counts that drive
/// sync appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetMessage {
    /// Ask a peer for the current spork set.
    GetSporks,

    /// A peer reports how many items of a sync asset it holds.
    SyncStatusCount { item_kind: i32, count: i32 },

    /// Ask a peer for its full operator roster.
    OperatorListRequest,

    /// Ask a peer for payment winner votes.
    PaymentWinnersRequest { known_operator_count: i32 },

    /// Ask a peer for governance objects; a zero filter means "all".
    GovernanceSyncRequest { filter_hash: Hash256 },

    /// Request that the network instant-lock a transaction.
    LockRequest {
        tx: Transaction,
        collateral: LockCollateral,
    },

    /// An operator's vote on a lock.
    LockVote(VoteRecord),
}

impl NetMessage {
    /// Short command name used in logs.
    pub fn command(&self) -> &'static str {
        match self {
            NetMessage::GetSporks => "getsporks",
            NetMessage::SyncStatusCount { .. } => "ssc",
            NetMessage::OperatorListRequest => "dseg",
            NetMessage::PaymentWinnersRequest { .. } => "mnget",
            NetMessage::GovernanceSyncRequest { .. } => "govsync",
            NetMessage::LockRequest { .. } => "ix",
            NetMessage::LockVote(_) => "txlvote",
        }
    }

    /// Whether the message belongs to the instant-lock protocol.
    pub fn is_lock_message(&self) -> bool {
        matches!(self, NetMessage::LockRequest { .. } | NetMessage::LockVote(_))
    }
}
