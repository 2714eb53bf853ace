// INSTANT-LOCK VOTE RECORD
// A single operator's signed endorsement of locking a transaction
//
// SAFETY INVARIANTS:
// 1. The signature covers (tx_hash, operator, block_height) and nothing else
// 2. The vote hash covers the signature too, so re-signed votes hash differently

use crate::{Amount, OutPoint};
use serde::{Deserialize, Serialize};
use vigil_crypto::{sha256d, CryptoError, Hash256, OperatorKey, PublicKey};

/// Domain tag prefixed to every signed vote payload.
const VOTE_DOMAIN: &[u8] = b"vigil/lock-vote/v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub tx_hash: Hash256,
    /// Collateral outpoint identifying the voting operator.
    pub operator: OutPoint,
    pub block_height: u64,
    pub signature: Vec<u8>,
}

impl VoteRecord {
    /// Build and sign a vote with the operator's key.
    pub fn signed(tx_hash: Hash256, operator: OutPoint, block_height: u64, key: &OperatorKey) -> Self {
        let mut vote = VoteRecord {
            tx_hash,
            operator,
            block_height,
            signature: Vec::new(),
        };
        vote.signature = key.sign(&vote.signing_payload());
        vote
    }

    /// Bytes covered by the operator signature.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(VOTE_DOMAIN.len() + 32 + 36 + 8);
        buf.extend_from_slice(VOTE_DOMAIN);
        buf.extend_from_slice(self.tx_hash.as_bytes());
        buf.extend_from_slice(&self.operator.to_bytes());
        buf.extend_from_slice(&self.block_height.to_le_bytes());
        buf
    }

    pub fn verify(&self, key: &PublicKey) -> Result<(), CryptoError> {
        key.verify(&self.signing_payload(), &self.signature)
    }

    /// Gossip identity of the vote.
    pub fn hash(&self) -> Hash256 {
        let mut buf = self.signing_payload();
        buf.extend_from_slice(&self.signature);
        sha256d(&buf)
    }
}

/// Fee collateral attached to a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockCollateral {
    /// Output funding the fee.
    pub outpoint: OutPoint,
    /// Declared fee paid for the lock.
    pub fee: Amount,
}
