// HASHING PRIMITIVES
// 256-bit identifiers for transactions, votes and gossip items
//
// SAFETY INVARIANTS:
// 1. Hashing is deterministic (same bytes → same hash on every node)
// 2. Hash ordering is the unsigned big-endian integer ordering of the bytes

use crate::CryptoError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A 256-bit hash.
///
/// Bytes are held most-significant first, so the derived `Ord` compares two
/// hashes as unsigned big-endian integers. Lock conflict tie-breaks rely on this.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The all-zero hash ("everything" in governance sync filters).
    pub const fn zero() -> Self {
        Hash256([0u8; 32])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| CryptoError::InvalidHex(format!("expected 32 bytes, got {}", v.len())))?;
        Ok(Hash256(arr))
    }

    /// Leading 16 bytes as a big-endian integer. Used for sampling scores.
    pub fn high_u128(&self) -> u128 {
        let mut high = [0u8; 16];
        high.copy_from_slice(&self.0[..16]);
        u128::from_be_bytes(high)
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps log lines readable.
        write!(f, "Hash256({}..)", &self.to_hex()[..12])
    }
}

/// Double SHA-256 of `data`.
pub fn sha256d(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    Hash256(out)
}
