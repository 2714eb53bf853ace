pub mod hash;
pub mod signing;

pub use hash::{sha256d, Hash256};
pub use signing::{OperatorKey, PublicKey};

use thiserror::Error;

/// Errors raised by hashing and signature primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid public key encoding")]
    InvalidPublicKey,

    #[error("Malformed signature ({0} bytes)")]
    MalformedSignature(usize),

    #[error("Signature does not match message and key")]
    SignatureMismatch,

    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}
