// OPERATOR SIGNING KEYS
//
// SAFETY INVARIANTS:
// 1. Secret key bytes never leave this module except through explicit export
// 2. Verification rejects malformed keys and signatures before checking the message

use crate::CryptoError;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public half of an operator key, as published in the operator roster.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Verify `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;
        let sig = Signature::from_slice(signature)
            .map_err(|_| CryptoError::MalformedSignature(signature.len()))?;
        key.verify(message, &sig).map_err(|_| CryptoError::SignatureMismatch)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

/// Secret signing key held by a local operator.
pub struct OperatorKey {
    signing_key: SigningKey,
}

impl OperatorKey {
    /// Generate a fresh key from the OS random source.
    pub fn generate() -> Self {
        OperatorKey {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Self {
        OperatorKey {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Parse a 32-byte secret from hex (configuration format).
    pub fn from_secret_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| CryptoError::InvalidHex(format!("expected 32 bytes, got {}", v.len())))?;
        Ok(Self::from_secret_bytes(&arr))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

impl fmt::Debug for OperatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}
