//! Message encoding and decoding for peer transport.
//!
//! # Wire Format
//!
//! ```text
//! [version: u8][payload: bincode-encoded NetMessage]
//! ```
//!
//! Framing (length prefixes) belongs to the transport and is not handled here.

use crate::NetMessage;
use thiserror::Error;

/// Current wire format version.
pub const WIRE_VERSION: u8 = 1;

/// Largest encoded message accepted from a peer.
pub const MAX_MESSAGE_SIZE: usize = 2 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unknown wire version: {0}")]
    UnknownVersion(u8),

    #[error("Message too short")]
    MessageTooShort,

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

pub fn encode_message(message: &NetMessage) -> Result<Vec<u8>, CodecError> {
    let payload = bincode::serialize(message).map_err(|e| CodecError::Encode(e.to_string()))?;
    if payload.len() + 1 > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(payload.len() + 1));
    }

    let mut bytes = Vec::with_capacity(1 + payload.len());
    bytes.push(WIRE_VERSION);
    bytes.extend(payload);
    Ok(bytes)
}

pub fn decode_message(bytes: &[u8]) -> Result<NetMessage, CodecError> {
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(bytes.len()));
    }
    let (&version, payload) = bytes.split_first().ok_or(CodecError::MessageTooShort)?;
    if version != WIRE_VERSION {
        return Err(CodecError::UnknownVersion(version));
    }
    bincode::deserialize(payload).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{LockCollateral, OutPoint, Transaction, TxIn, TxOut, VoteRecord, CENT};
    use vigil_crypto::{sha256d, Hash256, OperatorKey};

    fn lock_request() -> NetMessage {
        let prev = OutPoint::new(sha256d(b"prev"), 1);
        NetMessage::LockRequest {
            tx: Transaction {
                version: 1,
                inputs: vec![TxIn::new(prev)],
                outputs: vec![TxOut { value: 5 * CENT, script_pubkey: vec![1, 2, 3] }],
                lock_time: 0,
            },
            collateral: LockCollateral { outpoint: prev, fee: CENT },
        }
    }

    #[test]
    fn test_lock_messages_survive_the_wire() {
        let key = OperatorKey::from_secret_bytes(&[5u8; 32]);
        let vote = VoteRecord::signed(sha256d(b"tx"), OutPoint::new(sha256d(b"mn"), 0), 42, &key);
        for msg in [lock_request(), NetMessage::LockVote(vote)] {
            let bytes = encode_message(&msg).unwrap();
            assert_eq!(bytes[0], WIRE_VERSION);
            assert_eq!(decode_message(&bytes).unwrap(), msg);
        }
    }

    #[test]
    fn test_governance_filter_zero_preserved() {
        let msg = NetMessage::GovernanceSyncRequest { filter_hash: Hash256::zero() };
        match decode_message(&encode_message(&msg).unwrap()).unwrap() {
            NetMessage::GovernanceSyncRequest { filter_hash } => assert!(filter_hash.is_zero()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rejects_empty_and_unknown_version() {
        assert!(matches!(decode_message(&[]), Err(CodecError::MessageTooShort)));
        let mut bytes = encode_message(&NetMessage::GetSporks).unwrap();
        bytes[0] = 9;
        assert!(matches!(decode_message(&bytes), Err(CodecError::UnknownVersion(9))));
    }

    #[test]
    fn test_rejects_garbage_payload() {
        assert!(matches!(decode_message(&[WIRE_VERSION, 0xff, 0xff, 0xff, 0xff]), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_rejects_oversized_input() {
        let bytes = vec![WIRE_VERSION; MAX_MESSAGE_SIZE + 1];
        assert!(matches!(decode_message(&bytes), Err(CodecError::MessageTooLarge(_))));
    }
}
