// TRANSACTION PRIMITIVES
// Minimal transaction model needed to validate and lock spends
//
// SAFETY INVARIANTS:
// 1. The transaction hash covers every field (canonical little-endian encoding)
// 2. A well-formed transaction never spends the same outpoint twice

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use vigil_crypto::{sha256d, Hash256};

/// Amount in base units.
pub type Amount = i64;

pub const COIN: Amount = 100_000_000;
pub const CENT: Amount = 1_000_000;
pub const MAX_MONEY: Amount = 21_000_000 * COIN;

/// Reference to a previous transaction output.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash256,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, index: u32) -> Self {
        OutPoint { txid, index }
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.txid.as_bytes());
        buf.extend_from_slice(&self.index.to_le_bytes());
    }

    /// Canonical 36-byte encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(36);
        self.encode_into(&mut buf);
        buf
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

impl fmt::Debug for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutPoint({:?}:{})", self.txid, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxIn {
    pub fn new(prevout: OutPoint) -> Self {
        TxIn {
            prevout,
            script_sig: Vec::new(),
            sequence: u32::MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: Amount,
    pub script_pubkey: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// Canonical encoding hashed into the transaction id.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + self.inputs.len() * 48 + self.outputs.len() * 40);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            input.prevout.encode_into(&mut buf);
            buf.extend_from_slice(&(input.script_sig.len() as u32).to_le_bytes());
            buf.extend_from_slice(&input.script_sig);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            buf.extend_from_slice(&(output.script_pubkey.len() as u32).to_le_bytes());
            buf.extend_from_slice(&output.script_pubkey);
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    pub fn hash(&self) -> Hash256 {
        sha256d(&self.encode())
    }

    /// Outpoints spent by this transaction, in input order.
    pub fn spent_outpoints(&self) -> Vec<OutPoint> {
        self.inputs.iter().map(|i| i.prevout).collect()
    }

    pub fn total_output_value(&self) -> Option<Amount> {
        self.outputs
            .iter()
            .try_fold(0i64, |acc, o| acc.checked_add(o.value))
    }

    /// Structural checks performed before a transaction may be locked.
    pub fn check_well_formed(&self) -> Result<(), CoreError> {
        if self.inputs.is_empty() {
            return Err(CoreError::NoInputs);
        }
        if self.outputs.is_empty() {
            return Err(CoreError::NoOutputs);
        }
        if self.lock_time != 0 {
            return Err(CoreError::NotFinal(self.lock_time));
        }

        let mut seen = BTreeSet::new();
        for input in &self.inputs {
            if !seen.insert(input.prevout) {
                return Err(CoreError::DuplicateInput(input.prevout));
            }
        }

        if self.outputs.iter().any(|o| o.value < 0 || o.value > MAX_MONEY) {
            return Err(CoreError::ValueOutOfRange);
        }
        match self.total_output_value() {
            Some(total) if total <= MAX_MONEY => Ok(()),
            _ => Err(CoreError::ValueOutOfRange),
        }
    }
}
