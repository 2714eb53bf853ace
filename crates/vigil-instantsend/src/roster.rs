// OPERATOR ROSTER
// Read-only view of registered operators, supplied by the roster subsystem.

use log::info;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use vigil_core::OutPoint;
use vigil_crypto::PublicKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorIdentity {
    /// Collateral outpoint; the operator's stable reference.
    pub collateral: OutPoint,
    pub public_key: PublicKey,
    pub protocol_version: u32,
    pub enabled: bool,
}

/// Source of operator eligibility data.
pub trait OperatorRoster: Send + Sync {
    fn get(&self, operator: &OutPoint) -> Option<OperatorIdentity>;

    /// Whether `operator` may vote on locks created at `height`.
    fn is_eligible(&self, operator: &OutPoint, _height: u64) -> bool {
        self.get(operator).map(|o| o.enabled).unwrap_or(false)
    }

    fn enabled_count(&self) -> usize;

    /// All registered operators, enabled or not.
    fn total_count(&self) -> usize;
}

/// Roster kept in memory, filled from gossip by the roster subsystem.
#[derive(Debug, Default)]
pub struct InMemoryRoster {
    operators: RwLock<BTreeMap<OutPoint, OperatorIdentity>>,
}

impl InMemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, identity: OperatorIdentity) {
        let collateral = identity.collateral;
        if self.operators.write().insert(collateral, identity).is_none() {
            info!("[Roster] registered operator {}", collateral);
        }
    }

    pub fn remove(&self, collateral: &OutPoint) -> Option<OperatorIdentity> {
        self.operators.write().remove(collateral)
    }

    pub fn set_enabled(&self, collateral: &OutPoint, enabled: bool) -> bool {
        match self.operators.write().get_mut(collateral) {
            Some(op) => {
                op.enabled = enabled;
                true
            }
            None => false,
        }
    }
}

impl OperatorRoster for InMemoryRoster {
    fn get(&self, operator: &OutPoint) -> Option<OperatorIdentity> {
        self.operators.read().get(operator).cloned()
    }

    fn enabled_count(&self) -> usize {
        self.operators.read().values().filter(|o| o.enabled).count()
    }

    fn total_count(&self) -> usize {
        self.operators.read().len()
    }
}
