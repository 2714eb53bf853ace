// SYNC ASSETS
// Stages of bootstrap sync and the table of allowed forward moves.

use crate::SyncError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SyncAsset {
    Failed,
    Initial,
    Sporks,
    OperatorList,
    PaymentWinners,
    Governance,
    Finished,
}

impl SyncAsset {
    /// Every asset, in sync order after the Failed side state.
    pub const ALL: [SyncAsset; 7] = [
        SyncAsset::Failed,
        SyncAsset::Initial,
        SyncAsset::Sporks,
        SyncAsset::OperatorList,
        SyncAsset::PaymentWinners,
        SyncAsset::Governance,
        SyncAsset::Finished,
    ];

    /// The next asset in sync order.
    ///
    /// SAFETY: Failed and Finished have no successor; leaving them goes
    /// through a reset instead.
    pub fn next(self) -> Result<SyncAsset, SyncError> {
        match self {
            SyncAsset::Initial => Ok(SyncAsset::Sporks),
            SyncAsset::Sporks => Ok(SyncAsset::OperatorList),
            SyncAsset::OperatorList => Ok(SyncAsset::PaymentWinners),
            SyncAsset::PaymentWinners => Ok(SyncAsset::Governance),
            SyncAsset::Governance => Ok(SyncAsset::Finished),
            SyncAsset::Failed | SyncAsset::Finished => {
                Err(SyncError::InvalidTransition { from: self })
            }
        }
    }

    pub fn wire_id(self) -> i32 {
        match self {
            SyncAsset::Failed => -1,
            SyncAsset::Initial => 0,
            SyncAsset::Sporks => 1,
            SyncAsset::OperatorList => 2,
            SyncAsset::PaymentWinners => 3,
            SyncAsset::Governance => 4,
            SyncAsset::Finished => 999,
        }
    }

    pub fn from_wire(id: i32) -> Result<SyncAsset, SyncError> {
        SyncAsset::ALL
            .into_iter()
            .find(|a| a.wire_id() == id)
            .ok_or(SyncError::UnknownAsset(id))
    }

    pub fn name(self) -> &'static str {
        match self {
            SyncAsset::Failed => "SYNC_FAILED",
            SyncAsset::Initial => "SYNC_INITIAL",
            SyncAsset::Sporks => "SYNC_SPORKS",
            SyncAsset::OperatorList => "SYNC_LIST",
            SyncAsset::PaymentWinners => "SYNC_WINNERS",
            SyncAsset::Governance => "SYNC_GOVERNANCE",
            SyncAsset::Finished => "SYNC_FINISHED",
        }
    }

    /// Human-readable status line.
    pub fn status_text(self) -> &'static str {
        match self {
            SyncAsset::Failed => "Synchronization failed",
            SyncAsset::Initial => "Synchronization pending...",
            SyncAsset::Sporks => "Synchronizing sporks...",
            SyncAsset::OperatorList => "Synchronizing operators...",
            SyncAsset::PaymentWinners => "Synchronizing payment winners...",
            SyncAsset::Governance => "Synchronizing governance objects...",
            SyncAsset::Finished => "Synchronization finished",
        }
    }

    /// Per-peer fulfilled-request key for the asset's request message.
    pub fn request_key(self) -> Option<&'static str> {
        match self {
            SyncAsset::Sporks => Some("spork-sync"),
            SyncAsset::OperatorList => Some("operator-list-sync"),
            SyncAsset::PaymentWinners => Some("payment-winner-sync"),
            SyncAsset::Governance => Some("governance-sync"),
            _ => None,
        }
    }

    /// Position among the data assets, 1 for Sporks through 4 for Governance.
    pub(crate) fn stage(self) -> i64 {
        match self {
            SyncAsset::Failed | SyncAsset::Initial => 0,
            SyncAsset::Sporks => 1,
            SyncAsset::OperatorList => 2,
            SyncAsset::PaymentWinners => 3,
            SyncAsset::Governance => 4,
            SyncAsset::Finished => 5,
        }
    }
}

/// Item kinds peers report in sync status counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SyncItemKind {
    OperatorList,
    PaymentWinners,
    GovernanceObjects,
    GovernanceFinal,
}

impl SyncItemKind {
    pub fn wire_id(self) -> i32 {
        match self {
            SyncItemKind::OperatorList => 2,
            SyncItemKind::PaymentWinners => 3,
            SyncItemKind::GovernanceObjects => 10,
            SyncItemKind::GovernanceFinal => 11,
        }
    }

    pub fn from_wire(id: i32) -> Result<SyncItemKind, SyncError> {
        match id {
            2 => Ok(SyncItemKind::OperatorList),
            3 => Ok(SyncItemKind::PaymentWinners),
            10 => Ok(SyncItemKind::GovernanceObjects),
            11 => Ok(SyncItemKind::GovernanceFinal),
            other => Err(SyncError::UnknownAsset(other)),
        }
    }

    /// Asset whose progress this kind of item counts toward.
    pub fn asset(self) -> SyncAsset {
        match self {
            SyncItemKind::OperatorList => SyncAsset::OperatorList,
            SyncItemKind::PaymentWinners => SyncAsset::PaymentWinners,
            SyncItemKind::GovernanceObjects | SyncItemKind::GovernanceFinal => SyncAsset::Governance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table_walks_forward() {
        let mut asset = SyncAsset::Initial;
        let mut visited = vec![asset];
        while let Ok(next) = asset.next() {
            asset = next;
            visited.push(asset);
        }
        assert_eq!(
            visited,
            vec![
                SyncAsset::Initial,
                SyncAsset::Sporks,
                SyncAsset::OperatorList,
                SyncAsset::PaymentWinners,
                SyncAsset::Governance,
                SyncAsset::Finished,
            ]
        );
    }

    #[test]
    fn test_terminal_states_have_no_successor() {
        assert_eq!(
            SyncAsset::Finished.next(),
            Err(SyncError::InvalidTransition { from: SyncAsset::Finished })
        );
        assert_eq!(
            SyncAsset::Failed.next(),
            Err(SyncError::InvalidTransition { from: SyncAsset::Failed })
        );
    }

    #[test]
    fn test_wire_ids() {
        for asset in SyncAsset::ALL {
            assert_eq!(SyncAsset::from_wire(asset.wire_id()), Ok(asset));
        }
        assert_eq!(SyncAsset::from_wire(5), Err(SyncError::UnknownAsset(5)));
        assert_eq!(SyncItemKind::from_wire(10), Ok(SyncItemKind::GovernanceObjects));
        assert_eq!(SyncItemKind::from_wire(1), Err(SyncError::UnknownAsset(1)));
        assert_eq!(SyncItemKind::GovernanceFinal.asset(), SyncAsset::Governance);
    }

    #[test]
    fn test_names_cover_every_asset() {
        for asset in SyncAsset::ALL {
            assert!(asset.name().starts_with("SYNC_"));
            assert!(!asset.status_text().is_empty());
        }
        assert_eq!(SyncAsset::Sporks.request_key(), Some("spork-sync"));
        assert_eq!(SyncAsset::Finished.request_key(), None);
    }
}
