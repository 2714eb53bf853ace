use crate::SyncAsset;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("No transition out of {from:?}")]
    InvalidTransition { from: SyncAsset },

    #[error("Unknown sync asset id {0}")]
    UnknownAsset(i32),
}
