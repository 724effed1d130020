//! Epoch transition errors.

use thiserror::Error;
use vireo_storage::StoreError;
use vireo_types::{CommitteeError, EpochId, ValidatorId};

/// Errors computing or installing the next epoch.
///
/// Any of these during `EndOfEpoch` is fatal: epoch advancement halts and
/// nothing is applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EpochError {
    #[error("next committee is invalid: {0}")]
    Committee(#[from] CommitteeError),

    #[error("stake of {validator} would become negative")]
    NegativeStake { validator: ValidatorId },

    #[error("stake of {validator} overflows u64")]
    StakeOverflow { validator: ValidatorId },

    #[error("failed to persist snapshot: {0}")]
    Storage(#[from] StoreError),

    #[error("{0} is already transitioning")]
    AlreadyTransitioning(EpochId),

    #[error("{0} is not transitioning")]
    NotTransitioning(EpochId),
}
