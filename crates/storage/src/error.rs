//! Storage errors.

use thiserror::Error;
use vireo_types::{Digest, EpochId, LedgerError, ObjectId, Version};

/// Errors applying writes to the object store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("transaction {0} already has effects")]
    AlreadyExecuted(Digest),

    #[error("object {id} expected at {expected}, store has {current:?}")]
    VersionConflict {
        id: ObjectId,
        expected: Version,
        current: Option<Version>,
    },

    #[error("write of object {id} at {written} does not advance past {current}")]
    NonMonotonicVersion {
        id: ObjectId,
        current: Version,
        written: Version,
    },

    #[error("object {0} cannot change between owned and shared")]
    ClassificationChanged(ObjectId),

    #[error("object {0} already exists")]
    ObjectExists(ObjectId),

    #[error("object {0} is deleted")]
    ObjectDeleted(ObjectId),

    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    #[error("a different snapshot is already stored for {0}")]
    EpochSnapshotConflict(EpochId),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict {
                id,
                expected,
                current,
            } => LedgerError::VersionConflict {
                id,
                expected,
                current,
            },
            other => LedgerError::Storage(other.to_string()),
        }
    }
}
