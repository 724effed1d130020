//! Client-facing error taxonomy.

use crate::{Address, Digest, EpochId, ObjectId, Owner, Version};
use serde::{Deserialize, Serialize};

/// Errors surfaced to a submitter.
///
/// Classification and version errors are returned synchronously from
/// `submit`. Failures discovered during execution are not errors: they are
/// recorded as failure effects (see `FailureReason`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("invalid sender signature")]
    InvalidSignature,

    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    #[error("object {id} is not owned by sender {sender} (owner: {owner:?})")]
    IncorrectOwner {
        id: ObjectId,
        sender: Address,
        owner: Owner,
    },

    /// Stale owned input at submission. Resubmit with the current version.
    #[error("object {id} version mismatch: transaction expects {expected}, current is {current}")]
    ObjectVersionMismatch {
        id: ObjectId,
        expected: Version,
        current: Version,
    },

    /// Owned input changed between certification and execution.
    #[error("version conflict on object {id}: certificate expects {expected}, store has {current:?}")]
    VersionConflict {
        id: ObjectId,
        expected: Version,
        current: Option<Version>,
    },

    #[error("object {id} at {version} is locked by transaction {locked_by}")]
    ObjectLocked {
        id: ObjectId,
        version: Version,
        locked_by: Digest,
    },

    #[error("{sender} may not send governance transactions")]
    UnauthorizedGovernance { sender: Address },

    #[error("shared-object transactions are not supported by this validator")]
    UnsupportedTransactionKind,

    #[error("{certified} has ended; current epoch is {current}")]
    EpochEnded { certified: EpochId, current: EpochId },

    #[error("quorum not reached: collected {collected} of {required} stake")]
    QuorumNotReached { collected: u64, required: u64 },

    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("unknown transaction {0}")]
    UnknownTransaction(Digest),

    #[error("validator overloaded: {pending} certificates awaiting execution")]
    Overloaded { pending: usize },

    #[error("consensus unavailable: {0}")]
    ConsensusUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Whether resubmitting (with fresh inputs or in the new epoch) may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            LedgerError::ObjectVersionMismatch { .. }
                | LedgerError::VersionConflict { .. }
                | LedgerError::ObjectLocked { .. }
                | LedgerError::EpochEnded { .. }
                | LedgerError::QuorumNotReached { .. }
                | LedgerError::Overloaded { .. }
                | LedgerError::ConsensusUnavailable(_)
        )
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
