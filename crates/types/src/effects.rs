//! Transaction effects: the committed outcome of executing a certificate.

use crate::{Digest, EpochId, ObjectId, ObjectRef, Version};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an executed transaction failed.
///
/// Failures are deterministic outcomes: every honest validator records the
/// same failure effect for the same certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// A shared input was deleted before this transaction's assigned version.
    ObjectNotFound(ObjectId),
    InsufficientCoinBalance { balance: u64, requested: u64 },
    /// Operation not applicable to the input (wrong object type, etc.).
    InvalidOperation(String),
    /// Deferred for congestion more rounds than allowed.
    CancelledByCongestion { deferred_rounds: u32 },
    ExecutorError(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ObjectNotFound(id) => write!(f, "object {} not found", id),
            FailureReason::InsufficientCoinBalance { balance, requested } => write!(
                f,
                "insufficient coin balance: {} requested, {} available",
                requested, balance
            ),
            FailureReason::InvalidOperation(msg) => write!(f, "invalid operation: {}", msg),
            FailureReason::CancelledByCongestion { deferred_rounds } => write!(
                f,
                "cancelled after {} rounds of congestion deferral",
                deferred_rounds
            ),
            FailureReason::ExecutorError(msg) => write!(f, "executor error: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Success,
    Failure(FailureReason),
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            ExecutionStatus::Success => None,
            ExecutionStatus::Failure(reason) => Some(reason),
        }
    }
}

/// Committed outcome of one certificate. At most one per transaction digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effects {
    pub transaction_digest: Digest,
    pub epoch: EpochId,
    pub status: ExecutionStatus,
    /// Existing objects written at `lamport_version`.
    pub mutated: Vec<ObjectRef>,
    /// Objects created at `lamport_version`.
    pub created: Vec<ObjectRef>,
    pub deleted: Vec<ObjectId>,
    /// Shared inputs and the versions they were read at.
    pub shared_inputs: Vec<(ObjectId, Version)>,
    pub lamport_version: Version,
    pub gas_used: u64,
}

impl Effects {
    /// Effects with no object changes.
    pub fn empty(
        transaction_digest: Digest,
        epoch: EpochId,
        status: ExecutionStatus,
        lamport_version: Version,
    ) -> Self {
        Self {
            transaction_digest,
            epoch,
            status,
            mutated: Vec::new(),
            created: Vec::new(),
            deleted: Vec::new(),
            shared_inputs: Vec::new(),
            lamport_version,
            gas_used: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn digest(&self) -> Digest {
        Digest::of_serializable(self)
    }

    /// Reference of a created or mutated object, if this transaction wrote it.
    pub fn written(&self, id: &ObjectId) -> Option<&ObjectRef> {
        self.created
            .iter()
            .chain(self.mutated.iter())
            .find(|r| r.id == *id)
    }
}
