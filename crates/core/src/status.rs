//! Submission outcomes and the lifecycle of a consensus-path transaction.

use serde::{Deserialize, Serialize};
use vireo_types::{Certificate, Effects, LedgerError};

/// Lifecycle of a certificate handed to consensus.
///
/// `Pending -> Delivered -> Executed | Failed`. Terminal states never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingStatus {
    /// Submitted to consensus, not yet seen in a commit.
    Pending,
    /// Ordered by consensus, awaiting execution (possibly deferred).
    Delivered,
    Executed(Effects),
    Failed(LedgerError),
}

impl PendingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PendingStatus::Executed(_) | PendingStatus::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            PendingStatus::Pending => "Pending",
            PendingStatus::Delivered => "Delivered",
            PendingStatus::Executed(_) => "Executed",
            PendingStatus::Failed(_) => "Failed",
        }
    }
}

/// Successful response to `submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResponse {
    /// Fast path, or a transaction whose effects already existed.
    Executed {
        certificate: Option<Certificate>,
        effects: Effects,
    },
    /// Handed to consensus. Poll the digest for the outcome.
    Pending { certificate: Certificate },
}

impl SubmitResponse {
    pub fn effects(&self) -> Option<&Effects> {
        match self {
            SubmitResponse::Executed { effects, .. } => Some(effects),
            SubmitResponse::Pending { .. } => None,
        }
    }

    pub fn certificate(&self) -> Option<&Certificate> {
        match self {
            SubmitResponse::Executed { certificate, .. } => certificate.as_ref(),
            SubmitResponse::Pending { certificate } => Some(certificate),
        }
    }
}

/// Successful response to `poll`. Failures are returned as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResponse {
    Executed(Effects),
    Pending,
}
