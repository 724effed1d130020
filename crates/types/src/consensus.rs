//! Ordered consensus output and the versions assigned from it.

use crate::{Certificate, CommitIndex, EpochId, ObjectId, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One ordered batch of certificates delivered identically to every replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusCommit {
    pub epoch: EpochId,
    /// Strictly increasing within an epoch, starting at zero.
    pub index: CommitIndex,
    pub timestamp_ms: u64,
    pub certificates: Vec<Certificate>,
}

/// Versions a certificate will read its shared inputs at, plus the version
/// every object it writes will land at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedVersions {
    pub shared: BTreeMap<ObjectId, Version>,
    pub lamport: Version,
}

impl AssignedVersions {
    pub fn get(&self, id: &ObjectId) -> Option<Version> {
        self.shared.get(id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.is_empty()
    }
}
