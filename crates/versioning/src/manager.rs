//! Assignment of shared-object input versions.

use std::collections::BTreeMap;
use tracing::trace;
use vireo_types::{AssignedVersions, Certificate, CommitIndex, ObjectId, Version};

/// Assigns each consensus-ordered certificate the versions it reads its
/// shared inputs at.
///
/// The next version of every shared object is tracked here rather than read
/// from the store, so assignment is a pure function of consensus order: two
/// replicas fed the same commits produce the same assignments even if their
/// executions run at different speeds.
///
/// A certificate reads each shared input at the object's current next version.
/// Its lamport version is one past the highest input version (owned and
/// shared); every shared input it declares mutable then advances to the
/// lamport version. Read-only inputs do not advance.
#[derive(Debug, Default, Clone)]
pub struct SharedObjectVersionManager {
    /// object -> version the next certificate will read
    next_versions: BTreeMap<ObjectId, Version>,
    last_commit: Option<CommitIndex>,
}

impl SharedObjectVersionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve input versions for `certificate`.
    ///
    /// Objects seen for the first time are seeded from the declared
    /// `initial_version`.
    ///
    /// # Arguments
    ///
    /// * `certificate` - A consensus-path certificate, in consensus order
    /// * `commit_index` - Index of the commit the certificate is processed in
    pub fn assign(
        &mut self,
        certificate: &Certificate,
        commit_index: CommitIndex,
    ) -> AssignedVersions {
        let data = &certificate.transaction.data;

        let shared: BTreeMap<ObjectId, Version> = data
            .shared_inputs()
            .map(|(id, initial_version, _)| {
                let version = *self.next_versions.entry(id).or_insert(initial_version);
                (id, version)
            })
            .collect();

        let lamport = Version::lamport(
            data.owned_inputs()
                .map(|(_, version)| version)
                .chain(shared.values().copied()),
        );

        for (id, _, mutable) in data.shared_inputs() {
            if mutable {
                self.next_versions.insert(id, lamport);
            }
        }
        self.last_commit = Some(commit_index);

        trace!(
            tx = ?certificate.digest(),
            commit = %commit_index,
            lamport = %lamport,
            shared = shared.len(),
            "Assigned shared versions"
        );
        AssignedVersions { shared, lamport }
    }

    /// Version the next certificate touching `id` would read.
    pub fn next_version(&self, id: &ObjectId) -> Option<Version> {
        self.next_versions.get(id).copied()
    }

    pub fn last_commit(&self) -> Option<CommitIndex> {
        self.last_commit
    }

    /// Number of shared objects seen so far.
    pub fn len(&self) -> usize {
        self.next_versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next_versions.is_empty()
    }
}
