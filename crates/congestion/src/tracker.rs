//! Per-commit load accounting and the deferral queue.

use crate::{CongestionConfig, CongestionMode};
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::{debug, trace};
use vireo_types::{AssignedVersions, Certificate, CommitIndex, Digest, ObjectId};

/// A certificate waiting for a later commit.
#[derive(Debug, Clone)]
pub struct DeferredCertificate {
    pub certificate: Certificate,
    /// Number of commits this certificate has been deferred for.
    pub deferred_rounds: u32,
}

/// What happened to a certificate handed to [`CongestionTracker::defer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferOutcome {
    /// Queued for the next commit.
    Deferred { deferred_rounds: u32 },
    /// Deferred too often; the caller records a cancellation effect.
    Cancelled { deferred_rounds: u32 },
}

/// Tracks load per shared object within the current commit.
///
/// Owned by the consensus handler's sequential loop; never shared, so it needs
/// no locking. For each certificate the handler asks [`should_defer`] before
/// assigning versions, so a deferred certificate consumes no versions. Admitted
/// certificates are then [`record`]ed.
///
/// Deferred certificates are kept in deferral order and are handed back, in
/// that order, at the start of the next commit.
///
/// [`should_defer`]: CongestionTracker::should_defer
/// [`record`]: CongestionTracker::record
#[derive(Debug)]
pub struct CongestionTracker {
    config: CongestionConfig,
    /// Commit the counters belong to.
    round: Option<CommitIndex>,
    /// object -> load accumulated this commit
    load: HashMap<ObjectId, u64>,
    /// digest -> deferred certificate, in deferral order
    deferred: IndexMap<Digest, DeferredCertificate>,
}

impl CongestionTracker {
    pub fn new(config: CongestionConfig) -> Self {
        Self {
            config,
            round: None,
            load: HashMap::new(),
            deferred: IndexMap::new(),
        }
    }

    pub fn config(&self) -> &CongestionConfig {
        &self.config
    }

    /// Commit the current counters belong to.
    pub fn round(&self) -> Option<CommitIndex> {
        self.round
    }

    /// Reset per-commit counters for `index`.
    pub fn begin_commit(&mut self, index: CommitIndex) {
        trace!(commit = %index, objects = self.load.len(), "Resetting congestion counters");
        self.round = Some(index);
        self.load.clear();
    }

    /// Cost of `certificate` under the configured mode.
    pub fn cost(&self, certificate: &Certificate) -> u64 {
        match self.config.mode {
            CongestionMode::TransactionCount => 1,
            CongestionMode::GasBudget => certificate.transaction.data.gas_budget,
        }
    }

    /// Current load of `object` this commit.
    pub fn load_of(&self, object: &ObjectId) -> u64 {
        self.load.get(object).copied().unwrap_or(0)
    }

    /// Whether `certificate` must wait for a later commit.
    ///
    /// True when admitting it would push any shared object it touches over
    /// `max_load_per_object`, unless that object has taken no load yet this
    /// commit. Governance certificates are never deferred.
    pub fn should_defer(&self, certificate: &Certificate) -> bool {
        if !self.config.enabled || certificate.class.is_governance() {
            return false;
        }
        let cost = self.cost(certificate);
        certificate
            .transaction
            .data
            .shared_inputs()
            .any(|(id, _, _)| {
                let load = self.load_of(&id);
                load > 0 && load.saturating_add(cost) > self.config.max_load_per_object
            })
    }

    /// Account for an admitted certificate.
    pub fn record(&mut self, certificate: &Certificate, assigned: &AssignedVersions) {
        let cost = self.cost(certificate);
        for id in assigned.shared.keys() {
            let load = self.load.entry(*id).or_default();
            *load = load.saturating_add(cost);
        }
    }

    /// Queue `certificate` for the next commit, or cancel it if it has
    /// already waited `max_deferral_rounds` commits.
    ///
    /// # Arguments
    ///
    /// * `certificate` - The certificate that could not be admitted
    /// * `previous_rounds` - How often it was deferred before (0 if never)
    pub fn defer(&mut self, certificate: Certificate, previous_rounds: u32) -> DeferOutcome {
        let deferred_rounds = previous_rounds + 1;
        if let Some(max) = self.config.max_deferral_rounds {
            if deferred_rounds > max {
                debug!(tx = ?certificate.digest(), deferred_rounds, "Cancelled by congestion");
                return DeferOutcome::Cancelled {
                    deferred_rounds: previous_rounds,
                };
            }
        }
        debug!(tx = ?certificate.digest(), deferred_rounds, "Deferred by congestion");
        self.deferred.insert(
            certificate.digest(),
            DeferredCertificate {
                certificate,
                deferred_rounds,
            },
        );
        DeferOutcome::Deferred { deferred_rounds }
    }

    /// Remove and return every deferred certificate, oldest deferral first.
    pub fn take_deferred(&mut self) -> Vec<DeferredCertificate> {
        self.deferred.drain(..).map(|(_, deferred)| deferred).collect()
    }

    pub fn is_deferred(&self, digest: &Digest) -> bool {
        self.deferred.contains_key(digest)
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Clear counters and the deferral queue at an epoch boundary, returning
    /// the certificates that were still waiting.
    pub fn reset(&mut self) -> Vec<DeferredCertificate> {
        self.round = None;
        self.load.clear();
        self.take_deferred()
    }
}
