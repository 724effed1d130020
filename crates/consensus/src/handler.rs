//! Sequential processing of ordered consensus output.

use crate::PendingTable;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use vireo_congestion::{CongestionConfig, CongestionTracker, DeferOutcome};
use vireo_epoch::{EpochError, EpochManager, GovernanceOutcome};
use vireo_execution::ExecutionScheduler;
use vireo_storage::{CommitBatch, StoreError};
use vireo_types::{
    AssignedVersions, Certificate, CommitIndex, ConsensusCommit, Digest, Effects, EpochId,
    ExecutionStatus, FailureReason, LedgerError, Version,
};
use vireo_versioning::SharedObjectVersionManager;

/// Errors that stop the consensus handler.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The epoch could not be advanced. Nothing of the next epoch was
    /// applied and the validator cannot make progress.
    #[error("epoch transition failed: {0}")]
    Fatal(#[from] EpochError),

    #[error("consensus handler halted by an earlier fatal error")]
    Halted,
}

/// What one commit did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub index: CommitIndex,
    /// Governance certificates applied.
    pub governance: usize,
    /// Certificates handed to the execution scheduler.
    pub scheduled: usize,
    pub deferred: usize,
    pub cancelled: usize,
    /// Certificates dropped for a bad signature or a past epoch.
    pub rejected: usize,
    /// Set when this commit ended the epoch.
    pub new_epoch: Option<EpochId>,
}

/// Turns consensus commits into execution.
///
/// Runs as a single sequential task. For each commit it:
///
/// 1. Verifies certificate signatures in parallel and drops invalid ones
/// 2. Applies governance certificates, ascending by digest
/// 3. Re-offers certificates deferred by earlier commits, in deferral order
/// 4. Offers the commit's remaining certificates, ascending by digest
///
/// Offering a certificate means asking the congestion tracker whether it must
/// wait, then assigning its shared versions and handing it to the scheduler.
/// Every decision depends only on commit contents, so replicas fed the same
/// commits assign the same versions.
///
/// An `EndOfEpoch` certificate closes the epoch once its commit has been
/// sequenced: the scheduler is drained and the next committee installed.
#[derive(Debug)]
pub struct ConsensusHandler {
    epoch: Arc<EpochManager>,
    scheduler: Arc<ExecutionScheduler>,
    pending: Arc<PendingTable>,
    versions: SharedObjectVersionManager,
    congestion: CongestionTracker,
    /// Index of the last commit processed in this epoch.
    last_index: Option<CommitIndex>,
    /// Digests sequenced this epoch.
    sequenced: HashSet<Digest>,
    halted: bool,
}

impl ConsensusHandler {
    /// Registers `pending` as an observer of `scheduler`, so certificates
    /// resolve in the pending table when they execute.
    pub fn new(
        epoch: Arc<EpochManager>,
        scheduler: Arc<ExecutionScheduler>,
        pending: Arc<PendingTable>,
        congestion: CongestionConfig,
    ) -> Self {
        scheduler.add_observer(pending.clone());
        Self {
            epoch,
            scheduler,
            pending,
            versions: SharedObjectVersionManager::new(),
            congestion: CongestionTracker::new(congestion),
            last_index: None,
            sequenced: HashSet::new(),
            halted: false,
        }
    }

    pub fn last_index(&self) -> Option<CommitIndex> {
        self.last_index
    }

    pub fn versions(&self) -> &SharedObjectVersionManager {
        &self.versions
    }

    pub fn congestion(&self) -> &CongestionTracker {
        &self.congestion
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Process commits until the channel closes or a fatal error occurs.
    pub async fn run(
        mut self,
        mut commits: mpsc::Receiver<ConsensusCommit>,
    ) -> Result<(), HandlerError> {
        while let Some(commit) = commits.recv().await {
            self.handle_commit(commit)?;
        }
        info!("Consensus output closed, handler stopping");
        Ok(())
    }

    /// Process one commit.
    ///
    /// Returns `None` when the commit was skipped: its epoch is not the
    /// current one, or its index is not above the last processed index.
    pub fn handle_commit(
        &mut self,
        commit: ConsensusCommit,
    ) -> Result<Option<CommitSummary>, HandlerError> {
        if self.halted {
            return Err(HandlerError::Halted);
        }

        let current = self.epoch.epoch();
        if commit.epoch != current {
            warn!(
                commit = %commit.index,
                commit_epoch = %commit.epoch,
                epoch = %current,
                "Skipping commit from another epoch"
            );
            return Ok(None);
        }
        if self.last_index.is_some_and(|last| commit.index <= last) {
            warn!(commit = %commit.index, last = ?self.last_index, "Skipping stale or duplicate commit");
            return Ok(None);
        }
        self.last_index = Some(commit.index);
        self.congestion.begin_commit(commit.index);

        let mut summary = CommitSummary {
            index: commit.index,
            ..Default::default()
        };
        let (governance, user) = self.verify(commit.certificates, current, &mut summary);

        let mut end_of_epoch = None;
        for certificate in governance.into_values() {
            if let Some(next_protocol_version) = self.apply_governance(certificate) {
                end_of_epoch.get_or_insert(next_protocol_version);
            }
            summary.governance += 1;
        }
        for deferred in self.congestion.take_deferred() {
            self.offer(
                deferred.certificate,
                deferred.deferred_rounds,
                commit.index,
                &mut summary,
            );
        }
        for certificate in user.into_values() {
            self.offer(certificate, 0, commit.index, &mut summary);
        }

        if let Some(next_protocol_version) = end_of_epoch {
            summary.new_epoch = Some(self.end_epoch(next_protocol_version)?);
        }

        let pruned = self.pending.prune_executed();
        if pruned > 0 {
            trace!(commit = %summary.index, pruned, "Pruned executed pending entries");
        }

        debug!(
            commit = %summary.index,
            governance = summary.governance,
            scheduled = summary.scheduled,
            deferred = summary.deferred,
            cancelled = summary.cancelled,
            rejected = summary.rejected,
            "Processed commit"
        );
        Ok(Some(summary))
    }

    /// Check signatures in parallel and split into governance and user
    /// certificates, each keyed (and so ordered) by digest.
    fn verify(
        &self,
        certificates: Vec<Certificate>,
        current: EpochId,
        summary: &mut CommitSummary,
    ) -> (BTreeMap<Digest, Certificate>, BTreeMap<Digest, Certificate>) {
        let epoch = self.epoch.current();
        let committee = epoch.committee();
        let checked: Vec<(Certificate, Result<(), LedgerError>)> = certificates
            .into_par_iter()
            .map(|certificate| {
                let result = if certificate.epoch != current {
                    Err(LedgerError::EpochEnded {
                        certified: certificate.epoch,
                        current,
                    })
                } else {
                    certificate
                        .verify(committee)
                        .map_err(|e| LedgerError::InvalidCertificate(e.to_string()))
                };
                (certificate, result)
            })
            .collect();

        let mut governance = BTreeMap::new();
        let mut user = BTreeMap::new();
        for (certificate, result) in checked {
            let digest = certificate.digest();
            match result {
                Ok(()) => {}
                Err(error @ LedgerError::EpochEnded { .. }) => {
                    warn!(tx = ?digest, %error, "Certificate from another epoch");
                    self.pending.fail(&digest, error);
                    summary.rejected += 1;
                    continue;
                }
                // The digest may belong to a valid certificate elsewhere;
                // leave its pending entry alone.
                Err(error) => {
                    warn!(tx = ?digest, %error, "Dropping invalid certificate");
                    summary.rejected += 1;
                    continue;
                }
            }
            if self.sequenced.contains(&digest) || self.congestion.is_deferred(&digest) {
                trace!(tx = ?digest, "Already sequenced");
                continue;
            }
            if certificate.class.is_governance() {
                governance.insert(digest, certificate);
            } else {
                user.insert(digest, certificate);
            }
        }
        (governance, user)
    }

    /// Apply a governance certificate and record its effects. Returns the
    /// next protocol version if it ends the epoch.
    fn apply_governance(&mut self, certificate: Certificate) -> Option<Option<u64>> {
        let digest = certificate.digest();
        self.sequenced.insert(digest);

        let (status, end_of_epoch) = match self.epoch.apply_governance(&certificate) {
            GovernanceOutcome::Recorded => (ExecutionStatus::Success, None),
            GovernanceOutcome::EndOfEpoch {
                next_protocol_version,
            } => (ExecutionStatus::Success, Some(next_protocol_version)),
            GovernanceOutcome::Rejected(reason) => (
                ExecutionStatus::Failure(FailureReason::InvalidOperation(reason)),
                None,
            ),
        };
        self.commit_effects(Effects::empty(
            digest,
            certificate.epoch,
            status,
            Version::INITIAL,
        ));
        end_of_epoch
    }

    /// Defer, cancel or schedule one user certificate.
    fn offer(
        &mut self,
        certificate: Certificate,
        previous_rounds: u32,
        index: CommitIndex,
        summary: &mut CommitSummary,
    ) {
        let digest = certificate.digest();

        if !certificate.class.requires_consensus() {
            // Owned-only certificate that reached consensus anyway.
            self.sequenced.insert(digest);
            self.pending.mark_delivered(&digest);
            self.schedule(certificate, None);
            summary.scheduled += 1;
            return;
        }

        if self.congestion.should_defer(&certificate) {
            match self.congestion.defer(certificate.clone(), previous_rounds) {
                DeferOutcome::Deferred { .. } => {
                    self.pending.mark_delivered(&digest);
                    summary.deferred += 1;
                }
                DeferOutcome::Cancelled { deferred_rounds } => {
                    self.sequenced.insert(digest);
                    self.pending.mark_delivered(&digest);
                    let reason = FailureReason::CancelledByCongestion { deferred_rounds };
                    if let Err(error) = self.scheduler.cancel(certificate, reason) {
                        warn!(tx = ?digest, %error, "Scheduler refused cancellation");
                        self.pending.fail(&digest, error);
                    }
                    summary.cancelled += 1;
                }
            }
            return;
        }

        let assigned = self.versions.assign(&certificate, index);
        self.congestion.record(&certificate, &assigned);
        self.sequenced.insert(digest);
        self.pending.mark_delivered(&digest);
        self.schedule(certificate, Some(assigned));
        summary.scheduled += 1;
    }

    fn schedule(&self, certificate: Certificate, assigned: Option<AssignedVersions>) {
        let digest = certificate.digest();
        if let Err(error) = self.scheduler.execute(certificate, assigned) {
            warn!(tx = ?digest, %error, "Scheduler refused certificate");
            self.pending.fail(&digest, error);
        }
    }

    /// Record effects that involve no object writes.
    fn commit_effects(&self, effects: Effects) {
        let batch = CommitBatch {
            effects: effects.clone(),
            expected_owned: Vec::new(),
            written: Vec::new(),
            deleted: Vec::new(),
        };
        match self.scheduler.store().commit(batch) {
            Ok(()) => self.pending.complete(&effects),
            Err(StoreError::AlreadyExecuted(_)) => {
                trace!(tx = ?effects.transaction_digest, "Effects already recorded");
            }
            Err(e) => {
                warn!(tx = ?effects.transaction_digest, error = %e, "Failed to record effects");
                self.pending.fail(&effects.transaction_digest, e.into());
            }
        }
    }

    /// Drain the epoch and install the next one.
    fn end_epoch(&mut self, next_protocol_version: Option<u64>) -> Result<EpochId, HandlerError> {
        let ending = self.epoch.epoch();
        if let Err(e) = self.epoch.begin_transition() {
            error!(epoch = %ending, error = %e, "Cannot begin epoch transition");
            self.halted = true;
            return Err(e.into());
        }

        // Failures of this epoch stop being reported from here on.
        self.pending.prune_terminal();
        let drained = self.scheduler.drain();
        info!(epoch = %ending, drained = drained.len(), "Drained execution for epoch end");

        let next = match self.epoch.advance(next_protocol_version) {
            Ok(next) => next,
            Err(e) => {
                error!(epoch = %ending, error = %e, "Epoch transition failed, halting");
                self.halted = true;
                return Err(e.into());
            }
        };

        let next_epoch = next.epoch();
        for deferred in self.congestion.reset() {
            self.pending.fail(
                &deferred.certificate.digest(),
                LedgerError::EpochEnded {
                    certified: deferred.certificate.epoch,
                    current: next_epoch,
                },
            );
        }
        self.last_index = None;
        self.sequenced.clear();

        info!(from = %ending, to = %next_epoch, "Consensus handler entered new epoch");
        Ok(next_epoch)
    }
}
