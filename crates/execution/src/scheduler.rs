//! Ordering, input resolution and atomic commit of certificate execution.

use crate::SchedulerConfig;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use vireo_core::{ExecutionInput, ExecutionObserver, ExecutionOutput, TransactionExecutor};
use vireo_epoch::EpochManager;
use vireo_storage::{CommitBatch, ObjectEntry, ObjectVersionStore};
use vireo_types::{
    AssignedVersions, Certificate, Digest, Effects, EpochId, ExecutionStatus, FailureReason,
    LedgerError, LedgerResult, Object, ObjectId, Version,
};

/// What happened to one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Effects committed, successful or not.
    Executed(Effects),
    /// Left the scheduler without effects and without mutating anything.
    Aborted(LedgerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub digest: Digest,
    pub outcome: ExecutionOutcome,
}

impl ExecutionResult {
    pub fn effects(&self) -> Option<&Effects> {
        match &self.outcome {
            ExecutionOutcome::Executed(effects) => Some(effects),
            ExecutionOutcome::Aborted(_) => None,
        }
    }
}

#[derive(Debug)]
struct PendingExecution {
    certificate: Certificate,
    /// Shared versions and lamport version, for consensus-path certificates.
    assigned: Option<AssignedVersions>,
    /// Set for certificates cancelled before execution. They only advance
    /// their owned inputs.
    cancelled: Option<FailureReason>,
}

/// Inputs of a ready certificate at their resolved versions.
struct ResolvedInputs {
    objects: BTreeMap<ObjectId, Object>,
    /// First shared input with no live object at its resolved version.
    missing_shared: Option<ObjectId>,
}

enum Readiness {
    Ready(ResolvedInputs),
    Wait,
    Conflict(LedgerError),
}

/// Executes certificates once their inputs are available.
///
/// A certificate waits until:
///
/// - every owned input is at the version it certified (a newer version or a
///   deletion aborts it with `VersionConflict`)
/// - every shared input is in the store at its assigned version, or no other
///   waiting certificate was assigned an older version of that object
///
/// Ready certificates run one at a time. Each execution is committed to the
/// store together with its effects in a single atomic batch. A failed
/// execution still writes every existing mutable input at the lamport version,
/// so versions promised by the version manager always materialize.
///
/// Execution is refused while the epoch is transitioning; [`drain`] then
/// aborts whatever is still waiting.
///
/// [`drain`]: ExecutionScheduler::drain
pub struct ExecutionScheduler {
    store: Arc<ObjectVersionStore>,
    epoch: Arc<EpochManager>,
    executor: Arc<dyn TransactionExecutor>,
    config: SchedulerConfig,
    /// Waiting certificates in arrival order.
    pending: Mutex<IndexMap<Digest, PendingExecution>>,
    observers: RwLock<Vec<Arc<dyn ExecutionObserver>>>,
}

impl std::fmt::Debug for ExecutionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionScheduler")
            .field("pending", &self.pending.lock().len())
            .field("config", &self.config)
            .finish()
    }
}

impl ExecutionScheduler {
    pub fn new(
        store: Arc<ObjectVersionStore>,
        epoch: Arc<EpochManager>,
        executor: Arc<dyn TransactionExecutor>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            epoch,
            executor,
            config,
            pending: Mutex::new(IndexMap::new()),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn ExecutionObserver>) {
        self.observers.write().push(observer);
    }

    pub fn store(&self) -> &Arc<ObjectVersionStore> {
        &self.store
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_pending(&self, digest: &Digest) -> bool {
        self.pending.lock().contains_key(digest)
    }

    /// Execute `certificate` as soon as its inputs are available.
    ///
    /// Returns every certificate resolved by this call: the given one if it
    /// was ready, plus any waiting certificates it unblocked. Submitting a
    /// certificate that is already executed or already waiting does nothing.
    ///
    /// # Arguments
    ///
    /// * `certificate` - A certificate of the current epoch
    /// * `assigned` - Versions from the shared-object version manager for
    ///   consensus-path certificates, `None` for the fast path
    pub fn execute(
        &self,
        certificate: Certificate,
        assigned: Option<AssignedVersions>,
    ) -> LedgerResult<Vec<ExecutionResult>> {
        self.check_epoch(&certificate)?;
        if certificate.class.requires_consensus() != assigned.is_some() {
            return Err(LedgerError::InvalidCertificate(
                "shared versions must be assigned exactly for consensus-path certificates".into(),
            ));
        }

        self.enqueue(PendingExecution {
            certificate,
            assigned,
            cancelled: None,
        })
    }

    /// Record `certificate` as failed with `reason` without running it.
    ///
    /// Used for consensus-path certificates that were sequenced but not
    /// admitted. No shared versions are read or written. Owned inputs are
    /// still rewritten at the lamport version of the owned inputs, so they
    /// stay spendable and the locks taken on their old versions lapse.
    pub fn cancel(
        &self,
        certificate: Certificate,
        reason: FailureReason,
    ) -> LedgerResult<Vec<ExecutionResult>> {
        let lamport = Version::lamport(
            certificate
                .transaction
                .data
                .owned_inputs()
                .map(|(_, version)| version),
        );
        self.check_epoch(&certificate)?;
        self.enqueue(PendingExecution {
            certificate,
            assigned: Some(AssignedVersions {
                shared: BTreeMap::new(),
                lamport,
            }),
            cancelled: Some(reason),
        })
    }

    fn check_epoch(&self, certificate: &Certificate) -> LedgerResult<()> {
        let current = self.epoch.epoch();
        if !self.epoch.is_active() || certificate.epoch != current {
            return Err(LedgerError::EpochEnded {
                certified: certificate.epoch,
                current,
            });
        }
        Ok(())
    }

    fn enqueue(&self, entry: PendingExecution) -> LedgerResult<Vec<ExecutionResult>> {
        let digest = entry.certificate.digest();
        let results = {
            let mut pending = self.pending.lock();
            if pending.contains_key(&digest) || self.store.is_executed(&digest) {
                trace!(tx = ?digest, "Already scheduled or executed");
                return Ok(Vec::new());
            }
            if entry.assigned.is_none() && pending.len() >= self.config.max_pending {
                return Err(LedgerError::Overloaded {
                    pending: pending.len(),
                });
            }
            pending.insert(digest, entry);
            self.run_ready(&mut pending)
        };

        self.notify(&results);
        Ok(results)
    }

    /// Abort every waiting certificate with `EpochEnded`.
    ///
    /// Runs nothing: certificates execute as soon as they are ready, so
    /// everything still queued is blocked on inputs that will not arrive in
    /// this epoch. Used while the epoch is transitioning.
    pub fn drain(&self) -> Vec<ExecutionResult> {
        let results = {
            let mut pending = self.pending.lock();
            let current = self.epoch.epoch();
            let mut results = Vec::with_capacity(pending.len());
            for (digest, waiting) in pending.drain(..) {
                warn!(tx = ?digest, "Certificate not ready at epoch end");
                results.push(ExecutionResult {
                    digest,
                    outcome: ExecutionOutcome::Aborted(LedgerError::EpochEnded {
                        certified: waiting.certificate.epoch,
                        current,
                    }),
                });
            }
            results
        };

        debug!(resolved = results.len(), "Drained execution scheduler");
        self.notify(&results);
        results
    }

    fn notify(&self, results: &[ExecutionResult]) {
        if results.is_empty() {
            return;
        }
        let observers = self.observers.read();
        for result in results {
            for observer in observers.iter() {
                match &result.outcome {
                    ExecutionOutcome::Executed(effects) => observer.on_executed(effects),
                    ExecutionOutcome::Aborted(error) => observer.on_aborted(&result.digest, error),
                }
            }
        }
    }

    /// Run waiting certificates until none is ready.
    fn run_ready(&self, pending: &mut IndexMap<Digest, PendingExecution>) -> Vec<ExecutionResult> {
        let mut results = Vec::new();
        loop {
            let mut progressed = false;
            let mut index = 0;
            while index < pending.len() {
                let ready = match self.readiness(pending, index) {
                    Readiness::Wait => {
                        index += 1;
                        continue;
                    }
                    Readiness::Ready(inputs) => Ok(inputs),
                    Readiness::Conflict(error) => Err(error),
                };
                let Some((digest, entry)) = pending.shift_remove_index(index) else {
                    break;
                };
                let outcome = match ready {
                    Ok(inputs) => self.execute_ready(&entry, inputs),
                    Err(error) => {
                        warn!(tx = ?digest, %error, "Aborting certificate");
                        ExecutionOutcome::Aborted(error)
                    }
                };
                results.push(ExecutionResult { digest, outcome });
                progressed = true;
            }
            if !progressed {
                return results;
            }
        }
    }

    fn readiness(&self, pending: &IndexMap<Digest, PendingExecution>, index: usize) -> Readiness {
        let Some((_, entry)) = pending.get_index(index) else {
            return Readiness::Wait;
        };
        let data = &entry.certificate.transaction.data;
        let mut objects = BTreeMap::new();

        for (id, expected) in data.owned_inputs() {
            match self.store.latest(&id) {
                Some(ObjectEntry::Live(object)) if object.version == expected => {
                    objects.insert(id, object);
                }
                // Not produced yet on this replica.
                Some(ObjectEntry::Live(object)) if object.version < expected => return Readiness::Wait,
                None => return Readiness::Wait,
                current => {
                    return Readiness::Conflict(LedgerError::VersionConflict {
                        id,
                        expected,
                        current: current.map(|entry| entry.version()),
                    })
                }
            }
        }

        let mut missing_shared = None;
        if let Some(assigned) = &entry.assigned {
            for (id, version) in &assigned.shared {
                let resolved = match self.store.entry_at(id, *version) {
                    Some(entry) => Some(entry),
                    None if Self::older_assignment_waiting(pending, index, id, *version) => {
                        return Readiness::Wait;
                    }
                    // The certificate that was to write this version was
                    // aborted; read the newest version before it.
                    None => self.store.latest_at_or_before(id, *version),
                };
                match resolved {
                    Some(ObjectEntry::Live(object)) => {
                        objects.insert(*id, object);
                    }
                    _ => {
                        missing_shared.get_or_insert(*id);
                    }
                }
            }
        }

        Readiness::Ready(ResolvedInputs {
            objects,
            missing_shared,
        })
    }

    fn older_assignment_waiting(
        pending: &IndexMap<Digest, PendingExecution>,
        index: usize,
        id: &ObjectId,
        version: Version,
    ) -> bool {
        pending.values().enumerate().any(|(i, other)| {
            i != index
                && other
                    .assigned
                    .as_ref()
                    .and_then(|a| a.get(id))
                    .is_some_and(|v| v < version)
        })
    }

    fn execute_ready(&self, entry: &PendingExecution, inputs: ResolvedInputs) -> ExecutionOutcome {
        let certificate = &entry.certificate;
        let data = &certificate.transaction.data;
        let digest = certificate.digest();
        let lamport = match &entry.assigned {
            Some(assigned) => assigned.lamport,
            None => Version::lamport(data.owned_inputs().map(|(_, version)| version)),
        };
        let context = BatchContext {
            digest,
            epoch: certificate.epoch,
            lamport,
            mutable: data
                .inputs
                .iter()
                .filter(|input| input.is_mutable())
                .map(|input| input.id())
                .collect(),
            expected_owned: data.owned_inputs().collect(),
            shared_inputs: entry
                .assigned
                .as_ref()
                .map(|a| a.shared.iter().map(|(id, v)| (*id, *v)).collect())
                .unwrap_or_default(),
        };

        let result = match (&entry.cancelled, inputs.missing_shared) {
            (Some(reason), _) => Err(reason.clone()),
            (None, Some(id)) => Err(FailureReason::ObjectNotFound(id)),
            (None, None) => self.executor.execute(&ExecutionInput {
                digest,
                transaction: data,
                objects: inputs.objects.clone(),
                lamport_version: lamport,
            }),
        };
        let batch = match result {
            Ok(output) => context
                .success(&inputs.objects, output, &self.store)
                .unwrap_or_else(|reason| context.failure(&inputs.objects, reason)),
            Err(reason) => context.failure(&inputs.objects, reason),
        };

        let effects = batch.effects.clone();
        match self.store.commit(batch) {
            Ok(()) => {
                match &effects.status {
                    ExecutionStatus::Success => {
                        debug!(tx = ?digest, lamport = %lamport, "Executed certificate")
                    }
                    ExecutionStatus::Failure(reason) => {
                        debug!(tx = ?digest, lamport = %lamport, %reason, "Certificate failed")
                    }
                }
                ExecutionOutcome::Executed(effects)
            }
            Err(error) => {
                warn!(tx = ?digest, %error, "Commit rejected");
                ExecutionOutcome::Aborted(error.into())
            }
        }
    }
}

/// Per-certificate facts needed to turn executor output into a commit batch.
struct BatchContext {
    digest: Digest,
    epoch: EpochId,
    lamport: Version,
    mutable: BTreeSet<ObjectId>,
    expected_owned: Vec<(ObjectId, Version)>,
    shared_inputs: Vec<(ObjectId, Version)>,
}

impl BatchContext {
    fn stamp(&self, mut object: Object) -> Object {
        object.version = self.lamport;
        object.previous_transaction = self.digest;
        object
    }

    fn effects(&self, status: ExecutionStatus, gas_used: u64) -> Effects {
        let mut effects = Effects::empty(self.digest, self.epoch, status, self.lamport);
        effects.shared_inputs = self.shared_inputs.clone();
        effects.gas_used = gas_used;
        effects
    }

    /// Every existing mutable input rewritten unchanged at the lamport version.
    fn failure(&self, inputs: &BTreeMap<ObjectId, Object>, reason: FailureReason) -> CommitBatch {
        let written: Vec<Object> = self
            .mutable
            .iter()
            .filter_map(|id| inputs.get(id))
            .map(|object| self.stamp(object.clone()))
            .collect();
        let mut effects = self.effects(ExecutionStatus::Failure(reason), 0);
        effects.mutated = written.iter().map(Object::reference).collect();
        CommitBatch {
            effects,
            expected_owned: self.expected_owned.clone(),
            written,
            deleted: Vec::new(),
        }
    }

    /// Validate executor output and build the batch for a successful run.
    fn success(
        &self,
        inputs: &BTreeMap<ObjectId, Object>,
        output: ExecutionOutput,
        store: &ObjectVersionStore,
    ) -> Result<CommitBatch, FailureReason> {
        let invalid = |msg: &str| FailureReason::InvalidOperation(msg.to_string());

        let mut mutated = BTreeMap::new();
        for object in output.mutated {
            let Some(input) = inputs.get(&object.id) else {
                return Err(invalid("executor mutated an object that is not an input"));
            };
            if !self.mutable.contains(&object.id) {
                return Err(invalid("executor mutated a read-only input"));
            }
            if !input.owner.same_classification(&object.owner) {
                return Err(invalid("object cannot change between owned and shared"));
            }
            mutated.insert(object.id, self.stamp(object));
        }

        let deleted: BTreeSet<ObjectId> = output.deleted.into_iter().collect();
        for id in &deleted {
            if !self.mutable.contains(id) || !inputs.contains_key(id) || mutated.contains_key(id) {
                return Err(invalid("executor deleted an object it cannot write"));
            }
        }

        for id in &self.mutable {
            if mutated.contains_key(id) || deleted.contains(id) {
                continue;
            }
            if let Some(object) = inputs.get(id) {
                mutated.insert(*id, self.stamp(object.clone()));
            }
        }

        let mut created = Vec::with_capacity(output.created.len());
        for object in output.created {
            if inputs.contains_key(&object.id) || store.latest(&object.id).is_some() {
                return Err(invalid("created object id already exists"));
            }
            created.push(self.stamp(object));
        }

        let mut effects = self.effects(ExecutionStatus::Success, output.gas_used);
        effects.mutated = mutated.values().map(Object::reference).collect();
        effects.created = created.iter().map(Object::reference).collect();
        effects.deleted = deleted.iter().copied().collect();

        Ok(CommitBatch {
            effects,
            expected_owned: self.expected_owned.clone(),
            written: mutated.into_values().chain(created).collect(),
            deleted: deleted.into_iter().collect(),
        })
    }
}
