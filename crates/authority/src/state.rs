//! The authority: admission, signing and routing of transactions.

use crate::{AuthorityConfig, OwnedObjectLocks, VoteAggregator};
use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};
use vireo_consensus::ConsensusAdapter;
use vireo_core::{PendingStatus, PollResponse, SubmitResponse, ValidatorClient};
use vireo_epoch::{EpochInfo, EpochManager};
use vireo_execution::{ExecutionOutcome, ExecutionScheduler};
use vireo_storage::{ObjectEntry, ObjectVersionStore};
use vireo_types::{
    AuthorityKeyPair, Certificate, ConsensusReason, Digest, Effects, InputObject, LedgerError,
    LedgerResult, Object, ObjectId, Owner, SignedTransaction, TransactionClass, TransactionVote,
    ValidatorId, Version,
};

/// One validator's view of the ledger and its entry point for clients.
///
/// `submit` validates a transaction, collects a quorum of votes from the
/// committee (this validator included) and routes the resulting certificate:
/// owned-only certificates go straight to the execution scheduler,
/// everything else to consensus.
///
/// Peers ask this validator for votes through `handle_vote_request`, which
/// runs the same validation and takes the owned-object locks.
pub struct Authority {
    validator: ValidatorId,
    key: AuthorityKeyPair,
    config: AuthorityConfig,
    store: Arc<ObjectVersionStore>,
    epoch: Arc<EpochManager>,
    scheduler: Arc<ExecutionScheduler>,
    consensus: ConsensusAdapter,
    locks: OwnedObjectLocks,
    peers: RwLock<Vec<Arc<dyn ValidatorClient>>>,
}

impl std::fmt::Debug for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authority")
            .field("validator", &self.validator)
            .field("config", &self.config)
            .field("peers", &self.peers.read().len())
            .finish()
    }
}

impl Authority {
    pub fn new(
        validator: ValidatorId,
        key: AuthorityKeyPair,
        config: AuthorityConfig,
        store: Arc<ObjectVersionStore>,
        epoch: Arc<EpochManager>,
        scheduler: Arc<ExecutionScheduler>,
        consensus: ConsensusAdapter,
    ) -> Self {
        Self {
            validator,
            key,
            config,
            store,
            epoch,
            scheduler,
            consensus,
            locks: OwnedObjectLocks::new(),
            peers: RwLock::new(Vec::new()),
        }
    }

    pub fn validator_id(&self) -> ValidatorId {
        self.validator
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    pub fn locks(&self) -> &OwnedObjectLocks {
        &self.locks
    }

    /// Drop locks on owned versions the store has moved past, and every
    /// lock from an earlier epoch.
    pub fn prune_locks(&self) -> usize {
        let stale = self.locks.enter_epoch(self.epoch.epoch());
        stale + self.locks.prune_spent(&self.store)
    }

    /// Clients for the other committee members. Votes are requested from all
    /// of them concurrently.
    pub fn set_peers(&self, peers: Vec<Arc<dyn ValidatorClient>>) {
        *self.peers.write() = peers;
    }

    /// Validate, certify and route `transaction`.
    ///
    /// Returns the effects for fast-path transactions, and `Pending` with the
    /// certificate for consensus-path ones; poll the digest for their effects.
    pub async fn submit(&self, transaction: SignedTransaction) -> LedgerResult<SubmitResponse> {
        let digest = transaction.digest();
        let class = self.check_transaction(&transaction)?;

        if let Some(effects) = self.store.get_effects(&digest) {
            debug!(tx = ?digest, "Already executed, returning existing effects");
            return Ok(SubmitResponse::Executed {
                certificate: None,
                effects,
            });
        }

        let epoch = self.epoch.current();
        let started_in = epoch.epoch();
        let local_vote = self.vote(&transaction)?;

        let mut aggregator = VoteAggregator::new(epoch.committee(), digest);
        aggregator.add_vote(local_vote);
        for vote in self.collect_peer_votes(&transaction).await {
            aggregator.add_vote(vote);
        }
        if !aggregator.has_quorum() {
            warn!(
                tx = ?digest,
                collected = aggregator.stake(),
                required = aggregator.quorum_needed(),
                "Quorum not reached"
            );
            return Err(LedgerError::QuorumNotReached {
                collected: aggregator.stake(),
                required: aggregator.quorum_needed(),
            });
        }

        let current = self.epoch.epoch();
        if current != started_in {
            return Err(LedgerError::EpochEnded {
                certified: started_in,
                current,
            });
        }
        let certificate = aggregator
            .into_certificate(transaction, class)
            .map_err(|e| LedgerError::InvalidCertificate(e.to_string()))?;

        self.route(certificate)
    }

    /// Process a certificate formed by another validator's `submit`.
    ///
    /// The certificate is checked against the current committee, then
    /// executed or proposed to consensus exactly as if it had been formed
    /// here.
    pub fn handle_certificate(&self, certificate: Certificate) -> LedgerResult<SubmitResponse> {
        let digest = certificate.digest();
        if let Some(effects) = self.store.get_effects(&digest) {
            return Ok(SubmitResponse::Executed {
                certificate: Some(certificate),
                effects,
            });
        }
        let epoch = self.epoch.current();
        if certificate.epoch != epoch.epoch() {
            return Err(LedgerError::EpochEnded {
                certified: certificate.epoch,
                current: epoch.epoch(),
            });
        }
        certificate
            .verify(epoch.committee())
            .map_err(|e| LedgerError::InvalidCertificate(e.to_string()))?;
        self.route(certificate)
    }

    fn route(&self, certificate: Certificate) -> LedgerResult<SubmitResponse> {
        if certificate.class.requires_consensus() {
            let digest = certificate.digest();
            if let PendingStatus::Failed(error) = self.consensus.propose(certificate.clone()).status() {
                return Err(error);
            }
            debug!(tx = ?digest, "Certificate sent to consensus");
            return Ok(SubmitResponse::Pending { certificate });
        }
        self.execute_fast_path(certificate)
    }

    fn execute_fast_path(&self, certificate: Certificate) -> LedgerResult<SubmitResponse> {
        let digest = certificate.digest();
        let results = self.scheduler.execute(certificate.clone(), None)?;
        let outcome = results.into_iter().find(|r| r.digest == digest);
        let effects = match outcome.map(|r| r.outcome) {
            Some(ExecutionOutcome::Executed(effects)) => effects,
            Some(ExecutionOutcome::Aborted(error)) => return Err(error),
            // Another submitter got there first, or inputs are still on
            // their way.
            None => match self.store.get_effects(&digest) {
                Some(effects) => effects,
                None => return Ok(SubmitResponse::Pending { certificate }),
            },
        };
        let owned: Vec<_> = certificate.transaction.data.owned_inputs().collect();
        self.locks.release(&digest, &owned);
        debug!(tx = ?digest, success = effects.is_success(), "Fast-path certificate executed");
        Ok(SubmitResponse::Executed {
            certificate: Some(certificate),
            effects,
        })
    }

    /// Peer-side signing: validate `transaction`, lock its owned inputs and
    /// return this validator's vote.
    pub fn handle_vote_request(&self, transaction: &SignedTransaction) -> LedgerResult<TransactionVote> {
        self.check_transaction(transaction)?;
        self.vote(transaction)
    }

    fn vote(&self, transaction: &SignedTransaction) -> LedgerResult<TransactionVote> {
        let current = self.epoch.epoch();
        if !self.epoch.is_active() {
            return Err(LedgerError::EpochEnded {
                certified: current,
                current,
            });
        }
        let digest = transaction.digest();
        let owned: Vec<_> = transaction.data.owned_inputs().collect();
        self.locks.acquire(current, digest, &owned)?;
        Ok(TransactionVote::sign(current, digest, self.validator, &self.key))
    }

    async fn collect_peer_votes(&self, transaction: &SignedTransaction) -> Vec<TransactionVote> {
        let peers = self.peers.read().clone();
        let timeout = self.config.vote_timeout();
        let requests = peers.iter().map(|peer| {
            let transaction = transaction.clone();
            async move {
                let id = peer.validator_id();
                match tokio::time::timeout(timeout, peer.request_vote(transaction)).await {
                    Ok(Ok(vote)) => Some(vote),
                    Ok(Err(e)) => {
                        debug!(peer = %id, error = %e, "Peer refused to vote");
                        None
                    }
                    Err(_) => {
                        warn!(peer = %id, "Vote request timed out");
                        None
                    }
                }
            }
        });
        join_all(requests).await.into_iter().flatten().collect()
    }

    /// Admission checks shared by `submit` and `handle_vote_request`.
    fn check_transaction(&self, transaction: &SignedTransaction) -> LedgerResult<TransactionClass> {
        let data = &transaction.data;
        let epoch = self.epoch.current();
        data.validity_check(epoch.protocol_config())?;
        transaction.verify_sender()?;

        let class = TransactionClass::classify(data);
        match class {
            TransactionClass::ConsensusRequired(ConsensusReason::SharedObject)
                if !self.config.shared_objects_enabled =>
            {
                return Err(LedgerError::UnsupportedTransactionKind);
            }
            TransactionClass::ConsensusRequired(ConsensusReason::Governance)
                if !epoch.protocol_config().is_governance_sender(&data.sender) =>
            {
                return Err(LedgerError::UnauthorizedGovernance {
                    sender: data.sender,
                });
            }
            _ => {}
        }

        let mut objects = Vec::with_capacity(data.inputs.len());
        for input in &data.inputs {
            let id = input.id();
            let object = match self.store.latest(&id) {
                Some(ObjectEntry::Live(object)) => object,
                _ => return Err(LedgerError::ObjectNotFound(id)),
            };
            match (input, &object.owner) {
                (InputObject::Owned { .. }, Owner::Owned(owner)) => {
                    if *owner != data.sender {
                        return Err(LedgerError::IncorrectOwner {
                            id,
                            sender: data.sender,
                            owner: object.owner,
                        });
                    }
                }
                (
                    InputObject::Shared {
                        initial_version, ..
                    },
                    Owner::Shared {
                        initial_version: actual,
                    },
                ) => {
                    if initial_version != actual {
                        return Err(LedgerError::InvalidTransaction(format!(
                            "shared object {id} has initial version {actual}, not {initial_version}"
                        )));
                    }
                }
                (InputObject::Owned { .. }, Owner::Shared { .. }) => {
                    return Err(LedgerError::InvalidTransaction(format!(
                        "object {id} is shared but declared owned"
                    )));
                }
                (InputObject::Shared { .. }, Owner::Owned(_)) => {
                    return Err(LedgerError::InvalidTransaction(format!(
                        "object {id} is owned but declared shared"
                    )));
                }
            }
            objects.push(object);
        }

        for (id, expected) in data.owned_inputs() {
            let current = objects
                .iter()
                .find(|object| object.id == id)
                .map(|object| object.version)
                .ok_or(LedgerError::ObjectNotFound(id))?;
            if current != expected {
                return Err(LedgerError::ObjectVersionMismatch {
                    id,
                    expected,
                    current,
                });
            }
        }
        Ok(class)
    }

    /// Effects if executed, `Pending` while in flight.
    pub fn poll(&self, digest: &Digest) -> LedgerResult<PollResponse> {
        if let Some(effects) = self.store.get_effects(digest) {
            return Ok(PollResponse::Executed(effects));
        }
        match self.consensus.pending().status(digest) {
            Some(PendingStatus::Executed(effects)) => Ok(PollResponse::Executed(effects)),
            Some(PendingStatus::Failed(error)) => Err(error),
            Some(PendingStatus::Pending | PendingStatus::Delivered) => Ok(PollResponse::Pending),
            None if self.scheduler.is_pending(digest) => Ok(PollResponse::Pending),
            None => Err(LedgerError::UnknownTransaction(*digest)),
        }
    }

    /// An object at `version`, or its latest version.
    pub fn get_object(&self, id: &ObjectId, version: Option<Version>) -> LedgerResult<Object> {
        self.store
            .get_object(id, version)
            .ok_or(LedgerError::ObjectNotFound(*id))
    }

    pub fn get_effects(&self, digest: &Digest) -> LedgerResult<Effects> {
        self.store
            .get_effects(digest)
            .ok_or(LedgerError::UnknownTransaction(*digest))
    }

    pub fn get_epoch_info(&self) -> EpochInfo {
        self.epoch.info()
    }
}
