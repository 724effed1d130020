//! A committee of in-process validators sharing one simulated consensus.

use crate::SimulatedConsensus;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};
use vireo_authority::{Authority, AuthorityConfig, LocalValidatorClient};
use vireo_congestion::CongestionConfig;
use vireo_consensus::{ConsensusAdapter, ConsensusHandler, HandlerError, PendingTable};
use vireo_core::{PollResponse, SubmitResponse, ValidatorClient};
use vireo_epoch::{EpochError, EpochManager, EpochStore};
use vireo_execution::{ExecutionScheduler, NativeExecutor, SchedulerConfig};
use vireo_storage::{ObjectVersionStore, StoreError};
use vireo_types::{
    AuthorityKeyPair, Committee, CommitteeError, ConsensusCommit, Digest, Effects, EpochId,
    LedgerResult, Object, ObjectId, ProtocolConfig, SignedTransaction, ValidatorId, ValidatorInfo,
};

/// Errors building a cluster.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("invalid genesis committee: {0}")]
    Committee(#[from] CommitteeError),

    #[error("invalid genesis objects: {0}")]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Epoch(#[from] EpochError),
}

/// Configuration for a simulated cluster.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Number of validators, each with stake 1.
    pub validators: u64,
    /// Objects every replica starts with.
    pub genesis: Vec<Object>,
    /// Random seed for key derivation and consensus ordering.
    pub seed: u64,
    /// Probability that a proposal is silently dropped.
    pub drop_probability: f64,
    /// Most certificates per commit.
    pub max_commit_size: usize,
    pub protocol: ProtocolConfig,
    pub congestion: CongestionConfig,
    pub authority: AuthorityConfig,
    pub scheduler: SchedulerConfig,
}

impl ClusterConfig {
    pub fn new(validators: u64) -> Self {
        Self {
            validators,
            genesis: Vec::new(),
            seed: 12345,
            drop_probability: 0.0,
            max_commit_size: 100,
            protocol: ProtocolConfig::default(),
            congestion: CongestionConfig::default(),
            authority: AuthorityConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }

    pub fn with_genesis(mut self, genesis: Vec<Object>) -> Self {
        self.genesis = genesis;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_drop_probability(mut self, probability: f64) -> Self {
        self.drop_probability = probability;
        self
    }

    pub fn with_max_commit_size(mut self, size: usize) -> Self {
        self.max_commit_size = size;
        self
    }

    pub fn with_congestion(mut self, congestion: CongestionConfig) -> Self {
        self.congestion = congestion;
        self
    }

    pub fn with_authority(mut self, authority: AuthorityConfig) -> Self {
        self.authority = authority;
        self
    }

    pub fn with_protocol(mut self, protocol: ProtocolConfig) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }
}

/// One validator's components.
pub struct Replica {
    pub authority: Arc<Authority>,
    pub store: Arc<ObjectVersionStore>,
    pub epoch: Arc<EpochManager>,
    pub scheduler: Arc<ExecutionScheduler>,
    pub pending: Arc<PendingTable>,
    handler: Mutex<ConsensusHandler>,
}

impl Replica {
    pub fn handle_commit(&self, commit: ConsensusCommit) -> Result<(), HandlerError> {
        self.handler.lock().handle_commit(commit).map(|_| ())
    }
}

/// Authority key of validator `index` for a cluster seeded with `seed`.
pub fn validator_key(seed: u64, index: u64) -> AuthorityKeyPair {
    let mut material = [0u8; 32];
    material[..8].copy_from_slice(&seed.to_le_bytes());
    material[8..16].copy_from_slice(&index.to_le_bytes());
    AuthorityKeyPair::from_seed(&material)
}

/// In-process validators wired to each other and to one
/// [`SimulatedConsensus`].
///
/// Submitting through any validator collects votes from all of them. A
/// fast-path certificate is then handed to every other replica, the way a
/// client broadcasts a certificate. Consensus output is delivered to every
/// replica by [`Cluster::run_commit`], so replicas stay in lockstep.
pub struct Cluster {
    config: ClusterConfig,
    consensus: Arc<SimulatedConsensus>,
    replicas: Vec<Replica>,
}

impl Cluster {
    pub fn new(config: ClusterConfig) -> Result<Self, ClusterError> {
        let keys: Vec<_> = (0..config.validators)
            .map(|i| validator_key(config.seed, i))
            .collect();
        let validators = keys
            .iter()
            .enumerate()
            .map(|(i, key)| ValidatorInfo {
                id: ValidatorId(i as u64),
                public_key: key.public_key(),
                stake: 1,
            })
            .collect();
        let committee = Committee::with_threshold(
            EpochId::GENESIS,
            validators,
            config.protocol.quorum_threshold_bps,
        )?;
        let consensus = Arc::new(SimulatedConsensus::new(config.seed, config.drop_probability));

        let mut replicas = Vec::with_capacity(keys.len());
        for (i, key) in keys.into_iter().enumerate() {
            let store = Arc::new(ObjectVersionStore::new());
            store.insert_genesis(config.genesis.clone())?;
            let epoch = Arc::new(EpochManager::new(
                EpochStore::new(committee.clone(), config.protocol.clone()),
                store.clone(),
            )?);
            let scheduler = Arc::new(ExecutionScheduler::new(
                store.clone(),
                epoch.clone(),
                Arc::new(NativeExecutor::default()),
                config.scheduler,
            ));
            let pending = Arc::new(PendingTable::new());
            let handler = ConsensusHandler::new(
                epoch.clone(),
                scheduler.clone(),
                pending.clone(),
                config.congestion.clone(),
            );
            let authority = Arc::new(Authority::new(
                ValidatorId(i as u64),
                key,
                config.authority,
                store.clone(),
                epoch.clone(),
                scheduler.clone(),
                ConsensusAdapter::new(consensus.clone(), pending.clone()),
            ));
            replicas.push(Replica {
                authority,
                store,
                epoch,
                scheduler,
                pending,
                handler: Mutex::new(handler),
            });
        }

        for replica in &replicas {
            let peers: Vec<Arc<dyn ValidatorClient>> = replicas
                .iter()
                .filter(|other| other.authority.validator_id() != replica.authority.validator_id())
                .map(|other| {
                    Arc::new(LocalValidatorClient::new(other.authority.clone()))
                        as Arc<dyn ValidatorClient>
                })
                .collect();
            replica.authority.set_peers(peers);
        }

        info!(validators = replicas.len(), seed = config.seed, "Cluster started");
        Ok(Self {
            config,
            consensus,
            replicas,
        })
    }

    pub fn size(&self) -> usize {
        self.replicas.len()
    }

    pub fn replica(&self, index: usize) -> &Replica {
        &self.replicas[index]
    }

    pub fn replicas(&self) -> &[Replica] {
        &self.replicas
    }

    pub fn authority(&self, index: usize) -> &Arc<Authority> {
        &self.replicas[index].authority
    }

    pub fn consensus(&self) -> &Arc<SimulatedConsensus> {
        &self.consensus
    }

    /// Submit through validator `index`, then hand any fast-path certificate
    /// to the other replicas.
    pub async fn submit(
        &self,
        index: usize,
        transaction: SignedTransaction,
    ) -> LedgerResult<SubmitResponse> {
        let response = self.replicas[index].authority.submit(transaction).await?;
        if let SubmitResponse::Executed {
            certificate: Some(certificate),
            ..
        } = &response
        {
            for (other, replica) in self.replicas.iter().enumerate() {
                if other == index {
                    continue;
                }
                if let Err(e) = replica.authority.handle_certificate(certificate.clone()) {
                    warn!(replica = other, tx = ?certificate.digest(), error = %e, "Replica refused certificate");
                }
            }
        }
        Ok(response)
    }

    /// Cut the next commit and deliver it to every replica.
    pub fn run_commit(&self) -> Result<ConsensusCommit, HandlerError> {
        let epoch = self.replicas[0].epoch.epoch();
        let commit = self.consensus.next_commit(epoch, self.config.max_commit_size);
        for replica in &self.replicas {
            replica.handle_commit(commit.clone())?;
            replica.authority.prune_locks();
        }
        Ok(commit)
    }

    /// Run `count` commits.
    pub fn run_commits(&self, count: usize) -> Result<(), HandlerError> {
        for _ in 0..count {
            self.run_commit()?;
        }
        Ok(())
    }

    pub fn poll(&self, index: usize, digest: &Digest) -> LedgerResult<PollResponse> {
        self.replicas[index].authority.poll(digest)
    }

    /// Effects of `digest` on every replica, in replica order.
    pub fn effects_everywhere(&self, digest: &Digest) -> Vec<Option<Effects>> {
        self.replicas
            .iter()
            .map(|replica| replica.store.get_effects(digest))
            .collect()
    }

    /// Latest version of `id` on every replica, in replica order.
    pub fn object_everywhere(&self, id: &ObjectId) -> Vec<Option<Object>> {
        self.replicas
            .iter()
            .map(|replica| replica.store.get_object(id, None))
            .collect()
    }
}
