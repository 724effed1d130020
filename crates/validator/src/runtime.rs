//! Runs a configured committee until shutdown.

use crate::config::{ConfigError, ValidatorConfig};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use vireo_consensus::HandlerError;
use vireo_simulation::{Cluster, ClusterError};

/// Errors starting or running the committee.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to start committee: {0}")]
    Cluster(#[from] ClusterError),

    #[error("consensus handler stopped: {0}")]
    Handler(#[from] HandlerError),
}

/// Totals reported when the runtime stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub commits: u64,
    pub certificates: u64,
}

/// A committee of in-process validators driven by a commit ticker.
pub struct ValidatorRuntime {
    cluster: Arc<Cluster>,
    commit_interval: Duration,
}

impl ValidatorRuntime {
    pub fn new(config: &ValidatorConfig) -> Result<Self, RuntimeError> {
        let cluster = Cluster::new(config.cluster_config()?)?;
        info!(
            validators = cluster.size(),
            genesis_objects = config.genesis.coins.len() + config.genesis.counters.len(),
            commit_interval_ms = config.node.commit_interval_ms,
            "Validator runtime ready"
        );
        Ok(Self {
            cluster: Arc::new(cluster),
            commit_interval: config.commit_interval(),
        })
    }

    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    /// Cut and deliver a commit every interval until `shutdown` resolves.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> Result<RunStats, RuntimeError> {
        let mut ticker = tokio::time::interval(self.commit_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut stats = RunStats::default();
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let commit = self.cluster.run_commit()?;
                    stats.commits += 1;
                    stats.certificates += commit.certificates.len() as u64;
                    if !commit.certificates.is_empty() {
                        debug!(
                            epoch = %commit.epoch,
                            commit = %commit.index,
                            certificates = commit.certificates.len(),
                            "Delivered commit"
                        );
                    }
                }
            }
        }

        info!(commits = stats.commits, certificates = stats.certificates, "Validator runtime stopped");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenesisConfig, GenesisCounter};
    use vireo_core::PollResponse;
    use vireo_types::test_utils::{test_account, test_increment};
    use vireo_types::ObjectData;

    fn config() -> ValidatorConfig {
        let mut config = ValidatorConfig::default();
        config.node.commit_interval_ms = 5;
        config.genesis = GenesisConfig {
            coins: Vec::new(),
            counters: vec![GenesisCounter { value: 10 }],
        };
        config
    }

    #[tokio::test]
    async fn test_runtime_executes_submitted_transactions() {
        let runtime = ValidatorRuntime::new(&config()).unwrap();
        let counter = runtime
            .cluster()
            .authority(0)
            .get_object(&GenesisConfig::object_id(0), None)
            .unwrap();

        let tx = test_increment(&test_account(1), &counter, 5, vec![]);
        let digest = tx.digest();
        runtime.cluster().submit(1, tx).await.unwrap();

        let stats = runtime
            .run_until(tokio::time::sleep(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(stats.commits >= 1);
        assert_eq!(stats.certificates, 1);

        let PollResponse::Executed(effects) = runtime.cluster().poll(1, &digest).unwrap() else {
            panic!("increment not executed");
        };
        assert!(effects.is_success());
        let counter = runtime.cluster().authority(3).get_object(&counter.id, None).unwrap();
        assert_eq!(counter.data, ObjectData::Counter { value: 15 });
    }

    #[tokio::test]
    async fn test_runtime_stops_on_shutdown() {
        let runtime = ValidatorRuntime::new(&config()).unwrap();
        let stats = runtime.run_until(async {}).await.unwrap();
        assert_eq!(stats.certificates, 0);
    }
}
