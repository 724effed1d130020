//! TOML configuration for the validator binary.
//!
//! ```toml
//! [node]
//! validators = 4
//! seed = 42
//! commit_interval_ms = 200
//!
//! [congestion]
//! max_load_per_object = 100
//!
//! [[genesis.coins]]
//! owner = "0x0101...01"
//! value = 1000000
//!
//! [[genesis.counters]]
//! value = 0
//! ```
//!
//! Every section is optional; missing values take their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use vireo_authority::AuthorityConfig;
use vireo_congestion::CongestionConfig;
use vireo_execution::SchedulerConfig;
use vireo_simulation::ClusterConfig;
use vireo_types::{Address, Digest, Object, ObjectData, ObjectId, ProtocolConfig, Version};

/// Errors loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid address {0:?}: expected 0x followed by 64 hex digits")]
    InvalidAddress(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Local committee settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Committee size. Every validator runs in this process.
    pub validators: u64,
    /// Seed for validator keys and consensus ordering.
    pub seed: u64,
    /// How often the consensus engine cuts a commit.
    pub commit_interval_ms: u64,
    pub max_commit_size: usize,
    /// Probability that a proposal is lost. For fault testing only.
    pub drop_probability: f64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            validators: 4,
            seed: 0,
            commit_interval_ms: 200,
            max_commit_size: 500,
            drop_probability: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisCoin {
    /// Owner address as `0x`-prefixed hex.
    pub owner: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisCounter {
    #[serde(default)]
    pub value: u64,
}

/// Objects present before the first transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    pub coins: Vec<GenesisCoin>,
    pub counters: Vec<GenesisCounter>,
}

impl GenesisConfig {
    /// Id of the `index`-th genesis object: coins first, then counters.
    pub fn object_id(index: usize) -> ObjectId {
        ObjectId::derive(&Digest::of(b"vireo-genesis"), index as u32)
    }

    /// Build the genesis objects, all at [`Version::INITIAL`].
    pub fn objects(&self) -> Result<Vec<Object>, ConfigError> {
        let mut objects = Vec::with_capacity(self.coins.len() + self.counters.len());
        for coin in &self.coins {
            objects.push(Object::new_owned(
                Self::object_id(objects.len()),
                Version::INITIAL,
                parse_address(&coin.owner)?,
                ObjectData::Coin { value: coin.value },
            ));
        }
        for counter in &self.counters {
            objects.push(Object::new_shared(
                Self::object_id(objects.len()),
                Version::INITIAL,
                ObjectData::Counter {
                    value: counter.value,
                },
            ));
        }
        Ok(objects)
    }
}

/// Parse a `0x`-prefixed 32-byte hex address.
pub fn parse_address(s: &str) -> Result<Address, ConfigError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(digits).map_err(|_| ConfigError::InvalidAddress(s.to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ConfigError::InvalidAddress(s.to_string()))?;
    Ok(Address::new(bytes))
}

/// Complete validator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub node: NodeConfig,
    pub protocol: ProtocolConfig,
    pub authority: AuthorityConfig,
    pub scheduler: SchedulerConfig,
    pub congestion: CongestionConfig,
    pub genesis: GenesisConfig,
}

impl ValidatorConfig {
    /// Read and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.validators == 0 {
            return Err(ConfigError::Invalid("node.validators must be at least 1".into()));
        }
        if self.node.commit_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "node.commit_interval_ms must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.node.drop_probability) {
            return Err(ConfigError::Invalid(
                "node.drop_probability must be within [0, 1]".into(),
            ));
        }
        if self.protocol.quorum_threshold_bps == 0 || self.protocol.quorum_threshold_bps > 10_000 {
            return Err(ConfigError::Invalid(
                "protocol.quorum_threshold_bps must be within (0, 10000]".into(),
            ));
        }
        for coin in &self.genesis.coins {
            parse_address(&coin.owner)?;
        }
        Ok(())
    }

    pub fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.node.commit_interval_ms)
    }

    /// Settings for the in-process committee.
    pub fn cluster_config(&self) -> Result<ClusterConfig, ConfigError> {
        Ok(ClusterConfig::new(self.node.validators)
            .with_genesis(self.genesis.objects()?)
            .with_seed(self.node.seed)
            .with_drop_probability(self.node.drop_probability)
            .with_max_commit_size(self.node.max_commit_size)
            .with_protocol(self.protocol.clone())
            .with_congestion(self.congestion.clone())
            .with_authority(self.authority)
            .with_scheduler(self.scheduler))
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vireo_congestion::CongestionMode;

    const OWNER: &str = "0x0101010101010101010101010101010101010101010101010101010101010101";

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ValidatorConfig::from_toml("").unwrap();
        assert_eq!(config, ValidatorConfig::default());
        assert_eq!(config.node.validators, 4);
        assert!(config.authority.shared_objects_enabled);
        assert_eq!(config.commit_interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_partial_sections() {
        let config = ValidatorConfig::from_toml(
            r#"
            [node]
            validators = 7
            seed = 9

            [authority]
            shared_objects_enabled = false

            [congestion]
            mode = "gas_budget"
            max_load_per_object = 50
            max_deferral_rounds = 3

            [protocol]
            max_input_objects = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.node.validators, 7);
        assert_eq!(config.node.seed, 9);
        assert_eq!(config.node.commit_interval_ms, 200);
        assert!(!config.authority.shared_objects_enabled);
        assert_eq!(config.authority.vote_timeout_ms, 5_000);
        assert_eq!(config.congestion.mode, CongestionMode::GasBudget);
        assert_eq!(config.congestion.max_deferral_rounds, Some(3));
        assert!(config.congestion.enabled);
        assert_eq!(config.protocol.max_input_objects, 8);
        assert_eq!(config.protocol.protocol_version, 1);
    }

    #[test]
    fn test_genesis_objects() {
        let config = ValidatorConfig::from_toml(&format!(
            r#"
            [[genesis.coins]]
            owner = "{OWNER}"
            value = 500

            [[genesis.coins]]
            owner = "{OWNER}"
            value = 7

            [[genesis.counters]]
            "#
        ))
        .unwrap();

        let objects = config.genesis.objects().unwrap();
        assert_eq!(objects.len(), 3);
        assert_eq!(objects[0].id, GenesisConfig::object_id(0));
        assert_eq!(objects[1].coin_value(), Some(7));
        assert!(objects[1].owner.is_owned_by(&Address::new([1; 32])));
        assert!(objects[2].owner.is_shared());
        assert_eq!(objects[2].data, ObjectData::Counter { value: 0 });
        assert!(objects.iter().all(|o| o.version == Version::INITIAL));

        let cluster = config.cluster_config().unwrap();
        assert_eq!(cluster.genesis, objects);
    }

    #[test]
    fn test_bad_address_rejected() {
        let err = ValidatorConfig::from_toml(
            r#"
            [[genesis.coins]]
            owner = "0x1234"
            value = 1
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress(a) if a == "0x1234"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ValidatorConfig::from_toml("[node]\nvalidators = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ValidatorConfig::from_toml("[node]\ndrop_probability = 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ValidatorConfig::from_toml("[node]\nvalidators = \"four\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_rendered_config_loads_back() {
        let mut config = ValidatorConfig::default();
        config.node.seed = 3;
        config.genesis.coins.push(GenesisCoin {
            owner: OWNER.to_string(),
            value: 10,
        });
        config.protocol = config.protocol.with_governance_sender(Address::new([1; 32]));
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains(OWNER));
        assert_eq!(ValidatorConfig::from_toml(&rendered).unwrap(), config);
    }

    #[test]
    fn test_governance_senders() {
        let config = ValidatorConfig::from_toml(&format!(
            r#"
            [protocol]
            governance_senders = ["{OWNER}"]
            "#
        ))
        .unwrap();
        assert!(config.protocol.is_governance_sender(&Address::new([1; 32])));
        assert!(!config.protocol.is_governance_sender(&Address::new([2; 32])));
        assert!(!ValidatorConfig::default()
            .protocol
            .is_governance_sender(&Address::new([1; 32])));

        assert!(matches!(
            ValidatorConfig::from_toml("[protocol]\ngovernance_senders = [\"0x1234\"]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = ValidatorConfig::load(Path::new("/nonexistent/vireo.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/vireo.toml"));
    }
}
