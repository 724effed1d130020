//! Immutable per-epoch state.

use serde::{Deserialize, Serialize};
use vireo_storage::EpochSnapshot;
use vireo_types::{Committee, EpochId, ProtocolConfig};

/// Committee and protocol configuration for one epoch.
///
/// Never mutated. An epoch transition builds a new `EpochStore` and swaps it
/// in whole, so readers see either the old epoch or the new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochStore {
    committee: Committee,
    protocol_config: ProtocolConfig,
}

impl EpochStore {
    pub fn new(committee: Committee, protocol_config: ProtocolConfig) -> Self {
        Self {
            committee,
            protocol_config,
        }
    }

    pub fn epoch(&self) -> EpochId {
        self.committee.epoch()
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    pub fn protocol_config(&self) -> &ProtocolConfig {
        &self.protocol_config
    }

    pub fn snapshot(&self) -> EpochSnapshot {
        EpochSnapshot {
            epoch: self.epoch(),
            committee: self.committee.clone(),
            protocol_config: self.protocol_config.clone(),
        }
    }
}

impl From<EpochSnapshot> for EpochStore {
    fn from(snapshot: EpochSnapshot) -> Self {
        Self::new(snapshot.committee, snapshot.protocol_config)
    }
}

/// Lifecycle phase of the current epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EpochPhase {
    Active,
    /// `EndOfEpoch` was processed; in-flight work is draining. Execution is
    /// refused until the next epoch is installed.
    Transitioning,
}

/// Answer to `get_epoch_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochInfo {
    pub epoch: EpochId,
    pub phase: EpochPhase,
    pub committee: Committee,
    pub protocol_config: ProtocolConfig,
}
