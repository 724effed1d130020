//! Persisted epoch snapshots.

use serde::{Deserialize, Serialize};
use vireo_types::{Committee, EpochId, ProtocolConfig};

/// Committee and protocol configuration an epoch ran with, keyed by epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSnapshot {
    pub epoch: EpochId,
    pub committee: Committee,
    pub protocol_config: ProtocolConfig,
}
