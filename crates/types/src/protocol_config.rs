//! Per-epoch protocol configuration.

use crate::Address;
use serde::{Deserialize, Serialize};

/// Default quorum threshold: two thirds of stake, rounded so that 3 of 4 equal
/// validators form a quorum and 2 of 3 do not.
pub const DEFAULT_QUORUM_THRESHOLD_BPS: u64 = 6_667;

/// Protocol parameters fixed for the duration of an epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub protocol_version: u64,

    /// Stake fraction (basis points) a certificate must carry.
    pub quorum_threshold_bps: u64,

    /// Maximum declared input objects per transaction.
    pub max_input_objects: usize,

    /// Accounts allowed to send governance transactions. Empty disables
    /// staking changes and epoch advancement.
    pub governance_senders: Vec<Address>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            protocol_version: 1,
            quorum_threshold_bps: DEFAULT_QUORUM_THRESHOLD_BPS,
            max_input_objects: 64,
            governance_senders: Vec::new(),
        }
    }
}

impl ProtocolConfig {
    pub fn with_quorum_threshold_bps(mut self, bps: u64) -> Self {
        self.quorum_threshold_bps = bps;
        self
    }

    pub fn with_max_input_objects(mut self, max: usize) -> Self {
        self.max_input_objects = max;
        self
    }

    pub fn with_governance_sender(mut self, sender: Address) -> Self {
        if !self.governance_senders.contains(&sender) {
            self.governance_senders.push(sender);
        }
        self
    }

    pub fn is_governance_sender(&self, sender: &Address) -> bool {
        self.governance_senders.contains(sender)
    }

    /// Configuration for the following epoch.
    pub fn successor(&self, next_protocol_version: Option<u64>) -> Self {
        Self {
            protocol_version: next_protocol_version.unwrap_or(self.protocol_version),
            ..self.clone()
        }
    }
}
