//! Configuration for congestion control.

use serde::{Deserialize, Serialize};

/// How a certificate's load on a shared object is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionMode {
    /// Every certificate costs 1.
    TransactionCount,
    /// A certificate costs its declared gas budget.
    GasBudget,
}

/// Configuration for per-object congestion control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CongestionConfig {
    pub mode: CongestionMode,

    /// Maximum load one shared object may take in a single commit.
    ///
    /// The first certificate touching an object in a commit is always
    /// admitted, so an expensive certificate cannot be deferred forever.
    pub max_load_per_object: u64,

    /// Cancel a certificate once it has been deferred this many times.
    ///
    /// `None` defers indefinitely.
    pub max_deferral_rounds: Option<u32>,

    /// Whether congestion control is enabled.
    ///
    /// When disabled, no certificate is ever deferred.
    pub enabled: bool,
}

impl Default for CongestionConfig {
    fn default() -> Self {
        Self {
            mode: CongestionMode::TransactionCount,
            max_load_per_object: 1_000,
            max_deferral_rounds: None,
            enabled: true,
        }
    }
}

impl CongestionConfig {
    /// Transaction-count mode with a per-object cap.
    pub fn with_max_transactions(max_load_per_object: u64) -> Self {
        Self {
            max_load_per_object,
            ..Default::default()
        }
    }

    /// Gas-budget mode with a per-object cap.
    pub fn with_max_gas(max_load_per_object: u64) -> Self {
        Self {
            mode: CongestionMode::GasBudget,
            max_load_per_object,
            ..Default::default()
        }
    }

    pub fn with_max_deferral_rounds(mut self, rounds: u32) -> Self {
        self.max_deferral_rounds = Some(rounds);
        self
    }

    /// Create a config with congestion control disabled.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}
