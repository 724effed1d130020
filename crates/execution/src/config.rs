use serde::{Deserialize, Serialize};

/// Execution scheduler limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Fast-path certificates are refused with `Overloaded` once this many
    /// certificates are waiting. Consensus-path certificates are always
    /// accepted, since consensus has already sequenced them.
    pub max_pending: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_pending: 10_000 }
    }
}

impl SchedulerConfig {
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }
}
