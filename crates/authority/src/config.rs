use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Authority admission settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Accept transactions with shared inputs. Governance is always accepted.
    pub shared_objects_enabled: bool,
    /// How long to wait for each peer's vote.
    pub vote_timeout_ms: u64,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            shared_objects_enabled: true,
            vote_timeout_ms: 5_000,
        }
    }
}

impl AuthorityConfig {
    pub fn with_shared_objects(mut self, enabled: bool) -> Self {
        self.shared_objects_enabled = enabled;
        self
    }

    pub fn with_vote_timeout(mut self, timeout: Duration) -> Self {
        self.vote_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn vote_timeout(&self) -> Duration {
        Duration::from_millis(self.vote_timeout_ms)
    }
}
