//! Congestion control for consensus-ordered transactions.
//!
//! A hot shared object can only absorb a bounded amount of work per commit.
//! [`CongestionTracker`] measures per-object load within a commit and defers
//! certificates that would exceed the cap to the next commit, optionally
//! cancelling certificates that have waited too long.

mod config;
mod tracker;

pub use config::{CongestionConfig, CongestionMode};
pub use tracker::{CongestionTracker, DeferOutcome, DeferredCertificate};
