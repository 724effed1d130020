//! Client-facing entry point of a Vireo validator.
//!
//! [`Authority`] admits transactions, collects votes into certificates and
//! routes them to the fast path or to consensus. It also serves the query
//! API (`poll`, `get_object`, `get_effects`, `get_epoch_info`) and the
//! peer-side signing endpoint.

mod aggregator;
mod client;
mod config;
mod locks;
mod state;

pub use aggregator::VoteAggregator;
pub use client::LocalValidatorClient;
pub use config::AuthorityConfig;
pub use locks::OwnedObjectLocks;
pub use state::Authority;
