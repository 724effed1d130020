//! Deterministic simulation of a validator committee.
//!
//! Every replica runs the real authority, consensus handler and execution
//! scheduler. Only the total-order broadcast is simulated: proposals from all
//! replicas go into one [`SimulatedConsensus`], which shuffles them with a
//! seeded RNG and cuts commits on demand. Given the same seed and the same
//! submissions, a run is reproducible.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Cluster                          │
//! │                                                          │
//! │  Replica 0        Replica 1        ...       Replica n   │
//! │  Authority ◄────► Authority ◄────► ... ◄───► Authority   │
//! │      │   votes / certificates                   │        │
//! │      ▼                                          ▼        │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │   SimulatedConsensus (seeded shuffle, drop prob.)  │  │
//! │  └────────────────────────┬───────────────────────────┘  │
//! │                           │ run_commit()                 │
//! │                           ▼                              │
//! │  Handler 0        Handler 1        ...       Handler n   │
//! │  (same commit delivered to every replica, in lockstep)   │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod cluster;
mod engine;

pub use cluster::{validator_key, Cluster, ClusterConfig, ClusterError, Replica};
pub use engine::SimulatedConsensus;
