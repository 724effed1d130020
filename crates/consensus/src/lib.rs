//! Consensus path of the Vireo validator.
//!
//! - [`ConsensusAdapter`] proposes certificates to the consensus engine and
//!   returns a [`SubmissionHandle`] per proposal
//! - [`PendingTable`] tracks the status of every proposed certificate
//! - [`ConsensusHandler`] consumes ordered commits: it applies governance,
//!   consults the congestion tracker, assigns shared-object versions and hands
//!   certificates to the execution scheduler
//!
//! ```text
//! Authority ──propose──► ConsensusAdapter ──submit──► ConsensusEngine
//!                              │                            │
//!                        PendingTable ◄─────┐        ConsensusCommit
//!                                           │               ▼
//!                     ExecutionScheduler ◄──┴──── ConsensusHandler
//! ```

mod adapter;
mod handler;
mod pending;

pub use adapter::{ConsensusAdapter, SubmissionHandle};
pub use handler::{CommitSummary, ConsensusHandler, HandlerError};
pub use pending::PendingTable;
