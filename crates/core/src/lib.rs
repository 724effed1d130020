//! Seams of the Vireo validator core.
//!
//! The core depends on three external collaborators, each behind a trait:
//!
//! - [`TransactionExecutor`]: the opaque deterministic VM
//! - [`ConsensusEngine`]: total-order broadcast of certificates
//! - [`ValidatorClient`]: signature requests to peer validators
//!
//! plus [`ExecutionObserver`], through which execution results flow back to
//! whoever is waiting on them.
//!
//! It also defines the status types returned to submitters.

mod execution;
mod status;
mod traits;

pub use execution::{ExecutionInput, ExecutionOutput};
pub use status::{PendingStatus, PollResponse, SubmitResponse};
pub use traits::{
    ConsensusEngine, ConsensusError, ExecutionObserver, TransactionExecutor, ValidatorClient,
};
