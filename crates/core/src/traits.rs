//! Traits at the boundaries of the validator core.

use crate::{ExecutionInput, ExecutionOutput};
use async_trait::async_trait;
use vireo_types::{
    Certificate, Digest, Effects, FailureReason, LedgerError, LedgerResult, SignedTransaction,
    TransactionVote, ValidatorId,
};

/// A deterministic transaction executor.
///
/// The core treats execution as a black box that consumes the input objects
/// at their resolved versions and produces writes.
///
/// # Guarantees
///
/// - **Synchronous**: never blocks or awaits
/// - **Deterministic**: the same input always yields the same output
/// - **No I/O**: reads nothing but `input`, writes nothing itself
///
/// Versions, owners of mutated objects and effects bookkeeping are handled by
/// the execution scheduler. The executor returns object contents; the
/// scheduler stamps every written object with the lamport version.
///
/// # Example
///
/// ```ignore
/// impl TransactionExecutor for NoopExecutor {
///     fn execute(&self, input: &ExecutionInput<'_>) -> Result<ExecutionOutput, FailureReason> {
///         Ok(ExecutionOutput::default())
///     }
/// }
/// ```
pub trait TransactionExecutor: Send + Sync {
    /// Execute one transaction.
    ///
    /// Returning `Err` records a failure effect. Nothing the executor
    /// produced is applied in that case.
    fn execute(&self, input: &ExecutionInput<'_>) -> Result<ExecutionOutput, FailureReason>;
}

/// Errors submitting to a consensus engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsensusError {
    #[error("consensus engine is shut down")]
    Shutdown,

    #[error("consensus submission rejected: {0}")]
    Rejected(String),
}

/// Opaque total-order broadcast.
///
/// Accepts certificates and eventually emits them inside `ConsensusCommit`s
/// delivered identically, in the same order, to every replica. Delivery is not
/// guaranteed: a proposal may be dropped silently, and a certificate may be
/// proposed more than once.
pub trait ConsensusEngine: Send + Sync {
    fn submit(&self, certificate: Certificate) -> Result<(), ConsensusError>;
}

/// Client for asking another validator to sign a transaction.
///
/// Implementations may be in-process (simulation) or remote. Calls from the
/// authority are made concurrently for all peers.
#[async_trait]
pub trait ValidatorClient: Send + Sync {
    /// The validator this client talks to.
    fn validator_id(&self) -> ValidatorId;

    /// Ask the validator to validate, lock and sign `transaction`.
    async fn request_vote(&self, transaction: SignedTransaction) -> LedgerResult<TransactionVote>;
}

/// Receives execution results as certificates leave the scheduler.
///
/// Called synchronously after the store commit, outside any scheduler lock.
/// Implementations must not call back into the scheduler.
pub trait ExecutionObserver: Send + Sync {
    /// Effects were committed for a certificate.
    fn on_executed(&self, effects: &Effects);

    /// A certificate left the scheduler without effects.
    fn on_aborted(&self, digest: &Digest, error: &LedgerError);
}
