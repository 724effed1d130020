//! Certificate execution for the Vireo validator.
//!
//! - [`ExecutionScheduler`]: waits for inputs, runs certificates and commits
//!   their effects atomically
//! - [`NativeExecutor`]: built-in [`TransactionExecutor`] for the native
//!   transaction kinds
//!
//! [`TransactionExecutor`]: vireo_core::TransactionExecutor

mod config;
mod native;
mod scheduler;

pub use config::SchedulerConfig;
pub use native::{GasSchedule, NativeExecutor};
pub use scheduler::{ExecutionOutcome, ExecutionResult, ExecutionScheduler};
