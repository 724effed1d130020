//! Epoch store and governance for the Vireo validator.
//!
//! An epoch has a fixed committee and protocol configuration, held in an
//! immutable [`EpochStore`]. Governance certificates record stake changes for
//! the next epoch; `EndOfEpoch` triggers the transition, which replaces the
//! epoch store atomically through [`EpochManager`].

mod error;
mod governance;
mod manager;
mod store;

pub use error::EpochError;
pub use governance::{GovernanceOutcome, PendingStakeChanges};
pub use manager::EpochManager;
pub use store::{EpochInfo, EpochPhase, EpochStore};
