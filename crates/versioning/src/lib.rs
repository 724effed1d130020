//! Shared-object version assignment.
//!
//! Consensus fixes the order of certificates touching shared objects;
//! [`SharedObjectVersionManager`] turns that order into concrete input
//! versions, identically on every replica.

mod manager;

pub use manager::SharedObjectVersionManager;
