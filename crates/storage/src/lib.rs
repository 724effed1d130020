//! Object version store for the Vireo validator.
//!
//! Three append-only tables behind a single write lock:
//!
//! - object version history keyed by `(object id, version)`
//! - effects keyed by transaction digest
//! - epoch snapshots keyed by epoch number
//!
//! The backing maps are persistent (`im`), so snapshots are O(1) and a commit
//! is built on a copy and swapped in only once every check has passed.

mod error;
mod snapshot;
mod store;

pub use error::StoreError;
pub use snapshot::EpochSnapshot;
pub use store::{CommitBatch, ObjectEntry, ObjectVersionStore, StoreSnapshot};
