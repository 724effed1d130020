//! Input and output of the opaque executor.

use std::collections::BTreeMap;
use vireo_types::{Digest, Object, ObjectId, TransactionData, Version};

/// Everything an executor may read.
#[derive(Debug, Clone)]
pub struct ExecutionInput<'a> {
    pub digest: Digest,
    pub transaction: &'a TransactionData,
    /// Input objects at their resolved versions, keyed by id.
    pub objects: BTreeMap<ObjectId, Object>,
    /// Version every written object will land at.
    pub lamport_version: Version,
}

impl ExecutionInput<'_> {
    pub fn object(&self, id: &ObjectId) -> Option<&Object> {
        self.objects.get(id)
    }
}

/// Writes produced by a successful execution.
///
/// `mutated` must only contain ids present in the input; `created` ids must be
/// fresh. Versions on returned objects are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutput {
    pub mutated: Vec<Object>,
    pub created: Vec<Object>,
    pub deleted: Vec<ObjectId>,
    pub gas_used: u64,
}
