//! Fixtures for tests that need a store and an epoch.
//!
//! Builds on `vireo_types::test_utils`, which only covers plain data.

use std::collections::BTreeMap;
use std::sync::Arc;
use vireo_epoch::{EpochManager, EpochStore};
use vireo_storage::ObjectVersionStore;
use vireo_types::test_utils::{test_authority_key, test_committee, test_protocol_config};
use vireo_types::{
    AssignedVersions, Certificate, Committee, EpochId, Object, ObjectId, ProtocolConfig,
    SignedTransaction, TransactionClass, TransactionVote, Version,
};

pub use vireo_types::test_utils;

/// Genesis store plus epoch manager for an equal-stake committee.
pub struct TestEnv {
    pub store: Arc<ObjectVersionStore>,
    pub epoch: Arc<EpochManager>,
}

impl TestEnv {
    /// `validators` equal-stake validators and the given genesis objects.
    pub fn new(validators: u64, genesis: Vec<Object>) -> Self {
        Self::with_config(validators, genesis, test_protocol_config())
    }

    pub fn with_config(validators: u64, genesis: Vec<Object>, config: ProtocolConfig) -> Self {
        let (committee, _) = test_committee(EpochId::GENESIS, validators);
        let store = Arc::new(ObjectVersionStore::new());
        if let Err(e) = store.insert_genesis(genesis) {
            panic!("genesis: {e}");
        }
        let epoch = match EpochManager::new(EpochStore::new(committee, config), store.clone()) {
            Ok(epoch) => Arc::new(epoch),
            Err(e) => panic!("epoch manager: {e}"),
        };
        Self { store, epoch }
    }

    pub fn committee(&self) -> Committee {
        self.epoch.current().committee().clone()
    }

    /// Certificate for `transaction` signed by the whole current committee.
    pub fn certify(&self, transaction: SignedTransaction) -> Certificate {
        certify(transaction, &self.committee())
    }

    /// Latest live version of `id`. Panics if absent or deleted.
    pub fn object(&self, id: &ObjectId) -> Object {
        match self.store.get_object(id, None) {
            Some(object) => object,
            None => panic!("object {id} not live in store"),
        }
    }
}

/// Certificate signed by every member of `committee`, using the
/// deterministic key of each validator id.
pub fn certify(transaction: SignedTransaction, committee: &Committee) -> Certificate {
    let digest = transaction.digest();
    let votes: Vec<_> = committee
        .validators()
        .iter()
        .map(|info| {
            TransactionVote::sign(committee.epoch(), digest, info.id, &test_authority_key(info.id.0))
        })
        .collect();
    let class = TransactionClass::classify(&transaction.data);
    match Certificate::assemble(transaction, class, committee, &votes) {
        Ok(certificate) => certificate,
        Err(e) => panic!("certify: {e}"),
    }
}

/// Hand-built version assignment, for driving the scheduler directly.
pub fn assigned(shared: &[(ObjectId, u64)], lamport: u64) -> AssignedVersions {
    AssignedVersions {
        shared: shared
            .iter()
            .map(|(id, v)| (*id, Version(*v)))
            .collect::<BTreeMap<_, _>>(),
        lamport: Version(lamport),
    }
}
