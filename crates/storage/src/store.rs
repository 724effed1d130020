//! The object version store.

use crate::{EpochSnapshot, StoreError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use vireo_types::{Digest, Effects, EpochId, Object, ObjectId, Version};

/// One version of an object: either its contents or a deletion marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectEntry {
    Live(Object),
    Deleted {
        id: ObjectId,
        version: Version,
        transaction: Digest,
    },
}

impl ObjectEntry {
    pub fn id(&self) -> ObjectId {
        match self {
            ObjectEntry::Live(object) => object.id,
            ObjectEntry::Deleted { id, .. } => *id,
        }
    }

    pub fn version(&self) -> Version {
        match self {
            ObjectEntry::Live(object) => object.version,
            ObjectEntry::Deleted { version, .. } => *version,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            ObjectEntry::Live(object) => Some(object),
            ObjectEntry::Deleted { .. } => None,
        }
    }

    pub fn into_object(self) -> Option<Object> {
        match self {
            ObjectEntry::Live(object) => Some(object),
            ObjectEntry::Deleted { .. } => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, ObjectEntry::Deleted { .. })
    }
}

/// All writes of one executed certificate, applied atomically.
#[derive(Debug, Clone)]
pub struct CommitBatch {
    pub effects: Effects,
    /// Owned inputs that must still be at these versions.
    pub expected_owned: Vec<(ObjectId, Version)>,
    /// New versions of mutated objects and newly created objects.
    pub written: Vec<Object>,
    /// Objects deleted at `effects.lamport_version`.
    pub deleted: Vec<ObjectId>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    /// Append-only version history keyed by `(id, version)`.
    history: im::OrdMap<(ObjectId, Version), ObjectEntry>,
    /// Latest version per object.
    latest: im::OrdMap<ObjectId, Version>,
    effects: im::HashMap<Digest, Effects>,
    epochs: im::OrdMap<EpochId, EpochSnapshot>,
}

impl Tables {
    fn latest_entry(&self, id: &ObjectId) -> Option<&ObjectEntry> {
        let version = self.latest.get(id)?;
        self.history.get(&(*id, *version))
    }

    fn entry_at(&self, id: &ObjectId, version: Version) -> Option<&ObjectEntry> {
        self.history.get(&(*id, version))
    }

    fn latest_at_or_before(&self, id: &ObjectId, version: Version) -> Option<&ObjectEntry> {
        self.history
            .range((*id, Version(0))..=(*id, version))
            .next_back()
            .map(|(_, entry)| entry)
    }

    fn get_object(&self, id: &ObjectId, version: Option<Version>) -> Option<Object> {
        let entry = match version {
            Some(version) => self.entry_at(id, version),
            None => self.latest_entry(id),
        };
        entry.and_then(ObjectEntry::as_object).cloned()
    }

    fn history_of(&self, id: &ObjectId) -> Vec<ObjectEntry> {
        self.history
            .range((*id, Version(0))..=(*id, Version(u64::MAX)))
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    fn put(&mut self, entry: ObjectEntry) {
        let key = (entry.id(), entry.version());
        self.latest.insert(key.0, key.1);
        self.history.insert(key, entry);
    }
}

/// Read-only point-in-time view of the store.
///
/// Cloning the underlying persistent maps is O(1), so a snapshot never blocks
/// writers and never observes a half-applied commit.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    tables: Tables,
}

impl StoreSnapshot {
    pub fn latest(&self, id: &ObjectId) -> Option<ObjectEntry> {
        self.tables.latest_entry(id).cloned()
    }

    pub fn entry_at(&self, id: &ObjectId, version: Version) -> Option<ObjectEntry> {
        self.tables.entry_at(id, version).cloned()
    }

    pub fn latest_at_or_before(&self, id: &ObjectId, version: Version) -> Option<ObjectEntry> {
        self.tables.latest_at_or_before(id, version).cloned()
    }

    pub fn get_object(&self, id: &ObjectId, version: Option<Version>) -> Option<Object> {
        self.tables.get_object(id, version)
    }

    pub fn get_effects(&self, digest: &Digest) -> Option<Effects> {
        self.tables.effects.get(digest).cloned()
    }
}

/// Versioned object store.
///
/// Holds the append-only version history of every object, effects keyed by
/// transaction digest, and epoch snapshots keyed by epoch. It is the single
/// authority for object versions: every write goes through [`commit`], which
/// applies one certificate's writes and its effects atomically or not at all.
///
/// [`commit`]: ObjectVersionStore::commit
#[derive(Debug, Default)]
pub struct ObjectVersionStore {
    tables: RwLock<Tables>,
}

impl ObjectVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed objects at genesis.
    pub fn insert_genesis(&self, objects: impl IntoIterator<Item = Object>) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let mut next = tables.clone();
        for object in objects {
            if next.latest.contains_key(&object.id) {
                return Err(StoreError::ObjectExists(object.id));
            }
            next.put(ObjectEntry::Live(object));
        }
        *tables = next;
        Ok(())
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            tables: self.tables.read().clone(),
        }
    }

    pub fn latest(&self, id: &ObjectId) -> Option<ObjectEntry> {
        self.tables.read().latest_entry(id).cloned()
    }

    pub fn latest_version(&self, id: &ObjectId) -> Option<Version> {
        self.tables.read().latest.get(id).copied()
    }

    pub fn entry_at(&self, id: &ObjectId, version: Version) -> Option<ObjectEntry> {
        self.tables.read().entry_at(id, version).cloned()
    }

    /// Newest entry of `id` whose version is at most `version`.
    pub fn latest_at_or_before(&self, id: &ObjectId, version: Version) -> Option<ObjectEntry> {
        self.tables.read().latest_at_or_before(id, version).cloned()
    }

    /// Object at `version`, or the latest live version when `None`.
    pub fn get_object(&self, id: &ObjectId, version: Option<Version>) -> Option<Object> {
        self.tables.read().get_object(id, version)
    }

    /// Full version history of `id`, oldest first.
    pub fn history(&self, id: &ObjectId) -> Vec<ObjectEntry> {
        self.tables.read().history_of(id)
    }

    pub fn get_effects(&self, digest: &Digest) -> Option<Effects> {
        self.tables.read().effects.get(digest).cloned()
    }

    pub fn is_executed(&self, digest: &Digest) -> bool {
        self.tables.read().effects.contains_key(digest)
    }

    pub fn executed_count(&self) -> usize {
        self.tables.read().effects.len()
    }

    /// Apply one certificate's writes and effects atomically.
    ///
    /// Fails without applying anything if the digest already has effects, an
    /// owned input moved, a written version does not advance, or a write
    /// changes an object's owned/shared classification.
    pub fn commit(&self, batch: CommitBatch) -> Result<(), StoreError> {
        let digest = batch.effects.transaction_digest;
        let lamport = batch.effects.lamport_version;
        let mut tables = self.tables.write();

        if tables.effects.contains_key(&digest) {
            return Err(StoreError::AlreadyExecuted(digest));
        }

        for (id, expected) in &batch.expected_owned {
            let current = tables.latest_entry(id);
            let live_version = current.and_then(ObjectEntry::as_object).map(|o| o.version);
            if live_version != Some(*expected) {
                return Err(StoreError::VersionConflict {
                    id: *id,
                    expected: *expected,
                    current: current.map(ObjectEntry::version),
                });
            }
        }

        let mut next = tables.clone();
        for object in batch.written {
            match tables.latest_entry(&object.id) {
                Some(ObjectEntry::Live(previous)) => {
                    if object.version <= previous.version {
                        return Err(StoreError::NonMonotonicVersion {
                            id: object.id,
                            current: previous.version,
                            written: object.version,
                        });
                    }
                    if !previous.owner.same_classification(&object.owner) {
                        return Err(StoreError::ClassificationChanged(object.id));
                    }
                }
                Some(ObjectEntry::Deleted { .. }) => {
                    return Err(StoreError::ObjectDeleted(object.id));
                }
                None => {}
            }
            trace!(object = ?object.id, version = %object.version, "write");
            next.put(ObjectEntry::Live(object));
        }

        for id in batch.deleted {
            match tables.latest_entry(&id) {
                Some(ObjectEntry::Live(previous)) if previous.version < lamport => {}
                Some(ObjectEntry::Live(previous)) => {
                    return Err(StoreError::NonMonotonicVersion {
                        id,
                        current: previous.version,
                        written: lamport,
                    });
                }
                Some(ObjectEntry::Deleted { .. }) => return Err(StoreError::ObjectDeleted(id)),
                None => return Err(StoreError::ObjectNotFound(id)),
            }
            next.put(ObjectEntry::Deleted {
                id,
                version: lamport,
                transaction: digest,
            });
        }

        next.effects.insert(digest, batch.effects);
        *tables = next;
        debug!(tx = ?digest, lamport = %lamport, "Committed effects");
        Ok(())
    }

    /// Persist the snapshot of an epoch. Re-persisting identical contents is a
    /// no-op.
    pub fn put_epoch_snapshot(&self, snapshot: EpochSnapshot) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if let Some(existing) = tables.epochs.get(&snapshot.epoch) {
            if *existing == snapshot {
                return Ok(());
            }
            return Err(StoreError::EpochSnapshotConflict(snapshot.epoch));
        }
        debug!(epoch = %snapshot.epoch, "Persisted epoch snapshot");
        tables.epochs.insert(snapshot.epoch, snapshot);
        Ok(())
    }

    pub fn epoch_snapshot(&self, epoch: EpochId) -> Option<EpochSnapshot> {
        self.tables.read().epochs.get(&epoch).cloned()
    }

    pub fn latest_epoch_snapshot(&self) -> Option<EpochSnapshot> {
        self.tables
            .read()
            .epochs
            .get_max()
            .map(|(_, snapshot)| snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vireo_types::test_utils::{test_account, test_coin, test_counter, test_object_id};
    use vireo_types::{ExecutionStatus, ObjectData, Owner};

    fn effects(tag: &[u8], lamport: u64) -> Effects {
        Effects::empty(
            Digest::of(tag),
            EpochId(0),
            ExecutionStatus::Success,
            Version(lamport),
        )
    }

    fn bumped(object: &Object, version: u64, value: u64) -> Object {
        let mut next = object.clone();
        next.version = Version(version);
        next.data = ObjectData::Coin { value };
        next
    }

    #[test]
    fn test_commit_appends_history() {
        let store = ObjectVersionStore::new();
        let coin = test_coin(1, test_account(1).address(), 100);
        store.insert_genesis([coin.clone()]).unwrap();

        store
            .commit(CommitBatch {
                effects: effects(b"t1", 2),
                expected_owned: vec![(coin.id, Version(1))],
                written: vec![bumped(&coin, 2, 60)],
                deleted: vec![],
            })
            .unwrap();

        assert_eq!(store.latest_version(&coin.id), Some(Version(2)));
        assert_eq!(
            store.get_object(&coin.id, Some(Version(1))).unwrap().coin_value(),
            Some(100)
        );
        assert_eq!(store.get_object(&coin.id, None).unwrap().coin_value(), Some(60));
        assert_eq!(store.history(&coin.id).len(), 2);
    }

    #[test]
    fn test_stale_owned_input_applies_nothing() {
        let store = ObjectVersionStore::new();
        let coin = test_coin(1, test_account(1).address(), 100);
        let other = test_coin(2, test_account(1).address(), 5);
        store.insert_genesis([coin.clone(), other.clone()]).unwrap();

        let result = store.commit(CommitBatch {
            effects: effects(b"t1", 3),
            expected_owned: vec![(other.id, Version(1)), (coin.id, Version(2))],
            written: vec![bumped(&other, 3, 1), bumped(&coin, 3, 1)],
            deleted: vec![],
        });

        assert!(matches!(result, Err(StoreError::VersionConflict { .. })));
        assert_eq!(store.latest_version(&other.id), Some(Version(1)));
        assert!(!store.is_executed(&Digest::of(b"t1")));
    }

    #[test]
    fn test_second_commit_of_digest_is_rejected() {
        let store = ObjectVersionStore::new();
        store.commit(CommitBatch {
            effects: effects(b"gov", 1),
            expected_owned: vec![],
            written: vec![],
            deleted: vec![],
        })
        .unwrap();
        assert!(matches!(
            store.commit(CommitBatch {
                effects: effects(b"gov", 1),
                expected_owned: vec![],
                written: vec![],
                deleted: vec![],
            }),
            Err(StoreError::AlreadyExecuted(_))
        ));
        assert_eq!(store.executed_count(), 1);
    }

    #[test]
    fn test_classification_is_immutable() {
        let store = ObjectVersionStore::new();
        let counter = test_counter(7);
        store.insert_genesis([counter.clone()]).unwrap();

        let mut owned = counter.clone();
        owned.version = Version(2);
        owned.owner = Owner::Owned(test_account(1).address());
        let result = store.commit(CommitBatch {
            effects: effects(b"t", 2),
            expected_owned: vec![],
            written: vec![owned],
            deleted: vec![],
        });
        assert_eq!(result, Err(StoreError::ClassificationChanged(counter.id)));
    }

    #[test]
    fn test_deletion_leaves_tombstone() {
        let store = ObjectVersionStore::new();
        let counter = test_counter(7);
        store.insert_genesis([counter.clone()]).unwrap();
        store
            .commit(CommitBatch {
                effects: effects(b"del", 4),
                expected_owned: vec![],
                written: vec![],
                deleted: vec![counter.id],
            })
            .unwrap();

        assert!(store.get_object(&counter.id, None).is_none());
        assert!(store.entry_at(&counter.id, Version(4)).unwrap().is_deleted());
        assert_eq!(
            store.latest_at_or_before(&counter.id, Version(3)).unwrap().version(),
            Version(1)
        );
        assert!(store.latest(&test_object_id(99)).is_none());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_commits() {
        let store = ObjectVersionStore::new();
        let coin = test_coin(1, test_account(1).address(), 100);
        store.insert_genesis([coin.clone()]).unwrap();
        let snapshot = store.snapshot();

        store
            .commit(CommitBatch {
                effects: effects(b"t1", 2),
                expected_owned: vec![(coin.id, Version(1))],
                written: vec![bumped(&coin, 2, 1)],
                deleted: vec![],
            })
            .unwrap();

        assert_eq!(snapshot.latest(&coin.id).unwrap().version(), Version(1));
        assert!(snapshot.get_effects(&Digest::of(b"t1")).is_none());
    }
}
