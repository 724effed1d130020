//! Owned-object locks: one transaction per owned object version.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};
use vireo_storage::ObjectVersionStore;
use vireo_types::{Digest, EpochId, LedgerError, LedgerResult, ObjectId, Version};

/// Maps each owned `(object, version)` this validator has signed for to the
/// transaction it signed.
///
/// An honest validator never signs two transactions spending the same owned
/// version, so two conflicting fast-path certificates cannot both gather a
/// quorum.
///
/// Locks live for one epoch. Certificates from an older epoch are refused
/// everywhere, so a lock whose transaction never reached quorum is dropped
/// the first time a vote arrives in a later epoch. Locks on versions the
/// store has already moved past are dropped by [`prune_spent`].
///
/// [`prune_spent`]: OwnedObjectLocks::prune_spent
#[derive(Debug, Default)]
pub struct OwnedObjectLocks {
    epoch: RwLock<EpochId>,
    locks: DashMap<(ObjectId, Version), Digest>,
}

impl OwnedObjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Epoch the current locks were taken in.
    pub fn epoch(&self) -> EpochId {
        *self.epoch.read()
    }

    /// Move the table to `epoch`, dropping every lock from earlier epochs.
    /// Returns how many locks were dropped.
    pub fn enter_epoch(&self, epoch: EpochId) -> usize {
        if *self.epoch.read() >= epoch {
            return 0;
        }
        let mut current = self.epoch.write();
        if *current >= epoch {
            return 0;
        }
        let dropped = self.locks.len();
        self.locks.clear();
        info!(from = %*current, to = %epoch, dropped, "Owned-object locks reset");
        *current = epoch;
        dropped
    }

    /// Lock every `(object, version)` to `digest` for `epoch`, or none of
    /// them.
    ///
    /// Locks already held by `digest` are fine; a lock held by any other
    /// transaction fails with `ObjectLocked`. Voting for an epoch the table
    /// has already left fails with `EpochEnded`.
    pub fn acquire(
        &self,
        epoch: EpochId,
        digest: Digest,
        inputs: &[(ObjectId, Version)],
    ) -> LedgerResult<()> {
        self.enter_epoch(epoch);
        // Held across the inserts so a concurrent reset cannot interleave.
        let current = self.epoch.read();
        if *current != epoch {
            return Err(LedgerError::EpochEnded {
                certified: epoch,
                current: *current,
            });
        }

        let mut taken = Vec::with_capacity(inputs.len());
        for &(id, version) in inputs {
            match self.locks.entry((id, version)) {
                Entry::Occupied(entry) if *entry.get() == digest => {}
                Entry::Occupied(entry) => {
                    let locked_by = *entry.get();
                    drop(entry);
                    for key in taken {
                        self.locks.remove(&key);
                    }
                    debug!(tx = ?digest, object = %id, %version, ?locked_by, "Owned input already locked");
                    return Err(LedgerError::ObjectLocked {
                        id,
                        version,
                        locked_by,
                    });
                }
                Entry::Vacant(entry) => {
                    entry.insert(digest);
                    taken.push((id, version));
                }
            }
        }
        Ok(())
    }

    /// Drop the locks `digest` holds on `inputs`.
    pub fn release(&self, digest: &Digest, inputs: &[(ObjectId, Version)]) -> usize {
        inputs
            .iter()
            .filter(|&key| self.locks.remove_if(key, |_, holder| holder == digest).is_some())
            .count()
    }

    /// Drop locks on versions `store` has moved past: the object has a newer
    /// version, was deleted, or is unknown.
    pub fn prune_spent(&self, store: &ObjectVersionStore) -> usize {
        let before = self.locks.len();
        self.locks.retain(|(id, version), _| {
            store
                .latest(id)
                .is_some_and(|entry| !entry.is_deleted() && entry.version() <= *version)
        });
        let pruned = before.saturating_sub(self.locks.len());
        if pruned > 0 {
            debug!(pruned, remaining = self.locks.len(), "Pruned spent owned-object locks");
        }
        pruned
    }

    /// Transaction holding the lock on `(id, version)`, if any.
    pub fn holder(&self, id: &ObjectId, version: Version) -> Option<Digest> {
        self.locks.get(&(*id, version)).map(|entry| *entry)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vireo_types::test_utils::{test_coin, test_object_id};
    use vireo_types::Address;

    const E0: EpochId = EpochId::GENESIS;

    #[test]
    fn test_same_digest_relocks() {
        let locks = OwnedObjectLocks::new();
        let digest = Digest::of(b"a");
        let inputs = [(test_object_id(1), Version(1))];

        locks.acquire(E0, digest, &inputs).unwrap();
        locks.acquire(E0, digest, &inputs).unwrap();
        assert_eq!(locks.holder(&test_object_id(1), Version(1)), Some(digest));
    }

    #[test]
    fn test_conflict_releases_partial_locks() {
        let locks = OwnedObjectLocks::new();
        let first = Digest::of(b"a");
        let second = Digest::of(b"b");
        locks.acquire(E0, first, &[(test_object_id(2), Version(1))]).unwrap();

        let err = locks
            .acquire(
                E0,
                second,
                &[(test_object_id(1), Version(1)), (test_object_id(2), Version(1))],
            )
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::ObjectLocked {
                id: test_object_id(2),
                version: Version(1),
                locked_by: first,
            }
        );
        assert_eq!(locks.holder(&test_object_id(1), Version(1)), None);
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_new_version_is_unlocked() {
        let locks = OwnedObjectLocks::new();
        locks.acquire(E0, Digest::of(b"a"), &[(test_object_id(1), Version(1))]).unwrap();
        locks.acquire(E0, Digest::of(b"b"), &[(test_object_id(1), Version(2))]).unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_next_epoch_drops_stale_locks() {
        let locks = OwnedObjectLocks::new();
        let inputs = [(test_object_id(1), Version(1))];
        locks.acquire(E0, Digest::of(b"a"), &inputs).unwrap();

        // A different transaction on the same version is free once the
        // epoch moves on.
        locks.acquire(EpochId(1), Digest::of(b"b"), &inputs).unwrap();
        assert_eq!(locks.epoch(), EpochId(1));
        assert_eq!(locks.len(), 1);
        assert_eq!(
            locks.holder(&test_object_id(1), Version(1)),
            Some(Digest::of(b"b"))
        );

        let err = locks.acquire(E0, Digest::of(b"c"), &inputs).unwrap_err();
        assert_eq!(
            err,
            LedgerError::EpochEnded {
                certified: E0,
                current: EpochId(1),
            }
        );
        assert_eq!(locks.enter_epoch(EpochId(1)), 0);
        assert_eq!(locks.enter_epoch(EpochId(2)), 1);
        assert!(locks.is_empty());
    }

    #[test]
    fn test_release_only_drops_own_locks() {
        let locks = OwnedObjectLocks::new();
        let inputs = [(test_object_id(1), Version(1)), (test_object_id(2), Version(1))];
        locks.acquire(E0, Digest::of(b"a"), &inputs[..1]).unwrap();
        locks.acquire(E0, Digest::of(b"b"), &inputs[1..]).unwrap();

        assert_eq!(locks.release(&Digest::of(b"a"), &inputs), 1);
        assert_eq!(locks.holder(&test_object_id(1), Version(1)), None);
        assert_eq!(
            locks.holder(&test_object_id(2), Version(1)),
            Some(Digest::of(b"b"))
        );
    }

    #[test]
    fn test_prune_spent_keeps_current_versions() {
        let owner = Address::new([1; 32]);
        let store = ObjectVersionStore::new();
        let live = test_coin(1, owner, 10);
        let mut moved = test_coin(2, owner, 10);
        moved.version = Version(3);
        store.insert_genesis([live.clone(), moved.clone()]).unwrap();

        let locks = OwnedObjectLocks::new();
        locks.acquire(E0, Digest::of(b"a"), &[(live.id, live.version)]).unwrap();
        locks.acquire(E0, Digest::of(b"b"), &[(moved.id, Version(2))]).unwrap();
        locks.acquire(E0, Digest::of(b"c"), &[(test_object_id(9), Version(1))]).unwrap();

        assert_eq!(locks.prune_spent(&store), 2);
        assert_eq!(locks.holder(&live.id, live.version), Some(Digest::of(b"a")));
        assert_eq!(locks.len(), 1);
    }
}
