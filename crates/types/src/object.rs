//! Ledger objects.

use crate::{Address, Digest, ObjectId, Version};
use serde::{Deserialize, Serialize};

/// Owner classification of an object.
///
/// The classification (owned vs shared) is fixed for the object's lifetime;
/// only the owning address of an owned object may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Owner {
    /// Exclusively controlled by one address. Never contended, so eligible
    /// for the fast path.
    Owned(Address),

    /// Mutable by anyone; access is ordered by consensus. `initial_version`
    /// is the version at which the object became shared.
    Shared { initial_version: Version },
}

impl Owner {
    pub fn is_shared(&self) -> bool {
        matches!(self, Owner::Shared { .. })
    }

    pub fn is_owned_by(&self, address: &Address) -> bool {
        matches!(self, Owner::Owned(owner) if owner == address)
    }

    /// Whether `other` keeps the same owned/shared classification.
    pub fn same_classification(&self, other: &Owner) -> bool {
        match (self, other) {
            (Owner::Owned(_), Owner::Owned(_)) => true,
            (
                Owner::Shared { initial_version: a },
                Owner::Shared { initial_version: b },
            ) => a == b,
            _ => false,
        }
    }
}

/// Object contents. Opaque to everything but the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectData {
    /// Fungible coin balance.
    Coin { value: u64 },
    /// Monotonic counter, the canonical contended shared object.
    Counter { value: u64 },
    /// Arbitrary executor-defined bytes.
    Opaque(Vec<u8>),
}

/// An object at a specific version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub id: ObjectId,
    pub version: Version,
    pub owner: Owner,
    pub data: ObjectData,
    /// Digest of the transaction that wrote this version.
    pub previous_transaction: Digest,
}

impl Object {
    /// Owned object as it exists at genesis.
    pub fn new_owned(id: ObjectId, version: Version, owner: Address, data: ObjectData) -> Self {
        Self {
            id,
            version,
            owner: Owner::Owned(owner),
            data,
            previous_transaction: Digest::ZERO,
        }
    }

    /// Shared object as it exists at genesis; shared from `version` onwards.
    pub fn new_shared(id: ObjectId, version: Version, data: ObjectData) -> Self {
        Self {
            id,
            version,
            owner: Owner::Shared {
                initial_version: version,
            },
            data,
            previous_transaction: Digest::ZERO,
        }
    }

    /// Coin balance, if this object is a coin.
    pub fn coin_value(&self) -> Option<u64> {
        match self.data {
            ObjectData::Coin { value } => Some(value),
            _ => None,
        }
    }

    pub fn digest(&self) -> Digest {
        Digest::of_serializable(self)
    }

    pub fn reference(&self) -> ObjectRef {
        ObjectRef {
            id: self.id,
            version: self.version,
            digest: self.digest(),
        }
    }
}

/// Identifies one version of an object by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: ObjectId,
    pub version: Version,
    pub digest: Digest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_is_preserved_across_transfers() {
        let alice = Owner::Owned(Address::new([1; 32]));
        let bob = Owner::Owned(Address::new([2; 32]));
        let shared = Owner::Shared {
            initial_version: Version(3),
        };

        assert!(alice.same_classification(&bob));
        assert!(!alice.same_classification(&shared));
        assert!(!shared.same_classification(&Owner::Shared {
            initial_version: Version(4)
        }));
    }

    #[test]
    fn test_reference_tracks_content() {
        let id = ObjectId::new([9; 32]);
        let owner = Address::new([1; 32]);
        let a = Object::new_owned(id, Version(1), owner, ObjectData::Coin { value: 10 });
        let mut b = a.clone();
        b.data = ObjectData::Coin { value: 11 };

        assert_eq!(a.reference().version, b.reference().version);
        assert_ne!(a.reference().digest, b.reference().digest);
        assert_eq!(a.coin_value(), Some(10));
    }
}
