//! Stake-weighted validator committee and quorum math.

use crate::{AuthorityPublicKey, EpochId, ValidatorId, DEFAULT_QUORUM_THRESHOLD_BPS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A committee member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub id: ValidatorId,
    pub public_key: AuthorityPublicKey,
    pub stake: u64,
}

/// Errors building a committee.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitteeError {
    #[error("committee has no validators")]
    Empty,

    #[error("committee has zero total stake")]
    ZeroStake,

    #[error("duplicate validator {0}")]
    DuplicateValidator(ValidatorId),

    #[error("total stake overflows u64")]
    StakeOverflow,
}

/// Validator set for one epoch.
///
/// Validators are kept sorted by id; a validator's position in that order is
/// its index in a certificate's signer bitfield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committee {
    epoch: EpochId,
    validators: Vec<ValidatorInfo>,
    total_stake: u64,
    quorum_threshold_bps: u64,
}

impl Committee {
    /// Build a committee with the default two-thirds threshold.
    ///
    /// Zero-stake validators are dropped.
    pub fn new(epoch: EpochId, validators: Vec<ValidatorInfo>) -> Result<Self, CommitteeError> {
        Self::with_threshold(epoch, validators, DEFAULT_QUORUM_THRESHOLD_BPS)
    }

    pub fn with_threshold(
        epoch: EpochId,
        validators: Vec<ValidatorInfo>,
        quorum_threshold_bps: u64,
    ) -> Result<Self, CommitteeError> {
        let mut by_id = BTreeMap::new();
        for info in validators {
            if info.stake == 0 {
                continue;
            }
            let id = info.id;
            if by_id.insert(id, info).is_some() {
                return Err(CommitteeError::DuplicateValidator(id));
            }
        }
        if by_id.is_empty() {
            return Err(CommitteeError::Empty);
        }
        let total_stake = by_id
            .values()
            .try_fold(0u64, |acc, v| acc.checked_add(v.stake))
            .ok_or(CommitteeError::StakeOverflow)?;
        if total_stake == 0 {
            return Err(CommitteeError::ZeroStake);
        }
        Ok(Self {
            epoch,
            validators: by_id.into_values().collect(),
            total_stake,
            quorum_threshold_bps,
        })
    }

    pub fn epoch(&self) -> EpochId {
        self.epoch
    }

    pub fn validators(&self) -> &[ValidatorInfo] {
        &self.validators
    }

    pub fn size(&self) -> usize {
        self.validators.len()
    }

    pub fn total_stake(&self) -> u64 {
        self.total_stake
    }

    pub fn quorum_threshold_bps(&self) -> u64 {
        self.quorum_threshold_bps
    }

    pub fn contains(&self, id: ValidatorId) -> bool {
        self.index_of(id).is_some()
    }

    /// Position of `id` in the signer bitfield.
    pub fn index_of(&self, id: ValidatorId) -> Option<usize> {
        self.validators.binary_search_by_key(&id, |v| v.id).ok()
    }

    pub fn get(&self, id: ValidatorId) -> Option<&ValidatorInfo> {
        self.index_of(id).map(|i| &self.validators[i])
    }

    pub fn at_index(&self, index: usize) -> Option<&ValidatorInfo> {
        self.validators.get(index)
    }

    /// Stake of `id`, zero for non-members.
    pub fn stake_of(&self, id: ValidatorId) -> u64 {
        self.get(id).map(|v| v.stake).unwrap_or(0)
    }

    pub fn public_key(&self, id: ValidatorId) -> Option<&AuthorityPublicKey> {
        self.get(id).map(|v| &v.public_key)
    }

    /// Whether `stake` meets the quorum threshold.
    pub fn has_quorum(&self, stake: u64) -> bool {
        stake > 0
            && (stake as u128) * 10_000
                >= (self.total_stake as u128) * (self.quorum_threshold_bps as u128)
    }

    /// Minimum stake forming a quorum.
    pub fn quorum_threshold(&self) -> u64 {
        let numerator = (self.total_stake as u128) * (self.quorum_threshold_bps as u128);
        let threshold = numerator.div_ceil(10_000).max(1);
        threshold.min(u64::MAX as u128) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthorityKeyPair;

    fn validator(id: u64, stake: u64) -> ValidatorInfo {
        ValidatorInfo {
            id: ValidatorId(id),
            public_key: AuthorityKeyPair::from_seed(&[id as u8; 32]).public_key(),
            stake,
        }
    }

    #[test]
    fn test_quorum_equal_stake() {
        let committee =
            Committee::new(EpochId(0), (0..4).map(|i| validator(i, 1)).collect()).unwrap();
        assert_eq!(committee.quorum_threshold(), 3);
        assert!(!committee.has_quorum(2));
        assert!(committee.has_quorum(3));
        assert!(committee.has_quorum(4));
        assert!(!committee.has_quorum(0));
    }

    #[test]
    fn test_two_of_three_is_not_quorum() {
        let committee =
            Committee::new(EpochId(0), (0..3).map(|i| validator(i, 1)).collect()).unwrap();
        assert!(!committee.has_quorum(2));
        assert!(committee.has_quorum(3));
    }

    #[test]
    fn test_weighted_stake() {
        let committee = Committee::new(
            EpochId(0),
            vec![validator(0, 70), validator(1, 10), validator(2, 20)],
        )
        .unwrap();
        assert!(committee.has_quorum(committee.stake_of(ValidatorId(0))));
        assert!(!committee.has_quorum(30));
        assert_eq!(committee.stake_of(ValidatorId(9)), 0);
    }

    #[test]
    fn test_ordering_and_zero_stake() {
        let committee = Committee::new(
            EpochId(2),
            vec![validator(5, 1), validator(1, 1), validator(3, 0)],
        )
        .unwrap();
        assert_eq!(committee.size(), 2);
        assert_eq!(committee.index_of(ValidatorId(1)), Some(0));
        assert_eq!(committee.index_of(ValidatorId(5)), Some(1));
        assert!(!committee.contains(ValidatorId(3)));
    }

    #[test]
    fn test_invalid_committees() {
        assert_eq!(
            Committee::new(EpochId(0), vec![validator(1, 0)]),
            Err(CommitteeError::Empty)
        );
        assert_eq!(
            Committee::new(EpochId(0), vec![validator(1, 1), validator(1, 2)]),
            Err(CommitteeError::DuplicateValidator(ValidatorId(1)))
        );
        assert_eq!(
            Committee::new(EpochId(0), vec![validator(1, u64::MAX), validator(2, 1)]),
            Err(CommitteeError::StakeOverflow)
        );
    }
}
