//! Staking bookkeeping accumulated during an epoch.

use crate::EpochError;
use std::collections::BTreeMap;
use vireo_types::{
    AuthorityPublicKey, Committee, EpochId, GovernanceAction, ProtocolConfig, ValidatorId,
    ValidatorInfo,
};

/// Result of applying one governance certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GovernanceOutcome {
    /// Stake change or registration recorded for the next epoch.
    Recorded,
    /// Not applicable against the current state; recorded as a failure effect.
    Rejected(String),
    /// The epoch must end now.
    EndOfEpoch { next_protocol_version: Option<u64> },
}

#[derive(Debug, Clone)]
struct Registration {
    public_key: AuthorityPublicKey,
    stake: u64,
}

/// Stake deltas and registrations waiting for the next epoch.
///
/// Tracks net deltas per validator rather than individual actions so that a
/// withdrawal is checked against everything already recorded this epoch.
#[derive(Debug, Clone, Default)]
pub struct PendingStakeChanges {
    deltas: BTreeMap<ValidatorId, i128>,
    registrations: BTreeMap<ValidatorId, Registration>,
}

impl PendingStakeChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty() && self.registrations.is_empty()
    }

    /// Stake `validator` would hold if the epoch ended now.
    pub fn projected_stake(&self, committee: &Committee, validator: ValidatorId) -> Option<i128> {
        let base = if let Some(info) = committee.get(validator) {
            info.stake as i128
        } else {
            self.registrations.get(&validator)?.stake as i128
        };
        Some(base + self.deltas.get(&validator).copied().unwrap_or(0))
    }

    /// Total stake the next committee would hold if the epoch ended now.
    pub fn projected_total_stake(&self, committee: &Committee) -> i128 {
        let registered: i128 = self.registrations.values().map(|r| r.stake as i128).sum();
        let deltas: i128 = self.deltas.values().sum();
        committee.total_stake() as i128 + registered + deltas
    }

    /// Record a staking action against `committee`.
    ///
    /// Actions that would make the next committee impossible to build are
    /// rejected here, so an accepted `EndOfEpoch` always finds a valid
    /// successor committee. `EndOfEpoch` itself is only checked against the
    /// current epoch; the caller drives the transition.
    pub fn apply(&mut self, committee: &Committee, action: &GovernanceAction) -> GovernanceOutcome {
        let total = self.projected_total_stake(committee);
        match action {
            GovernanceAction::AddStake { validator, amount } => {
                let Some(projected) = self.projected_stake(committee, *validator) else {
                    return GovernanceOutcome::Rejected(format!("unknown validator {validator}"));
                };
                let amount = *amount as i128;
                if projected + amount > u64::MAX as i128 || total + amount > u64::MAX as i128 {
                    return GovernanceOutcome::Rejected(format!(
                        "stake of {validator} would overflow"
                    ));
                }
                *self.deltas.entry(*validator).or_default() += amount;
                GovernanceOutcome::Recorded
            }
            GovernanceAction::WithdrawStake { validator, amount } => {
                let Some(projected) = self.projected_stake(committee, *validator) else {
                    return GovernanceOutcome::Rejected(format!("unknown validator {validator}"));
                };
                if projected < *amount as i128 {
                    return GovernanceOutcome::Rejected(format!(
                        "{validator} holds {projected}, cannot withdraw {amount}"
                    ));
                }
                if total - *amount as i128 <= 0 {
                    return GovernanceOutcome::Rejected(
                        "withdrawal would leave the next committee without stake".to_string(),
                    );
                }
                *self.deltas.entry(*validator).or_default() -= *amount as i128;
                GovernanceOutcome::Recorded
            }
            GovernanceAction::RegisterValidator {
                validator,
                public_key,
                stake,
            } => {
                if committee.contains(*validator) || self.registrations.contains_key(validator) {
                    return GovernanceOutcome::Rejected(format!(
                        "{validator} is already registered"
                    ));
                }
                if total + *stake as i128 > u64::MAX as i128 {
                    return GovernanceOutcome::Rejected("total stake would overflow".to_string());
                }
                self.registrations.insert(
                    *validator,
                    Registration {
                        public_key: public_key.clone(),
                        stake: *stake,
                    },
                );
                GovernanceOutcome::Recorded
            }
            GovernanceAction::EndOfEpoch {
                epoch,
                next_protocol_version,
            } => {
                if *epoch != committee.epoch() {
                    return GovernanceOutcome::Rejected(format!(
                        "ends {epoch}, but the current epoch is {}",
                        committee.epoch()
                    ));
                }
                GovernanceOutcome::EndOfEpoch {
                    next_protocol_version: *next_protocol_version,
                }
            }
        }
    }

    /// Committee for `next_epoch`: current stake plus deltas plus
    /// registrations, with zero-stake validators removed.
    pub fn next_committee(
        &self,
        current: &Committee,
        next_epoch: EpochId,
        config: &ProtocolConfig,
    ) -> Result<Committee, EpochError> {
        let mut validators = Vec::with_capacity(current.size() + self.registrations.len());

        let existing = current.validators().iter().map(|info| {
            (info.id, info.public_key.clone(), info.stake)
        });
        let registered = self
            .registrations
            .iter()
            .map(|(id, reg)| (*id, reg.public_key.clone(), reg.stake));

        for (id, public_key, stake) in existing.chain(registered) {
            let delta = self.deltas.get(&id).copied().unwrap_or(0);
            let next_stake = stake as i128 + delta;
            if next_stake < 0 {
                return Err(EpochError::NegativeStake { validator: id });
            }
            let stake = u64::try_from(next_stake)
                .map_err(|_| EpochError::StakeOverflow { validator: id })?;
            validators.push(ValidatorInfo {
                id,
                public_key,
                stake,
            });
        }

        Ok(Committee::with_threshold(
            next_epoch,
            validators,
            config.quorum_threshold_bps,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vireo_types::test_utils::{test_authority_key, test_committee};
    use vireo_types::CommitteeError;

    fn add(validator: u64, amount: u64) -> GovernanceAction {
        GovernanceAction::AddStake {
            validator: ValidatorId(validator),
            amount,
        }
    }

    fn withdraw(validator: u64, amount: u64) -> GovernanceAction {
        GovernanceAction::WithdrawStake {
            validator: ValidatorId(validator),
            amount,
        }
    }

    #[test]
    fn test_next_committee_applies_deltas_and_registrations() {
        let (committee, _) = test_committee(EpochId(0), 4);
        let mut pending = PendingStakeChanges::new();

        assert_eq!(pending.apply(&committee, &add(0, 9)), GovernanceOutcome::Recorded);
        assert_eq!(pending.apply(&committee, &withdraw(3, 1)), GovernanceOutcome::Recorded);
        let register = GovernanceAction::RegisterValidator {
            validator: ValidatorId(7),
            public_key: test_authority_key(7).public_key(),
            stake: 5,
        };
        assert_eq!(pending.apply(&committee, &register), GovernanceOutcome::Recorded);

        let next = pending
            .next_committee(&committee, EpochId(1), &ProtocolConfig::default())
            .unwrap();
        assert_eq!(next.epoch(), EpochId(1));
        assert_eq!(next.stake_of(ValidatorId(0)), 10);
        assert!(!next.contains(ValidatorId(3)));
        assert_eq!(next.stake_of(ValidatorId(7)), 5);
        assert_eq!(next.total_stake(), 17);
    }

    #[test]
    fn test_rejects_inapplicable_actions() {
        let (committee, _) = test_committee(EpochId(0), 4);
        let mut pending = PendingStakeChanges::new();

        assert!(matches!(
            pending.apply(&committee, &add(9, 1)),
            GovernanceOutcome::Rejected(_)
        ));
        assert_eq!(pending.apply(&committee, &withdraw(1, 1)), GovernanceOutcome::Recorded);
        // Already withdrew everything this epoch.
        assert!(matches!(
            pending.apply(&committee, &withdraw(1, 1)),
            GovernanceOutcome::Rejected(_)
        ));
        assert!(!pending.is_empty());
    }

    #[test]
    fn test_withdrawal_cannot_empty_next_committee() {
        let (committee, _) = test_committee(EpochId(0), 2);
        let mut pending = PendingStakeChanges::new();

        assert_eq!(pending.apply(&committee, &withdraw(0, 1)), GovernanceOutcome::Recorded);
        assert!(matches!(
            pending.apply(&committee, &withdraw(1, 1)),
            GovernanceOutcome::Rejected(reason) if reason.contains("without stake")
        ));
        assert_eq!(pending.projected_total_stake(&committee), 1);

        let next = pending
            .next_committee(&committee, EpochId(1), &ProtocolConfig::default())
            .unwrap();
        assert_eq!(next.size(), 1);
        assert!(next.contains(ValidatorId(1)));
    }

    #[test]
    fn test_stake_overflow_is_rejected() {
        let (committee, _) = test_committee(EpochId(0), 2);
        let mut pending = PendingStakeChanges::new();

        assert!(matches!(
            pending.apply(&committee, &add(0, u64::MAX)),
            GovernanceOutcome::Rejected(_)
        ));
        assert_eq!(pending.apply(&committee, &add(0, u64::MAX - 2)), GovernanceOutcome::Recorded);
        let register = GovernanceAction::RegisterValidator {
            validator: ValidatorId(5),
            public_key: test_authority_key(5).public_key(),
            stake: 1,
        };
        assert!(matches!(
            pending.apply(&committee, &register),
            GovernanceOutcome::Rejected(_)
        ));
    }

    #[test]
    fn test_end_of_epoch_must_name_current_epoch() {
        let (committee, _) = test_committee(EpochId(3), 2);
        let mut pending = PendingStakeChanges::new();

        let stale = GovernanceAction::EndOfEpoch {
            epoch: EpochId(2),
            next_protocol_version: None,
        };
        assert!(matches!(
            pending.apply(&committee, &stale),
            GovernanceOutcome::Rejected(_)
        ));
        let current = GovernanceAction::EndOfEpoch {
            epoch: EpochId(3),
            next_protocol_version: Some(4),
        };
        assert_eq!(
            pending.apply(&committee, &current),
            GovernanceOutcome::EndOfEpoch {
                next_protocol_version: Some(4)
            }
        );
    }

    #[test]
    fn test_invalid_next_committee_is_an_error() {
        let (committee, _) = test_committee(EpochId(0), 2);

        let mut emptied = PendingStakeChanges::new();
        emptied.deltas.insert(ValidatorId(0), -1);
        emptied.deltas.insert(ValidatorId(1), -1);
        assert_eq!(
            emptied.next_committee(&committee, EpochId(1), &ProtocolConfig::default()),
            Err(EpochError::Committee(CommitteeError::Empty))
        );

        let mut overflowing = PendingStakeChanges::new();
        overflowing.deltas.insert(ValidatorId(0), u64::MAX as i128);
        assert_eq!(
            overflowing.next_committee(&committee, EpochId(1), &ProtocolConfig::default()),
            Err(EpochError::StakeOverflow {
                validator: ValidatorId(0)
            })
        );
    }
}
