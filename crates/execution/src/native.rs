//! Built-in executor for the native transaction kinds.

use serde::{Deserialize, Serialize};
use vireo_core::{ExecutionInput, ExecutionOutput, TransactionExecutor};
use vireo_types::{FailureReason, Object, ObjectData, ObjectId, Owner, TransactionKind, Version};

/// Gas schedule for the native executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    /// Charged for every transaction.
    pub base: u64,
    /// Charged per declared input object.
    pub per_object: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            base: 10,
            per_object: 5,
        }
    }
}

/// Executes transfers, counters and deletions directly, without a VM.
///
/// `Programmable` payloads are accepted and charged but have no effect on
/// objects.
#[derive(Debug, Clone, Default)]
pub struct NativeExecutor {
    gas: GasSchedule,
}

impl NativeExecutor {
    pub fn new(gas: GasSchedule) -> Self {
        Self { gas }
    }

    fn gas_used(&self, input: &ExecutionInput<'_>) -> u64 {
        let objects = input.transaction.inputs.len() as u64;
        self.gas
            .base
            .saturating_add(self.gas.per_object.saturating_mul(objects))
            .min(input.transaction.gas_budget)
    }
}

fn input_object<'a>(
    input: &'a ExecutionInput<'_>,
    id: &ObjectId,
) -> Result<&'a Object, FailureReason> {
    input.object(id).ok_or(FailureReason::ObjectNotFound(*id))
}

fn invalid(msg: impl Into<String>) -> FailureReason {
    FailureReason::InvalidOperation(msg.into())
}

impl TransactionExecutor for NativeExecutor {
    fn execute(&self, input: &ExecutionInput<'_>) -> Result<ExecutionOutput, FailureReason> {
        let mut output = ExecutionOutput {
            gas_used: self.gas_used(input),
            ..Default::default()
        };

        match &input.transaction.kind {
            TransactionKind::NativeTransfer {
                coin,
                recipient,
                amount,
            } => {
                let source = input_object(input, coin)?;
                let Some(balance) = source.coin_value() else {
                    return Err(invalid("transferred object is not a coin"));
                };
                if balance < *amount {
                    return Err(FailureReason::InsufficientCoinBalance {
                        balance,
                        requested: *amount,
                    });
                }
                let mut remaining = source.clone();
                remaining.data = ObjectData::Coin {
                    value: balance - amount,
                };
                output.mutated.push(remaining);
                output.created.push(Object::new_owned(
                    ObjectId::derive(&input.digest, 0),
                    Version::INITIAL,
                    *recipient,
                    ObjectData::Coin { value: *amount },
                ));
            }
            TransactionKind::TransferObject { object, recipient } => {
                let source = input_object(input, object)?;
                if source.owner.is_shared() {
                    return Err(invalid("shared objects cannot be transferred"));
                }
                let mut transferred = source.clone();
                transferred.owner = Owner::Owned(*recipient);
                output.mutated.push(transferred);
            }
            TransactionKind::IncrementCounter { counter, amount } => {
                let source = input_object(input, counter)?;
                let ObjectData::Counter { value } = source.data else {
                    return Err(invalid("object is not a counter"));
                };
                let value = value
                    .checked_add(*amount)
                    .ok_or_else(|| invalid("counter overflow"))?;
                let mut incremented = source.clone();
                incremented.data = ObjectData::Counter { value };
                output.mutated.push(incremented);
            }
            TransactionKind::DeleteObject { object } => {
                input_object(input, object)?;
                output.deleted.push(*object);
            }
            TransactionKind::Programmable { .. } => {}
            TransactionKind::Governance(_) => {
                return Err(invalid("governance transactions are not executed"));
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use vireo_types::test_utils::{
        test_account, test_coin, test_counter, test_increment, test_transfer,
    };
    use vireo_types::{Address, TransactionData};

    fn run(
        data: &TransactionData,
        objects: Vec<Object>,
    ) -> Result<ExecutionOutput, FailureReason> {
        let input = ExecutionInput {
            digest: data.digest(),
            transaction: data,
            objects: objects.into_iter().map(|o| (o.id, o)).collect::<BTreeMap<_, _>>(),
            lamport_version: Version(2),
        };
        NativeExecutor::default().execute(&input)
    }

    #[test]
    fn test_transfer_splits_coin() {
        let sender = test_account(1);
        let recipient = Address::new([9; 32]);
        let coin = test_coin(1, sender.address(), 100);
        let tx = test_transfer(&sender, &coin, recipient, 30);

        let output = run(&tx.data, vec![coin.clone()]).unwrap();
        assert_eq!(output.mutated[0].coin_value(), Some(70));
        assert_eq!(output.created.len(), 1);
        assert_eq!(output.created[0].coin_value(), Some(30));
        assert!(output.created[0].owner.is_owned_by(&recipient));
        assert_eq!(output.created[0].id, ObjectId::derive(&tx.digest(), 0));
        assert!(output.gas_used > 0);
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let sender = test_account(1);
        let coin = test_coin(1, sender.address(), 10);
        let tx = test_transfer(&sender, &coin, Address::new([9; 32]), 11);

        assert_eq!(
            run(&tx.data, vec![coin]),
            Err(FailureReason::InsufficientCoinBalance {
                balance: 10,
                requested: 11
            })
        );
    }

    #[test]
    fn test_increment_counter() {
        let sender = test_account(1);
        let counter = test_counter(7);
        let tx = test_increment(&sender, &counter, 4, vec![]);

        let output = run(&tx.data, vec![counter]).unwrap();
        assert_eq!(output.mutated[0].data, ObjectData::Counter { value: 4 });
    }

    #[test]
    fn test_wrong_object_type() {
        let sender = test_account(1);
        let counter = test_counter(7);
        let mut coin_like = counter.clone();
        coin_like.owner = Owner::Owned(sender.address());
        let tx = test_transfer(&sender, &coin_like, Address::new([9; 32]), 1);

        assert!(matches!(
            run(&tx.data, vec![coin_like]),
            Err(FailureReason::InvalidOperation(_))
        ));
    }
}
