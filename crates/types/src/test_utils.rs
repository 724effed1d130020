//! Deterministic fixtures shared by tests across the workspace.

use crate::{
    AccountKeyPair, Address, AuthorityKeyPair, Certificate, Committee, EpochId, GovernanceAction,
    InputObject, Object, ObjectData, ObjectId, ProtocolConfig, SignedTransaction, TransactionClass,
    TransactionData, TransactionKind, TransactionVote, ValidatorId, ValidatorInfo, Version,
};

/// Authority key for validator `id`, derived from a fixed seed.
pub fn test_authority_key(id: u64) -> AuthorityKeyPair {
    let mut seed = [0xA5; 32];
    seed[..8].copy_from_slice(&id.to_le_bytes());
    AuthorityKeyPair::from_seed(&seed)
}

/// Account key derived from a one-byte seed.
pub fn test_account(seed: u8) -> AccountKeyPair {
    AccountKeyPair::from_seed(&[seed; 32])
}

pub fn test_object_id(n: u64) -> ObjectId {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&n.to_be_bytes());
    ObjectId::new(bytes)
}

/// Equal-stake committee of `n` validators, ids `0..n`, with their keys.
pub fn test_committee(epoch: EpochId, n: u64) -> (Committee, Vec<AuthorityKeyPair>) {
    let keys: Vec<_> = (0..n).map(test_authority_key).collect();
    let validators = keys
        .iter()
        .enumerate()
        .map(|(i, key)| ValidatorInfo {
            id: ValidatorId(i as u64),
            public_key: key.public_key(),
            stake: 1,
        })
        .collect();
    match Committee::new(epoch, validators) {
        Ok(committee) => (committee, keys),
        Err(e) => panic!("test committee of size {n}: {e}"),
    }
}

pub fn test_coin(id: u64, owner: Address, value: u64) -> Object {
    Object::new_owned(
        test_object_id(id),
        Version::INITIAL,
        owner,
        ObjectData::Coin { value },
    )
}

pub fn test_counter(id: u64) -> Object {
    Object::new_shared(
        test_object_id(id),
        Version::INITIAL,
        ObjectData::Counter { value: 0 },
    )
}

/// Native transfer of `amount` out of `coin`.
pub fn test_transfer(
    sender: &AccountKeyPair,
    coin: &Object,
    recipient: Address,
    amount: u64,
) -> SignedTransaction {
    let data = TransactionData::new(
        sender.address(),
        TransactionKind::NativeTransfer {
            coin: coin.id,
            recipient,
            amount,
        },
        vec![InputObject::Owned {
            id: coin.id,
            expected_version: coin.version,
        }],
    );
    SignedTransaction::sign(data, sender)
}

/// Increment of a shared counter. `extra` adds more inputs (e.g. an owned
/// object to make the transaction unique per sender).
pub fn test_increment(
    sender: &AccountKeyPair,
    counter: &Object,
    amount: u64,
    extra: Vec<InputObject>,
) -> SignedTransaction {
    let mut inputs = vec![InputObject::Shared {
        id: counter.id,
        initial_version: counter.version,
        mutable: true,
    }];
    inputs.extend(extra);
    let data = TransactionData::new(
        sender.address(),
        TransactionKind::IncrementCounter {
            counter: counter.id,
            amount,
        },
        inputs,
    );
    SignedTransaction::sign(data, sender)
}

/// Account allowed to send governance transactions under
/// [`test_protocol_config`].
pub fn test_governance_account() -> AccountKeyPair {
    test_account(200)
}

/// Default protocol config with [`test_governance_account`] authorized.
pub fn test_protocol_config() -> ProtocolConfig {
    ProtocolConfig::default().with_governance_sender(test_governance_account().address())
}

/// Governance transaction carrying `action`.
pub fn test_governance(sender: &AccountKeyPair, action: GovernanceAction) -> SignedTransaction {
    let data = TransactionData::new(
        sender.address(),
        TransactionKind::Governance(action),
        Vec::new(),
    );
    SignedTransaction::sign(data, sender)
}

/// Certificate signed by every member of `committee`.
pub fn test_certificate(
    transaction: SignedTransaction,
    committee: &Committee,
    keys: &[AuthorityKeyPair],
) -> Certificate {
    let digest = transaction.digest();
    let votes: Vec<_> = committee
        .validators()
        .iter()
        .zip(keys)
        .map(|(info, key)| TransactionVote::sign(committee.epoch(), digest, info.id, key))
        .collect();
    let class = TransactionClass::classify(&transaction.data);
    match Certificate::assemble(transaction, class, committee, &votes) {
        Ok(cert) => cert,
        Err(e) => panic!("test certificate: {e}"),
    }
}
