//! Validator votes and the certificates assembled from them.

use crate::{
    transaction_vote_message, AuthorityKeyPair, AuthorityPublicKey, AuthoritySignature, Committee,
    Digest, EpochId, SignedTransaction, SignerBitfield, TransactionClass, ValidatorId,
};
use serde::{Deserialize, Serialize};

/// One validator's signature over a transaction digest in an epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionVote {
    pub epoch: EpochId,
    pub digest: Digest,
    pub validator: ValidatorId,
    pub signature: AuthoritySignature,
}

impl TransactionVote {
    pub fn sign(
        epoch: EpochId,
        digest: Digest,
        validator: ValidatorId,
        keypair: &AuthorityKeyPair,
    ) -> Self {
        let signature = keypair.sign(&transaction_vote_message(epoch, &digest));
        Self {
            epoch,
            digest,
            validator,
            signature,
        }
    }

    pub fn verify(&self, public_key: &AuthorityPublicKey) -> bool {
        public_key.verify(
            &transaction_vote_message(self.epoch, &self.digest),
            &self.signature,
        )
    }
}

/// Errors assembling or verifying a certificate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CertificateError {
    #[error("certificate is for {certified}, committee is for {committee}")]
    WrongEpoch {
        certified: EpochId,
        committee: EpochId,
    },

    #[error("vote from non-member {0}")]
    UnknownSigner(ValidatorId),

    #[error("vote is for a different transaction or epoch")]
    MismatchedVote,

    #[error("signer bitfield sized {actual}, committee has {expected}")]
    BitfieldSize { expected: usize, actual: usize },

    #[error("signers hold {collected} stake, quorum needs {required}")]
    InsufficientStake { collected: u64, required: u64 },

    #[error("invalid aggregate signature")]
    InvalidSignature,

    #[error("transaction class does not match its inputs")]
    ClassMismatch,
}

/// A transaction signed by a quorum of the committee of `epoch`.
///
/// Immutable once assembled. The class is fixed at admission and travels with
/// the certificate so every replica routes it identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub transaction: SignedTransaction,
    pub class: TransactionClass,
    pub epoch: EpochId,
    pub signers: SignerBitfield,
    pub signature: AuthoritySignature,
}

impl Certificate {
    /// Aggregate `votes` into a certificate.
    ///
    /// Duplicate votes from the same validator are counted once.
    pub fn assemble(
        transaction: SignedTransaction,
        class: TransactionClass,
        committee: &Committee,
        votes: &[TransactionVote],
    ) -> Result<Self, CertificateError> {
        let digest = transaction.digest();
        let mut signers = SignerBitfield::new(committee.size());
        let mut signatures = Vec::with_capacity(votes.len());
        let mut stake = 0u64;

        for vote in votes {
            if vote.epoch != committee.epoch() || vote.digest != digest {
                return Err(CertificateError::MismatchedVote);
            }
            let index = committee
                .index_of(vote.validator)
                .ok_or(CertificateError::UnknownSigner(vote.validator))?;
            if signers.contains(index) {
                continue;
            }
            signers.insert(index);
            signatures.push(&vote.signature);
            stake = stake.saturating_add(committee.stake_of(vote.validator));
        }

        if !committee.has_quorum(stake) {
            return Err(CertificateError::InsufficientStake {
                collected: stake,
                required: committee.quorum_threshold(),
            });
        }

        let signature =
            AuthoritySignature::aggregate(&signatures).map_err(|_| CertificateError::InvalidSignature)?;

        Ok(Self {
            transaction,
            class,
            epoch: committee.epoch(),
            signers,
            signature,
        })
    }

    pub fn digest(&self) -> Digest {
        self.transaction.digest()
    }

    /// Verify quorum stake and the aggregate signature against `committee`.
    pub fn verify(&self, committee: &Committee) -> Result<(), CertificateError> {
        if self.epoch != committee.epoch() {
            return Err(CertificateError::WrongEpoch {
                certified: self.epoch,
                committee: committee.epoch(),
            });
        }
        if self.signers.len() != committee.size() {
            return Err(CertificateError::BitfieldSize {
                expected: committee.size(),
                actual: self.signers.len(),
            });
        }
        if TransactionClass::classify(&self.transaction.data) != self.class {
            return Err(CertificateError::ClassMismatch);
        }

        let mut stake = 0u64;
        let mut keys = Vec::with_capacity(self.signers.count());
        for index in self.signers.iter() {
            let Some(info) = committee.at_index(index) else {
                return Err(CertificateError::BitfieldSize {
                    expected: committee.size(),
                    actual: index + 1,
                });
            };
            stake = stake.saturating_add(info.stake);
            keys.push(&info.public_key);
        }
        if !committee.has_quorum(stake) {
            return Err(CertificateError::InsufficientStake {
                collected: stake,
                required: committee.quorum_threshold(),
            });
        }

        let aggregate_key =
            AuthorityPublicKey::aggregate(&keys).map_err(|_| CertificateError::InvalidSignature)?;
        let message = transaction_vote_message(self.epoch, &self.digest());
        if !aggregate_key.verify(&message, &self.signature) {
            return Err(CertificateError::InvalidSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AccountKeyPair, InputObject, ObjectId, TransactionData, TransactionKind, ValidatorInfo,
        Version,
    };

    fn setup(n: u64) -> (Committee, Vec<AuthorityKeyPair>) {
        let keys: Vec<_> = (0..n)
            .map(|i| AuthorityKeyPair::from_seed(&[i as u8 + 1; 32]))
            .collect();
        let validators = keys
            .iter()
            .enumerate()
            .map(|(i, k)| ValidatorInfo {
                id: ValidatorId(i as u64),
                public_key: k.public_key(),
                stake: 1,
            })
            .collect();
        (Committee::new(EpochId(0), validators).unwrap(), keys)
    }

    fn transaction() -> SignedTransaction {
        let sender = AccountKeyPair::from_seed(&[42; 32]);
        let data = TransactionData::new(
            sender.address(),
            TransactionKind::Programmable { payload: vec![] },
            vec![InputObject::Owned {
                id: ObjectId::new([1; 32]),
                expected_version: Version(1),
            }],
        );
        SignedTransaction::sign(data, &sender)
    }

    fn votes(tx: &SignedTransaction, keys: &[AuthorityKeyPair], who: &[usize]) -> Vec<TransactionVote> {
        who.iter()
            .map(|&i| TransactionVote::sign(EpochId(0), tx.digest(), ValidatorId(i as u64), &keys[i]))
            .collect()
    }

    #[test]
    fn test_assemble_and_verify() {
        let (committee, keys) = setup(4);
        let tx = transaction();
        let class = TransactionClass::classify(&tx.data);
        let cert =
            Certificate::assemble(tx.clone(), class, &committee, &votes(&tx, &keys, &[0, 2, 3]))
                .unwrap();
        assert_eq!(cert.signers.count(), 3);
        assert!(cert.verify(&committee).is_ok());
    }

    #[test]
    fn test_duplicate_votes_do_not_count_twice() {
        let (committee, keys) = setup(4);
        let tx = transaction();
        let class = TransactionClass::classify(&tx.data);
        let result =
            Certificate::assemble(tx.clone(), class, &committee, &votes(&tx, &keys, &[1, 1, 2]));
        assert!(matches!(
            result,
            Err(CertificateError::InsufficientStake { collected: 2, required: 3 })
        ));
    }

    #[test]
    fn test_tampered_certificate_is_rejected() {
        let (committee, keys) = setup(4);
        let tx = transaction();
        let class = TransactionClass::classify(&tx.data);
        let mut cert =
            Certificate::assemble(tx.clone(), class, &committee, &votes(&tx, &keys, &[0, 1, 2]))
                .unwrap();
        cert.signers.insert(3);
        assert_eq!(cert.verify(&committee), Err(CertificateError::InvalidSignature));
    }

    #[test]
    fn test_wrong_epoch_committee() {
        let (committee, keys) = setup(4);
        let tx = transaction();
        let class = TransactionClass::classify(&tx.data);
        let cert =
            Certificate::assemble(tx.clone(), class, &committee, &votes(&tx, &keys, &[0, 1, 2]))
                .unwrap();
        let next = Committee::new(EpochId(1), committee.validators().to_vec()).unwrap();
        assert!(matches!(
            cert.verify(&next),
            Err(CertificateError::WrongEpoch { .. })
        ));
    }
}
