//! Vote collection for one transaction.

use std::collections::BTreeMap;
use tracing::warn;
use vireo_types::{
    Certificate, CertificateError, Committee, Digest, SignedTransaction, TransactionClass,
    TransactionVote, ValidatorId,
};

/// Collects validator votes on a transaction until their stake forms a
/// quorum of the committee.
///
/// Each vote is checked on arrival, so a single bad signature cannot spoil
/// the aggregate signature of the certificate.
#[derive(Debug)]
pub struct VoteAggregator<'a> {
    committee: &'a Committee,
    digest: Digest,
    /// Accepted votes, one per validator.
    votes: BTreeMap<ValidatorId, TransactionVote>,
    stake: u64,
}

impl<'a> VoteAggregator<'a> {
    pub fn new(committee: &'a Committee, digest: Digest) -> Self {
        Self {
            committee,
            digest,
            votes: BTreeMap::new(),
            stake: 0,
        }
    }

    /// Add a vote. Returns whether it counted.
    ///
    /// Votes for another transaction or epoch, from non-members, with a bad
    /// signature, or repeated from the same validator are ignored.
    pub fn add_vote(&mut self, vote: TransactionVote) -> bool {
        if vote.digest != self.digest || vote.epoch != self.committee.epoch() {
            warn!(validator = %vote.validator, "Vote for a different transaction or epoch");
            return false;
        }
        let Some(public_key) = self.committee.public_key(vote.validator) else {
            warn!(validator = %vote.validator, "Vote from non-member");
            return false;
        };
        if self.votes.contains_key(&vote.validator) {
            return false;
        }
        if !vote.verify(public_key) {
            warn!(validator = %vote.validator, "Invalid vote signature");
            return false;
        }
        self.stake = self
            .stake
            .saturating_add(self.committee.stake_of(vote.validator));
        self.votes.insert(vote.validator, vote);
        true
    }

    pub fn has_quorum(&self) -> bool {
        self.committee.has_quorum(self.stake)
    }

    /// Stake of the votes accepted so far.
    pub fn stake(&self) -> u64 {
        self.stake
    }

    pub fn quorum_needed(&self) -> u64 {
        self.committee.quorum_threshold()
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    /// Aggregate the accepted votes into a certificate.
    pub fn into_certificate(
        self,
        transaction: SignedTransaction,
        class: TransactionClass,
    ) -> Result<Certificate, CertificateError> {
        let votes: Vec<_> = self.votes.into_values().collect();
        Certificate::assemble(transaction, class, self.committee, &votes)
    }
}
