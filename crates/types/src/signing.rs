//! Domain-separated signing messages.
//!
//! | Tag | Signed by | Purpose |
//! |-----|-----------|---------|
//! | `vireo_tx:` | account | sender authorization of a transaction |
//! | `tx_vote:` | validator | agreement to execute a transaction in an epoch |
//!
//! Each message prepends its tag so a signature from one context can never be
//! replayed in another.

use crate::{Digest, EpochId};

/// Domain tag for sender signatures over a transaction digest.
pub const DOMAIN_TRANSACTION: &[u8] = b"vireo_tx:";

/// Domain tag for validator votes.
///
/// Format: `tx_vote:` || epoch || transaction digest
pub const DOMAIN_TRANSACTION_VOTE: &[u8] = b"tx_vote:";

/// Message an account signs to authorize a transaction.
pub fn transaction_message(digest: &Digest) -> Vec<u8> {
    let mut message = Vec::with_capacity(DOMAIN_TRANSACTION.len() + Digest::LENGTH);
    message.extend_from_slice(DOMAIN_TRANSACTION);
    message.extend_from_slice(digest.as_bytes());
    message
}

/// Message a validator signs to vote for a transaction.
///
/// Votes from all signers of a certificate cover the same bytes, so their BLS
/// signatures aggregate into one.
pub fn transaction_vote_message(epoch: EpochId, digest: &Digest) -> Vec<u8> {
    let mut message = Vec::with_capacity(DOMAIN_TRANSACTION_VOTE.len() + 8 + Digest::LENGTH);
    message.extend_from_slice(DOMAIN_TRANSACTION_VOTE);
    message.extend_from_slice(&epoch.0.to_le_bytes());
    message.extend_from_slice(digest.as_bytes());
    message
}
