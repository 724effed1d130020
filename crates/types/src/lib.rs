//! Core types for the Vireo validator.
//!
//! This crate holds the data model shared by every other crate:
//!
//! - Identifiers, digests and key material
//! - Objects with owned or shared ownership
//! - Transactions, their classification, votes and certificates
//! - Committees and quorum math
//! - Consensus commits, effects and the client error taxonomy
//!
//! Everything here is plain data plus pure functions. No I/O, no async.

mod certificate;
mod committee;
mod consensus;
mod crypto;
mod digest;
mod effects;
mod error;
mod identifiers;
mod object;
mod protocol_config;
mod signer_bitfield;
mod signing;
mod transaction;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use certificate::{Certificate, CertificateError, TransactionVote};
pub use committee::{Committee, CommitteeError, ValidatorInfo};
pub use consensus::{AssignedVersions, ConsensusCommit};
pub use crypto::{
    AccountKeyPair, AccountPublicKey, AccountSignature, AggregateError, AuthorityKeyPair,
    AuthorityPublicKey, AuthoritySignature,
};
pub use digest::{Digest, HexError};
pub use effects::{Effects, ExecutionStatus, FailureReason};
pub use error::{LedgerError, LedgerResult};
pub use identifiers::{Address, CommitIndex, EpochId, ObjectId, ValidatorId, Version};
pub use object::{Object, ObjectData, ObjectRef, Owner};
pub use protocol_config::{ProtocolConfig, DEFAULT_QUORUM_THRESHOLD_BPS};
pub use signer_bitfield::SignerBitfield;
pub use signing::{
    transaction_message, transaction_vote_message, DOMAIN_TRANSACTION, DOMAIN_TRANSACTION_VOTE,
};
pub use transaction::{
    ConsensusReason, GovernanceAction, InputObject, SignedTransaction, TransactionClass,
    TransactionData, TransactionKind,
};
