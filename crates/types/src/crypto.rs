//! Signing keys, public keys and signatures.
//!
//! Two schemes, treated as opaque sign/verify primitives:
//! - Ed25519 for account (sender) signatures on transactions
//! - BLS12-381 for validator votes, aggregated into certificates

use crate::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ciphersuite tag for BLS signatures (min-pk, proof of possession not used).
const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";

/// Ed25519 key pair controlling an account.
#[derive(Clone)]
pub struct AccountKeyPair(ed25519_dalek::SigningKey);

impl AccountKeyPair {
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Deterministic key pair (simulation and tests).
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(seed))
    }

    pub fn public_key(&self) -> AccountPublicKey {
        AccountPublicKey(self.0.verifying_key().to_bytes())
    }

    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key())
    }

    pub fn sign(&self, message: &[u8]) -> AccountSignature {
        use ed25519_dalek::Signer;
        AccountSignature(self.0.sign(message).to_bytes().to_vec())
    }
}

impl fmt::Debug for AccountKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountKeyPair({:?})", self.public_key())
    }
}

/// Ed25519 public key of an account.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountPublicKey([u8; 32]);

impl AccountPublicKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn verify(&self, message: &[u8], signature: &AccountSignature) -> bool {
        use ed25519_dalek::Verifier;
        let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(bytes) = <[u8; 64]>::try_from(signature.0.as_slice()) else {
            return false;
        };
        key.verify(message, &ed25519_dalek::Signature::from_bytes(&bytes))
            .is_ok()
    }
}

impl fmt::Debug for AccountPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountPublicKey({})", hex::encode(&self.0[..8]))
    }
}

/// Ed25519 signature (64 bytes).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSignature(Vec<u8>);

impl AccountSignature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for AccountSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = hex::encode(&self.0);
        write!(f, "AccountSignature({}..)", &hex[..hex.len().min(16)])
    }
}

/// BLS12-381 key pair of a validator.
#[derive(Clone)]
pub struct AuthorityKeyPair(blst::min_pk::SecretKey);

impl AuthorityKeyPair {
    pub fn generate() -> Self {
        let mut ikm = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut ikm);
        Self::from_seed(&ikm)
    }

    /// Deterministic key pair (simulation and tests).
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let secret = blst::min_pk::SecretKey::key_gen(seed, &[])
            .expect("key_gen accepts any 32-byte input keying material");
        Self(secret)
    }

    pub fn public_key(&self) -> AuthorityPublicKey {
        AuthorityPublicKey(self.0.sk_to_pk().to_bytes().to_vec())
    }

    pub fn sign(&self, message: &[u8]) -> AuthoritySignature {
        AuthoritySignature(self.0.sign(message, BLS_DST, &[]).to_bytes().to_vec())
    }
}

impl fmt::Debug for AuthorityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorityKeyPair({:?})", self.public_key())
    }
}

/// BLS12-381 public key (48 bytes compressed).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuthorityPublicKey(Vec<u8>);

impl AuthorityPublicKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn verify(&self, message: &[u8], signature: &AuthoritySignature) -> bool {
        let Ok(key) = blst::min_pk::PublicKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(sig) = blst::min_pk::Signature::from_bytes(&signature.0) else {
            return false;
        };
        sig.verify(true, message, BLS_DST, &[], &key, true) == blst::BLST_ERROR::BLST_SUCCESS
    }

    /// Aggregate public keys of validators that signed the same message.
    pub fn aggregate(keys: &[&AuthorityPublicKey]) -> Result<Self, AggregateError> {
        if keys.is_empty() {
            return Err(AggregateError::Empty);
        }
        let parsed = keys
            .iter()
            .map(|k| blst::min_pk::PublicKey::from_bytes(&k.0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| AggregateError::Malformed)?;
        let refs: Vec<_> = parsed.iter().collect();
        let aggregate = blst::min_pk::AggregatePublicKey::aggregate(&refs, true)
            .map_err(|_| AggregateError::Malformed)?;
        Ok(Self(aggregate.to_public_key().to_bytes().to_vec()))
    }
}

impl fmt::Debug for AuthorityPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = hex::encode(&self.0);
        write!(f, "AuthorityPublicKey({}..)", &hex[..hex.len().min(16)])
    }
}

/// BLS12-381 signature (96 bytes compressed), individual or aggregated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoritySignature(Vec<u8>);

impl AuthoritySignature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Aggregate signatures over the same message.
    pub fn aggregate(signatures: &[&AuthoritySignature]) -> Result<Self, AggregateError> {
        if signatures.is_empty() {
            return Err(AggregateError::Empty);
        }
        let parsed = signatures
            .iter()
            .map(|s| blst::min_pk::Signature::from_bytes(&s.0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| AggregateError::Malformed)?;
        let refs: Vec<_> = parsed.iter().collect();
        let aggregate = blst::min_pk::AggregateSignature::aggregate(&refs, true)
            .map_err(|_| AggregateError::Malformed)?;
        Ok(Self(aggregate.to_signature().to_bytes().to_vec()))
    }
}

impl fmt::Debug for AuthoritySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = hex::encode(&self.0);
        write!(f, "AuthoritySignature({}..)", &hex[..hex.len().min(16)])
    }
}

/// Errors aggregating BLS material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("cannot aggregate an empty list")]
    Empty,

    #[error("malformed BLS key or signature")]
    Malformed,
}
