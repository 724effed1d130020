//! Blake3 content digests.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte Blake3 digest.
///
/// Used for transaction digests, effects digests and object content hashes.
/// Ordering is byte-wise, which makes it usable as a deterministic tie-break.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Digest length in bytes.
    pub const LENGTH: usize = 32;

    /// All-zero digest, used as the "previous transaction" of genesis objects.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Wrap raw digest bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash arbitrary bytes.
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Hash several byte slices as one stream.
    pub fn of_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Hash the canonical bincode encoding of a value.
    pub fn of_serializable<T: Serialize>(value: &T) -> Self {
        let bytes = bincode::serialize(value)
            .expect("bincode serialization of in-memory ledger types cannot fail");
        Self::of(&bytes)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, HexError> {
        if hex.len() != Self::LENGTH * 2 {
            return Err(HexError::InvalidLength {
                expected: Self::LENGTH * 2,
                actual: hex.len(),
            });
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex, &mut bytes).map_err(|_| HexError::InvalidHex)?;
        Ok(Self(bytes))
    }

    /// Full lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn into_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Digest({}..{})", &hex[..8], &hex[56..])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Errors parsing hex-encoded identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    #[error("invalid hex length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid hex string")]
    InvalidHex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic() {
        assert_eq!(Digest::of(b"vireo"), Digest::of(b"vireo"));
        assert_ne!(Digest::of(b"vireo"), Digest::of(b"oriev"));
    }

    #[test]
    fn test_parts_match_concatenation() {
        assert_eq!(Digest::of_parts(&[b"ab", b"cd"]), Digest::of(b"abcd"));
    }

    #[test]
    fn test_hex_parsing() {
        let digest = Digest::of(b"payload");
        assert_eq!(Digest::from_hex(&digest.to_hex()), Ok(digest));
        assert_eq!(
            Digest::from_hex("abcd"),
            Err(HexError::InvalidLength {
                expected: 64,
                actual: 4
            })
        );
        assert_eq!(Digest::from_hex(&"zz".repeat(32)), Err(HexError::InvalidHex));
    }
}
