//! Bitfield recording which committee members signed a certificate.

use serde::{Deserialize, Serialize};

/// Compact set of committee indices.
///
/// Index `i` refers to the `i`-th validator of the committee in ascending
/// validator-id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerBitfield {
    words: Vec<u64>,
    len: usize,
}

impl SignerBitfield {
    /// Empty bitfield sized for a committee of `len` validators.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Mark index as signed. Out-of-range indices are ignored.
    pub fn insert(&mut self, index: usize) {
        if index < self.len {
            self.words[index / 64] |= 1 << (index % 64);
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.len && (self.words[index / 64] >> (index % 64)) & 1 == 1
    }

    /// Number of signers.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Committee size this bitfield was built for.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Signer indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|&i| self.contains(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_iterate() {
        let mut bits = SignerBitfield::new(70);
        bits.insert(0);
        bits.insert(65);
        bits.insert(69);
        bits.insert(70);

        assert!(bits.contains(65));
        assert!(!bits.contains(70));
        assert_eq!(bits.count(), 3);
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![0, 65, 69]);
    }

    #[test]
    fn test_empty() {
        let bits = SignerBitfield::new(4);
        assert!(bits.is_empty());
        assert_eq!(bits.len(), 4);
        assert!(!SignerBitfield::default().contains(0));
    }
}
