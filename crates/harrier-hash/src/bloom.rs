//! Tiered two-probe bloom filter keyed by row hashes.
//!
//! The bit array is one of four fixed power-of-two sizes chosen by the
//! expected distinct-row count; both probe positions derive from a single
//! 64-bit row hash, so membership tests cost one multiply and two word
//! loads. Above the largest tier no filter is built and the caller falls
//! back to a full hash probe.

use tracing::debug;

use harrier_error::{HarrierError, Result};
use harrier_types::Batch;

use crate::row_hash::{hash_rows, non_null_indices};

/// Golden-ratio multiplier deriving the second probe from the row hash.
const PROBE_MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

/// Expected-record capacity of each tier.
const TIER_CAPACITIES: [usize; 4] = [1_000, 62_000, 1_000_000, 16_000_000];

/// Bit-array size of each tier. All powers of two, smallest 8 Kbit.
const TIER_BITS: [usize; 4] = [
    8 * 1024,
    512 * 1024,
    8 * 1024 * 1024,
    128 * 1024 * 1024,
];

/// Fixed-size two-probe bloom filter with a word-indexed bit array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    words: Vec<u64>,
    mask: u64,
    tier: u8,
}

impl BloomFilter {
    /// Create an empty filter sized for `expected` distinct records, or
    /// `None` when the expectation exceeds the largest tier.
    #[must_use]
    pub fn with_expected(expected: usize) -> Option<Self> {
        let tier = TIER_CAPACITIES.iter().position(|&cap| expected <= cap)?;
        let bits = TIER_BITS[tier];
        Some(Self {
            words: vec![0; bits / 64],
            mask: bits as u64 - 1,
            tier: tier as u8,
        })
    }

    /// Build a filter from the named key columns of a batch.
    ///
    /// Rows with any null key column are excluded (a partially-null row
    /// can never equi-match). Returns `Ok(None)` when the non-null row
    /// count exceeds the largest tier.
    pub fn create(batch: &Batch, columns: &[String]) -> Result<Option<Self>> {
        let keep = non_null_indices(batch, columns)?;
        let Some(mut filter) = Self::with_expected(keep.len()) else {
            debug!(rows = keep.len(), "bloom filter rejected: above largest tier");
            return Ok(None);
        };
        let hashes = hash_rows(batch, columns)?;
        for row in keep {
            filter.insert_hash(hashes[row]);
        }
        Ok(Some(filter))
    }

    /// Set both probe bits for a row hash.
    pub fn insert_hash(&mut self, hash: u64) {
        let (first, second) = self.probes(hash);
        self.set_bit(first);
        self.set_bit(second);
    }

    /// Test both probe bits. False means definitely absent.
    #[must_use]
    pub fn possibly_contains(&self, hash: u64) -> bool {
        let (first, second) = self.probes(hash);
        self.get_bit(first) && self.get_bit(second)
    }

    /// Batched membership test over the named key columns. Rows with any
    /// null key column yield `false` (definitely not present).
    pub fn possibly_contains_batch(&self, batch: &Batch, columns: &[String]) -> Result<Vec<bool>> {
        let selected = batch.resolve_columns(columns)?;
        let hashes = hash_rows(batch, columns)?;
        let mut out = Vec::with_capacity(batch.row_count());
        for (row, &hash) in hashes.iter().enumerate() {
            let all_valid = selected.iter().all(|col| col.validity.is_valid(row));
            out.push(all_valid && self.possibly_contains(hash));
        }
        Ok(out)
    }

    /// Tier index, 0..=3.
    #[must_use]
    pub fn tier(&self) -> u8 {
        self.tier
    }

    /// Bit-array size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.words.len() * 64
    }

    /// One tier byte followed by the raw bit array as little-endian
    /// 64-bit words.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.words.len() * 8);
        out.push(self.tier);
        for word in &self.words {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Inverse of [`BloomFilter::serialize`], validating tier and length.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (&tier, body) = bytes.split_first().ok_or_else(|| HarrierError::Corrupt {
            what: "empty bloom filter payload".to_owned(),
        })?;
        let bits = *TIER_BITS
            .get(tier as usize)
            .ok_or_else(|| HarrierError::out_of_range("bloom tier", tier))?;
        if body.len() != bits / 8 {
            return Err(HarrierError::Corrupt {
                what: format!(
                    "bloom tier {tier} expects {} bytes, found {}",
                    bits / 8,
                    body.len()
                ),
            });
        }
        let words = body
            .chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0_u8; 8];
                raw.copy_from_slice(chunk);
                u64::from_le_bytes(raw)
            })
            .collect();
        Ok(Self {
            words,
            mask: bits as u64 - 1,
            tier,
        })
    }

    fn probes(&self, hash: u64) -> (u64, u64) {
        let first = hash & self.mask;
        let second = hash.wrapping_mul(PROBE_MULTIPLIER) & self.mask;
        (first, second)
    }

    fn set_bit(&mut self, bit: u64) {
        self.words[(bit / 64) as usize] |= 1_u64 << (bit % 64);
    }

    fn get_bit(&self, bit: u64) -> bool {
        self.words[(bit / 64) as usize] & (1_u64 << (bit % 64)) != 0
    }
}
