//! Hash table and hash set keyed by 64-bit row hashes.
//!
//! The table maps a hash to the ordered sequence of row indices that
//! produced it; insertion order per key is preserved so probe output
//! stays stable. The set answers "was this newly added", which is all a
//! distinct operator needs.

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use harrier_error::Result;
use harrier_types::Batch;

use crate::row_hash::{hash_rows, non_null_indices};

/// Multi-valued mapping from 64-bit key to row indices.
#[derive(Debug, Default, Clone)]
pub struct HashTable {
    map: HashMap<u64, SmallVec<[u64; 2]>>,
    rows: usize,
}

impl HashTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table over the named key columns, skipping rows with any
    /// null key column.
    pub fn from_batch(batch: &Batch, columns: &[String]) -> Result<Self> {
        let keep = non_null_indices(batch, columns)?;
        let hashes = hash_rows(batch, columns)?;
        let mut table = Self::new();
        for row in keep {
            table.insert(hashes[row], row as u64);
        }
        Ok(table)
    }

    /// Append a row index under a key, preserving insertion order.
    pub fn insert(&mut self, key: u64, row: u64) {
        self.map.entry(key).or_default().push(row);
        self.rows += 1;
    }

    /// Row indices recorded under a key, in insertion order.
    #[must_use]
    pub fn get(&self, key: u64) -> &[u64] {
        self.map.get(&key).map_or(&[], |rows| rows.as_slice())
    }

    #[must_use]
    pub fn contains(&self, key: u64) -> bool {
        self.map.contains_key(&key)
    }

    /// Total row indices stored across all keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.map.len()
    }
}

/// Set of 64-bit values with newly-added reporting.
#[derive(Debug, Default, Clone)]
pub struct HashSet64 {
    set: HashSet<u64>,
}

impl HashSet64 {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value; true when it was not present before.
    pub fn insert(&mut self, value: u64) -> bool {
        self.set.insert(value)
    }

    #[must_use]
    pub fn contains(&self, value: u64) -> bool {
        self.set.contains(&value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Distinct helper: hash every row of the batch over the named
    /// columns and keep the first row index of each distinct hash.
    /// Returns the populated set and the kept indices in row order.
    pub fn distinct(batch: &Batch, columns: &[String]) -> Result<(Self, Vec<usize>)> {
        let hashes = hash_rows(batch, columns)?;
        let mut set = Self::new();
        let mut kept = Vec::new();
        for (row, &hash) in hashes.iter().enumerate() {
            if set.insert(hash) {
                kept.push(row);
            }
        }
        Ok((set, kept))
    }
}
