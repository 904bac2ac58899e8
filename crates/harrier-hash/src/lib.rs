//! Join and distinct primitives: deterministic null-aware row hashing,
//! null-avoidant index computation, multi-valued hash tables, hash sets,
//! and tiered bloom filters, all specialized for columnar batches.

pub mod bloom;
pub mod row_hash;
pub mod table;

pub use bloom::BloomFilter;
pub use row_hash::{hash_rows, non_null_indices, NULL_HASH_SENTINEL};
pub use table::{HashSet64, HashTable};
