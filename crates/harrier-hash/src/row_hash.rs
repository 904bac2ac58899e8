//! Deterministic null-aware row hashing over selected batch columns.
//!
//! Each column contributes a 64-bit hash computed by a type-specialized
//! read of its buffer; per-row column hashes fold together with a
//! multiplicative step. The hash depends only on the values, never on
//! buffer layout, so equal rows hash equally across batches and chunk
//! boundaries.

use xxhash_rust::xxh3::xxh3_64;

use harrier_error::Result;
use harrier_types::{Batch, Column, ColumnData};

/// Fixed hash assigned to nulls and NaN so they are stable across runs.
pub const NULL_HASH_SENTINEL: u64 = 0xC2B2_AE3D_27D4_EB4F;

/// Multiplicative fold step shared by column combination and list
/// element folding.
const HASH_FOLD: u64 = 31;

/// Compute one 64-bit hash per row over the named columns.
///
/// Columns are resolved by name; an unknown name is an error. Null
/// values and NaN hash to [`NULL_HASH_SENTINEL`].
pub fn hash_rows(batch: &Batch, columns: &[String]) -> Result<Vec<u64>> {
    let selected = batch.resolve_columns(columns)?;
    let mut hashes = vec![0_u64; batch.row_count()];
    for column in selected {
        fold_column(column, &mut hashes);
    }
    Ok(hashes)
}

/// Sorted row indices whose every selected column is non-null.
///
/// Computed by AND-ing the validity bitmaps of the selected columns;
/// each bitmap's starting bit offset is honored. Hash tables and bloom
/// filters built for joins must not contain partially-null rows, and
/// this is the gate that keeps them out.
pub fn non_null_indices(batch: &Batch, columns: &[String]) -> Result<Vec<usize>> {
    let selected = batch.resolve_columns(columns)?;
    let mut combined = match selected.first() {
        Some(first) => first.validity.clone(),
        None => return Ok((0..batch.row_count()).collect()),
    };
    for column in &selected[1..] {
        combined = combined.and_with(&column.validity)?;
    }
    Ok((0..batch.row_count())
        .filter(|&row| combined.is_valid(row))
        .collect())
}

fn fold_column(column: &Column, hashes: &mut [u64]) {
    for (row, hash) in hashes.iter_mut().enumerate() {
        let col_hash = if column.validity.is_valid(row) {
            hash_value(&column.data, row)
        } else {
            NULL_HASH_SENTINEL
        };
        *hash = hash.wrapping_mul(HASH_FOLD).wrapping_add(col_hash);
    }
}

fn hash_value(data: &ColumnData, row: usize) -> u64 {
    match data {
        ColumnData::Int64(v) | ColumnData::Timestamp(v) => xxh3_64(&v[row].to_le_bytes()),
        ColumnData::Float64(v) => {
            let value = v[row];
            if value.is_nan() {
                NULL_HASH_SENTINEL
            } else {
                xxh3_64(&value.to_bits().to_le_bytes())
            }
        }
        ColumnData::Bool(v) => xxh3_64(&[u8::from(v[row])]),
        ColumnData::Utf8 { offsets, data } | ColumnData::Bytes { offsets, data } => {
            let start = offsets[row] as usize;
            let end = offsets[row + 1] as usize;
            xxh3_64(&data[start..end])
        }
        ColumnData::List { offsets, child } => {
            let start = offsets[row] as usize;
            let end = offsets[row + 1] as usize;
            let mut hash = 0_u64;
            for idx in start..end {
                hash = hash
                    .wrapping_mul(HASH_FOLD)
                    .wrapping_add(hash_value(child, idx));
            }
            hash
        }
        // Nested objects carry their rendered representation; hashing it
        // is the slow path.
        ColumnData::Struct { offsets, data } => {
            let start = offsets[row] as usize;
            let end = offsets[row + 1] as usize;
            xxh3_64(&data[start..end])
        }
    }
}
