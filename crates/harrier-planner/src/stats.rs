//! Merged per-column relation statistics.
//!
//! Bounds are kept in the order-preserving signed-64 encoding so columns
//! of mixed provenance reduce to plain integer comparisons; the
//! `i64::MIN` sentinel means "no value" and never participates in
//! min/max merges. The wire format is byte-exact: two big-endian record
//! counters followed by four maps, each a big-endian `u32` entry count
//! and `[1-byte key length][key utf-8][8-byte big-endian value]`
//! entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use harrier_error::{HarrierError, Result};
use harrier_types::{encode_ordered, ScalarValue, NO_VALUE_SENTINEL};

/// Per-relation statistics aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationStatistics {
    pub record_count: i64,
    pub record_count_estimate: i64,
    pub null_count: BTreeMap<String, i64>,
    pub lower_bounds: BTreeMap<String, i64>,
    pub upper_bounds: BTreeMap<String, i64>,
    pub cardinality_estimate: BTreeMap<String, i64>,
}

impl RelationStatistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observed value into a column's bounds and null count.
    pub fn observe_column(&mut self, column: &str, value: &ScalarValue) {
        if value.is_null() {
            *self.null_count.entry(column.to_owned()).or_insert(0) += 1;
            return;
        }
        let encoded = encode_ordered(value);
        if encoded == NO_VALUE_SENTINEL {
            // NaN and untrackable values count as nulls for bounds.
            *self.null_count.entry(column.to_owned()).or_insert(0) += 1;
            return;
        }
        self.lower_bounds
            .entry(column.to_owned())
            .and_modify(|lower| *lower = (*lower).min(encoded))
            .or_insert(encoded);
        self.upper_bounds
            .entry(column.to_owned())
            .and_modify(|upper| *upper = (*upper).max(encoded))
            .or_insert(encoded);
    }

    /// Merge another relation's statistics into this one.
    pub fn merge(&mut self, other: &Self) {
        self.record_count = self.record_count.saturating_add(other.record_count);
        self.record_count_estimate = self
            .record_count_estimate
            .saturating_add(other.record_count_estimate);
        for (column, count) in &other.null_count {
            *self.null_count.entry(column.clone()).or_insert(0) += count;
        }
        for (column, &lower) in &other.lower_bounds {
            if lower == NO_VALUE_SENTINEL {
                continue;
            }
            self.lower_bounds
                .entry(column.clone())
                .and_modify(|existing| *existing = (*existing).min(lower))
                .or_insert(lower);
        }
        for (column, &upper) in &other.upper_bounds {
            if upper == NO_VALUE_SENTINEL {
                continue;
            }
            self.upper_bounds
                .entry(column.clone())
                .and_modify(|existing| *existing = (*existing).max(upper))
                .or_insert(upper);
        }
        for (column, &estimate) in &other.cardinality_estimate {
            self.cardinality_estimate
                .entry(column.clone())
                .and_modify(|existing| *existing = (*existing).max(estimate))
                .or_insert(estimate);
        }
    }

    /// Byte-exact serialization.
    #[must_use]
    pub fn serialize_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.record_count.to_be_bytes());
        out.extend_from_slice(&self.record_count_estimate.to_be_bytes());
        for map in [
            &self.null_count,
            &self.lower_bounds,
            &self.upper_bounds,
            &self.cardinality_estimate,
        ] {
            write_map(&mut out, map);
        }
        out
    }

    /// Inverse of [`RelationStatistics::serialize_bytes`], rejecting
    /// truncated or oversized payloads.
    pub fn deserialize_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor { bytes, pos: 0 };
        let record_count = cursor.read_i64()?;
        let record_count_estimate = cursor.read_i64()?;
        let null_count = read_map(&mut cursor)?;
        let lower_bounds = read_map(&mut cursor)?;
        let upper_bounds = read_map(&mut cursor)?;
        let cardinality_estimate = read_map(&mut cursor)?;
        if cursor.pos != bytes.len() {
            return Err(HarrierError::Corrupt {
                what: format!(
                    "relation statistics: {} trailing bytes",
                    bytes.len() - cursor.pos
                ),
            });
        }
        Ok(Self {
            record_count,
            record_count_estimate,
            null_count,
            lower_bounds,
            upper_bounds,
            cardinality_estimate,
        })
    }
}

fn write_map(out: &mut Vec<u8>, map: &BTreeMap<String, i64>) {
    out.extend_from_slice(&(map.len() as u32).to_be_bytes());
    for (key, value) in map {
        let key_bytes = key.as_bytes();
        // Column names beyond 255 bytes are truncated at the wire level.
        let len = key_bytes.len().min(255);
        out.push(len as u8);
        out.extend_from_slice(&key_bytes[..len]);
        out.extend_from_slice(&value.to_be_bytes());
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let span = self
            .bytes
            .get(self.pos..self.pos + len)
            .ok_or_else(|| HarrierError::Corrupt {
                what: "relation statistics: truncated payload".to_owned(),
            })?;
        self.pos += len;
        Ok(span)
    }

    fn read_i64(&mut self) -> Result<i64> {
        let mut raw = [0_u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(i64::from_be_bytes(raw))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut raw = [0_u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(raw))
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }
}

fn read_map(cursor: &mut Cursor<'_>) -> Result<BTreeMap<String, i64>> {
    let count = cursor.read_u32()?;
    let mut map = BTreeMap::new();
    for _ in 0..count {
        let key_len = cursor.read_u8()? as usize;
        let key = String::from_utf8(cursor.take(key_len)?.to_vec()).map_err(|_| {
            HarrierError::Corrupt {
                what: "relation statistics: non-utf8 column name".to_owned(),
            }
        })?;
        let value = cursor.read_i64()?;
        map.insert(key, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RelationStatistics {
        let mut stats = RelationStatistics {
            record_count: 1_000,
            record_count_estimate: 1_024,
            ..RelationStatistics::default()
        };
        stats.observe_column("id", &ScalarValue::Int64(5));
        stats.observe_column("id", &ScalarValue::Int64(-3));
        stats.observe_column("id", &ScalarValue::Null);
        stats.observe_column("name", &ScalarValue::from("delta"));
        stats.observe_column("name", &ScalarValue::from("alpha"));
        stats.cardinality_estimate.insert("id".to_owned(), 900);
        stats
    }

    #[test]
    fn bounds_track_min_and_max() {
        let stats = sample();
        assert_eq!(stats.lower_bounds["id"], -3);
        assert_eq!(stats.upper_bounds["id"], 5);
        assert_eq!(stats.null_count["id"], 1);
        assert_eq!(
            stats.lower_bounds["name"],
            encode_ordered(&ScalarValue::from("alpha"))
        );
        assert_eq!(
            stats.upper_bounds["name"],
            encode_ordered(&ScalarValue::from("delta"))
        );
    }

    #[test]
    fn nan_is_excluded_from_bounds() {
        let mut stats = RelationStatistics::new();
        stats.observe_column("v", &ScalarValue::Float64(f64::NAN));
        assert!(stats.lower_bounds.get("v").is_none());
        assert_eq!(stats.null_count["v"], 1);

        stats.observe_column("v", &ScalarValue::Float64(2.5));
        assert_eq!(stats.lower_bounds["v"], 2);
    }

    #[test]
    fn merge_widens_bounds_and_sums_counts() {
        let mut a = RelationStatistics::new();
        a.record_count = 10;
        a.observe_column("id", &ScalarValue::Int64(0));
        let mut b = RelationStatistics::new();
        b.record_count = 5;
        b.observe_column("id", &ScalarValue::Int64(100));
        b.observe_column("id", &ScalarValue::Null);

        a.merge(&b);
        assert_eq!(a.record_count, 15);
        assert_eq!(a.lower_bounds["id"], 0);
        assert_eq!(a.upper_bounds["id"], 100);
        assert_eq!(a.null_count["id"], 1);
    }

    #[test]
    fn wire_format_is_byte_exact() {
        let mut stats = RelationStatistics::new();
        stats.record_count = 2;
        stats.record_count_estimate = 3;
        stats.null_count.insert("a".to_owned(), 1);

        let bytes = stats.serialize_bytes();
        let mut expected = Vec::new();
        expected.extend_from_slice(&2_i64.to_be_bytes());
        expected.extend_from_slice(&3_i64.to_be_bytes());
        // null_count: one entry, key "a", value 1.
        expected.extend_from_slice(&1_u32.to_be_bytes());
        expected.push(1);
        expected.push(b'a');
        expected.extend_from_slice(&1_i64.to_be_bytes());
        // Three empty maps.
        for _ in 0..3 {
            expected.extend_from_slice(&0_u32.to_be_bytes());
        }
        assert_eq!(bytes, expected);
    }

    #[test]
    fn serialization_round_trips() {
        let stats = sample();
        let restored = RelationStatistics::deserialize_bytes(&stats.serialize_bytes()).unwrap();
        assert_eq!(restored, stats);
    }

    #[test]
    fn truncation_is_rejected() {
        let bytes = sample().serialize_bytes();
        for cut in [0, 7, 16, bytes.len() - 1] {
            assert!(
                matches!(
                    RelationStatistics::deserialize_bytes(&bytes[..cut]),
                    Err(HarrierError::Corrupt { .. })
                ),
                "cut at {cut} must be rejected"
            );
        }
        let mut extended = bytes;
        extended.push(0);
        assert!(matches!(
            RelationStatistics::deserialize_bytes(&extended),
            Err(HarrierError::Corrupt { .. })
        ));
    }
}
