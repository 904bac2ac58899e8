//! Order-preserving signed-64 encoding.
//!
//! Relation statistics and predicate range tracking reduce every ordered
//! scalar to an `i64` so bounds of mixed provenance can be compared with
//! plain integer comparisons. The map preserves `<=` within each type
//! family:
//!
//! - integers, booleans and timestamps map by arithmetic value;
//! - floats map by `floor`, clamped to the representable range (NaN maps
//!   to the sentinel);
//! - strings and byte strings pack their first 7 bytes big-endian into
//!   the low 7 bytes of the slot, so lexicographic order on the prefix is
//!   preserved and every encoding is non-negative;
//! - `Null`, lists and structs map to the sentinel.

use crate::value::ScalarValue;

/// "No value" sentinel, excluded from min/max updates.
pub const NO_VALUE_SENTINEL: i64 = i64::MIN;

/// Encode a scalar into the order-preserving signed-64 space.
#[must_use]
pub fn encode_ordered(value: &ScalarValue) -> i64 {
    match value {
        ScalarValue::Null | ScalarValue::List(_) => NO_VALUE_SENTINEL,
        ScalarValue::Int64(v) | ScalarValue::Timestamp(v) => *v,
        ScalarValue::Bool(v) => i64::from(*v),
        ScalarValue::Float64(v) => encode_float(*v),
        ScalarValue::Utf8(s) => encode_prefix(s.as_bytes()),
        ScalarValue::Bytes(b) => encode_prefix(b),
    }
}

fn encode_float(v: f64) -> i64 {
    if v.is_nan() {
        return NO_VALUE_SENTINEL;
    }
    // Clamp away from the sentinel so -inf stays distinguishable from
    // "no value".
    if v <= (i64::MIN + 1) as f64 {
        return i64::MIN + 1;
    }
    if v >= i64::MAX as f64 {
        return i64::MAX;
    }
    v.floor() as i64
}

fn encode_prefix(bytes: &[u8]) -> i64 {
    let mut slot = [0_u8; 8];
    for (i, byte) in bytes.iter().take(7).enumerate() {
        slot[i + 1] = *byte;
    }
    i64::from_be_bytes(slot)
}
