//! Scalar values exchanged between the decoder, the hash primitives, and
//! the optimizer's literal folding.

use std::cmp::Ordering;
use std::fmt;

use harrier_error::{HarrierError, Result};

/// A single typed value, including the absent value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Int64(i64),
    Float64(f64),
    Bool(bool),
    Utf8(String),
    Bytes(Vec<u8>),
    /// Epoch seconds.
    Timestamp(i64),
    List(Vec<ScalarValue>),
}

impl ScalarValue {
    /// Short type name for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int64(_) => "int64",
            Self::Float64(_) => "float64",
            Self::Bool(_) => "bool",
            Self::Utf8(_) => "utf8",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
            Self::List(_) => "list",
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Compare two scalars for folding purposes.
    ///
    /// Integers and floats compare by numeric value. `Null` compares as
    /// unknown (`Ok(None)`), matching SQL three-valued logic. Values of
    /// incompatible types are a [`HarrierError::TypeMismatch`]: the plan
    /// that produced the comparison is rejected rather than silently
    /// coerced.
    pub fn try_compare(&self, other: &Self) -> Result<Option<Ordering>> {
        use ScalarValue::{Bool, Bytes, Float64, Int64, Null, Timestamp, Utf8};

        let ordering = match (self, other) {
            (Null, _) | (_, Null) => return Ok(None),
            (Int64(a), Int64(b)) | (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
            (Float64(a), Float64(b)) => a.partial_cmp(b),
            (Int64(a), Float64(b)) => (*a as f64).partial_cmp(b),
            (Float64(a), Int64(b)) => a.partial_cmp(&(*b as f64)),
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Utf8(a), Utf8(b)) => Some(a.cmp(b)),
            (Bytes(a), Bytes(b)) => Some(a.cmp(b)),
            (left, right) => {
                return Err(HarrierError::TypeMismatch {
                    left: left.type_name().to_owned(),
                    right: right.type_name().to_owned(),
                })
            }
        };
        Ok(ordering)
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "'{v}'"),
            Self::Bytes(v) => {
                write!(f, "x'")?;
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                write!(f, "'")
            }
            Self::Timestamp(v) => write!(f, "@{v}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        Self::Utf8(v.to_owned())
    }
}
