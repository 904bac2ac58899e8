//! Error taxonomy for the HarrierDB query-engine core.
//!
//! Recoverable conditions (a full pool, a cache miss, a skipped input line)
//! are reported as ordinary return values by the crates that own them.
//! [`HarrierError`] is reserved for contract violations: invalid handles,
//! malformed plan nodes, untypable comparisons, corrupt serialized state.

use thiserror::Error;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, HarrierError>;

/// All error conditions surfaced by the core crates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum HarrierError {
    /// A memory-pool handle does not name a live segment (unknown id,
    /// double release).
    #[error("invalid memory-pool ref id {ref_id}")]
    InvalidRef { ref_id: u64 },

    /// `unlatch` was called on a segment with no outstanding latch.
    #[error("segment for ref id {ref_id} is not latched")]
    NotLatched { ref_id: u64 },

    /// An allocation could not be satisfied and resizing was not permitted.
    #[error("capacity exceeded: requested {requested} bytes, {available} available")]
    CapacityExceeded { requested: usize, available: usize },

    /// A projected or hashed column name is absent from the schema.
    #[error("unknown column: {name}")]
    UnknownColumn { name: String },

    /// An expression or plan node has a type the current operation cannot
    /// process.
    #[error("unknown or unexpected node type: {node_type}")]
    UnknownNodeType { node_type: String },

    /// Two values of incompatible types were compared during folding.
    #[error("type mismatch: cannot compare {left} with {right}")]
    TypeMismatch { left: String, right: String },

    /// A numeric argument fell outside its permitted range.
    #[error("{what} out of range: {value}")]
    OutOfRange { what: String, value: String },

    /// Serialized state failed validation (truncated or inconsistent).
    #[error("corrupt serialized state: {what}")]
    Corrupt { what: String },

    /// An internal invariant was violated. Always a bug.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HarrierError {
    /// Construct an [`HarrierError::Internal`] from any displayable message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Construct an [`HarrierError::OutOfRange`] with a displayable value.
    pub fn out_of_range(what: impl Into<String>, value: impl std::fmt::Display) -> Self {
        Self::OutOfRange {
            what: what.into(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_offending_input() {
        let err = HarrierError::InvalidRef { ref_id: 42 };
        assert!(err.to_string().contains("42"));

        let err = HarrierError::UnknownColumn {
            name: "missing".to_owned(),
        };
        assert!(err.to_string().contains("missing"));

        let err = HarrierError::out_of_range("bloom tier", 5);
        assert!(err.to_string().contains("bloom tier"));
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn internal_helper_wraps_message() {
        let err = HarrierError::internal("latch table desynchronized");
        assert!(matches!(err, HarrierError::Internal(_)));
        assert!(err.to_string().contains("latch table"));
    }
}
