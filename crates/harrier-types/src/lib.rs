//! Core data model for the HarrierDB query-engine core.
//!
//! Defines the scalar value space, the columnar batch layout (typed value
//! buffers plus validity bitmaps), and the order-preserving signed-64
//! encoding used by relation statistics and predicate range tracking.

pub mod batch;
pub mod encoding;
pub mod value;

pub use batch::{Batch, Column, ColumnData, ColumnSpec, ColumnType, ValidityBitmap};
pub use encoding::{encode_ordered, NO_VALUE_SENTINEL};
pub use value::ScalarValue;
