//! Columnar batch layout.
//!
//! A [`Batch`] is an ordered set of named [`Column`]s sharing one row
//! count. Each column pairs a typed contiguous buffer ([`ColumnData`])
//! with a [`ValidityBitmap`]. Var-length types use an offsets-plus-bytes
//! layout; nested structs fall back to a rendered-string representation.

use harrier_error::{HarrierError, Result};

use crate::value::ScalarValue;

/// Column type tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    Bool,
    Bytes,
    Utf8,
    Timestamp,
    List(Box<ColumnType>),
    Struct,
}

impl ColumnType {
    /// Short tag name for diagnostics.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::Bytes => "bytes",
            Self::Utf8 => "utf8",
            Self::Timestamp => "timestamp",
            Self::List(_) => "list",
            Self::Struct => "struct",
        }
    }
}

/// A named, typed column slot in a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub ty: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Byte-packed LSB-first validity bitmap with a starting bit offset.
///
/// The offset lets a bitmap view a chunk that does not begin on a byte
/// boundary; all row indices passed to the accessors are relative to the
/// chunk, not the backing bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityBitmap {
    bytes: Vec<u8>,
    offset: usize,
    len: usize,
}

impl ValidityBitmap {
    /// A bitmap with every row valid.
    #[must_use]
    pub fn new_all_valid(len: usize) -> Self {
        Self {
            bytes: vec![0xFF; len.div_ceil(8)],
            offset: 0,
            len,
        }
    }

    /// A bitmap with every row null.
    #[must_use]
    pub fn new_all_null(len: usize) -> Self {
        Self {
            bytes: vec![0; len.div_ceil(8)],
            offset: 0,
            len,
        }
    }

    /// An empty bitmap to be grown with [`ValidityBitmap::push`].
    #[must_use]
    pub fn new_empty() -> Self {
        Self {
            bytes: Vec::new(),
            offset: 0,
            len: 0,
        }
    }

    #[must_use]
    pub fn from_bools(bits: &[bool]) -> Self {
        let mut bitmap = Self::new_empty();
        for &bit in bits {
            bitmap.push(bit);
        }
        bitmap
    }

    /// View packed bytes starting at an arbitrary bit offset.
    pub fn from_packed(bytes: Vec<u8>, offset: usize, len: usize) -> Result<Self> {
        if (offset + len).div_ceil(8) > bytes.len() {
            return Err(HarrierError::out_of_range(
                "validity bitmap length",
                offset + len,
            ));
        }
        Ok(Self { bytes, offset, len })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn is_valid(&self, row: usize) -> bool {
        debug_assert!(row < self.len, "row {row} beyond bitmap length {}", self.len);
        let bit = self.offset + row;
        self.bytes[bit / 8] & (1_u8 << (bit % 8)) != 0
    }

    /// Append one validity bit.
    pub fn push(&mut self, valid: bool) {
        let bit = self.offset + self.len;
        if bit / 8 >= self.bytes.len() {
            self.bytes.push(0);
        }
        if valid {
            self.bytes[bit / 8] |= 1_u8 << (bit % 8);
        }
        self.len += 1;
    }

    /// Number of valid rows.
    #[must_use]
    pub fn count_valid(&self) -> usize {
        (0..self.len).filter(|&row| self.is_valid(row)).count()
    }

    /// AND-combine with another bitmap of the same length, respecting both
    /// starting offsets.
    pub fn and_with(&self, other: &Self) -> Result<Self> {
        if self.len != other.len {
            return Err(HarrierError::internal(format!(
                "validity length mismatch: {} vs {}",
                self.len, other.len
            )));
        }
        let mut combined = Self::new_empty();
        for row in 0..self.len {
            combined.push(self.is_valid(row) && other.is_valid(row));
        }
        Ok(combined)
    }
}

/// Typed contiguous column buffers.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Bool(Vec<bool>),
    Timestamp(Vec<i64>),
    Utf8 { offsets: Vec<u32>, data: Vec<u8> },
    Bytes { offsets: Vec<u32>, data: Vec<u8> },
    List {
        offsets: Vec<u32>,
        child: Box<ColumnData>,
    },
    /// Rendered-string representation of nested objects (slow path).
    Struct { offsets: Vec<u32>, data: Vec<u8> },
}

impl ColumnData {
    /// An empty buffer of the given type.
    #[must_use]
    pub fn new_empty(ty: &ColumnType) -> Self {
        match ty {
            ColumnType::Int64 => Self::Int64(Vec::new()),
            ColumnType::Float64 => Self::Float64(Vec::new()),
            ColumnType::Bool => Self::Bool(Vec::new()),
            ColumnType::Timestamp => Self::Timestamp(Vec::new()),
            ColumnType::Utf8 => Self::Utf8 {
                offsets: vec![0],
                data: Vec::new(),
            },
            ColumnType::Bytes => Self::Bytes {
                offsets: vec![0],
                data: Vec::new(),
            },
            ColumnType::List(child) => Self::List {
                offsets: vec![0],
                child: Box::new(Self::new_empty(child)),
            },
            ColumnType::Struct => Self::Struct {
                offsets: vec![0],
                data: Vec::new(),
            },
        }
    }

    /// Number of rows stored.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int64(v) | Self::Timestamp(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Utf8 { offsets, .. }
            | Self::Bytes { offsets, .. }
            | Self::List { offsets, .. }
            | Self::Struct { offsets, .. } => offsets.len().saturating_sub(1),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Type tag of this buffer.
    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Int64(_) => ColumnType::Int64,
            Self::Float64(_) => ColumnType::Float64,
            Self::Bool(_) => ColumnType::Bool,
            Self::Timestamp(_) => ColumnType::Timestamp,
            Self::Utf8 { .. } => ColumnType::Utf8,
            Self::Bytes { .. } => ColumnType::Bytes,
            Self::List { child, .. } => ColumnType::List(Box::new(child.column_type())),
            Self::Struct { .. } => ColumnType::Struct,
        }
    }

    /// Append one scalar, which must match the buffer's type or be `Null`.
    ///
    /// Nulls append a placeholder slot so row positions stay aligned with
    /// the validity bitmap.
    pub fn push(&mut self, value: &ScalarValue) -> Result<()> {
        match (self, value) {
            (Self::Int64(v), ScalarValue::Int64(x)) => v.push(*x),
            (Self::Int64(v), ScalarValue::Null) => v.push(0),
            (Self::Timestamp(v), ScalarValue::Timestamp(x)) => v.push(*x),
            (Self::Timestamp(v), ScalarValue::Null) => v.push(0),
            (Self::Float64(v), ScalarValue::Float64(x)) => v.push(*x),
            (Self::Float64(v), ScalarValue::Int64(x)) => v.push(*x as f64),
            (Self::Float64(v), ScalarValue::Null) => v.push(0.0),
            (Self::Bool(v), ScalarValue::Bool(x)) => v.push(*x),
            (Self::Bool(v), ScalarValue::Null) => v.push(false),
            (Self::Utf8 { offsets, data }, ScalarValue::Utf8(s)) => {
                data.extend_from_slice(s.as_bytes());
                offsets.push(data.len() as u32);
            }
            (
                Self::Utf8 { offsets, data: _ } | Self::Struct { offsets, data: _ },
                ScalarValue::Null,
            ) => {
                offsets.push(*offsets.last().unwrap_or(&0));
            }
            (Self::Bytes { offsets, data }, ScalarValue::Bytes(b)) => {
                data.extend_from_slice(b);
                offsets.push(data.len() as u32);
            }
            (Self::Bytes { offsets, .. }, ScalarValue::Null) => {
                offsets.push(*offsets.last().unwrap_or(&0));
            }
            (Self::List { offsets, child }, ScalarValue::List(items)) => {
                for item in items {
                    child.push(item)?;
                }
                offsets.push(child.len() as u32);
            }
            (Self::List { offsets, child }, ScalarValue::Null) => {
                offsets.push(child.len() as u32);
            }
            (Self::Struct { offsets, data }, ScalarValue::Utf8(repr)) => {
                data.extend_from_slice(repr.as_bytes());
                offsets.push(data.len() as u32);
            }
            (buffer, value) => {
                return Err(HarrierError::TypeMismatch {
                    left: buffer.column_type().tag().to_owned(),
                    right: value.type_name().to_owned(),
                })
            }
        }
        Ok(())
    }

    /// Materialize the value at a row index.
    #[must_use]
    pub fn value_at(&self, row: usize) -> ScalarValue {
        match self {
            Self::Int64(v) => ScalarValue::Int64(v[row]),
            Self::Timestamp(v) => ScalarValue::Timestamp(v[row]),
            Self::Float64(v) => ScalarValue::Float64(v[row]),
            Self::Bool(v) => ScalarValue::Bool(v[row]),
            Self::Utf8 { offsets, data } | Self::Struct { offsets, data } => {
                let start = offsets[row] as usize;
                let end = offsets[row + 1] as usize;
                ScalarValue::Utf8(String::from_utf8_lossy(&data[start..end]).into_owned())
            }
            Self::Bytes { offsets, data } => {
                let start = offsets[row] as usize;
                let end = offsets[row + 1] as usize;
                ScalarValue::Bytes(data[start..end].to_vec())
            }
            Self::List { offsets, child } => {
                let start = offsets[row] as usize;
                let end = offsets[row + 1] as usize;
                ScalarValue::List((start..end).map(|i| child.value_at(i)).collect())
            }
        }
    }

    /// Var-length byte span for a row, if this is a var-length buffer.
    #[must_use]
    pub fn byte_span(&self, row: usize) -> Option<&[u8]> {
        match self {
            Self::Utf8 { offsets, data }
            | Self::Bytes { offsets, data }
            | Self::Struct { offsets, data } => {
                let start = offsets[row] as usize;
                let end = offsets[row + 1] as usize;
                Some(&data[start..end])
            }
            _ => None,
        }
    }
}

/// A named column: typed buffer plus validity bitmap of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
    pub validity: ValidityBitmap,
}

impl Column {
    /// Value at a row, honoring the validity bitmap.
    #[must_use]
    pub fn value_at(&self, row: usize) -> ScalarValue {
        if !self.validity.is_valid(row) {
            return ScalarValue::Null;
        }
        self.data.value_at(row)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// An ordered set of columns sharing one row count.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    columns: Vec<Column>,
    row_count: usize,
}

impl Batch {
    /// Assemble a batch from columns, validating that lengths agree.
    pub fn from_columns(columns: Vec<Column>, row_count: usize) -> Result<Self> {
        for column in &columns {
            if column.data.len() != row_count || column.validity.len() != row_count {
                return Err(HarrierError::internal(format!(
                    "column {} has {} values / {} validity bits for {} rows",
                    column.name,
                    column.data.len(),
                    column.validity.len(),
                    row_count
                )));
            }
        }
        Ok(Self { columns, row_count })
    }

    /// Build a batch from row-oriented values against a schema.
    ///
    /// Primarily a test and interop convenience; the decoder builds
    /// columns directly.
    pub fn from_rows(rows: &[Vec<ScalarValue>], specs: &[ColumnSpec]) -> Result<Self> {
        let mut buffers: Vec<ColumnData> = specs
            .iter()
            .map(|spec| ColumnData::new_empty(&spec.ty))
            .collect();
        let mut validity: Vec<ValidityBitmap> =
            specs.iter().map(|_| ValidityBitmap::new_empty()).collect();

        for row in rows {
            if row.len() != specs.len() {
                return Err(HarrierError::internal(format!(
                    "row width {} does not match schema width {}",
                    row.len(),
                    specs.len()
                )));
            }
            for (slot, value) in row.iter().enumerate() {
                buffers[slot].push(value)?;
                validity[slot].push(!value.is_null());
            }
        }

        let columns = specs
            .iter()
            .zip(buffers.into_iter().zip(validity))
            .map(|(spec, (data, validity))| Column {
                name: spec.name.clone(),
                data,
                validity,
            })
            .collect();
        Self::from_columns(columns, rows.len())
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Resolve a list of column names, failing on the first unknown.
    pub fn resolve_columns<'a>(&'a self, names: &[String]) -> Result<Vec<&'a Column>> {
        names
            .iter()
            .map(|name| {
                self.column(name).ok_or_else(|| HarrierError::UnknownColumn {
                    name: name.clone(),
                })
            })
            .collect()
    }

    /// Schema of this batch.
    #[must_use]
    pub fn schema(&self) -> Vec<ColumnSpec> {
        self.columns
            .iter()
            .map(|c| ColumnSpec::new(c.name.clone(), c.data.column_type()))
            .collect()
    }

    /// Materialize one row (test and diagnostics convenience).
    #[must_use]
    pub fn row(&self, row: usize) -> Vec<ScalarValue> {
        self.columns.iter().map(|c| c.value_at(row)).collect()
    }
}
