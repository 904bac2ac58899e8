//! Columnar materialization of JSONL lines.
//!
//! Builders append parsed values straight from byte slices into typed
//! buffers; a row that fails mid-parse is rolled back by truncating every
//! builder to the row boundary and the line is skipped. Missing keys
//! null-pad their columns as the row completes, so no end-of-batch fill
//! pass runs over the data.

use memchr::memchr;
use tracing::debug;

use harrier_error::Result;
use harrier_pool::IntBuffer;
use harrier_types::{Batch, Column, ColumnData, ColumnType, ValidityBitmap};

use crate::scan::{parse_float, parse_int, scan_value, unescape, Fields, Lines, ValueClass};
use crate::schema::{infer_schema, JsonType};

/// Decoder construction parameters.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Lines sampled for schema inference.
    pub sample_lines: usize,
    /// Row bound per streamed batch.
    pub batch_rows: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            sample_lines: 25,
            batch_rows: 65_536,
        }
    }
}

/// One decoded batch plus its recovery bookkeeping.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub batch: Batch,
    /// Malformed lines skipped while producing this batch.
    pub lines_skipped: usize,
    /// Projected names absent from the inferred schema.
    pub unknown_columns: Vec<String>,
}

/// Schema-inferring columnar JSONL decoder.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    #[must_use]
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Decode the whole buffer into one batch.
    pub fn decode(&self, bytes: &[u8], projection: &[String]) -> Result<Decoded> {
        let unbounded = Self::new(DecoderConfig {
            sample_lines: self.config.sample_lines,
            batch_rows: usize::MAX,
        });
        let mut stream = unbounded.stream(bytes, projection);
        match stream.next() {
            Some(decoded) => decoded,
            None => {
                let unknown_columns = stream.unknown_columns.clone();
                Ok(Decoded {
                    batch: Batch::from_columns(Vec::new(), 0)?,
                    lines_skipped: 0,
                    unknown_columns,
                })
            }
        }
    }

    /// Produce a lazy sequence of bounded-row batches. Finite, and
    /// restartable only by rewinding the input buffer; yielded batches
    /// own their data.
    #[must_use]
    pub fn stream<'a>(&self, bytes: &'a [u8], projection: &[String]) -> DecodeBatches<'a> {
        let schema = infer_schema(bytes, self.config.sample_lines);
        let projected: Vec<(String, JsonType)> = if projection.is_empty() {
            schema.clone()
        } else {
            projection
                .iter()
                .filter_map(|name| {
                    schema
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(key, ty)| (key.clone(), ty.clone()))
                })
                .collect()
        };
        let unknown_columns: Vec<String> = projection
            .iter()
            .filter(|name| !schema.iter().any(|(key, _)| &key == name))
            .cloned()
            .collect();

        DecodeBatches {
            lines: Lines::new(bytes),
            projected,
            unknown_columns,
            batch_rows: self.config.batch_rows.max(1),
            done: false,
        }
    }
}

/// Streaming batch iterator returned by [`Decoder::stream`].
pub struct DecodeBatches<'a> {
    lines: Lines<'a>,
    projected: Vec<(String, JsonType)>,
    unknown_columns: Vec<String>,
    batch_rows: usize,
    done: bool,
}

impl Iterator for DecodeBatches<'_> {
    type Item = Result<Decoded>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut builders: Vec<ColumnBuilder> = self
            .projected
            .iter()
            .map(|(name, ty)| ColumnBuilder::new(name.clone(), ty))
            .collect();
        let mut rows = 0;
        let mut lines_skipped = 0;

        while rows < self.batch_rows {
            let Some(line) = self.lines.next() else {
                self.done = true;
                break;
            };
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match append_line(line, &mut builders) {
                Ok(()) => rows += 1,
                Err(()) => {
                    // Roll the partial row back and move to the next line.
                    for builder in &mut builders {
                        builder.truncate_to(rows);
                    }
                    lines_skipped += 1;
                    debug!(line_len = line.len(), "skipped malformed jsonl line");
                }
            }
        }

        if rows == 0 && lines_skipped == 0 && self.done {
            return None;
        }

        let columns: Result<Vec<Column>> =
            builders.into_iter().map(ColumnBuilder::finish).collect();
        let decoded = columns
            .and_then(|columns| Batch::from_columns(columns, rows))
            .map(|batch| Decoded {
                batch,
                lines_skipped,
                unknown_columns: self.unknown_columns.clone(),
            });
        Some(decoded)
    }
}

/// Decode with default parameters; the one-call convenience entry.
pub fn decode(bytes: &[u8], projection: &[String]) -> Result<Decoded> {
    Decoder::default().decode(bytes, projection)
}

/// Append one well-formed line to every builder, or report malformed.
fn append_line(line: &[u8], builders: &mut [ColumnBuilder]) -> std::result::Result<(), ()> {
    let mut written = vec![false; builders.len()];
    for field in Fields::new(line) {
        let field = field?;
        let slot = builders
            .iter()
            .enumerate()
            .find(|(idx, b)| !written[*idx] && b.matches_key(field.key))
            .map(|(idx, _)| idx);
        let Some(slot) = slot else {
            continue;
        };
        builders[slot].push_field(field.value, field.class)?;
        written[slot] = true;
    }
    for (slot, builder) in builders.iter_mut().enumerate() {
        if !written[slot] {
            builder.push_null();
        }
    }
    Ok(())
}

#[derive(Debug)]
enum BuilderData {
    Int64(IntBuffer),
    Float64(Vec<f64>),
    Bool(Vec<bool>),
    Utf8 { offsets: Vec<u32>, data: Vec<u8> },
    Struct { offsets: Vec<u32>, data: Vec<u8> },
    List {
        offsets: Vec<u32>,
        elem: ListElem,
    },
}

#[derive(Debug)]
enum ListElem {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Bool(Vec<bool>),
    Utf8 { offsets: Vec<u32>, data: Vec<u8> },
}

#[derive(Debug)]
struct ColumnBuilder {
    name: String,
    data: BuilderData,
    validity: ValidityBitmap,
}

impl ColumnBuilder {
    fn new(name: String, ty: &JsonType) -> Self {
        let data = match ty.column_type() {
            ColumnType::Int64 => BuilderData::Int64(IntBuffer::new()),
            ColumnType::Float64 => BuilderData::Float64(Vec::new()),
            ColumnType::Bool => BuilderData::Bool(Vec::new()),
            ColumnType::List(elem) => BuilderData::List {
                offsets: vec![0],
                elem: match *elem {
                    ColumnType::Int64 => ListElem::Int64(Vec::new()),
                    ColumnType::Float64 => ListElem::Float64(Vec::new()),
                    ColumnType::Bool => ListElem::Bool(Vec::new()),
                    _ => ListElem::Utf8 {
                        offsets: vec![0],
                        data: Vec::new(),
                    },
                },
            },
            ColumnType::Struct => BuilderData::Struct {
                offsets: vec![0],
                data: Vec::new(),
            },
            _ => BuilderData::Utf8 {
                offsets: vec![0],
                data: Vec::new(),
            },
        };
        Self {
            name,
            data,
            validity: ValidityBitmap::new_empty(),
        }
    }

    fn matches_key(&self, key: &[u8]) -> bool {
        if self.name.as_bytes() == key {
            return true;
        }
        // Keys containing escapes compare by their unescaped form, the
        // same form schema inference recorded.
        key.contains(&b'\\') && unescape(key).is_some_and(|k| k == self.name)
    }

    fn push_null(&mut self) {
        match &mut self.data {
            BuilderData::Int64(values) => values.append(0),
            BuilderData::Float64(values) => values.push(0.0),
            BuilderData::Bool(values) => values.push(false),
            BuilderData::Utf8 { offsets, .. } | BuilderData::Struct { offsets, .. } => {
                offsets.push(*offsets.last().unwrap_or(&0));
            }
            BuilderData::List { offsets, elem } => offsets.push(elem.len() as u32),
        }
        self.validity.push(false);
    }

    /// Parse one value span into the typed buffer. `Err` means the line
    /// is malformed relative to the inferred schema.
    fn push_field(&mut self, value: &[u8], class: ValueClass) -> std::result::Result<(), ()> {
        if class == ValueClass::Null {
            self.push_null();
            return Ok(());
        }
        match &mut self.data {
            BuilderData::Int64(values) => {
                if class != ValueClass::Number {
                    return Err(());
                }
                values.append(parse_int(value).ok_or(())?);
            }
            BuilderData::Float64(values) => {
                if class != ValueClass::Number {
                    return Err(());
                }
                values.push(parse_float(value).ok_or(())?);
            }
            BuilderData::Bool(values) => match class {
                ValueClass::True => values.push(true),
                ValueClass::False => values.push(false),
                _ => return Err(()),
            },
            BuilderData::Utf8 { offsets, data } => {
                push_string_span(offsets, data, value, class)?;
            }
            BuilderData::Struct { offsets, data } => {
                // Rendered representation: the raw span as scanned.
                data.extend_from_slice(value);
                offsets.push(data.len() as u32);
            }
            BuilderData::List { offsets, elem } => {
                if class != ValueClass::Array {
                    return Err(());
                }
                append_list_elements(elem, value)?;
                offsets.push(elem.len() as u32);
            }
        }
        self.validity.push(true);
        Ok(())
    }

    fn truncate_to(&mut self, rows: usize) {
        if self.validity.len() > rows {
            // Bitmaps only grow; rebuild on the rare rollback.
            let kept: Vec<bool> = (0..rows).map(|row| self.validity.is_valid(row)).collect();
            self.validity = ValidityBitmap::from_bools(&kept);
        }
        match &mut self.data {
            BuilderData::Int64(values) => values.truncate(rows),
            BuilderData::Float64(values) => values.truncate(rows),
            BuilderData::Bool(values) => values.truncate(rows),
            BuilderData::Utf8 { offsets, data } | BuilderData::Struct { offsets, data } => {
                offsets.truncate(rows + 1);
                data.truncate(*offsets.last().unwrap_or(&0) as usize);
            }
            BuilderData::List { offsets, elem } => {
                offsets.truncate(rows + 1);
                elem.truncate(*offsets.last().unwrap_or(&0) as usize);
            }
        }
    }

    fn finish(self) -> Result<Column> {
        let data = match self.data {
            BuilderData::Int64(values) => ColumnData::Int64(values.into_vec()),
            BuilderData::Float64(values) => ColumnData::Float64(values),
            BuilderData::Bool(values) => ColumnData::Bool(values),
            BuilderData::Utf8 { offsets, data } => ColumnData::Utf8 { offsets, data },
            BuilderData::Struct { offsets, data } => ColumnData::Struct { offsets, data },
            BuilderData::List { offsets, elem } => ColumnData::List {
                offsets,
                child: Box::new(match elem {
                    ListElem::Int64(values) => ColumnData::Int64(values),
                    ListElem::Float64(values) => ColumnData::Float64(values),
                    ListElem::Bool(values) => ColumnData::Bool(values),
                    ListElem::Utf8 { offsets, data } => ColumnData::Utf8 { offsets, data },
                }),
            },
        };
        Ok(Column {
            name: self.name,
            data,
            validity: self.validity,
        })
    }
}

impl ListElem {
    fn len(&self) -> usize {
        match self {
            Self::Int64(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Utf8 { offsets, .. } => offsets.len() - 1,
        }
    }

    fn truncate(&mut self, len: usize) {
        match self {
            Self::Int64(v) => v.truncate(len),
            Self::Float64(v) => v.truncate(len),
            Self::Bool(v) => v.truncate(len),
            Self::Utf8 { offsets, data } => {
                offsets.truncate(len + 1);
                data.truncate(*offsets.last().unwrap_or(&0) as usize);
            }
        }
    }

    fn push(&mut self, value: &[u8], class: ValueClass) -> std::result::Result<(), ()> {
        match self {
            Self::Int64(values) => {
                if class == ValueClass::Null {
                    values.push(0);
                    return Ok(());
                }
                if class != ValueClass::Number {
                    return Err(());
                }
                values.push(parse_int(value).ok_or(())?);
            }
            Self::Float64(values) => {
                if class == ValueClass::Null {
                    values.push(0.0);
                    return Ok(());
                }
                if class != ValueClass::Number {
                    return Err(());
                }
                values.push(parse_float(value).ok_or(())?);
            }
            Self::Bool(values) => match class {
                ValueClass::True => values.push(true),
                ValueClass::False => values.push(false),
                ValueClass::Null => values.push(false),
                _ => return Err(()),
            },
            Self::Utf8 { offsets, data } => {
                push_string_span(offsets, data, value, class)?;
            }
        }
        Ok(())
    }
}

/// Store a string span, unescaping only when an escape is present; any
/// non-string span is stored as its literal text (mixed-type columns
/// widen to strings).
fn push_string_span(
    offsets: &mut Vec<u32>,
    data: &mut Vec<u8>,
    value: &[u8],
    class: ValueClass,
) -> std::result::Result<(), ()> {
    if class == ValueClass::String && memchr(b'\\', value).is_some() {
        let unescaped = unescape(value).ok_or(())?;
        data.extend_from_slice(unescaped.as_bytes());
    } else {
        data.extend_from_slice(value);
    }
    offsets.push(data.len() as u32);
    Ok(())
}

/// Parse the elements of an array span (outer brackets included).
fn append_list_elements(elem: &mut ListElem, span: &[u8]) -> std::result::Result<(), ()> {
    let mut pos = 1;
    let end = span.len().saturating_sub(1);
    loop {
        while pos < end && span[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= end {
            return Ok(());
        }
        let (value, class, next) = scan_value(&span[..end], pos).ok_or(())?;
        elem.push(value, class)?;
        pos = next;
        while pos < end && span[pos].is_ascii_whitespace() {
            pos += 1;
        }
        match span.get(pos) {
            Some(b',') => pos += 1,
            Some(b']') | None => return Ok(()),
            _ if pos >= end => return Ok(()),
            _ => return Err(()),
        }
    }
}
