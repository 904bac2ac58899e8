//! Schema inference over a JSONL sample prefix.
//!
//! The first S lines are scanned and every key's observed value types are
//! merged through a small lattice: `Null` is the identity, `Integer`
//! widens to `Double`, `Array` joined with `Object` is `Object`, and any
//! other mixture falls back to `String`. Array columns additionally sniff
//! an element type from the first non-whitespace byte after `[` and keep
//! it only while it stays consistent.

use harrier_types::ColumnType;

use crate::scan::{Fields, Lines, ValueClass};

/// Observed JSON value type for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Double,
    String,
    /// Element type, when consistently observed.
    Array(Option<Box<JsonType>>),
    Object,
}

impl JsonType {
    /// Join two observations in the inference lattice.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        use JsonType::{Array, Boolean, Double, Integer, Null, Object, String};
        match (self, other) {
            (Null, t) | (t, Null) => t,
            (Integer, Integer) => Integer,
            (Integer | Double, Integer | Double) => Double,
            (Boolean, Boolean) => Boolean,
            (String, String) => String,
            (Object, Object) | (Array(_), Object) | (Object, Array(_)) => Object,
            (Array(a), Array(b)) => Array(merge_elements(a, b)),
            _ => String,
        }
    }

    /// Column type this observation materializes as.
    ///
    /// Arrays of primitives become typed lists; arrays of unknown or
    /// nested element types and objects fall back to the rendered-string
    /// slow path. An all-null column materializes as nullable strings.
    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Null | Self::String => ColumnType::Utf8,
            Self::Boolean => ColumnType::Bool,
            Self::Integer => ColumnType::Int64,
            Self::Double => ColumnType::Float64,
            Self::Array(Some(elem)) => match elem.as_ref() {
                Self::Integer => ColumnType::List(Box::new(ColumnType::Int64)),
                Self::Double => ColumnType::List(Box::new(ColumnType::Float64)),
                Self::Boolean => ColumnType::List(Box::new(ColumnType::Bool)),
                Self::String => ColumnType::List(Box::new(ColumnType::Utf8)),
                _ => ColumnType::Struct,
            },
            Self::Array(None) | Self::Object => ColumnType::Struct,
        }
    }
}

fn merge_elements(a: Option<Box<JsonType>>, b: Option<Box<JsonType>>) -> Option<Box<JsonType>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(Box::new(a.merge(*b))),
        (Some(t), None) | (None, Some(t)) => Some(t),
        (None, None) => None,
    }
}

/// Classify a scanned value span into its observed type.
#[must_use]
pub fn classify(value: &[u8], class: ValueClass) -> JsonType {
    match class {
        ValueClass::Null => JsonType::Null,
        ValueClass::True | ValueClass::False => JsonType::Boolean,
        ValueClass::String => JsonType::String,
        ValueClass::Number => {
            if value
                .iter()
                .any(|b| matches!(b, b'.' | b'e' | b'E'))
            {
                JsonType::Double
            } else {
                JsonType::Integer
            }
        }
        ValueClass::Object => JsonType::Object,
        ValueClass::Array => JsonType::Array(sniff_element(value).map(Box::new)),
    }
}

/// Infer the element type of an array span from the first
/// non-whitespace byte after `[`.
fn sniff_element(span: &[u8]) -> Option<JsonType> {
    let inner = span.get(1..span.len().saturating_sub(1))?;
    let first = inner
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n'))?;
    match inner[first] {
        b'"' => Some(JsonType::String),
        b'{' => Some(JsonType::Object),
        b'[' => Some(JsonType::Array(None)),
        b't' | b'f' => Some(JsonType::Boolean),
        b'-' | b'+' | b'0'..=b'9' => {
            // Numeric element: double when the first element carries a
            // fractional or exponent marker.
            let element_end = inner[first..]
                .iter()
                .position(|b| matches!(b, b',' | b']'))
                .map_or(inner.len(), |p| first + p);
            if inner[first..element_end]
                .iter()
                .any(|b| matches!(b, b'.' | b'e' | b'E'))
            {
                Some(JsonType::Double)
            } else {
                Some(JsonType::Integer)
            }
        }
        _ => None,
    }
}

/// Infer a schema from the first `sample_lines` well-formed lines.
/// Keys appear in first-seen order; malformed lines are ignored here and
/// skipped again (and counted) during materialization.
#[must_use]
pub fn infer_schema(bytes: &[u8], sample_lines: usize) -> Vec<(String, JsonType)> {
    let mut order: Vec<String> = Vec::new();
    let mut types: std::collections::HashMap<String, JsonType> = std::collections::HashMap::new();
    let mut sampled = 0;

    for line in Lines::new(bytes) {
        if sampled >= sample_lines {
            break;
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let mut fields = Vec::new();
        let mut malformed = false;
        for field in Fields::new(line) {
            match field {
                Ok(field) => fields.push((key_string(field.key), classify(field.value, field.class))),
                Err(()) => {
                    malformed = true;
                    break;
                }
            }
        }
        if malformed {
            continue;
        }
        sampled += 1;
        for (key, observed) in fields {
            match types.get_mut(&key) {
                Some(existing) => {
                    let merged = existing.clone().merge(observed);
                    *existing = merged;
                }
                None => {
                    order.push(key.clone());
                    types.insert(key, observed);
                }
            }
        }
    }

    order
        .into_iter()
        .map(|key| {
            let ty = types[&key].clone();
            (key, ty)
        })
        .collect()
}

fn key_string(raw: &[u8]) -> String {
    if raw.contains(&b'\\') {
        crate::scan::unescape(raw).unwrap_or_else(|| String::from_utf8_lossy(raw).into_owned())
    } else {
        String::from_utf8_lossy(raw).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_identities() {
        assert_eq!(JsonType::Null.merge(JsonType::Integer), JsonType::Integer);
        assert_eq!(JsonType::Integer.merge(JsonType::Null), JsonType::Integer);
        assert_eq!(JsonType::Integer.merge(JsonType::Double), JsonType::Double);
        assert_eq!(JsonType::Double.merge(JsonType::Integer), JsonType::Double);
        assert_eq!(
            JsonType::Array(None).merge(JsonType::Object),
            JsonType::Object
        );
        assert_eq!(JsonType::Integer.merge(JsonType::String), JsonType::String);
        assert_eq!(JsonType::Boolean.merge(JsonType::Integer), JsonType::String);
    }

    #[test]
    fn infers_the_documented_three_line_sample() {
        let input = b"{\"a\":1,\"b\":\"x\"}\n{\"a\":2.5}\n{\"b\":\"y\",\"c\":true}\n";
        let schema = infer_schema(input, 25);
        assert_eq!(
            schema,
            vec![
                ("a".to_owned(), JsonType::Double),
                ("b".to_owned(), JsonType::String),
                ("c".to_owned(), JsonType::Boolean),
            ]
        );
    }

    #[test]
    fn sample_limit_bounds_inference() {
        let input = b"{\"a\":1}\n{\"a\":2}\n{\"a\":\"late surprise\"}\n";
        let schema = infer_schema(input, 2);
        assert_eq!(schema, vec![("a".to_owned(), JsonType::Integer)]);
    }

    #[test]
    fn array_element_sniffing() {
        assert_eq!(
            classify(b"[1, 2]", ValueClass::Array),
            JsonType::Array(Some(Box::new(JsonType::Integer)))
        );
        assert_eq!(
            classify(b"[1.5]", ValueClass::Array),
            JsonType::Array(Some(Box::new(JsonType::Double)))
        );
        assert_eq!(
            classify(b"[\"x\"]", ValueClass::Array),
            JsonType::Array(Some(Box::new(JsonType::String)))
        );
        assert_eq!(
            classify(b"[true]", ValueClass::Array),
            JsonType::Array(Some(Box::new(JsonType::Boolean)))
        );
        assert_eq!(
            classify(b"[{\"x\":1}]", ValueClass::Array),
            JsonType::Array(Some(Box::new(JsonType::Object)))
        );
        assert_eq!(classify(b"[]", ValueClass::Array), JsonType::Array(None));
    }

    #[test]
    fn inconsistent_elements_widen() {
        let a = classify(b"[1]", ValueClass::Array);
        let b = classify(b"[\"x\"]", ValueClass::Array);
        // Mixed int/string elements widen to string elements.
        assert_eq!(
            a.merge(b),
            JsonType::Array(Some(Box::new(JsonType::String)))
        );
    }

    #[test]
    fn malformed_sample_lines_are_ignored() {
        let input = b"{\"a\":1}\nnot json at all\n{\"a\":2}\n";
        let schema = infer_schema(input, 25);
        assert_eq!(schema, vec![("a".to_owned(), JsonType::Integer)]);
    }

    #[test]
    fn column_type_mapping() {
        use harrier_types::ColumnType;
        assert_eq!(JsonType::Integer.column_type(), ColumnType::Int64);
        assert_eq!(JsonType::Double.column_type(), ColumnType::Float64);
        assert_eq!(JsonType::Boolean.column_type(), ColumnType::Bool);
        assert_eq!(JsonType::String.column_type(), ColumnType::Utf8);
        assert_eq!(JsonType::Null.column_type(), ColumnType::Utf8);
        assert_eq!(JsonType::Object.column_type(), ColumnType::Struct);
        assert_eq!(
            JsonType::Array(Some(Box::new(JsonType::Integer))).column_type(),
            ColumnType::List(Box::new(ColumnType::Int64))
        );
        assert_eq!(JsonType::Array(None).column_type(), ColumnType::Struct);
    }
}
