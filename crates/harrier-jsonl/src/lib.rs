//! Streaming columnar JSONL decoder.
//!
//! Converts a byte buffer of newline-delimited JSON objects into columnar
//! batches in two phases: schema inference over a sample prefix, then
//! columnar materialization that parses primitive values directly from
//! their byte slices into typed buffers. Only projected columns are
//! materialized; malformed lines are skipped and counted, never fatal.

pub mod decode;
pub mod scan;
pub mod schema;

pub use decode::{decode, DecodeBatches, Decoded, Decoder, DecoderConfig};
pub use schema::{infer_schema, JsonType};
