//! Chunk encoding, splitting, and manifest building.
//!
//! This crate provides:
//! - [`Chunker`]: base64-encodes a payload once and slices it into
//!   fixed-length segments.
//! - [`decode_chunks`]: reassembles segments in either historical encoding
//!   ([`ChunkEncoding`]) and verifies the result is a JSON document.
//! - [`rolling_hash`]: the cheap content fingerprint that gates upload resume.
//! - [`ChunkEnvelope`]: the JSON body each chunk is uploaded as.
//! - [`build_manifest`]: constructs the ordered [`Manifest`](skein_types::Manifest)
//!   of a chunk set.

mod chunker;
mod codec;
mod envelope;
mod error;
mod hash;
mod manifest;

pub use chunker::{Chunker, chunk_count, encode_payload, split_legacy};
pub use codec::{ChunkEncoding, decode_chunks, decode_current, decode_legacy, verify_json};
pub use envelope::{ChunkEnvelope, envelope_segment};
pub use error::CasError;
pub use hash::rolling_hash;
pub use manifest::{
    build_manifest, build_manifest_with_timestamp, deserialize_manifest, serialize_manifest,
};
