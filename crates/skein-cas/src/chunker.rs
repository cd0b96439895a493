//! Fixed-length chunker over a single base64 transcoding of the payload.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Base64-encode the whole payload once.
pub fn encode_payload(payload: &str) -> String {
    STANDARD.encode(payload.as_bytes())
}

/// Number of segments `encoded_len` characters split into.
pub fn chunk_count(encoded_len: usize, chunk_size: usize) -> usize {
    encoded_len.div_ceil(chunk_size.max(1))
}

/// Splits payloads into fixed-length base64 segments.
///
/// The payload is transcoded to base64 exactly once and the resulting ASCII
/// text is sliced, so a multi-byte character can never be severed. The last
/// segment may be shorter than `chunk_size`; an empty payload produces no
/// segments.
pub struct Chunker {
    chunk_size: usize,
}

impl Chunker {
    /// Create a chunker producing segments of `chunk_size` base64 characters.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Segment length in base64 characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Encode and split a payload.
    pub fn split(&self, payload: &str) -> Vec<String> {
        self.split_encoded(&encode_payload(payload))
    }

    /// Split text that is already base64-encoded.
    pub fn split_encoded(&self, encoded: &str) -> Vec<String> {
        // Base64 is pure ASCII, so every byte offset is a char boundary.
        encoded
            .as_bytes()
            .chunks(self.chunk_size)
            .map(|segment| String::from_utf8_lossy(segment).into_owned())
            .collect()
    }
}

/// Produce the historical chunk encoding.
///
/// The raw payload is cut into pieces of at most `raw_slice_len` bytes and
/// each piece is base64-encoded on its own. Cuts are moved back to the
/// nearest character boundary so every piece is valid UTF-8.
pub fn split_legacy(payload: &str, raw_slice_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = payload;

    while !rest.is_empty() {
        let mut cut = rest.len().min(raw_slice_len.max(1));
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            // Slice shorter than one character: emit the whole character.
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (piece, tail) = rest.split_at(cut);
        chunks.push(encode_payload(piece));
        rest = tail;
    }

    chunks
}
