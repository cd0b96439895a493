//! Reassembly and decoding of chunk segments.
//!
//! Two encodings exist in stored data:
//!
//! - **Current**: the whole payload was base64-encoded once and the text was
//!   sliced. Decoding concatenates all segments and decodes once.
//! - **Legacy**: the raw payload was sliced first and every slice was
//!   base64-encoded on its own. Each segment must be decoded separately.
//!
//! Stored chunk sets carry no version marker. The legacy format is recognised
//! by the length of its first segment, which is always the base64 length of
//! a full raw slice ([`LEGACY_CHUNK_LEN`](skein_types::LEGACY_CHUNK_LEN)).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use crate::error::CasError;

/// Which historical encoding a chunk set uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkEncoding {
    /// One base64 transcoding per chunk.
    Legacy,
    /// One base64 transcoding for the whole payload.
    Current,
}

impl ChunkEncoding {
    /// Pick the decoder for a chunk set.
    ///
    /// Legacy iff the first segment is exactly `legacy_chunk_len` long.
    pub fn detect<S: AsRef<str>>(chunks: &[S], legacy_chunk_len: usize) -> Self {
        match chunks.first() {
            Some(first) if first.as_ref().len() == legacy_chunk_len => Self::Legacy,
            _ => Self::Current,
        }
    }
}

/// Concatenate segments in order and base64-decode once.
pub fn decode_current<S: AsRef<str>>(chunks: &[S]) -> Result<String, CasError> {
    let mut joined = String::new();
    for chunk in chunks {
        joined.push_str(chunk.as_ref());
    }
    let bytes = STANDARD.decode(joined.as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}

/// Base64-decode each segment on its own and concatenate the results.
///
/// Bytes are joined before UTF-8 validation, so a character that an old
/// writer split across two slices still decodes.
pub fn decode_legacy<S: AsRef<str>>(chunks: &[S]) -> Result<String, CasError> {
    let mut bytes = Vec::new();
    for (index, chunk) in chunks.iter().enumerate() {
        let piece = STANDARD
            .decode(chunk.as_ref().as_bytes())
            .map_err(|source| CasError::LegacyChunk { index, source })?;
        bytes.extend_from_slice(&piece);
    }
    Ok(String::from_utf8(bytes)?)
}

/// Check that `text` is one complete JSON document.
///
/// On failure the error carries the text length and the offset of the last
/// closing brace, which is usually enough to tell a truncated document from
/// garbage.
pub fn verify_json(text: &str) -> Result<(), CasError> {
    match serde_json::from_str::<serde::de::IgnoredAny>(text) {
        Ok(_) => Ok(()),
        Err(e) => {
            let last_brace = text.rfind('}');
            warn!(
                decoded_len = text.len(),
                ?last_brace,
                error = %e,
                "reassembled document is not valid json"
            );
            Err(CasError::CorruptDocument {
                decoded_len: text.len(),
                last_brace,
                reason: e.to_string(),
            })
        }
    }
}

/// Detect the encoding, decode, and verify the document.
///
/// Returns the decoded text together with the encoding that was used.
pub fn decode_chunks<S: AsRef<str>>(
    chunks: &[S],
    legacy_chunk_len: usize,
) -> Result<(String, ChunkEncoding), CasError> {
    let encoding = ChunkEncoding::detect(chunks, legacy_chunk_len);
    let text = match encoding {
        ChunkEncoding::Legacy => decode_legacy(chunks)?,
        ChunkEncoding::Current => decode_current(chunks)?,
    };
    debug!(?encoding, chunks = chunks.len(), decoded_len = text.len(), "decoded chunk set");
    verify_json(&text)?;
    Ok((text, encoding))
}

#[cfg(test)]
mod tests {
    use skein_types::{LEGACY_CHUNK_LEN, LEGACY_RAW_SLICE_LEN};

    use super::*;
    use crate::chunker::{Chunker, split_legacy};

    /// Deterministic JSON document of roughly `len` characters.
    fn json_doc(len: usize) -> String {
        let mut body = String::with_capacity(len);
        let mut state: u32 = 0xC0FF_EE00;
        while body.len() + 11 < len {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            body.push(char::from(b'a' + ((state >> 16) % 26) as u8));
        }
        format!(r#"{{"data":"{body}"}}"#)
    }

    #[test]
    fn test_current_roundtrip() {
        let payload = json_doc(5_000);
        let chunks = Chunker::new(700).split(&payload);
        let (decoded, encoding) = decode_chunks(&chunks, LEGACY_CHUNK_LEN).unwrap();
        assert_eq!(encoding, ChunkEncoding::Current);
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_legacy_roundtrip() {
        let payload = json_doc(LEGACY_RAW_SLICE_LEN * 2 + 777);
        let chunks = split_legacy(&payload, LEGACY_RAW_SLICE_LEN);
        assert_eq!(chunks.len(), 3);

        let (decoded, encoding) = decode_chunks(&chunks, LEGACY_CHUNK_LEN).unwrap();
        assert_eq!(encoding, ChunkEncoding::Legacy);
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_legacy_roundtrip_multibyte() {
        let payload = format!(r#"{{"name":"{}"}}"#, "日本語テキスト".repeat(40));
        let chunks = split_legacy(&payload, 31);
        assert_eq!(decode_legacy(&chunks).unwrap(), payload);
    }

    #[test]
    fn test_130k_document_scenario() {
        let payload = json_doc(130_000);
        assert_eq!(payload.len(), 130_000);

        let chunks = Chunker::new(51_200).split(&payload);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks.iter().map(String::len).sum::<usize>(), 173_336);

        let (decoded, encoding) = decode_chunks(&chunks, LEGACY_CHUNK_LEN).unwrap();
        assert_eq!(encoding, ChunkEncoding::Current);
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_single_legacy_length_chunk_selects_legacy() {
        // Exactly one full raw slice: a single chunk of the legacy length.
        let payload = json_doc(LEGACY_RAW_SLICE_LEN);
        assert_eq!(payload.len(), LEGACY_RAW_SLICE_LEN);
        let chunks = split_legacy(&payload, LEGACY_RAW_SLICE_LEN);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), LEGACY_CHUNK_LEN);

        assert_eq!(
            ChunkEncoding::detect(&chunks, LEGACY_CHUNK_LEN),
            ChunkEncoding::Legacy
        );
        let (decoded, encoding) = decode_chunks(&chunks, LEGACY_CHUNK_LEN).unwrap();
        assert_eq!(encoding, ChunkEncoding::Legacy);
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_detect_defaults_to_current() {
        let empty: [&str; 0] = [];
        assert_eq!(
            ChunkEncoding::detect(&empty, LEGACY_CHUNK_LEN),
            ChunkEncoding::Current
        );
        assert_eq!(
            ChunkEncoding::detect(&["abcd"], LEGACY_CHUNK_LEN),
            ChunkEncoding::Current
        );
    }

    #[test]
    fn test_wrong_branch_surfaces_as_error() {
        // Legacy chunks decoded with the current decoder: padding mid-stream.
        let payload = json_doc(200);
        let chunks = split_legacy(&payload, 50);
        assert!(decode_current(&chunks).is_err());
    }

    #[test]
    fn test_truncated_document_is_rejected() {
        let payload = json_doc(3_000);
        let mut chunks = Chunker::new(400).split(&payload);
        chunks.pop();
        // Keep whole base64 groups so only the json check can fail.
        let mut joined: String = chunks.concat();
        joined.truncate(joined.len() / 4 * 4);

        let err = decode_chunks(&[joined], LEGACY_CHUNK_LEN).unwrap_err();
        match err {
            CasError::CorruptDocument { decoded_len, .. } => assert!(decoded_len < 3_000),
            other => panic!("expected CorruptDocument, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_json_reports_last_brace() {
        let err = verify_json(r#"{"a":{"b":1}"#).unwrap_err();
        match err {
            CasError::CorruptDocument {
                decoded_len,
                last_brace,
                ..
            } => {
                assert_eq!(decoded_len, 12);
                assert_eq!(last_brace, Some(11));
            }
            other => panic!("expected CorruptDocument, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(matches!(
            decode_current(&["!!!!"]).unwrap_err(),
            CasError::Base64(_)
        ));
        assert!(matches!(
            decode_legacy(&["Zm9v", "!!"]).unwrap_err(),
            CasError::LegacyChunk { index: 1, .. }
        ));
    }
}
