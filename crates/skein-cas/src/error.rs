//! Error types for chunk encoding and manifest operations.

/// Errors that can occur while encoding, decoding or indexing chunks.
///
/// Every variant except [`CasError::Serialization`] on the write path means
/// the stored data cannot be trusted and is reported as a data integrity
/// failure by the engine.
#[derive(Debug, thiserror::Error)]
pub enum CasError {
    /// JSON encoding or decoding of an envelope or manifest failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The reassembled base64 text is not valid base64.
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A legacy chunk could not be base64-decoded on its own.
    #[error("legacy chunk {index} is not valid base64: {source}")]
    LegacyChunk {
        /// Index of the offending chunk.
        index: usize,
        /// Underlying decode error.
        source: base64::DecodeError,
    },

    /// The decoded bytes are not UTF-8.
    #[error("decoded payload is not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The decoded text is not a complete JSON document.
    #[error(
        "corrupt document: {decoded_len} chars decoded, last closing brace at {last_brace:?}: {reason}"
    )]
    CorruptDocument {
        /// Length of the decoded text.
        decoded_len: usize,
        /// Byte offset of the last `}` found, if any.
        last_brace: Option<usize>,
        /// Parser message.
        reason: String,
    },

    /// The number of chunk ids does not match the declared chunk count.
    #[error("chunk count mismatch: expected {expected}, found {found}")]
    ChunkCountMismatch {
        /// Declared chunk count.
        expected: u32,
        /// Number of ids actually present.
        found: usize,
    },
}
