//! Error types for blob storage operations.

/// Errors that can occur while talking to a blob backend.
///
/// All of these are surfaced unmodified by the transfer pipeline; retrying
/// is the concern of the client implementation, not its callers.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A tag sidecar could not be encoded or decoded.
    #[error("tag encoding error: {0}")]
    Tags(#[from] serde_json::Error),

    /// The backend could not be reached or refused the request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the upload (e.g. it exceeds the write ceiling).
    #[error("upload rejected: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge {
        /// Size of the rejected body.
        size: usize,
        /// Largest body the backend accepts.
        limit: usize,
    },
}
