//! Error types for MIME decoding.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
///
/// Only [`Error::EmptyMessage`], [`Error::DepthExceeded`] and
/// [`Error::TooManyParts`] are returned by [`crate::Message::parse`].
/// The remaining variants come from the lower-level helpers, whose
/// failures the message decoder absorbs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input held no header and no body octets.
    #[error("Empty message: no headers or body to decode")]
    EmptyMessage,

    /// Multipart nesting went past the configured ceiling.
    #[error("Multipart nesting exceeds the depth limit of {limit}")]
    DepthExceeded {
        /// Configured maximum depth.
        limit: usize,
    },

    /// The part tree grew past the configured node count.
    #[error("Message contains more than {limit} MIME parts")]
    TooManyParts {
        /// Configured maximum number of parts.
        limit: usize,
    },

    /// Date header could not be interpreted.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
