//! Error types for the protocol layer.

/// Errors that can occur while encoding requests or reading replies.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing required fields,
    /// or a shape that doesn't match the expected type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The remote answered with a non-2xx status.
    #[error("remote answered with status {0}")]
    Status(u16),

    /// The remote answered 2xx but the body carried the in-band
    /// `{"kind":"error"}` marker.
    #[error("remote rejected the request: {0}")]
    Rejected(String),
}
