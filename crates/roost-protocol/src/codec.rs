//! Codec trait and implementations for serializing/deserializing payloads.
//!
//! The layers above never call `serde_json` directly: they hold a
//! [`Codec`] and let it turn request bodies into bytes and reply bytes
//! back into typed values.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the session manager and the caches
/// keep their codec for their whole lifetime and use it from spawned
/// tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ```rust
/// use roost_protocol::{Codec, JsonCodec, UserId};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&UserId::new("u1")).unwrap();
/// let decoded: UserId = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, UserId::new("u1"));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
