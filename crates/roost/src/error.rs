//! Unified error type for Roost.

use roost_cache::CacheError;
use roost_protocol::ProtocolError;
use roost_session::SessionError;
use roost_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `roost` crate you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum RoostError {
    /// A transport-level error (unreachable, bad status).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, in-band rejection).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (credentials, storage, stale data).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A cache-level error (not found, busy, unauthenticated).
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl RoostError {
    /// `true` for errors that mean "log in again".
    pub fn needs_login(&self) -> bool {
        matches!(
            self,
            Self::Cache(CacheError::Unauthenticated)
                | Self::Session(SessionError::InvalidCredentials(_) | SessionError::StaleAuthData { .. })
        )
    }
}
