//! Error types for the session layer.

use roost_protocol::{ProtocolError, UserId};
use roost_transport::TransportError;

/// Errors that can occur during session management.
///
/// These cover the whole client-side lifecycle: logging in, persisting
/// the session, and resuming it on the next start.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The auth endpoint refused the credentials, either with a 4xx status
    /// or with an in-band error marker inside a `200`.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The auth endpoint could not be reached or answered with an
    /// unexpected status.
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    /// The reply could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Reading or writing the persisted session failed.
    #[error("session storage failed: {0}")]
    Storage(#[from] std::io::Error),

    /// A persisted session exists but its token has expired.
    /// `auto_resume` handles this locally by returning `false`.
    #[error("persisted session for {identity} expired at {expired_at}")]
    StaleAuthData { identity: UserId, expired_at: u64 },

    /// Nothing is persisted under the session key.
    #[error("no persisted session")]
    NoPersistedSession,
}
