//! Error types for the cache layer.

use roost_protocol::{EntityId, ProtocolError};
use roost_transport::TransportError;

/// Errors that can occur during cache operations.
///
/// A failed operation never changes the cache's items.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Nobody is logged in, or the remote refused the token.
    #[error("not authenticated")]
    Unauthenticated,

    /// The entity doesn't exist (locally after a refresh, or remotely).
    #[error("entity {0} not found")]
    NotFound(EntityId),

    /// Another update or delete of this entity is still in flight.
    #[error("entity {0} already has a mutation in flight")]
    Busy(EntityId),

    /// The create was cancelled by a delete of its placeholder id before
    /// the remote confirmed it.
    #[error("create {0} was cancelled")]
    Cancelled(EntityId),

    /// The remote answered with the in-band error marker.
    #[error("remote rejected the operation: {0}")]
    Rejected(String),

    /// Transport failure or an unexpected status.
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    /// The payload couldn't be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl CacheError {
    /// Folds a reply error into the cache taxonomy. `id` is the entity the
    /// request addressed, if any, and turns a 404 into `NotFound`.
    pub(crate) fn from_reply(error: ProtocolError, id: Option<&EntityId>) -> Self {
        match (error, id) {
            (ProtocolError::Status(404), Some(id)) => Self::NotFound(id.clone()),
            (ProtocolError::Status(401 | 403), _) => Self::Unauthenticated,
            (ProtocolError::Status(status), _) => Self::Network(TransportError::BadStatus(status)),
            (ProtocolError::Rejected(detail), _) => Self::Rejected(detail),
            (other, _) => Self::Protocol(other),
        }
    }
}
