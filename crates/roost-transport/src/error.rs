/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The remote could not be reached at all (offline, DNS, refused).
    #[error("remote unreachable: {0}")]
    Unreachable(String),

    /// The request was sent but failed before a response arrived.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The remote answered with a status outside the resource contract.
    #[error("unexpected status {0}")]
    BadStatus(u16),
}
