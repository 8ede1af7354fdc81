//! The read-only identity seam between the session layer and its
//! consumers.
//!
//! Entity caches need to know who is logged in, to stamp the owner on a
//! new entity, or to scope a listing to "mine", but they must not be able
//! to log anyone in or out. [`IdentitySource`] is the one question they
//! are allowed to ask.

use roost_protocol::UserId;

/// Answers "who is authenticated right now?".
///
/// Synchronous on purpose: a create resolves its owner once, at call
/// time, and a later identity change must not reach into an operation
/// that is already in flight.
///
/// # Example
///
/// ```rust
/// use roost_protocol::UserId;
/// use roost_session::IdentitySource;
///
/// /// Always the same user. Handy in tests.
/// struct Fixed(UserId);
///
/// impl IdentitySource for Fixed {
///     fn current_identity(&self) -> Option<UserId> {
///         Some(self.0.clone())
///     }
/// }
///
/// assert_eq!(Fixed(UserId::new("u1")).current_identity(), Some(UserId::new("u1")));
/// ```
pub trait IdentitySource: Send + Sync + 'static {
    /// The identity of the current valid session, or `None` when nobody
    /// is logged in or the token has expired.
    fn current_identity(&self) -> Option<UserId>;
}
