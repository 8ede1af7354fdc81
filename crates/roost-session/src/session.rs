//! Session types: the data structures that represent "who is logged in".
//!
//! A [`Session`] is the client's record of a successful login. It tracks:
//! - WHO the user is (`identity`, `email`)
//! - HOW to prove it (`token`)
//! - UNTIL WHEN the proof holds (`expires_at`)
//!
//! Validity is never stored. It is recomputed from the token and the
//! clock every time somebody asks, so it cannot drift from the expiry.

use std::time::Duration;

use roost_protocol::UserId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for the session manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Key of the persisted session record in the key-value store.
    pub storage_key: String,

    /// Path of the login endpoint.
    pub login_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_key: "authData".to_string(),
            login_path: "account/login".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An authenticated session.
///
/// Immutable once built: login and resume replace the whole value, they
/// never patch fields of the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Which user this session belongs to.
    pub identity: UserId,

    /// The email the user logged in with, when known.
    pub email: Option<String>,

    /// The credential presented to the remote.
    pub token: String,

    /// Expiry in milliseconds since the Unix epoch.
    pub expires_at: u64,
}

impl Session {
    /// `true` while the token is present and `now_millis < expires_at`.
    pub fn is_valid(&self, now_millis: u64) -> bool {
        !self.token.is_empty() && now_millis < self.expires_at
    }

    /// The token, but only while the session is valid.
    pub fn token_at(&self, now_millis: u64) -> Option<&str> {
        self.is_valid(now_millis).then_some(self.token.as_str())
    }

    /// Time left before expiry (zero once expired).
    pub fn remaining(&self, now_millis: u64) -> Duration {
        Duration::from_millis(self.expires_at.saturating_sub(now_millis))
    }
}

// ---------------------------------------------------------------------------
// PersistedSession
// ---------------------------------------------------------------------------

/// The JSON shape written to durable storage:
/// `{"identity": ..., "token": ..., "expiresAt": ..., "email": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub identity: UserId,
    pub token: String,
    pub expires_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<&Session> for PersistedSession {
    fn from(session: &Session) -> Self {
        Self {
            identity: session.identity.clone(),
            token: session.token.clone(),
            expires_at: session.expires_at,
            email: session.email.clone(),
        }
    }
}

impl From<PersistedSession> for Session {
    fn from(record: PersistedSession) -> Self {
        Self {
            identity: record.identity,
            email: record.email,
            token: record.token,
            expires_at: record.expires_at,
        }
    }
}
