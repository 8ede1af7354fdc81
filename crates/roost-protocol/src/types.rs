//! Identity newtypes and the payloads that travel between client and
//! remote.
//!
//! Field names follow the remote's camelCase JSON, so most structs carry
//! `#[serde(rename_all = "camelCase")]`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The opaque id of an authenticated user.
///
/// Newtype over `String` so a user id can never be passed where an entity
/// id is expected. `#[serde(transparent)]` keeps it a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The id of a cached entity.
///
/// Server-assigned ids are opaque. Ids minted by the client for a create
/// that has not been confirmed yet start with [`EntityId::PLACEHOLDER_PREFIX`],
/// but the prefix is only a readability aid: whether an id is a
/// placeholder is decided by the cache that minted it, since nothing stops
/// the remote from issuing ids with the same prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Prefix of client-generated placeholder ids.
    pub const PLACEHOLDER_PREFIX: &'static str = "tmp-";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds a placeholder id from a random suffix.
    pub fn placeholder(suffix: &str) -> Self {
        Self(format!("{}{suffix}", Self::PLACEHOLDER_PREFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Auth payloads
// ---------------------------------------------------------------------------

/// Body of `POST /account/login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

// Hand-written so the password never ends up in a log line.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Successful reply of the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginReply {
    pub token: String,
    pub identity: UserId,
    #[serde(default)]
    pub email: Option<String>,
    /// Token lifetime. Servers send it as a number or as a numeric string.
    #[serde(deserialize_with = "seconds_from_number_or_string")]
    pub expires_in_seconds: u64,
}

fn seconds_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(u64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(n) => Ok(n),
        Seconds::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Mutation replies
// ---------------------------------------------------------------------------

/// Reply of `POST /{resource}`: the id the server assigned.
///
/// Older servers call the field `name`; both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedId {
    #[serde(alias = "name")]
    pub assigned_id: EntityId,
}

/// The in-band failure marker: `{"kind": "error", "detail": "..."}`.
///
/// Only deserializes when `kind` is literally `"error"`, so a success
/// payload that happens to carry some other `kind` is left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub kind: ErrorMarker,
    /// Some servers put the message in `localId`.
    #[serde(alias = "localId", default)]
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorMarker {
    #[serde(rename = "error")]
    Error,
}
