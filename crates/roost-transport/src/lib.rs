//! Transport abstraction layer for Roost.
//!
//! Everything above this crate talks to the remote through one call:
//! `fetch(request) -> response`. A [`Request`] names a resource path, a
//! [`Method`], optional query pairs and an optional body; a [`Response`]
//! is a status code plus raw bytes. What those bytes mean is the protocol
//! layer's business, not ours.
//!
//! # Feature Flags
//!
//! - `memory` (default): [`MemoryBackend`], an in-process implementation of
//!   the whole remote contract (auth endpoint plus collections)
//! - `http`: [`HttpTransport`] via `reqwest`

mod error;
#[cfg(feature = "http")]
mod http;
#[cfg(feature = "memory")]
mod memory;

pub use error::TransportError;
#[cfg(feature = "http")]
pub use http::HttpTransport;
#[cfg(feature = "memory")]
pub use memory::{BackendConfig, MemoryBackend};

use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// The HTTP-style verb of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// A single call to the remote.
///
/// `path` is relative and has no leading slash (`"places"`,
/// `"places/p1"`, `"account/login"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// Creates a request without query or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into().trim_start_matches('/').to_string(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Appends a query pair.
    pub fn with_query(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attaches an encoded body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Path segments, e.g. `["places", "p1"]`.
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Looks up a query value by key.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.method, self.path)?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

/// What came back from the remote: a status code and the raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// `true` for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs network calls against the remote.
///
/// The rest of the workspace never talks to a socket or an HTTP client
/// directly. It builds a [`Request`], hands it to a `Transport`, and reads
/// the [`Response`]. Swapping the in-memory backend for HTTP (or for a
/// test wrapper that holds replies back) changes nothing above this trait.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one transport is shared (behind an `Arc`)
///   by the session manager and every entity cache.
/// - The returned future is `Send` so operations can be moved into
///   spawned tasks and keep running after the caller stops listening.
///
/// # Status codes are not errors
///
/// A `404` or a `500` is still a response: the caller decides what it
/// means. Deleting something already gone is fine for the cache, while
/// the same status on a login is a failure. Only "no response at all"
/// (unreachable, timed out, connection dropped) is a [`TransportError`].
pub trait Transport: Send + Sync + 'static {
    /// Sends one request and waits for its response.
    ///
    /// A response with a non-2xx status is still `Ok`. Only failures to
    /// get a response at all are `Err`.
    fn fetch(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn fetch(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send {
        (**self).fetch(request)
    }
}
