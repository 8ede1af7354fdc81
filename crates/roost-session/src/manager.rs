//! The session manager: the single owner of "who is logged in".
//!
//! It's responsible for:
//! - Logging in against the auth endpoint
//! - Persisting the session so the next start can resume it
//! - Resuming a persisted session if it hasn't expired
//! - Logging out (in memory and on disk)
//! - Publishing every change to subscribers
//!
//! # Concurrency note
//!
//! The current session lives in a `tokio::sync::watch` channel: every
//! change replaces the whole value, so a subscriber never sees half of a
//! session. Login, logout and resume additionally take a lifecycle lock
//! for their whole duration, which totally orders them. A logout issued
//! while a login is in flight runs after it, and cannot be undone by the
//! login's late persist.

use std::sync::Arc;

use roost_protocol::{Codec, Credentials, JsonCodec, LoginReply, ProtocolError, UserId, read_reply};
use roost_transport::{Method, Request, Transport, TransportError};
use tokio::sync::{Mutex, watch};

use crate::{Clock, IdentitySource, KeyValueStore, PersistedSession, Session, SessionConfig, SessionError};

/// Owns the authenticated session.
///
/// ## Lifecycle
///
/// ```text
///   login() ─────────┐
///                    ▼
///   auto_resume() ─→ [Some(Session)] ──(time passes)──→ invalid by value
///        │                 │
///        ▼                 ▼ logout()
///      false            [None]
/// ```
pub struct SessionManager<T: Transport, S: KeyValueStore> {
    transport: Arc<T>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    codec: JsonCodec,
    config: SessionConfig,

    /// The latest published session. `None` means logged out.
    current: watch::Sender<Option<Session>>,

    /// Held for the whole of login/logout/auto_resume.
    lifecycle: Mutex<()>,
}

impl<T: Transport, S: KeyValueStore> SessionManager<T, S> {
    /// Creates a logged-out manager.
    pub fn new(
        transport: Arc<T>,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            store,
            clock,
            codec: JsonCodec,
            config,
            current: watch::Sender::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    /// Logs in with email and password.
    ///
    /// On success the session is persisted first and published second; if
    /// persisting fails nothing is published and the error is returned.
    ///
    /// # Errors
    /// - [`SessionError::InvalidCredentials`]: refused with a 4xx, or with
    ///   an in-band error marker inside a `200`
    /// - [`SessionError::Network`]: unreachable, or an unexpected status
    /// - [`SessionError::Protocol`]: the reply didn't decode
    /// - [`SessionError::Storage`]: the session couldn't be persisted
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, SessionError> {
        let _lifecycle = self.lifecycle.lock().await;

        let body = self.codec.encode(credentials)?;
        let request = Request::new(Method::Post, &self.config.login_path).with_body(body);
        let response = self.transport.fetch(request).await?;

        let reply: LoginReply = read_reply(&self.codec, &response).map_err(|e| match e {
            ProtocolError::Rejected(detail) => SessionError::InvalidCredentials(detail),
            ProtocolError::Status(status @ (400 | 401 | 403)) => {
                SessionError::InvalidCredentials(format!("login refused with status {status}"))
            }
            ProtocolError::Status(status) => {
                SessionError::Network(TransportError::BadStatus(status))
            }
            other => SessionError::Protocol(other),
        })?;

        if reply.token.is_empty() {
            return Err(SessionError::InvalidCredentials("empty token".into()));
        }

        let now = self.clock.now_millis();
        let session = Session {
            identity: reply.identity,
            email: reply.email.or_else(|| Some(credentials.email.clone())),
            token: reply.token,
            expires_at: now.saturating_add(reply.expires_in_seconds.saturating_mul(1000)),
        };

        self.persist(&session).await?;
        self.current.send_replace(Some(session.clone()));

        tracing::info!(
            identity = %session.identity,
            expires_at = session.expires_at,
            "logged in"
        );
        Ok(session)
    }

    /// Clears the session in memory and deletes the persisted copy.
    ///
    /// Never touches the network. The in-memory session is cleared even
    /// if deleting the persisted copy fails.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let _lifecycle = self.lifecycle.lock().await;

        let previous = self.current.send_replace(None);
        self.store.remove(&self.config.storage_key).await?;

        match previous {
            Some(session) => tracing::info!(identity = %session.identity, "logged out"),
            None => tracing::debug!("logout without a session"),
        }
        Ok(())
    }

    /// Tries to restore a persisted session.
    ///
    /// Returns `Ok(true)` if a valid session was restored and published.
    /// A missing, expired or unreadable record returns `Ok(false)` and
    /// leaves storage untouched; callers that want it gone follow up with
    /// [`logout`](Self::logout).
    ///
    /// # Errors
    /// Only [`SessionError::Storage`]: the store itself failed.
    pub async fn auto_resume(&self) -> Result<bool, SessionError> {
        let _lifecycle = self.lifecycle.lock().await;

        match self.restore().await {
            Ok(session) => {
                tracing::info!(identity = %session.identity, "session resumed");
                self.current.send_replace(Some(session));
                Ok(true)
            }
            Err(SessionError::NoPersistedSession) => Ok(false),
            Err(e @ SessionError::StaleAuthData { .. }) => {
                tracing::info!(error = %e, "not resuming");
                Ok(false)
            }
            Err(SessionError::Protocol(e)) => {
                tracing::warn!(error = %e, "persisted session is unreadable");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// `true` iff the latest session is valid right now.
    pub fn is_authenticated(&self) -> bool {
        let now = self.clock.now_millis();
        self.current.borrow().as_ref().is_some_and(|s| s.is_valid(now))
    }

    /// The identity of the latest session, while it is valid.
    pub fn identity(&self) -> Option<UserId> {
        let now = self.clock.now_millis();
        self.current
            .borrow()
            .as_ref()
            .filter(|s| s.is_valid(now))
            .map(|s| s.identity.clone())
    }

    /// The token of the latest session, while it is valid.
    pub fn token(&self) -> Option<String> {
        let now = self.clock.now_millis();
        self.current
            .borrow()
            .as_ref()
            .and_then(|s| s.token_at(now))
            .map(str::to_string)
    }

    /// The latest published session, valid or not.
    pub fn session(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    /// Subscribes to session changes.
    ///
    /// The handle is the subscription: drop it to unsubscribe.
    pub fn subscribe(&self) -> SessionWatch {
        SessionWatch {
            rx: self.current.subscribe(),
            clock: Arc::clone(&self.clock),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    async fn persist(&self, session: &Session) -> Result<(), SessionError> {
        let bytes = self.codec.encode(&PersistedSession::from(session))?;
        let value = String::from_utf8_lossy(&bytes);
        self.store.set(&self.config.storage_key, &value).await?;
        Ok(())
    }

    /// Reads and validates the persisted record without publishing it.
    async fn restore(&self) -> Result<Session, SessionError> {
        let raw = self
            .store
            .get(&self.config.storage_key)
            .await?
            .ok_or(SessionError::NoPersistedSession)?;

        let record: PersistedSession = self.codec.decode(raw.as_bytes())?;
        let session = Session::from(record);

        if !session.is_valid(self.clock.now_millis()) {
            return Err(SessionError::StaleAuthData {
                identity: session.identity,
                expired_at: session.expires_at,
            });
        }
        Ok(session)
    }
}

impl<T: Transport, S: KeyValueStore> IdentitySource for SessionManager<T, S> {
    fn current_identity(&self) -> Option<UserId> {
        self.identity()
    }
}

// ---------------------------------------------------------------------------
// SessionWatch
// ---------------------------------------------------------------------------

/// A scoped subscription to the session.
///
/// Reads evaluate validity against the clock at read time, so an expired
/// token reads as unauthenticated even if nothing was published since.
pub struct SessionWatch {
    rx: watch::Receiver<Option<Session>>,
    clock: Arc<dyn Clock>,
}

impl SessionWatch {
    /// The latest published session, valid or not.
    pub fn session(&self) -> Option<Session> {
        self.rx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        let now = self.clock.now_millis();
        self.rx.borrow().as_ref().is_some_and(|s| s.is_valid(now))
    }

    pub fn identity(&self) -> Option<UserId> {
        let now = self.clock.now_millis();
        self.rx
            .borrow()
            .as_ref()
            .filter(|s| s.is_valid(now))
            .map(|s| s.identity.clone())
    }

    /// Waits for the next publish. Returns `false` once the manager is
    /// gone and nothing more will ever be published.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
