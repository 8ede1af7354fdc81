//! `RoostClient` builder and facade.
//!
//! This is the entry point for an app shell. It ties together the
//! layers: transport → session → caches → gate, all sharing one transport
//! and one clock.

use std::sync::Arc;

use roost_cache::{CacheConfig, EntityCache, EntityKind};
use roost_protocol::{Credentials, UserId};
use roost_session::{
    Clock, IdentitySource, KeyValueStore, Session, SessionConfig, SessionManager, SystemClock,
};
use roost_transport::Transport;

use crate::{Bookings, GateConfig, NavigationGate, Navigator, Place, Places, RoostError};

/// Builder for a [`RoostClient`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use roost::prelude::*;
///
/// let client = RoostClientBuilder::new(Arc::new(MemoryBackend::default()))
///     .clock(Arc::new(ManualClock::new(0)))
///     .build(Arc::new(MemoryStore::new()), Arc::new(RecordingNavigator::new()));
/// assert!(!client.is_authenticated());
/// ```
pub struct RoostClientBuilder<T: Transport> {
    transport: Arc<T>,
    clock: Arc<dyn Clock>,
    session_config: SessionConfig,
    places_config: CacheConfig,
    bookings_config: CacheConfig,
    gate_config: GateConfig,
}

impl<T: Transport> RoostClientBuilder<T> {
    /// Creates a builder with default settings and the system clock.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            clock: Arc::new(SystemClock),
            session_config: SessionConfig::default(),
            places_config: Places::cache_config(),
            bookings_config: Bookings::cache_config(),
            gate_config: GateConfig::default(),
        }
    }

    /// Sets the clock used for token expiry.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Overrides the places cache configuration.
    pub fn places_config(mut self, config: CacheConfig) -> Self {
        self.places_config = config;
        self
    }

    /// Overrides the bookings cache configuration.
    pub fn bookings_config(mut self, config: CacheConfig) -> Self {
        self.bookings_config = config;
        self
    }

    /// Sets the navigation gate configuration.
    pub fn gate_config(mut self, config: GateConfig) -> Self {
        self.gate_config = config;
        self
    }

    /// Builds the client over `store` (persisted session) and `navigator`
    /// (gate redirects).
    pub fn build<S: KeyValueStore, N: Navigator>(
        self,
        store: Arc<S>,
        navigator: Arc<N>,
    ) -> RoostClient<T, S, N> {
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&self.transport),
            store,
            self.clock,
            self.session_config,
        ));
        let identity: Arc<dyn IdentitySource> = sessions.clone();
        let places = EntityCache::with_config(
            Arc::clone(&self.transport),
            Arc::clone(&identity),
            self.places_config,
        );
        let bookings =
            EntityCache::with_config(self.transport, identity, self.bookings_config);
        let gate = NavigationGate::new(Arc::clone(&sessions), navigator, self.gate_config);

        RoostClient {
            sessions,
            places,
            bookings,
            gate,
        }
    }
}

/// One session, one places cache, one bookings cache and one gate.
pub struct RoostClient<T: Transport, S: KeyValueStore, N: Navigator> {
    sessions: Arc<SessionManager<T, S>>,
    places: EntityCache<Places, T>,
    bookings: EntityCache<Bookings, T>,
    gate: NavigationGate<T, S, N>,
}

impl<T, S, N> RoostClient<T, S, N>
where
    T: Transport,
    S: KeyValueStore,
    N: Navigator,
{
    pub fn sessions(&self) -> &Arc<SessionManager<T, S>> {
        &self.sessions
    }

    pub fn places(&self) -> &EntityCache<Places, T> {
        &self.places
    }

    pub fn bookings(&self) -> &EntityCache<Bookings, T> {
        &self.bookings
    }

    pub fn gate(&self) -> &NavigationGate<T, S, N> {
        &self.gate
    }

    pub fn is_authenticated(&self) -> bool {
        self.sessions.is_authenticated()
    }

    pub fn identity(&self) -> Option<UserId> {
        self.sessions.identity()
    }

    /// Logs in. Switching to a different user empties both caches.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, RoostError> {
        let previous = self.sessions.session().map(|s| s.identity);
        let session = self.sessions.login(credentials).await?;
        if previous.is_some_and(|p| p != session.identity) {
            self.clear_caches();
        }
        Ok(session)
    }

    /// Logs out and empties both caches.
    ///
    /// The caches are cleared only once the session is gone. `logout` may
    /// wait behind an in-flight login, and a refresh started during that
    /// wait still sees the old identity. Clearing afterwards drops its
    /// reply, and any later owner-scoped refresh is unauthenticated.
    pub async fn logout(&self) -> Result<(), RoostError> {
        let result = self.sessions.logout().await;
        self.clear_caches();
        Ok(result?)
    }

    pub async fn auto_resume(&self) -> Result<bool, RoostError> {
        Ok(self.sessions.auto_resume().await?)
    }

    /// Runs the gate for `route`. A denial also empties both caches.
    pub async fn can_enter(&self, route: &str) -> bool {
        let allowed = self.gate.can_enter(route).await;
        if !allowed {
            self.clear_caches();
        }
        allowed
    }

    /// Cached places the current user offers. Empty when logged out.
    pub fn offers(&self) -> Vec<Place> {
        match self.identity() {
            Some(identity) => self.places.owned_by(&identity),
            None => Vec::new(),
        }
    }

    /// Cached places the current user may book: everyone else's.
    pub fn bookable_places(&self) -> Vec<Place> {
        let identity = self.identity();
        self.places
            .items()
            .iter()
            .filter(|place| identity.as_ref().is_none_or(|id| place.is_bookable_by(id)))
            .cloned()
            .collect()
    }

    fn clear_caches(&self) {
        self.places.clear();
        self.bookings.clear();
    }
}
