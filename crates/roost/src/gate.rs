//! The navigation gate: the check run before entering a protected section.
//!
//! A gate decides once per navigation attempt. It never waits for a later
//! session change: if the session isn't valid now and can't be resumed
//! now, entry is denied and the user is sent to the login route.

use std::sync::{Arc, Mutex, PoisonError};

use roost_session::{KeyValueStore, SessionManager};
use roost_transport::Transport;
use serde::{Deserialize, Serialize};

/// Performs redirects on behalf of the gate.
pub trait Navigator: Send + Sync + 'static {
    fn redirect(&self, route: &str);
}

/// Remembers redirects instead of performing them. Useful headless.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every redirect so far, oldest first.
    pub fn redirects(&self) -> Vec<String> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, route: &str) {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route.to_string());
    }
}

// ---------------------------------------------------------------------------
// GateConfig
// ---------------------------------------------------------------------------

/// Configuration for a navigation gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Route prefixes that need a session. A prefix matches itself and
    /// anything below it (`/places` matches `/places/p1`, not `/placesx`).
    pub protected_prefixes: Vec<String>,

    /// Where denied navigations are sent.
    pub login_route: String,

    /// Log out (deleting the persisted record) when a resume fails.
    pub purge_stale: bool,
}

impl GateConfig {
    /// `true` if entering `route` needs a session.
    pub fn is_protected(&self, route: &str) -> bool {
        let path = route.split(['?', '#']).next().unwrap_or_default();
        self.protected_prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            protected_prefixes: vec!["/places".to_string(), "/bookings".to_string()],
            login_route: "/auth".to_string(),
            purge_stale: true,
        }
    }
}

// ---------------------------------------------------------------------------
// NavigationGate
// ---------------------------------------------------------------------------

/// Guards protected routes.
///
/// ```text
/// unprotected route ───────────────────────────→ allow
/// authenticated ───────────────────────────────→ allow
/// not authenticated → auto_resume() ─ true ────→ allow
///                                  └ false/err → (purge) → redirect → deny
/// ```
pub struct NavigationGate<T: Transport, S: KeyValueStore, N: Navigator> {
    sessions: Arc<SessionManager<T, S>>,
    navigator: Arc<N>,
    config: GateConfig,
}

impl<T: Transport, S: KeyValueStore, N: Navigator> NavigationGate<T, S, N> {
    pub fn new(sessions: Arc<SessionManager<T, S>>, navigator: Arc<N>, config: GateConfig) -> Self {
        Self {
            sessions,
            navigator,
            config,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn navigator(&self) -> &Arc<N> {
        &self.navigator
    }

    /// Decides whether `route` may be entered. Redirects exactly once on
    /// denial.
    pub async fn can_enter(&self, route: &str) -> bool {
        if !self.config.is_protected(route) {
            return true;
        }
        if self.sessions.is_authenticated() {
            return true;
        }

        let resumed = match self.sessions.auto_resume().await {
            Ok(resumed) => resumed,
            Err(e) => {
                tracing::warn!(%route, error = %e, "resume failed");
                false
            }
        };
        if resumed {
            tracing::debug!(%route, "entry allowed after resume");
            return true;
        }

        if self.config.purge_stale {
            if let Err(e) = self.sessions.logout().await {
                tracing::warn!(error = %e, "could not purge stale session");
            }
        }

        tracing::info!(%route, login_route = %self.config.login_route, "entry denied");
        self.navigator.redirect(&self.config.login_route);
        false
    }
}
