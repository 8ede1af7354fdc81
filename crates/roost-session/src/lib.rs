//! Authenticated session lifecycle for Roost.
//!
//! This crate owns the answer to "who is logged in":
//!
//! 1. **Login**: trading credentials for a token ([`SessionManager::login`])
//! 2. **Persistence**: keeping the session in a [`KeyValueStore`] so the
//!    next start can pick it up
//! 3. **Auto-resume**: restoring a persisted session if it hasn't expired
//!    ([`SessionManager::auto_resume`])
//! 4. **Publishing**: every change is pushed to [`SessionWatch`] handles
//!
//! # How it fits in the stack
//!
//! ```text
//! Cache Layer (above)  ← asks "who is logged in?" via IdentitySource
//!     ↕
//! Session Layer (this crate)  ← owns the token and its expiry
//!     ↕
//! Protocol Layer (below)  ← provides UserId, Credentials, LoginReply
//! ```

mod auth;
mod clock;
mod error;
mod manager;
mod session;
mod store;

pub use auth::IdentitySource;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use manager::{SessionManager, SessionWatch};
pub use session::{PersistedSession, Session, SessionConfig};
pub use store::{FileStore, KeyValueStore, MemoryStore};
