//! # Roost
//!
//! Reactive entity cache and session lifecycle for a places-booking
//! client.
//!
//! Roost keeps one authenticated session (with expiry, persistence and
//! auto-resume) and in-memory caches of the remote `places` and
//! `bookings` collections that stay consistent across local writes,
//! confirmed remote writes and full refetches. A navigation gate decides
//! whether protected routes may be entered.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use roost::prelude::*;
//!
//! # async fn run() -> Result<(), RoostError> {
//! let client = RoostClientBuilder::new(Arc::new(MemoryBackend::default()))
//!     .build(Arc::new(FileStore::new("./data")), Arc::new(RecordingNavigator::new()));
//!
//! if !client.auto_resume().await? {
//!     client.login(&Credentials::new("ann@example.com", "secret")).await?;
//! }
//! let places = client.places().refresh().await?;
//! # let _ = places;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! - `roost-transport`: `fetch(request) -> response`, in-memory and HTTP
//! - `roost-protocol`: ids, payloads, codec, reply decoding
//! - `roost-session`: login, logout, persistence, auto-resume
//! - `roost-cache`: the generic entity cache

mod bookings;
mod client;
mod dates;
mod error;
mod gate;
mod logging;
mod places;

pub use bookings::{Booking, BookingPatch, BookingRecord, Bookings, NewBooking};
pub use client::{RoostClient, RoostClientBuilder};
pub use error::RoostError;
pub use gate::{GateConfig, NavigationGate, Navigator, RecordingNavigator};
pub use logging::init_logging;
pub use places::{DEFAULT_IMAGE_URL, NewPlace, Place, PlaceLocation, PlacePatch, PlaceRecord, Places};

pub use roost_cache as cache;
pub use roost_protocol as protocol;
pub use roost_session as session;
pub use roost_transport as transport;

pub mod prelude {
    //! Everything an app shell usually needs.

    pub use roost_cache::{
        CacheConfig, CacheError, CacheWatch, CreateHandle, EntityCache, EntityKind,
        OperationState, OwnerFilter, PendingCreate,
    };
    pub use roost_protocol::{Credentials, EntityId, UserId};
    pub use roost_session::{
        Clock, FileStore, IdentitySource, KeyValueStore, ManualClock, MemoryStore, Session,
        SessionConfig, SessionError, SessionManager, SessionWatch, SystemClock,
    };
    #[cfg(feature = "http")]
    pub use roost_transport::HttpTransport;
    pub use roost_transport::{BackendConfig, MemoryBackend, Transport, TransportError};

    pub use crate::{
        Booking, BookingPatch, Bookings, GateConfig, NavigationGate, Navigator, NewBooking,
        NewPlace, Place, PlaceLocation, PlacePatch, Places, RecordingNavigator, RoostClient,
        RoostClientBuilder, RoostError, init_logging,
    };
}
