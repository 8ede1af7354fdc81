//! Reactive entity caches for Roost.
//!
//! Each cache mirrors one remote collection in memory and keeps it
//! consistent across local writes, confirmed remote writes and full
//! refetches.
//!
//! # Key types
//!
//! - [`EntityKind`]: the trait each kind of entity implements
//! - [`EntityCache`]: the cache: refresh, create, update, delete, get
//! - [`PendingCreate`]: a create with a placeholder id, not yet sent
//! - [`CreateHandle`]: a create running on its own task
//! - [`CacheWatch`]: a scoped subscription to the items
//! - [`CacheConfig`]: resource name and owner filter

mod cache;
mod config;
mod error;
mod kind;
mod pending;

pub use cache::{CacheWatch, EntityCache, Snapshot};
pub use config::{CacheConfig, OperationState, OwnerFilter};
pub use error::CacheError;
pub use kind::EntityKind;
pub use pending::{CreateHandle, PendingCreate};
