//! Cache configuration and per-operation state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::CacheError;

// ---------------------------------------------------------------------------
// CacheConfig
// ---------------------------------------------------------------------------

/// Which slice of the remote collection a cache mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerFilter {
    /// Every entity, regardless of owner.
    All,
    /// Only entities owned by the identity that is logged in when the
    /// refresh starts.
    CurrentIdentity,
}

/// Configuration for an entity cache.
///
/// Entity kinds supply theirs through `EntityKind::cache_config()`; the
/// client builder can still override it per cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Resource name on the remote (`"places"` → `GET /places`).
    pub resource: String,

    /// Which entities a refresh asks for.
    pub owner_filter: OwnerFilter,

    /// Query parameter carrying the owner when filtering.
    pub owner_param: String,
}

impl CacheConfig {
    /// A config for `resource` with no owner filter.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Self::default()
        }
    }

    /// Same config, filtered to the current identity.
    pub fn owned(mut self) -> Self {
        self.owner_filter = OwnerFilter::CurrentIdentity;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            resource: "items".to_string(),
            owner_filter: OwnerFilter::All,
            owner_param: "owner".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// OperationState
// ---------------------------------------------------------------------------

/// Where a mutation is in its life.
///
/// ```text
/// Pending → Committed
///        ↘ Failed
/// ```
///
/// There are no retries: `Failed` is final. Only `Committed` ever touches
/// the cache's items.
#[derive(Debug, Clone)]
pub enum OperationState<E> {
    Pending,
    Committed(E),
    Failed(Arc<CacheError>),
}

impl<E> OperationState<E> {
    /// Returns `true` once the operation has either committed or failed.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// The committed value, if any.
    pub fn committed(&self) -> Option<&E> {
        match self {
            Self::Committed(value) => Some(value),
            _ => None,
        }
    }
}
