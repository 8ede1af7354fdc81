//! The entity cache: an in-memory mirror of one remote collection.
//!
//! It's responsible for:
//! - Holding the last known list and publishing every change
//! - Running create/update/delete against the remote and merging the
//!   confirmed result into the list ("reconciliation")
//! - Refetching the whole list on demand
//! - Guarding against two mutations of the same entity at once
//!
//! # Concurrency note
//!
//! The list lives in a `tokio::sync::watch` channel as an immutable
//! `Arc<Vec<_>>` snapshot; every change publishes a new snapshot. All
//! changes to the list happen while holding the ledger lock, so the
//! ledger (pending creates, in-flight ids) and the list never disagree.
//! The lock is a `std::sync::Mutex` and is never held across an `.await`.
//!
//! Every reconciliation is stamped with the generation it started in.
//! [`EntityCache::clear`] bumps the generation, so a reply that arrives
//! after a logout cannot put a previous user's data back.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use roost_protocol::{Codec, Collection, EntityId, JsonCodec, UserId, read_reply};
use roost_session::IdentitySource;
use roost_transport::{Method, Request, Transport};
use serde::de::IgnoredAny;
use tokio::sync::watch;

use crate::{CacheConfig, CacheError, EntityKind, OwnerFilter, PendingCreate};

/// An immutable snapshot of a cache's items.
pub type Snapshot<E> = Arc<Vec<E>>;

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

pub(crate) enum CreateState {
    InFlight,
    /// A delete arrived for the placeholder before the remote confirmed.
    Cancelled,
}

#[derive(Default)]
pub(crate) struct Ledger {
    /// Pending creates, keyed by placeholder id.
    pub(crate) creates: HashMap<EntityId, CreateState>,

    /// Placeholder id → server-assigned id, for confirmed creates whose
    /// entity is still in the items. Pruned on delete and on refresh.
    pub(crate) confirmed: HashMap<EntityId, EntityId>,

    /// Ids with an update or delete in flight.
    pub(crate) in_flight: HashSet<EntityId>,
}

pub(crate) struct Inner<K: EntityKind, T: Transport> {
    pub(crate) transport: Arc<T>,
    pub(crate) identity: Arc<dyn IdentitySource>,
    pub(crate) codec: JsonCodec,
    pub(crate) config: CacheConfig,
    pub(crate) items: watch::Sender<Snapshot<K::Entity>>,
    /// Set by the first successful refresh, reset by `clear`.
    pub(crate) baseline: AtomicBool,
    pub(crate) generation: AtomicU64,
    pub(crate) ledger: Mutex<Ledger>,
}

impl<K: EntityKind, T: Transport> Inner<K, T> {
    pub(crate) fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// `resource` or `resource/id`.
    pub(crate) fn path(&self, id: Option<&EntityId>) -> String {
        match id {
            Some(id) => format!("{}/{id}", self.config.resource),
            None => self.config.resource.clone(),
        }
    }

    /// Applies `change` to a copy of the items and publishes it, unless
    /// the cache was cleared since `generation` or `change` returns
    /// `false`. Takes the ledger to prove the caller holds the lock.
    pub(crate) fn reconcile(
        &self,
        _ledger: &Ledger,
        generation: u64,
        change: impl FnOnce(&mut Vec<K::Entity>) -> bool,
    ) -> bool {
        if self.generation() != generation {
            tracing::debug!(resource = %self.config.resource, "cache cleared meanwhile, dropping reply");
            return false;
        }
        self.items.send_if_modified(|snapshot| {
            let mut next = snapshot.as_ref().clone();
            if change(&mut next) {
                *snapshot = Arc::new(next);
                true
            } else {
                false
            }
        })
    }
}

/// Replaces the entity with the same id in place, or appends it.
pub(crate) fn upsert<K: EntityKind>(items: &mut Vec<K::Entity>, entity: K::Entity) -> bool {
    match items.iter().position(|e| K::id(e) == K::id(&entity)) {
        Some(index) => items[index] = entity,
        None => items.push(entity),
    }
    true
}

// ---------------------------------------------------------------------------
// InFlight
// ---------------------------------------------------------------------------

/// Marks an id as having a mutation in flight; unmarks it on drop, so an
/// abandoned or failed operation releases the id too.
struct InFlight<'a> {
    ledger: &'a Mutex<Ledger>,
    id: EntityId,
}

impl<'a> InFlight<'a> {
    fn acquire(ledger: &'a Mutex<Ledger>, id: &EntityId) -> Result<Self, CacheError> {
        let mut guard = ledger.lock().unwrap_or_else(PoisonError::into_inner);
        // A placeholder with a pending create counts as busy too.
        if guard.creates.contains_key(id) || !guard.in_flight.insert(id.clone()) {
            return Err(CacheError::Busy(id.clone()));
        }
        Ok(Self {
            ledger,
            id: id.clone(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .remove(&self.id);
    }
}

// ---------------------------------------------------------------------------
// EntityCache
// ---------------------------------------------------------------------------

/// An in-memory mirror of the remote collection of kind `K`.
///
/// Cheap to clone: clones share the same items and ledger.
///
/// ## Guarantees
///
/// - At most one entity per id in the items at any time.
/// - When an operation's future resolves, its effect is already
///   published; a subscriber reading right after sees it.
/// - A failed operation leaves the items untouched.
pub struct EntityCache<K: EntityKind, T: Transport> {
    pub(crate) inner: Arc<Inner<K, T>>,
}

impl<K: EntityKind, T: Transport> Clone for EntityCache<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: EntityKind, T: Transport> EntityCache<K, T> {
    /// Creates an empty cache configured by `K::cache_config()`.
    pub fn new(transport: Arc<T>, identity: Arc<dyn IdentitySource>) -> Self {
        Self::with_config(transport, identity, K::cache_config())
    }

    /// Creates an empty cache with an explicit config.
    pub fn with_config(
        transport: Arc<T>,
        identity: Arc<dyn IdentitySource>,
        config: CacheConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                identity,
                codec: JsonCodec,
                config,
                items: watch::Sender::new(Arc::new(Vec::new())),
                baseline: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                ledger: Mutex::new(Ledger::default()),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    // -- Reads (no network) ----------------------------------------------

    /// The current items.
    pub fn items(&self) -> Snapshot<K::Entity> {
        Arc::clone(&*self.inner.items.borrow())
    }

    /// Looks an entity up in the current items. Accepts the placeholder id
    /// of a confirmed create.
    pub fn get(&self, id: &EntityId) -> Option<K::Entity> {
        let id = self.resolve_id(id);
        self.inner
            .items
            .borrow()
            .iter()
            .find(|e| K::id(e) == &id)
            .cloned()
    }

    /// The current items owned by `owner`.
    pub fn owned_by(&self, owner: &UserId) -> Vec<K::Entity> {
        self.inner
            .items
            .borrow()
            .iter()
            .filter(|e| K::owner(e) == owner)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// `true` once a refresh has succeeded (and no `clear` since).
    pub fn has_baseline(&self) -> bool {
        self.inner.baseline.load(Ordering::SeqCst)
    }

    /// Subscribes to the items. Drop the handle to unsubscribe.
    pub fn subscribe(&self) -> CacheWatch<K::Entity> {
        CacheWatch {
            rx: self.inner.items.subscribe(),
        }
    }

    /// Maps the placeholder id of a confirmed create to the id the remote
    /// assigned. Any other id is returned as is.
    ///
    /// Placeholders are recognized by the ledger, not by their shape, so a
    /// server id that happens to look like one is left alone.
    pub fn resolve_id(&self, id: &EntityId) -> EntityId {
        self.inner
            .ledger()
            .confirmed
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.clone())
    }

    // -- Operations --------------------------------------------------------

    /// Fetches the whole collection and replaces the items with it.
    ///
    /// With [`OwnerFilter::CurrentIdentity`] only the current identity's
    /// entities are requested, and no identity is
    /// [`CacheError::Unauthenticated`]. Concurrent refreshes: the last one
    /// to resolve wins.
    pub async fn refresh(&self) -> Result<Vec<K::Entity>, CacheError> {
        let inner = &self.inner;
        let generation = inner.generation();

        let mut request = Request::new(Method::Get, inner.path(None));
        if inner.config.owner_filter == OwnerFilter::CurrentIdentity {
            let owner = inner
                .identity
                .current_identity()
                .ok_or(CacheError::Unauthenticated)?;
            request = request.with_query(inner.config.owner_param.as_str(), owner.as_str());
        }

        let response = inner.transport.fetch(request).await?;
        let collection: Collection<K::Record> = read_reply(&inner.codec, &response)
            .map_err(|e| CacheError::from_reply(e, None))?;
        let entities: Vec<K::Entity> = collection
            .into_inner()
            .into_iter()
            .map(|(id, record)| K::from_record(id, record))
            .collect();

        {
            let mut ledger = inner.ledger();
            if inner.generation() == generation {
                let listed: HashSet<&EntityId> = entities.iter().map(K::id).collect();
                ledger.confirmed.retain(|_, assigned| listed.contains(assigned));
                inner.items.send_replace(Arc::new(entities.clone()));
                inner.baseline.store(true, Ordering::SeqCst);
            } else {
                tracing::debug!(resource = %inner.config.resource, "cache cleared meanwhile, dropping refresh");
            }
        }

        tracing::debug!(resource = %inner.config.resource, count = entities.len(), "refreshed");
        Ok(entities)
    }

    /// Starts a create: resolves the owner now and mints a placeholder id.
    ///
    /// Nothing is sent until [`PendingCreate::commit`] (or
    /// [`PendingCreate::spawn`]). Dropping the pending create abandons it.
    pub fn begin_create(&self, draft: K::Draft) -> Result<PendingCreate<K, T>, CacheError> {
        let owner = self
            .inner
            .identity
            .current_identity()
            .ok_or(CacheError::Unauthenticated)?;
        let placeholder = generate_placeholder_id();
        let entity = K::build(placeholder.clone(), owner, draft);
        Ok(PendingCreate::new(self.clone(), placeholder, entity))
    }

    /// Creates an entity and appends it to the items once the remote has
    /// assigned its id.
    pub async fn create(&self, draft: K::Draft) -> Result<K::Entity, CacheError> {
        self.begin_create(draft)?.commit().await
    }

    /// Replaces an entity with `patch` applied.
    ///
    /// Without a baseline, or with no items, refreshes first. If a delete
    /// removed the entity while the update was in flight, it stays
    /// removed.
    pub async fn update(&self, id: &EntityId, patch: K::Patch) -> Result<K::Entity, CacheError> {
        let inner = &self.inner;
        let id = self.resolve_id(id);
        let _in_flight = InFlight::acquire(&inner.ledger, &id)?;

        let needs_refresh = !self.has_baseline() || self.is_empty();
        if needs_refresh {
            tracing::debug!(resource = %inner.config.resource, %id, "no baseline, refreshing before update");
            self.refresh().await?;
        }

        let generation = inner.generation();
        let current = self.get(&id).ok_or_else(|| CacheError::NotFound(id.clone()))?;
        let updated = K::with_id(K::apply_patch(&current, patch), id.clone());

        let body = inner.codec.encode(&K::to_record(&updated))?;
        let request = Request::new(Method::Put, inner.path(Some(&id))).with_body(body);
        let response = inner.transport.fetch(request).await?;
        read_reply::<_, IgnoredAny>(&inner.codec, &response)
            .map_err(|e| CacheError::from_reply(e, Some(&id)))?;

        let replaced = {
            let ledger = inner.ledger();
            inner.reconcile(&ledger, generation, |items| {
                match items.iter().position(|e| K::id(e) == &id) {
                    Some(index) => {
                        items[index] = updated.clone();
                        true
                    }
                    None => false,
                }
            })
        };

        tracing::info!(resource = %inner.config.resource, %id, replaced, "entity updated");
        Ok(updated)
    }

    /// Deletes an entity remotely, then removes it from the items.
    ///
    /// Deleting an id that isn't cached still asks the remote, and a 404
    /// counts as success. Deleting the placeholder id of a pending create
    /// sends nothing: the create is cancelled and cleans up after itself.
    pub async fn delete(&self, id: &EntityId) -> Result<(), CacheError> {
        let inner = &self.inner;
        let Some(id) = self.settle_placeholder_delete(id) else {
            return Ok(());
        };
        let _in_flight = InFlight::acquire(&inner.ledger, &id)?;
        let generation = inner.generation();

        let request = Request::new(Method::Delete, inner.path(Some(&id)));
        let response = inner.transport.fetch(request).await?;
        if response.status == 404 {
            tracing::debug!(resource = %inner.config.resource, %id, "already gone remotely");
        } else {
            read_reply::<_, IgnoredAny>(&inner.codec, &response)
                .map_err(|e| CacheError::from_reply(e, Some(&id)))?;
        }

        {
            let mut ledger = inner.ledger();
            ledger.confirmed.retain(|_, assigned| *assigned != id);
            inner.reconcile(&ledger, generation, |items| {
                let before = items.len();
                items.retain(|e| K::id(e) != &id);
                items.len() != before
            });
        }

        tracing::info!(resource = %inner.config.resource, %id, "entity deleted");
        Ok(())
    }

    /// Fetches one entity from the remote. Doesn't read or touch the items.
    pub async fn get_by_id(&self, id: &EntityId) -> Result<K::Entity, CacheError> {
        let inner = &self.inner;
        let id = self.resolve_id(id);
        if inner.ledger().creates.contains_key(&id) {
            return Err(CacheError::NotFound(id));
        }

        let request = Request::new(Method::Get, inner.path(Some(&id)));
        let response = inner.transport.fetch(request).await?;
        let record: Option<K::Record> = read_reply(&inner.codec, &response)
            .map_err(|e| CacheError::from_reply(e, Some(&id)))?;

        match record {
            Some(record) => Ok(K::from_record(id, record)),
            None => Err(CacheError::NotFound(id)),
        }
    }

    /// Empties the items, forgets pending creates and the baseline.
    ///
    /// Replies to operations started before the clear are dropped.
    pub fn clear(&self) {
        let inner = &self.inner;
        let mut ledger = inner.ledger();
        inner.generation.fetch_add(1, Ordering::SeqCst);
        ledger.creates.clear();
        ledger.confirmed.clear();
        inner.baseline.store(false, Ordering::SeqCst);
        inner.items.send_replace(Arc::new(Vec::new()));
        tracing::debug!(resource = %inner.config.resource, "cache cleared");
    }

    /// Handles the placeholder cases of `delete` locally. Returns the id to
    /// delete remotely, or `None` when a pending create was cancelled
    /// instead.
    fn settle_placeholder_delete(&self, id: &EntityId) -> Option<EntityId> {
        let mut ledger = self.inner.ledger();
        if let Some(state) = ledger.creates.get_mut(id) {
            *state = CreateState::Cancelled;
            tracing::info!(resource = %self.inner.config.resource, placeholder = %id, "pending create cancelled");
            return None;
        }
        Some(ledger.confirmed.get(id).cloned().unwrap_or_else(|| id.clone()))
    }
}

// ---------------------------------------------------------------------------
// CacheWatch
// ---------------------------------------------------------------------------

/// A scoped subscription to a cache's items.
pub struct CacheWatch<E> {
    rx: watch::Receiver<Snapshot<E>>,
}

impl<E> CacheWatch<E> {
    /// The latest published items.
    pub fn current(&self) -> Snapshot<E> {
        Arc::clone(&*self.rx.borrow())
    }

    /// `true` if something was published since the last `changed`.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Waits for the next publish. Returns `false` once every clone of the
    /// cache is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Generates a placeholder id: the prefix plus 16 random bytes in hex.
fn generate_placeholder_id() -> EntityId {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    let suffix: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    EntityId::placeholder(&suffix)
}

// =========================================================================
// Tests
// =========================================================================
