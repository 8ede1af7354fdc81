//! Pending creates.
//!
//! A create happens in two steps. [`EntityCache::begin_create`] resolves
//! the owner and mints a placeholder id synchronously, so the caller can
//! refer to the entity (or cancel it) before the remote has answered.
//! [`PendingCreate::commit`] then sends it and reconciles the reply.
//!
//! [`EntityCache::begin_create`]: crate::EntityCache::begin_create

use roost_protocol::{AssignedId, Codec, EntityId, read_reply};
use roost_transport::{Method, Request, Transport};
use tokio::sync::watch;

use crate::cache::{CreateState, upsert};
use crate::{CacheError, EntityCache, EntityKind, OperationState};

/// Removes the ledger entry of a create however it ends: committed,
/// failed, or dropped before commit.
struct CreateEntry<K: EntityKind, T: Transport> {
    cache: EntityCache<K, T>,
    placeholder: EntityId,
}

impl<K: EntityKind, T: Transport> Drop for CreateEntry<K, T> {
    fn drop(&mut self) {
        self.cache.inner.ledger().creates.remove(&self.placeholder);
    }
}

/// A create that has a placeholder id but hasn't been sent yet.
pub struct PendingCreate<K: EntityKind, T: Transport> {
    entry: CreateEntry<K, T>,
    entity: K::Entity,
    generation: u64,
}

impl<K: EntityKind, T: Transport> PendingCreate<K, T> {
    pub(crate) fn new(cache: EntityCache<K, T>, placeholder: EntityId, entity: K::Entity) -> Self {
        let generation = {
            let mut ledger = cache.inner.ledger();
            ledger
                .creates
                .insert(placeholder.clone(), CreateState::InFlight);
            cache.inner.generation()
        };
        Self {
            entry: CreateEntry { cache, placeholder },
            entity,
            generation,
        }
    }

    /// The id the entity goes by until the remote assigns one.
    pub fn placeholder_id(&self) -> &EntityId {
        &self.entry.placeholder
    }

    /// The entity as it will be sent, under its placeholder id.
    pub fn entity(&self) -> &K::Entity {
        &self.entity
    }

    /// Sends the create and appends the confirmed entity to the items.
    ///
    /// If a racing refresh already brought the entity in, it's replaced in
    /// place rather than duplicated. If the placeholder is deleted before
    /// the commit, nothing is sent. If it is deleted while the create is in
    /// flight, the remote copy is deleted instead. Either way the result
    /// is [`CacheError::Cancelled`].
    pub async fn commit(self) -> Result<K::Entity, CacheError> {
        let Self {
            entry,
            entity,
            generation,
        } = self;
        let inner = &entry.cache.inner;
        let placeholder = &entry.placeholder;

        let cancelled_early = matches!(
            inner.ledger().creates.get(placeholder),
            Some(CreateState::Cancelled)
        );
        if cancelled_early {
            tracing::debug!(resource = %inner.config.resource, %placeholder, "create cancelled before it was sent");
            return Err(CacheError::Cancelled(placeholder.clone()));
        }

        let body = inner.codec.encode(&K::to_record(&entity))?;
        let request = Request::new(Method::Post, inner.path(None)).with_body(body);
        let response = inner.transport.fetch(request).await?;
        let reply: AssignedId = read_reply(&inner.codec, &response)
            .map_err(|e| CacheError::from_reply(e, None))?;
        let assigned = reply.assigned_id;
        let confirmed = K::with_id(entity, assigned.clone());

        let cancelled = {
            let mut ledger = inner.ledger();
            match ledger.creates.remove(placeholder) {
                Some(CreateState::Cancelled) => true,
                _ => {
                    if inner.generation() == generation {
                        ledger
                            .confirmed
                            .insert(placeholder.clone(), assigned.clone());
                    }
                    let item = confirmed.clone();
                    inner.reconcile(&ledger, generation, |items| upsert::<K>(items, item));
                    false
                }
            }
        };

        if cancelled {
            tracing::info!(
                resource = %inner.config.resource,
                %placeholder,
                %assigned,
                "create was cancelled, deleting remote copy"
            );
            let request = Request::new(Method::Delete, inner.path(Some(&assigned)));
            match inner.transport.fetch(request).await {
                Ok(response) if response.is_success() || response.status == 404 => {}
                Ok(response) => {
                    tracing::warn!(%assigned, status = response.status, "remote copy not deleted")
                }
                Err(e) => tracing::warn!(%assigned, error = %e, "remote copy not deleted"),
            }
            return Err(CacheError::Cancelled(placeholder.clone()));
        }

        tracing::info!(
            resource = %inner.config.resource,
            %placeholder,
            id = %assigned,
            "entity created"
        );
        Ok(confirmed)
    }

    /// Commits on a spawned task, so the create finishes (and reconciles)
    /// even if the caller goes away.
    pub fn spawn(self) -> CreateHandle<K::Entity> {
        let placeholder = self.placeholder_id().clone();
        let (tx, rx) = watch::channel(OperationState::Pending);
        tokio::spawn(async move {
            let state = match self.commit().await {
                Ok(entity) => OperationState::Committed(entity),
                Err(e) => {
                    tracing::debug!(error = %e, "spawned create failed");
                    OperationState::Failed(std::sync::Arc::new(e))
                }
            };
            tx.send_replace(state);
        });
        CreateHandle { placeholder, rx }
    }
}

// ---------------------------------------------------------------------------
// CreateHandle
// ---------------------------------------------------------------------------

/// Tracks a create running on its own task.
pub struct CreateHandle<E> {
    placeholder: EntityId,
    rx: watch::Receiver<OperationState<E>>,
}

impl<E: Clone> CreateHandle<E> {
    pub fn placeholder_id(&self) -> &EntityId {
        &self.placeholder
    }

    /// Where the create is right now.
    pub fn state(&self) -> OperationState<E> {
        self.rx.borrow().clone()
    }

    /// Waits until the create has committed or failed.
    pub async fn settled(&mut self) -> OperationState<E> {
        let settled = self
            .rx
            .wait_for(OperationState::is_settled)
            .await
            .map(|state| state.clone());
        // The task only goes away without settling if the runtime does.
        settled.unwrap_or_else(|_| self.rx.borrow().clone())
    }
}
