//! The `EntityKind` trait: what a cache needs to know about one kind of
//! entity.
//!
//! A cache is generic over the kind. The kind says where the collection
//! lives, how an entity maps to and from its wire record, and how drafts
//! and patches turn into whole new entities. The cache does everything
//! else: requests, reconciliation, publishing.

use std::fmt::Debug;

use roost_protocol::{EntityId, UserId};
use serde::{Serialize, de::DeserializeOwned};

use crate::CacheConfig;

/// One kind of remotely stored entity.
///
/// Each associated type defines the shape of the kind's data:
/// - `Entity`: the immutable value held in the cache
/// - `Record`: the JSON shape on the wire (no id; the id is the key)
/// - `Draft`: what a caller provides to create one
/// - `Patch`: what a caller provides to change one
///
/// All functions are associated functions (no `self`): a kind is a
/// marker type, never instantiated.
///
/// ## Why associated types?
///
/// A kind ties four types together. With generic parameters a cache would
/// be `EntityCache<Place, PlaceRecord, NewPlace, PlacePatch, T>` and every
/// caller would have to spell out all four. With associated types it is
/// `EntityCache<Places, T>`, and the compiler looks the rest up through
/// `Places`. It also means a kind can only have one record shape, which is
/// what the remote expects.
///
/// ## Trait bounds explained
///
/// - `Entity: Clone + PartialEq` → snapshots are shared `Arc<Vec<_>>`
///   values; changing one means cloning it, and `PartialEq` lets tests and
///   subscribers compare what they got.
/// - `Record: Serialize + DeserializeOwned` → it crosses the wire in both
///   directions, and the decoded value must not borrow from the reply
///   buffer, which is dropped right after.
/// - `Send + Sync + 'static` everywhere → a cache may be cloned into a
///   spawned task (see `PendingCreate::spawn`), so everything it holds
///   must be able to move between threads and outlive the caller.
///
/// ## Example
///
/// ```rust
/// use roost_cache::{CacheConfig, EntityKind};
/// use roost_protocol::{EntityId, UserId};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Note {
///     id: EntityId,
///     owner: UserId,
///     text: String,
/// }
///
/// #[derive(Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct NoteRecord {
///     user_id: UserId,
///     text: String,
/// }
///
/// struct Notes;
///
/// impl EntityKind for Notes {
///     type Entity = Note;
///     type Record = NoteRecord;
///     type Draft = String;
///     type Patch = String;
///
///     fn cache_config() -> CacheConfig {
///         CacheConfig::new("notes").owned()
///     }
///     fn id(note: &Note) -> &EntityId {
///         &note.id
///     }
///     fn owner(note: &Note) -> &UserId {
///         &note.owner
///     }
///     fn from_record(id: EntityId, r: NoteRecord) -> Note {
///         Note { id, owner: r.user_id, text: r.text }
///     }
///     fn to_record(note: &Note) -> NoteRecord {
///         NoteRecord { user_id: note.owner.clone(), text: note.text.clone() }
///     }
///     fn build(id: EntityId, owner: UserId, text: String) -> Note {
///         Note { id, owner, text }
///     }
///     fn with_id(note: Note, id: EntityId) -> Note {
///         Note { id, ..note }
///     }
///     fn apply_patch(note: &Note, text: String) -> Note {
///         Note { text, ..note.clone() }
///     }
/// }
///
/// assert_eq!(Notes::cache_config().resource, "notes");
/// ```
pub trait EntityKind: Send + Sync + 'static {
    type Entity: Clone + Debug + PartialEq + Send + Sync + 'static;

    type Record: Serialize + DeserializeOwned + Send + 'static;

    type Draft: Send + 'static;

    type Patch: Send + 'static;

    /// Where the collection lives and which slice of it to mirror.
    fn cache_config() -> CacheConfig;

    /// The entity's id (server-assigned, or a placeholder).
    fn id(entity: &Self::Entity) -> &EntityId;

    /// The identity that owns the entity.
    fn owner(entity: &Self::Entity) -> &UserId;

    /// Builds an entity from a record the remote keyed under `id`.
    fn from_record(id: EntityId, record: Self::Record) -> Self::Entity;

    /// The record to send for `entity`. The id is not part of it.
    fn to_record(entity: &Self::Entity) -> Self::Record;

    /// Builds a new entity from a draft. `id` is a placeholder and `owner`
    /// is the identity resolved when the create was started.
    fn build(id: EntityId, owner: UserId, draft: Self::Draft) -> Self::Entity;

    /// The same entity under a different id.
    fn with_id(entity: Self::Entity, id: EntityId) -> Self::Entity;

    /// Builds a new entity from `entity` with `patch` applied.
    ///
    /// Must keep the id. Validation of the patched values is the caller's
    /// business.
    fn apply_patch(entity: &Self::Entity, patch: Self::Patch) -> Self::Entity;
}
