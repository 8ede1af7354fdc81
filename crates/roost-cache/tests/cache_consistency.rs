//! Integration tests for cache consistency under interleaved operations.
//!
//! Races are staged with `GatedTransport`: the remote applies a request
//! right away but its reply is held until the test releases it.

mod common;

use common::{Fixture, Tasks, ids, ids_unique};
use futures_util::future::join_all;
use roost_cache::{CacheConfig, CacheError, EntityKind, OperationState};
use roost_protocol::{EntityId, UserId};
use roost_transport::{Method, Request, Transport, TransportError};

fn eid(id: &str) -> EntityId {
    EntityId::new(id)
}

// =========================================================================
// refresh()
// =========================================================================

#[tokio::test]
async fn test_refresh_keeps_server_order_and_sets_baseline() {
    let f = Fixture::new();
    f.seed("t3", "u1", "third");
    f.seed("t1", "u2", "first");
    f.seed("t2", "u1", "second");

    let fetched = f.tasks.refresh().await.unwrap();

    assert_eq!(fetched.len(), 3);
    assert_eq!(ids(&f.tasks), vec!["t3", "t1", "t2"]);
    assert!(f.tasks.has_baseline());
    assert_eq!(f.log(), vec!["GET /tasks"]);
}

#[tokio::test]
async fn test_refresh_unknown_collection_is_empty() {
    let f = Fixture::new();

    let fetched = f.tasks.refresh().await.unwrap();

    assert!(fetched.is_empty());
    assert!(f.tasks.has_baseline());
}

#[tokio::test]
async fn test_refresh_owned_filters_by_current_identity() {
    let f = Fixture::with_config(Tasks::cache_config().owned());
    f.seed("t1", "u1", "mine");
    f.seed("t2", "u2", "theirs");

    f.tasks.refresh().await.unwrap();

    assert_eq!(ids(&f.tasks), vec!["t1"]);
    assert_eq!(f.log(), vec!["GET /tasks?owner=u1"]);
}

#[tokio::test]
async fn test_refresh_owned_without_identity_is_unauthenticated() {
    let f = Fixture::with_config(Tasks::cache_config().owned());
    f.identity.set(None);

    let result = f.tasks.refresh().await;

    assert!(matches!(result, Err(CacheError::Unauthenticated)));
    assert!(f.log().is_empty());
}

#[tokio::test]
async fn test_refresh_offline_leaves_items_untouched() {
    let f = Fixture::new();
    f.seed("t1", "u1", "a");
    f.tasks.refresh().await.unwrap();
    f.memory().set_offline(true);

    let result = f.tasks.refresh().await;

    assert!(matches!(result, Err(CacheError::Network(TransportError::Unreachable(_)))));
    assert_eq!(ids(&f.tasks), vec!["t1"]);
}

#[tokio::test]
async fn test_refresh_replaces_items_wholesale() {
    let f = Fixture::new();
    f.seed("t1", "u1", "a");
    f.tasks.refresh().await.unwrap();

    // Someone else deletes t1 and adds t2.
    f.memory()
        .fetch(Request::new(Method::Delete, "tasks/t1"))
        .await
        .unwrap();
    f.seed("t2", "u1", "b");
    f.tasks.refresh().await.unwrap();

    assert_eq!(ids(&f.tasks), vec!["t2"]);
}

// =========================================================================
// create()
// =========================================================================

#[tokio::test]
async fn test_create_appends_with_assigned_id() {
    let f = Fixture::new();
    f.seed("t1", "u1", "existing");
    f.tasks.refresh().await.unwrap();

    let created = f.tasks.create("new".to_string()).await.unwrap();

    assert!(!created.id.as_str().starts_with(EntityId::PLACEHOLDER_PREFIX));
    assert_eq!(created.owner, UserId::new("u1"));
    assert_eq!(ids(&f.tasks), vec!["t1".to_string(), created.id.to_string()]);
    assert!(f.memory().record("tasks", created.id.as_str()).is_some());
}

#[tokio::test]
async fn test_create_without_identity_fails_and_sends_nothing() {
    let f = Fixture::new();
    f.seed("t1", "u1", "existing");
    f.tasks.refresh().await.unwrap();
    let before = f.tasks.items();
    f.identity.set(None);

    let result = f.tasks.create("nope".to_string()).await;

    assert!(matches!(result, Err(CacheError::Unauthenticated)));
    assert_eq!(f.tasks.items(), before);
    assert_eq!(f.log(), vec!["GET /tasks"]);
}

#[tokio::test]
async fn test_create_rejected_leaves_items_untouched() {
    let f = Fixture::new();
    f.memory().reject_next("PERMISSION_DENIED");

    let result = f.tasks.create("x".to_string()).await;

    assert!(matches!(result, Err(CacheError::Rejected(ref d)) if d == "PERMISSION_DENIED"));
    assert!(f.tasks.is_empty());
}

#[tokio::test]
async fn test_create_is_visible_to_subscribers_when_it_resolves() {
    let f = Fixture::new();
    let watch = f.tasks.subscribe();

    let created = f.tasks.create("seen".to_string()).await.unwrap();

    // No need to wait for a change notification: reconciliation happened
    // before the future resolved.
    assert_eq!(watch.current().as_slice(), &[created]);
}

#[tokio::test]
async fn test_create_racing_refresh_does_not_duplicate() {
    let f = Fixture::new();
    f.backend.gate(Method::Post);

    let mut handle = f.tasks.begin_create("racy".to_string()).unwrap().spawn();
    f.backend.wait_held(1).await;

    // The remote already has the entity; a refresh brings it in first.
    f.tasks.refresh().await.unwrap();
    assert_eq!(f.tasks.len(), 1);

    f.backend.release(1);
    let state = handle.settled().await;

    let created = state.committed().cloned().expect("create should commit");
    assert_eq!(f.tasks.len(), 1);
    assert_eq!(f.tasks.items()[0], created);
}

#[tokio::test]
async fn test_create_then_delete_placeholder_never_appears() {
    let f = Fixture::new();
    f.backend.gate(Method::Post);
    let watch = f.tasks.subscribe();

    let pending = f.tasks.begin_create("short-lived".to_string()).unwrap();
    let placeholder = pending.placeholder_id().clone();
    let mut handle = pending.spawn();
    f.backend.wait_held(1).await;

    f.tasks.delete(&placeholder).await.unwrap();
    assert_eq!(f.log(), vec!["POST /tasks"], "cancelling sends nothing");

    f.backend.release(1);
    let state = handle.settled().await;

    match state {
        OperationState::Failed(e) => {
            assert!(matches!(*e, CacheError::Cancelled(ref id) if *id == placeholder))
        }
        other => panic!("expected a cancelled create, got {other:?}"),
    }
    assert!(f.tasks.is_empty());
    assert!(f.memory().ids("tasks").is_empty(), "remote copy is deleted");
    assert_eq!(f.log().len(), 2);
    assert!(f.log()[1].starts_with("DELETE /tasks/"));
    // Nothing was ever published.
    assert!(!watch.current().iter().any(|t| t.title == "short-lived"));
    assert!(!watch.has_changed());
}

#[tokio::test]
async fn test_commit_after_placeholder_deleted_sends_nothing() {
    let f = Fixture::new();
    let pending = f.tasks.begin_create("never sent".to_string()).unwrap();
    let placeholder = pending.placeholder_id().clone();

    f.tasks.delete(&placeholder).await.unwrap();
    let result = pending.commit().await;

    assert!(matches!(result, Err(CacheError::Cancelled(ref id)) if *id == placeholder));
    assert!(f.log().is_empty());
    assert!(f.memory().ids("tasks").is_empty());
    assert!(f.tasks.is_empty());
}

#[tokio::test]
async fn test_delete_by_placeholder_after_confirmation_deletes_real_id() {
    let f = Fixture::new();
    let pending = f.tasks.begin_create("kept".to_string()).unwrap();
    let placeholder = pending.placeholder_id().clone();
    let created = pending.commit().await.unwrap();

    f.tasks.delete(&placeholder).await.unwrap();

    assert!(f.tasks.is_empty());
    assert_eq!(f.log().last().cloned(), Some(format!("DELETE /tasks/{}", created.id)));
}

#[tokio::test]
async fn test_create_during_clear_is_not_appended() {
    let f = Fixture::new();
    f.backend.gate(Method::Post);

    let mut handle = f.tasks.begin_create("stale".to_string()).unwrap().spawn();
    f.backend.wait_held(1).await;
    f.tasks.clear();
    f.backend.release(1);

    assert!(handle.settled().await.committed().is_some());
    assert!(f.tasks.is_empty());
}

// =========================================================================
// update()
// =========================================================================

#[tokio::test]
async fn test_update_replaces_in_place() {
    let f = Fixture::new();
    f.seed("t1", "u1", "a");
    f.seed("t2", "u1", "b");
    f.tasks.refresh().await.unwrap();

    let updated = f.tasks.update(&eid("t1"), true).await.unwrap();

    assert!(updated.done);
    assert_eq!(ids(&f.tasks), vec!["t1", "t2"]);
    assert_eq!(f.tasks.get(&eid("t1")), Some(updated));
    assert_eq!(f.memory().record("tasks", "t1").unwrap()["done"], true);
}

#[tokio::test]
async fn test_update_on_empty_cache_refreshes_first() {
    let f = Fixture::new();
    f.seed("t1", "u1", "a");

    let updated = f.tasks.update(&eid("t1"), true).await.unwrap();

    assert!(updated.done);
    assert_eq!(f.log(), vec!["GET /tasks", "PUT /tasks/t1"]);
    assert!(f.tasks.has_baseline());
}

#[tokio::test]
async fn test_update_on_empty_cache_missing_id_is_not_found() {
    let f = Fixture::new();
    f.seed("t1", "u1", "a");

    let result = f.tasks.update(&eid("ghost"), true).await;

    assert!(matches!(result, Err(CacheError::NotFound(ref id)) if *id == eid("ghost")));
    assert_eq!(f.log(), vec!["GET /tasks"], "no PUT for a missing entity");
}

#[tokio::test]
async fn test_update_with_baseline_does_not_refetch() {
    let f = Fixture::new();
    f.seed("t1", "u1", "a");
    f.tasks.refresh().await.unwrap();

    f.tasks.update(&eid("t1"), true).await.unwrap();

    assert_eq!(f.log(), vec!["GET /tasks", "PUT /tasks/t1"]);
}

#[tokio::test]
async fn test_update_same_id_twice_is_busy() {
    let f = Fixture::new();
    f.seed("t1", "u1", "a");
    f.tasks.refresh().await.unwrap();
    f.backend.gate(Method::Put);

    let tasks = f.tasks.clone();
    let first = tokio::spawn(async move { tasks.update(&eid("t1"), true).await });
    f.backend.wait_held(1).await;

    let second = f.tasks.update(&eid("t1"), false).await;
    assert!(matches!(second, Err(CacheError::Busy(ref id)) if *id == eid("t1")));
    let delete = f.tasks.delete(&eid("t1")).await;
    assert!(matches!(delete, Err(CacheError::Busy(_))));

    f.backend.release(1);
    assert!(first.await.unwrap().unwrap().done);

    // The guard is released once the first update is done.
    f.backend.release(1);
    f.tasks.update(&eid("t1"), false).await.unwrap();
}

#[tokio::test]
async fn test_update_of_pending_placeholder_is_busy() {
    let f = Fixture::new();
    let pending = f.tasks.begin_create("draft".to_string()).unwrap();

    let result = f.tasks.update(pending.placeholder_id(), true).await;

    assert!(matches!(result, Err(CacheError::Busy(_))));
}

#[tokio::test]
async fn test_update_does_not_resurrect_removed_entity() {
    let f = Fixture::new();
    f.seed("t1", "u1", "a");
    f.tasks.refresh().await.unwrap();
    f.backend.gate(Method::Put);

    let tasks = f.tasks.clone();
    let update = tokio::spawn(async move { tasks.update(&eid("t1"), true).await });
    f.backend.wait_held(1).await;

    // Removed remotely by someone else; a refresh drops it locally.
    f.memory()
        .fetch(Request::new(Method::Delete, "tasks/t1"))
        .await
        .unwrap();
    f.tasks.refresh().await.unwrap();
    f.backend.release(1);

    update.await.unwrap().unwrap();
    assert!(f.tasks.is_empty());
}

#[tokio::test]
async fn test_update_failure_leaves_items_untouched() {
    let f = Fixture::new();
    f.seed("t1", "u1", "a");
    f.tasks.refresh().await.unwrap();
    let before = f.tasks.items();
    f.memory().reject_next("QUOTA_EXCEEDED");

    let result = f.tasks.update(&eid("t1"), true).await;

    assert!(matches!(result, Err(CacheError::Rejected(_))));
    assert_eq!(f.tasks.items(), before);
}

// =========================================================================
// delete()
// =========================================================================

#[tokio::test]
async fn test_delete_removes_from_items_and_remote() {
    let f = Fixture::new();
    f.seed("t1", "u1", "a");
    f.seed("t2", "u1", "b");
    f.tasks.refresh().await.unwrap();

    f.tasks.delete(&eid("t1")).await.unwrap();

    assert_eq!(ids(&f.tasks), vec!["t2"]);
    assert_eq!(f.memory().ids("tasks"), vec!["t2"]);
}

#[tokio::test]
async fn test_delete_missing_remotely_is_success() {
    let f = Fixture::new();

    f.tasks.delete(&eid("ghost")).await.unwrap();

    assert_eq!(f.log(), vec!["DELETE /tasks/ghost"]);
}

#[tokio::test]
async fn test_delete_server_id_shaped_like_placeholder_goes_to_remote() {
    let f = Fixture::new();
    f.seed("tmp-7", "u1", "odd id");
    f.tasks.refresh().await.unwrap();

    f.tasks.delete(&eid("tmp-7")).await.unwrap();

    assert!(f.tasks.is_empty());
    assert!(f.memory().ids("tasks").is_empty());
    assert_eq!(f.log().last().map(String::as_str), Some("DELETE /tasks/tmp-7"));
}

#[tokio::test]
async fn test_delete_of_confirmed_create_forgets_placeholder() {
    let f = Fixture::new();
    let pending = f.tasks.begin_create("done soon".to_string()).unwrap();
    let placeholder = pending.placeholder_id().clone();
    let created = pending.commit().await.unwrap();
    assert_eq!(f.tasks.resolve_id(&placeholder), created.id);

    f.tasks.delete(&created.id).await.unwrap();

    assert_eq!(f.tasks.resolve_id(&placeholder), placeholder);
}

#[tokio::test]
async fn test_refresh_forgets_placeholder_of_entity_gone_remotely() {
    let f = Fixture::new();
    let pending = f.tasks.begin_create("removed elsewhere".to_string()).unwrap();
    let placeholder = pending.placeholder_id().clone();
    let created = pending.commit().await.unwrap();
    f.memory()
        .fetch(Request::new(Method::Delete, format!("tasks/{}", created.id)))
        .await
        .unwrap();

    f.tasks.refresh().await.unwrap();

    assert!(f.tasks.is_empty());
    assert_eq!(f.tasks.resolve_id(&placeholder), placeholder);
}

#[tokio::test]
async fn test_refresh_keeps_placeholder_of_listed_entity() {
    let f = Fixture::new();
    let pending = f.tasks.begin_create("still here".to_string()).unwrap();
    let placeholder = pending.placeholder_id().clone();
    let created = pending.commit().await.unwrap();

    f.tasks.refresh().await.unwrap();

    assert_eq!(f.tasks.get(&placeholder), Some(created));
}

// =========================================================================
// get_by_id()
// =========================================================================

#[tokio::test]
async fn test_get_by_id_matches_refreshed_entity() {
    let f = Fixture::new();
    f.seed("t1", "u1", "a");
    f.seed("t2", "u2", "b");
    f.tasks.refresh().await.unwrap();

    for cached in f.tasks.items().iter() {
        let fetched = f.tasks.get_by_id(&cached.id).await.unwrap();
        assert_eq!(&fetched, cached);
    }
}

#[tokio::test]
async fn test_get_by_id_server_id_shaped_like_placeholder_is_fetched() {
    let f = Fixture::new();
    f.seed("tmp-7", "u1", "odd id");

    let fetched = f.tasks.get_by_id(&eid("tmp-7")).await.unwrap();

    assert_eq!(fetched.title, "odd id");
    assert_eq!(f.log(), vec!["GET /tasks/tmp-7"]);
}

#[tokio::test]
async fn test_get_by_id_pending_placeholder_is_not_found_without_request() {
    let f = Fixture::new();
    let pending = f.tasks.begin_create("pending".to_string()).unwrap();

    let result = f.tasks.get_by_id(pending.placeholder_id()).await;

    assert!(matches!(result, Err(CacheError::NotFound(_))));
    assert!(f.log().is_empty());
}

#[tokio::test]
async fn test_get_by_id_missing_is_not_found() {
    let f = Fixture::new();

    let result = f.tasks.get_by_id(&eid("ghost")).await;

    assert!(matches!(result, Err(CacheError::NotFound(ref id)) if *id == eid("ghost")));
}

#[tokio::test]
async fn test_get_by_id_offline_is_network_error() {
    let f = Fixture::new();
    f.memory().set_offline(true);

    let result = f.tasks.get_by_id(&eid("t1")).await;

    assert!(matches!(result, Err(CacheError::Network(_))));
}

#[tokio::test]
async fn test_get_by_id_does_not_touch_items() {
    let f = Fixture::new();
    f.seed("t1", "u1", "a");

    f.tasks.get_by_id(&eid("t1")).await.unwrap();

    assert!(f.tasks.is_empty());
    assert!(!f.tasks.has_baseline());
}

// =========================================================================
// Interleavings
// =========================================================================

#[tokio::test]
async fn test_concurrent_creates_and_refreshes_keep_ids_unique() {
    let f = Fixture::new();
    f.seed("t1", "u1", "seed");

    let creates = join_all((0..8).map(|i| f.tasks.create(format!("task {i}"))));
    let refreshes = join_all((0..4).map(|_| f.tasks.refresh()));
    let (created, refreshed) = tokio::join!(creates, refreshes);

    assert!(created.iter().all(Result::is_ok));
    assert!(refreshed.iter().all(Result::is_ok));
    assert!(ids_unique(&f.tasks));

    // A final refresh agrees with the remote exactly.
    f.tasks.refresh().await.unwrap();
    assert_eq!(f.tasks.len(), 9);
    assert!(ids_unique(&f.tasks));
}

#[tokio::test]
async fn test_mixed_operations_on_many_ids_keep_ids_unique() {
    let f = Fixture::new();
    for i in 0..6 {
        f.seed(&format!("t{i}"), "u1", "seed");
    }
    f.tasks.refresh().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..6 {
        let tasks = f.tasks.clone();
        handles.push(tokio::spawn(async move {
            let id = EntityId::new(format!("t{i}"));
            match i % 3 {
                0 => tasks.update(&id, true).await.map(|_| ()),
                1 => tasks.delete(&id).await,
                _ => tasks.create(format!("extra {i}")).await.map(|_| ()),
            }
        }));
        if i == 3 {
            f.tasks.refresh().await.unwrap();
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(ids_unique(&f.tasks));
    // t1 and t4 deleted, two extras created.
    assert_eq!(f.tasks.len(), 6);
}

#[tokio::test]
async fn test_config_override_changes_resource() {
    let f = Fixture::with_config(CacheConfig::new("chores"));
    f.memory()
        .seed("chores", "c1", serde_json::json!({ "userId": "u1", "title": "dishes" }));

    f.tasks.refresh().await.unwrap();

    assert_eq!(ids(&f.tasks), vec!["c1"]);
}
