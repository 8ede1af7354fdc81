//! Shared fixtures for the cache integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use roost_cache::{CacheConfig, EntityCache, EntityKind};
use roost_protocol::{EntityId, UserId};
use roost_session::IdentitySource;
use roost_transport::{MemoryBackend, Method, Request, Response, Transport, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{Semaphore, watch};

// =========================================================================
// A small entity kind: tasks owned by a user.
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: EntityId,
    pub owner: UserId,
    pub title: String,
    pub done: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub user_id: UserId,
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

pub struct Tasks;

impl EntityKind for Tasks {
    type Entity = Task;
    type Record = TaskRecord;
    type Draft = String;
    type Patch = bool;

    fn cache_config() -> CacheConfig {
        CacheConfig::new("tasks")
    }

    fn id(task: &Task) -> &EntityId {
        &task.id
    }

    fn owner(task: &Task) -> &UserId {
        &task.owner
    }

    fn from_record(id: EntityId, record: TaskRecord) -> Task {
        Task {
            id,
            owner: record.user_id,
            title: record.title,
            done: record.done,
        }
    }

    fn to_record(task: &Task) -> TaskRecord {
        TaskRecord {
            user_id: task.owner.clone(),
            title: task.title.clone(),
            done: task.done,
        }
    }

    fn build(id: EntityId, owner: UserId, title: String) -> Task {
        Task {
            id,
            owner,
            title,
            done: false,
        }
    }

    fn with_id(task: Task, id: EntityId) -> Task {
        Task { id, ..task }
    }

    fn apply_patch(task: &Task, done: bool) -> Task {
        Task {
            done,
            ..task.clone()
        }
    }
}

// =========================================================================
// Identity
// =========================================================================

/// An identity source the test can switch.
#[derive(Default)]
pub struct TestIdentity(Mutex<Option<UserId>>);

impl TestIdentity {
    pub fn logged_in(identity: &str) -> Self {
        Self(Mutex::new(Some(UserId::new(identity))))
    }

    pub fn set(&self, identity: Option<&str>) {
        *self.0.lock().unwrap() = identity.map(UserId::new);
    }
}

impl IdentitySource for TestIdentity {
    fn current_identity(&self) -> Option<UserId> {
        self.0.lock().unwrap().clone()
    }
}

// =========================================================================
// GatedTransport
// =========================================================================

/// Forwards every request, but holds the replies of gated methods until
/// the test releases them. The remote has already applied the request
/// while its reply is held.
pub struct GatedTransport<T> {
    inner: T,
    gated: Mutex<HashSet<Method>>,
    held: watch::Sender<usize>,
    release: Semaphore,
}

impl<T: Transport> GatedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            gated: Mutex::new(HashSet::new()),
            held: watch::Sender::new(0),
            release: Semaphore::new(0),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Starts holding replies to `method`.
    pub fn gate(&self, method: Method) {
        self.gated.lock().unwrap().insert(method);
    }

    /// Waits until `count` replies in total have been held.
    pub async fn wait_held(&self, count: usize) {
        self.held
            .subscribe()
            .wait_for(|held| *held >= count)
            .await
            .expect("sender lives as long as the transport");
    }

    /// Lets `count` held replies through.
    pub fn release(&self, count: usize) {
        self.release.add_permits(count);
    }
}

impl<T: Transport> Transport for GatedTransport<T> {
    async fn fetch(&self, request: Request) -> Result<Response, TransportError> {
        let gated = self.gated.lock().unwrap().contains(&request.method);
        let reply = self.inner.fetch(request).await;
        if gated {
            self.held.send_modify(|held| *held += 1);
            self.release
                .acquire()
                .await
                .expect("semaphore is never closed")
                .forget();
        }
        reply
    }
}

// =========================================================================
// Builders
// =========================================================================

pub type Backend = GatedTransport<MemoryBackend>;

pub struct Fixture {
    pub backend: Arc<Backend>,
    pub identity: Arc<TestIdentity>,
    pub tasks: EntityCache<Tasks, Backend>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(Tasks::cache_config())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        let backend = Arc::new(GatedTransport::new(MemoryBackend::default()));
        let identity = Arc::new(TestIdentity::logged_in("u1"));
        let tasks = EntityCache::with_config(Arc::clone(&backend), identity.clone(), config);
        Self {
            backend,
            identity,
            tasks,
        }
    }

    pub fn memory(&self) -> &MemoryBackend {
        self.backend.inner()
    }

    /// Seeds a task on the remote.
    pub fn seed(&self, id: &str, owner: &str, title: &str) {
        self.memory()
            .seed("tasks", id, json!({ "userId": owner, "title": title }));
    }

    /// Requests seen by the remote, as `"METHOD /path?query"`.
    pub fn log(&self) -> Vec<String> {
        self.memory().request_log()
    }
}

/// Ids of the current items, in order.
pub fn ids(tasks: &EntityCache<Tasks, Backend>) -> Vec<String> {
    tasks
        .items()
        .iter()
        .map(|t| t.id.as_str().to_string())
        .collect()
}

/// `true` if no id appears twice.
pub fn ids_unique(tasks: &EntityCache<Tasks, Backend>) -> bool {
    let ids = ids(tasks);
    ids.iter().collect::<HashSet<_>>().len() == ids.len()
}
