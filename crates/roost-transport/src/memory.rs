//! An in-process remote: the auth endpoint plus any number of keyed
//! collections, all held in memory.
//!
//! The backend speaks the same contract a real server does, down to the
//! quirks: rejected logins come back as `200` with an in-band
//! `{"kind":"error"}` marker, and an unknown collection lists as `null`.
//! It knows nothing about the client's types; it stores whatever JSON
//! objects it is given.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Map, Value, json};

use crate::{Method, Request, Response, Transport, TransportError};

/// Settings for a [`MemoryBackend`].
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Path of the login endpoint.
    pub login_path: String,
    /// Lifetime reported for newly issued tokens.
    pub token_lifetime_secs: u64,
    /// Record field holding the owner, matched against `?owner=`.
    pub owner_field: String,
    /// Artificial delay before every request is handled.
    pub latency: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            login_path: "account/login".to_string(),
            token_lifetime_secs: 3600,
            owner_field: "userId".to_string(),
            latency: Duration::ZERO,
        }
    }
}

struct Account {
    password: String,
    identity: String,
}

#[derive(Default)]
struct BackendState {
    accounts: HashMap<String, Account>,
    collections: HashMap<String, Map<String, Value>>,
    offline: bool,
    rejections: VecDeque<String>,
    log: Vec<String>,
}

/// In-memory implementation of the remote contract.
///
/// Lock discipline: the state mutex is only held inside synchronous
/// helpers, never across the latency sleep.
pub struct MemoryBackend {
    config: BackendConfig,
    state: Mutex<BackendState>,
    next_id: AtomicU64,
}

impl MemoryBackend {
    /// Creates an empty backend with the given config.
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BackendState::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers an account that `login` will accept.
    pub fn register_account(&self, email: &str, password: &str, identity: &str) {
        self.state().accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                identity: identity.to_string(),
            },
        );
    }

    /// Stores a record under a fixed id, as if created earlier.
    pub fn seed(&self, resource: &str, id: &str, record: Value) {
        self.state()
            .collections
            .entry(resource.to_string())
            .or_default()
            .insert(id.to_string(), record);
    }

    /// Returns one stored record.
    pub fn record(&self, resource: &str, id: &str) -> Option<Value> {
        self.state()
            .collections
            .get(resource)
            .and_then(|c| c.get(id))
            .cloned()
    }

    /// Returns the ids of a collection in iteration order.
    pub fn ids(&self, resource: &str) -> Vec<String> {
        self.state()
            .collections
            .get(resource)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// While offline every request fails with
    /// [`TransportError::Unreachable`].
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Makes the next request answer `200` with an in-band error marker.
    pub fn reject_next(&self, detail: &str) {
        self.state().rejections.push_back(detail.to_string());
    }

    /// Every request handled so far, formatted as `"METHOD /path?query"`.
    pub fn request_log(&self) -> Vec<String> {
        self.state().log.clone()
    }

    /// Number of requests handled so far.
    pub fn request_count(&self) -> usize {
        self.state().log.len()
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, request: &Request) -> Result<Response, TransportError> {
        let mut state = self.state();
        state.log.push(request.to_string());

        if state.offline {
            return Err(TransportError::Unreachable(
                "memory backend is offline".into(),
            ));
        }
        if let Some(detail) = state.rejections.pop_front() {
            return Ok(error_reply(&detail));
        }

        if request.path == self.config.login_path {
            return Ok(match request.method {
                Method::Post => self.login(&state, request),
                _ => Response::new(405, ""),
            });
        }

        let segments = request.segments();
        let response = match (request.method, segments.as_slice()) {
            (Method::Get, [resource]) => self.list(&state, resource, request),
            (Method::Get, [resource, id]) => {
                match state.collections.get(*resource).and_then(|c| c.get(*id)) {
                    Some(record) => json_response(200, record),
                    None => Response::new(404, "null"),
                }
            }
            (Method::Post, [resource]) => {
                let Some(record) = parse_record(request) else {
                    return Ok(Response::new(400, ""));
                };
                let id = format!(
                    "{resource}-{:04}",
                    self.next_id.fetch_add(1, Ordering::Relaxed)
                );
                state
                    .collections
                    .entry((*resource).to_string())
                    .or_default()
                    .insert(id.clone(), record);
                tracing::debug!(%resource, %id, "record created");
                json_response(201, &json!({ "assignedId": id }))
            }
            (Method::Put, [resource, id]) => {
                let Some(record) = parse_record(request) else {
                    return Ok(Response::new(400, ""));
                };
                match state
                    .collections
                    .get_mut(*resource)
                    .and_then(|c| c.get_mut(*id))
                {
                    Some(slot) => {
                        *slot = record.clone();
                        json_response(200, &record)
                    }
                    None => Response::new(404, "null"),
                }
            }
            (Method::Delete, [resource, id]) => {
                match state
                    .collections
                    .get_mut(*resource)
                    .and_then(|c| c.shift_remove(*id))
                {
                    Some(_) => Response::new(200, "{}"),
                    None => Response::new(404, "null"),
                }
            }
            _ => Response::new(405, ""),
        };
        Ok(response)
    }

    fn login(&self, state: &BackendState, request: &Request) -> Response {
        let Some(body) = parse_record(request) else {
            return Response::new(400, "");
        };
        let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
        let password = body
            .get("password")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let Some(account) = state.accounts.get(email) else {
            return error_reply("EMAIL_NOT_FOUND");
        };
        if account.password != password {
            return error_reply("INVALID_PASSWORD");
        }

        let serial = self.next_id.fetch_add(1, Ordering::Relaxed);
        json_response(
            200,
            &json!({
                "kind": "identitytoolkit#VerifyPasswordResponse",
                "token": format!("tok-{}-{serial}", account.identity),
                "identity": account.identity,
                "email": email,
                "expiresInSeconds": self.config.token_lifetime_secs.to_string(),
            }),
        )
    }

    fn list(&self, state: &BackendState, resource: &str, request: &Request) -> Response {
        let Some(collection) = state.collections.get(resource) else {
            return Response::new(200, "null");
        };
        let owner = request.query_value("owner");
        let filtered: Map<String, Value> = collection
            .iter()
            .filter(|(_, record)| match owner {
                Some(owner) => {
                    record.get(&self.config.owner_field).and_then(Value::as_str)
                        == Some(owner)
                }
                None => true,
            })
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect();
        json_response(200, &Value::Object(filtered))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(BackendConfig::default())
    }
}

impl Transport for MemoryBackend {
    async fn fetch(&self, request: Request) -> Result<Response, TransportError> {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
        self.handle(&request)
    }
}

/// Parses the body as a JSON object and drops any client-sent `id`.
fn parse_record(request: &Request) -> Option<Value> {
    let body = request.body.as_deref()?;
    let mut value: Value = serde_json::from_slice(body).ok()?;
    value.as_object_mut()?.remove("id");
    Some(value)
}

fn json_response(status: u16, value: &Value) -> Response {
    Response::new(status, value.to_string())
}

fn error_reply(detail: &str) -> Response {
    json_response(200, &json!({ "kind": "error", "detail": detail }))
}
