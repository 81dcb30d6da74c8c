//! In-memory stand-in for the reservation backend.
//!
//! Implements the subset of the backend contract the gateway consumes, with
//! call counting, artificial latency and injectable failures. It can be used
//! directly as a [`Transport`] or mounted as an HTTP service with [`router`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use crate::client::{Reply, Transport};
use crate::error::ClientError;
use crate::resource::Resource;

/// Failure injected for the next call to a path.
#[derive(Debug, Clone)]
pub enum Failure {
    Domain(String),
    Status(u16),
    Transport,
}

#[derive(Default)]
struct Tables {
    rows: HashMap<String, Vec<Resource>>,
    users: Vec<Resource>,
    sessions: HashMap<String, Value>,
    next_id: u64,
}

#[derive(Default)]
pub struct FakeBackend {
    tables: Mutex<Tables>,
    calls: Mutex<HashMap<String, usize>>,
    failures: Mutex<HashMap<String, VecDeque<Failure>>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a session token resolving to the given `/user/current` record.
    pub fn add_session(&self, token: &str, user: Value) {
        self.tables.lock().sessions.insert(token.to_string(), user);
    }

    pub fn seed(&self, table: &str, row: Resource) {
        self.tables.lock().rows.entry(table.to_string()).or_default().push(row);
    }

    pub fn seed_user(&self, user: Resource) {
        self.tables.lock().users.push(user);
    }

    pub fn rows(&self, table: &str) -> Vec<Resource> {
        self.tables.lock().rows.get(table).cloned().unwrap_or_default()
    }

    pub fn users(&self) -> Vec<Resource> {
        self.tables.lock().users.clone()
    }

    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().get(path).copied().unwrap_or(0)
    }

    pub fn fail_next(&self, path: &str, failure: Failure) {
        self.failures.lock().entry(path.to_string()).or_default().push_back(failure);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Apply one request to the in-memory state.
    pub fn handle(&self, path: &str, token: &str, body: &Value) -> Reply {
        if path == "/user/current" {
            return match self.tables.lock().sessions.get(token) {
                Some(user) => ok(user.clone()),
                None => domain("invalid session"),
            };
        }
        let mut parts = path.trim_start_matches('/').splitn(2, '/');
        let family = parts.next().unwrap_or_default();
        let action = parts.next().unwrap_or_default();
        let mut t = self.tables.lock();
        match (family, action) {
            ("department" | "program" | "course", _) => {
                let next_id = t.next_id + 1;
                let rows = t.rows.entry(family.to_string()).or_default();
                let reply = table_action(rows, family, action, body, next_id);
                if action == "create" {
                    t.next_id = next_id;
                }
                reply
            }
            ("user", "list") => ok(Value::Array(page(&filter(&t.users, body), body))),
            ("user", "toggle") => toggle(&mut t.users, body),
            ("user", "set-role") => {
                let role = body.get("role").cloned().unwrap_or(Value::Null);
                if let Some(id) = body.get("id").and_then(|v| v.as_str()) {
                    match t.users.iter_mut().find(|u| u.id == id) {
                        Some(u) => {
                            u.set_field("role", role);
                            ok(u.to_value())
                        }
                        None => domain("user not found"),
                    }
                } else if let Some(email) = body.get("email").and_then(|v| v.as_str()) {
                    if let Some(u) = t.users.iter_mut().find(|u| u.field_str("email") == Some(email)) {
                        u.set_field("role", role);
                        return ok(u.to_value());
                    }
                    t.next_id += 1;
                    let u = Resource::new(format!("user-{}", t.next_id)).with("email", email).with("role", role);
                    t.users.push(u.clone());
                    ok(u.to_value())
                } else {
                    domain("email is required")
                }
            }
            ("user", "remove-role") => match find_id(body).and_then(|id| t.users.iter_mut().find(|u| u.id == id)) {
                Some(u) => {
                    u.set_field("role", Value::Null);
                    ok(json!({ "error": null }))
                }
                None => domain("user not found"),
            },
            ("student", "delete") => {
                let id = find_id(body).unwrap_or_default();
                let before = t.users.len();
                t.users.retain(|u| u.id != id);
                if t.users.len() == before { domain("student not found") } else { ok(json!({ "error": null })) }
            }
            _ => Reply { status: 404, body: json!({ "error": "not found", "message": "unknown endpoint" }) },
        }
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn post(&self, path: &str, token: &str, body: &Value) -> Result<Reply, ClientError> {
        *self.calls.lock().entry(path.to_string()).or_default() += 1;
        let delay = *self.delay.lock();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        let injected = self.failures.lock().get_mut(path).and_then(|q| q.pop_front());
        match injected {
            Some(Failure::Transport) => Err(ClientError::Transport("connection reset".into())),
            Some(Failure::Status(status)) => Ok(Reply { status, body: json!({}) }),
            Some(Failure::Domain(msg)) => Ok(domain(&msg)),
            None => Ok(self.handle(path, token, body)),
        }
    }
}

/// Mount the fake as an HTTP backend (`POST /<family>/<action>`).
pub fn router(backend: Arc<FakeBackend>) -> Router {
    Router::new().route("/{*path}", post(serve)).with_state(backend)
}

async fn serve(
    State(backend): State<Arc<FakeBackend>>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let path = format!("/{}", path);
    match backend.post(&path, &token, &body).await {
        Ok(reply) => (StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK), Json(reply.body)),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({}))),
    }
}

fn ok(v: Value) -> Reply {
    Reply { status: 200, body: v }
}

fn domain(msg: &str) -> Reply {
    Reply { status: 200, body: json!({ "error": msg, "message": msg }) }
}

fn find_id(body: &Value) -> Option<&str> {
    body.get("id").and_then(|v| v.as_str())
}

fn table_action(rows: &mut Vec<Resource>, family: &str, action: &str, body: &Value, next_id: u64) -> Reply {
    match action {
        "list" => ok(Value::Array(page(&filter(rows, body), body))),
        "create" => {
            let alias = body.get("alias").and_then(|v| v.as_str()).unwrap_or_default();
            if rows.iter().any(|r| r.field_str("alias") == Some(alias)) {
                return domain(&format!("{} already exists", alias));
            }
            let mut r = Resource::new(format!("{}-{}", family, next_id));
            apply_fields(&mut r, body);
            rows.push(r.clone());
            ok(r.to_value())
        }
        "update" => match find_id(body).and_then(|id| rows.iter_mut().find(|r| r.id == id)) {
            Some(r) => {
                apply_fields(r, body);
                ok(r.to_value())
            }
            None => domain("record not found"),
        },
        "toggle" => toggle(rows, body),
        "delete" => {
            let id = find_id(body).unwrap_or_default();
            let before = rows.len();
            rows.retain(|r| r.id != id);
            if rows.len() == before { domain("record not found") } else { ok(json!({ "error": null })) }
        }
        _ => Reply { status: 404, body: json!({ "error": "not found", "message": "unknown endpoint" }) },
    }
}

fn apply_fields(r: &mut Resource, body: &Value) {
    if let Some(obj) = body.as_object() {
        for (k, v) in obj {
            if k != "id" {
                r.set_field(k, v.clone());
            }
        }
    }
}

fn toggle(rows: &mut [Resource], body: &Value) -> Reply {
    let state = body.get("state").and_then(|v| v.as_bool()).unwrap_or(false);
    match find_id(body).and_then(|id| rows.iter_mut().find(|r| r.id == id)) {
        Some(r) => {
            r.is_disabled = state;
            ok(json!({ "isDisabled": state }))
        }
        None => domain("record not found"),
    }
}

fn filter(rows: &[Resource], body: &Value) -> Vec<Value> {
    let keyword = body.get("keyword").and_then(|v| v.as_str()).map(|s| s.to_lowercase());
    let mut wanted: Map<String, Value> = Map::new();
    for key in ["departmentId", "programId", "role"] {
        if let Some(v) = body.get(key) {
            wanted.insert(key.to_string(), v.clone());
        }
    }
    rows.iter()
        .filter(|r| wanted.iter().all(|(k, v)| r.field(k) == Some(v)))
        .filter(|r| match &keyword {
            Some(kw) => ["name", "alias", "email"]
                .iter()
                .any(|f| r.field_str(f).map(|s| s.to_lowercase().contains(kw.as_str())).unwrap_or(false)),
            None => true,
        })
        .map(|r| r.to_value())
        .collect()
}

fn page(rows: &[Value], body: &Value) -> Vec<Value> {
    let skip = body.get("skip").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
    let take = body.get("take").and_then(|v| v.as_u64()).map(|t| t as usize).unwrap_or(usize::MAX);
    rows.iter().skip(skip).take(take).cloned().collect()
}
