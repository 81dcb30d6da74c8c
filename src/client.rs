//! Authenticated calls to the reservation backend.
//!
//! Every request is a JSON POST carrying `Authorization: Bearer <token>`.
//! Responses use the `{error, ...payload}` envelope: a non-null `error` is a
//! domain failure even when the HTTP status is 200.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::model::{DisabledFlag, User};
use crate::resource::{ListParams, Operation, Resource, ResourceKind};

/// Raw backend reply before envelope interpretation.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

/// Wire seam between the protocol logic and the HTTP stack.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, path: &str, token: &str, body: &Value) -> Result<Reply, ClientError>;
}

/// `reqwest`-backed transport rooted at the backend base URL.
#[derive(Clone)]
pub struct HttpTransport {
    base: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base: Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn url_for(&self, path: &str) -> Result<Url, ClientError> {
        // Keep any path prefix on the base (e.g. https://host/api/v1).
        let joined = format!("{}/{}", self.base.as_str().trim_end_matches('/'), path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|e| ClientError::Transport(format!("invalid backend url: {}", e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, path: &str, token: &str, body: &Value) -> Result<Reply, ClientError> {
        let url = self.url_for(path)?;
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await.map_err(|e| ClientError::Transport(e.to_string()))?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(v) => v,
                // Non-JSON bodies on error statuses still classify by status below.
                Err(e) if (200..300).contains(&status) => return Err(ClientError::Decode(e.to_string())),
                Err(_) => Value::Null,
            }
        };
        Ok(Reply { status, body })
    }
}

/// Result of a toggle: the state the backend settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleReply {
    pub is_disabled: bool,
}

/// Resource client bound to one session token.
#[derive(Clone)]
pub struct ResourceClient {
    transport: Arc<dyn Transport>,
    token: Option<String>,
}

impl ResourceClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport, token: None }
    }

    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self { transport: self.transport.clone(), token: Some(token.into()) }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Perform one call and interpret the envelope.
    pub async fn call(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        let token = self.token.as_deref().filter(|t| !t.is_empty()).ok_or(ClientError::Unauthorized)?;
        debug!(target: "client", path, "backend call");
        let reply = self.transport.post(path, token, &body).await.map_err(|e| {
            warn!(target: "client", path, error = %e, "backend unreachable");
            e
        })?;
        interpret(path, reply)
    }

    fn endpoint(kind: ResourceKind, op: Operation) -> Result<&'static str, ClientError> {
        kind.endpoint(op)
            .ok_or_else(|| ClientError::Domain(format!("{} does not support this operation", kind.label())))
    }

    pub async fn list(&self, kind: ResourceKind, params: &ListParams) -> Result<Vec<Resource>, ClientError> {
        let path = Self::endpoint(kind, Operation::List)?;
        let v = self.call(path, params.body(kind)).await?;
        let items = match v {
            Value::Array(items) => items,
            Value::Object(mut m) => match m.remove("data") {
                Some(Value::Array(items)) => items,
                _ => return Err(ClientError::Decode(format!("{}: expected a list", path))),
            },
            _ => return Err(ClientError::Decode(format!("{}: expected a list", path))),
        };
        items
            .into_iter()
            .map(|item| Resource::from_value(item).map_err(|e| ClientError::Decode(e.to_string())))
            .collect()
    }

    pub async fn create(&self, kind: ResourceKind, fields: Map<String, Value>) -> Result<Resource, ClientError> {
        let path = Self::endpoint(kind, Operation::Create)?;
        let mut body = fields;
        if let Some(role) = kind.user_role() {
            body.entry("role").or_insert_with(|| Value::from(role.as_str()));
        }
        let v = self.call(path, Value::Object(body)).await?;
        record_from(path, v)
    }

    pub async fn update(&self, kind: ResourceKind, id: &str, fields: Map<String, Value>) -> Result<Resource, ClientError> {
        let path = Self::endpoint(kind, Operation::Update)?;
        let mut body = fields;
        body.insert("id".into(), Value::from(id));
        let v = self.call(path, Value::Object(body)).await?;
        record_from(path, v)
    }

    /// Ask the backend to set `isDisabled` to `desired_disabled`.
    pub async fn toggle(&self, kind: ResourceKind, id: &str, desired_disabled: bool) -> Result<ToggleReply, ClientError> {
        let path = Self::endpoint(kind, Operation::Toggle)?;
        let v = self.call(path, serde_json::json!({ "id": id, "state": desired_disabled })).await?;
        let has_flag = v.get("isDisabled").is_some() || v.get("enabled").is_some();
        if !has_flag {
            return Err(ClientError::Decode(format!("{}: missing isDisabled", path)));
        }
        let flag: DisabledFlag = serde_json::from_value(v).map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(ToggleReply { is_disabled: flag.0 })
    }

    pub async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), ClientError> {
        let path = Self::endpoint(kind, Operation::Delete)?;
        self.call(path, serde_json::json!({ "id": id })).await?;
        Ok(())
    }

    /// Resolve the user the bound token belongs to.
    pub async fn current_user(&self) -> Result<User, ClientError> {
        let v = self.call("/user/current", Value::Object(Map::new())).await?;
        serde_json::from_value(v).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

fn interpret(path: &str, reply: Reply) -> Result<Value, ClientError> {
    if reply.status == 401 || reply.status == 403 {
        return Err(ClientError::Unauthorized);
    }
    if !(200..300).contains(&reply.status) {
        warn!(target: "client", path, status = reply.status, "backend error status");
        return Err(ClientError::Http { status: reply.status });
    }
    if let Some(err) = reply.body.get("error").filter(|e| !e.is_null()) {
        let message = reply
            .body
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| err.as_str())
            .unwrap_or("request rejected")
            .to_string();
        debug!(target: "client", path, %message, "domain error");
        return Err(ClientError::Domain(message));
    }
    Ok(reply.body)
}

fn record_from(path: &str, v: Value) -> Result<Resource, ClientError> {
    let obj = match v {
        Value::Object(mut m) => match m.remove("data") {
            Some(Value::Object(inner)) => inner,
            Some(other) => {
                m.insert("data".into(), other);
                m
            }
            None => m,
        },
        _ => return Err(ClientError::Decode(format!("{}: expected a record", path))),
    };
    let mut obj = obj;
    obj.remove("error");
    obj.remove("message");
    Resource::from_value(Value::Object(obj)).map_err(|e| ClientError::Decode(format!("{}: {}", path, e)))
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
