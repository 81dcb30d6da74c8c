//!
//! resrv HTTP gateway
//! ------------------
//! Axum front for the reservation backend.
//!
//! Responsibilities:
//! - Session gate on page routes: resolve the `session` cookie through the
//!   backend, clear it and redirect to sign-in when it does not resolve.
//! - Role dispatch into the page model (view + sidebar tabs).
//! - Sign-in callback (token -> cookie) and sign-out (cookie cleared).
//! - Same-origin `/api/{resource}/{action}` proxy onto the resource client.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::client::{HttpTransport, ResourceClient, Transport};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::resource::{ListParams, Operation, ResourceKind};
use crate::session::{Resolution, SessionResolver};
use crate::shell::{Shell, Tab};

pub const SESSION_COOKIE: &str = "session";
/// Cookie name used by earlier deployments; read as a fallback, cleared on sign-out.
pub const LEGACY_SESSION_COOKIE: &str = "authorization";
pub const SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 30;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Unauthenticated base client; handlers bind the caller's token.
    pub client: ResourceClient,
    pub resolver: SessionResolver,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(config.backend_url.clone(), config.backend_timeout)
            .context("building backend HTTP client")?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Self {
        let client = ResourceClient::new(transport);
        Self { config: Arc::new(config), resolver: SessionResolver::new(client.clone()), client }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/tab/{tab}", get(tab_page))
        .route("/sign-in", get(sign_in))
        .route("/api/sign-out", any(sign_out))
        .route("/api/{resource}/{action}", post(api))
        .route("/healthz", get(|| async { Json(json!({ "status": "ok" })) }))
        .with_state(state)
}

/// Start the gateway on the configured address.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = config.addr();
    info!(target: "startup", backend = %config.backend_url, "Starting resrv on {}", addr);
    let state = AppState::new(config)?;
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get(header::COOKIE)?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name && v.len() > 1 {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    parse_cookie(headers, SESSION_COOKIE).or_else(|| parse_cookie(headers, LEGACY_SESSION_COOKIE))
}

/// Bearer header first, then the session cookie.
fn request_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| session_token(headers))
}

fn cookie_safe(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_graphic() && c != ';' && c != ',' && c != '"')
}

fn cookie_header(name: &str, value: &str, max_age: u64, secure: bool) -> Option<HeaderValue> {
    let secure = if secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!("{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}{}", name, value, max_age, secure)).ok()
}

fn set_session_cookie(headers: &mut HeaderMap, token: &str, secure: bool) {
    if let Some(v) = cookie_header(SESSION_COOKIE, token, SESSION_MAX_AGE_SECS, secure) {
        headers.append(header::SET_COOKIE, v);
    }
}

fn clear_session_cookie(headers: &mut HeaderMap, name: &str, secure: bool) {
    if let Some(v) = cookie_header(name, "", 0, secure) {
        headers.append(header::SET_COOKIE, v);
    }
}

/// Expire the canonical cookie, and the legacy one when the request carried it.
fn clear_session_cookies(headers: &mut HeaderMap, request: &HeaderMap, secure: bool) {
    clear_session_cookie(headers, SESSION_COOKIE, secure);
    if parse_cookie(request, LEGACY_SESSION_COOKIE).is_some() {
        clear_session_cookie(headers, LEGACY_SESSION_COOKIE, secure);
    }
}

fn redirect(location: &'static str, mut headers: HeaderMap) -> Response {
    headers.insert(header::LOCATION, HeaderValue::from_static(location));
    (StatusCode::FOUND, headers).into_response()
}

fn error_response(err: AppError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.envelope())).into_response()
}

/// Run the session gate; `Err` carries the redirect to send instead.
async fn gate(state: &AppState, headers: &HeaderMap) -> Result<crate::model::User, Response> {
    let token = session_token(headers);
    match state.resolver.resolve(token.as_deref()).await {
        Resolution::Render(user) => Ok(user),
        Resolution::Redirect { location, clear_cookie } => {
            let mut h = HeaderMap::new();
            if clear_cookie {
                clear_session_cookies(&mut h, headers, state.config.cookie_secure);
            }
            Err(redirect(location, h))
        }
    }
}

fn page_model(shell: &Shell, active: Option<Tab>, user: &crate::model::User) -> Value {
    json!({
        "view": shell.view(),
        "tabs": shell.tabs(),
        "activeTab": active,
        "user": user,
    })
}

async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match gate(&state, &headers).await {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let shell = Shell::for_user(&user);
    debug!(target: "session", user = %user.id, view = shell.view(), "render");
    (StatusCode::OK, Json(page_model(&shell, shell.default_tab(), &user))).into_response()
}

async fn tab_page(State(state): State<AppState>, Path(tab): Path<String>, headers: HeaderMap) -> Response {
    let user = match gate(&state, &headers).await {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let Some(tab) = Tab::parse(&tab) else {
        return error_response(AppError::not_found("not_found", "unknown page"));
    };
    let shell = Shell::for_user(&user);
    if !shell.allows_tab(tab) {
        return error_response(AppError::forbidden("forbidden", "page not available for this account"));
    }
    (StatusCode::OK, Json(page_model(&shell, Some(tab), &user))).into_response()
}

#[derive(Debug, Deserialize)]
struct SignInQuery {
    token: Option<String>,
    error: Option<String>,
}

fn sign_in_message(code: &str) -> Option<&'static str> {
    match code {
        "1" => Some("Invalid email"),
        "session" => Some("Session expired"),
        _ => None,
    }
}

async fn sign_in(State(state): State<AppState>, Query(q): Query<SignInQuery>, headers: HeaderMap) -> Response {
    if let Some(token) = q.token.as_deref().filter(|t| !t.is_empty()) {
        if !cookie_safe(token) {
            return error_response(AppError::user("invalid_token", "malformed sign-in token"));
        }
        return match state.resolver.resolve(Some(token)).await {
            Resolution::Render(user) => {
                info!(target: "session", user = %user.id, "signed in");
                let mut h = HeaderMap::new();
                set_session_cookie(&mut h, token, state.config.cookie_secure);
                redirect("/", h)
            }
            Resolution::Redirect { location, .. } => redirect(location, HeaderMap::new()),
        };
    }
    // Only the canonical cookie counts here; a leftover legacy cookie that
    // the gate already rejected would bounce straight back.
    if parse_cookie(&headers, SESSION_COOKIE).is_some() {
        return redirect("/", HeaderMap::new());
    }
    let error = q.error.as_deref().and_then(sign_in_message);
    (StatusCode::OK, Json(json!({ "view": "sign-in", "error": error }))).into_response()
}

async fn sign_out(State(state): State<AppState>, method: Method, headers: HeaderMap) -> Response {
    if method != Method::POST {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid method" }))).into_response();
    }
    if session_token(&headers).is_none() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "no session" }))).into_response();
    }
    let mut h = HeaderMap::new();
    clear_session_cookies(&mut h, &headers, state.config.cookie_secure);
    info!(target: "session", "signed out");
    (StatusCode::OK, h, Json(json!({ "error": null }))).into_response()
}

async fn api(
    State(state): State<AppState>,
    Path((resource, action)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body: Value = if body.is_empty() {
        Value::Object(Map::new())
    } else {
        match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => return error_response(AppError::user("invalid_json".to_string(), e.to_string())),
        }
    };
    debug!(target: "api", %resource, %action, "proxy");
    match proxy(&state, &resource, &action, request_token(&headers), body).await {
        Ok(v) => (StatusCode::OK, Json(v)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn proxy(state: &AppState, resource: &str, action: &str, token: Option<String>, body: Value) -> AppResult<Value> {
    let kind = ResourceKind::parse(resource).ok_or_else(|| AppError::not_found("not_found", "unknown resource"))?;
    let op = Operation::parse(action).ok_or_else(|| AppError::not_found("not_found", "unknown action"))?;
    if kind.endpoint(op).is_none() {
        return Err(AppError::not_found("not_found".to_string(), format!("{} cannot {}", kind, action)));
    }
    let client = state.client.with_token(token.unwrap_or_default());
    let id = || {
        body.get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::user("missing_id", "id is required"))
    };
    match op {
        Operation::List => {
            let params = list_params(&body, state.config.page_size);
            let rows = client.list(kind, &params).await?;
            Ok(json!({ "error": null, "data": rows }))
        }
        Operation::Create => {
            let created = client.create(kind, fields_of(&body)).await?;
            Ok(json!({ "error": null, "data": created }))
        }
        Operation::Update => {
            let id = id()?;
            let updated = client.update(kind, &id, fields_of(&body)).await?;
            Ok(json!({ "error": null, "data": updated }))
        }
        Operation::Toggle => {
            let id = id()?;
            let desired = body
                .get("state")
                .and_then(|v| v.as_bool())
                .ok_or_else(|| AppError::user("missing_state", "state is required"))?;
            let reply = client.toggle(kind, &id, desired).await?;
            Ok(json!({ "error": null, "isDisabled": reply.is_disabled }))
        }
        Operation::Delete => {
            let id = id()?;
            client.delete(kind, &id).await?;
            Ok(json!({ "error": null }))
        }
    }
}

fn list_params(body: &Value, page_size: u64) -> ListParams {
    let text = |k: &str| body.get(k).and_then(|v| v.as_str()).filter(|s| !s.is_empty()).map(str::to_string);
    ListParams {
        skip: body.get("skip").and_then(|v| v.as_u64()).unwrap_or(0),
        take: body.get("take").and_then(|v| v.as_u64()).unwrap_or(page_size),
        keyword: text("keyword"),
        filter_id: text("filterId").or_else(|| text("programId")).or_else(|| text("departmentId")),
    }
}

fn fields_of(body: &Value) -> Map<String, Value> {
    let mut m = body.as_object().cloned().unwrap_or_default();
    m.remove("id");
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_cookie(v: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::COOKIE, HeaderValue::from_str(v).unwrap());
        h
    }

    #[test]
    fn session_cookie_prefers_canonical_name() {
        assert_eq!(session_token(&with_cookie("theme=dark; session=abc")), Some("abc".into()));
        assert_eq!(session_token(&with_cookie("authorization=old")), Some("old".into()));
        assert_eq!(session_token(&with_cookie("authorization=old; session=new")), Some("new".into()));
        assert_eq!(session_token(&with_cookie("session=")), None);
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn bearer_header_beats_cookie() {
        let mut h = with_cookie("session=cookie");
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer header"));
        assert_eq!(request_token(&h), Some("header".into()));
        assert_eq!(request_token(&with_cookie("session=cookie")), Some("cookie".into()));
    }

    #[test]
    fn cookie_attributes() {
        let mut h = HeaderMap::new();
        set_session_cookie(&mut h, "tok", false);
        clear_session_cookie(&mut h, SESSION_COOKIE, true);
        let all: Vec<_> = h.get_all(header::SET_COOKIE).iter().map(|v| v.to_str().unwrap().to_string()).collect();
        assert_eq!(all[0], "session=tok; HttpOnly; Path=/; SameSite=Lax; Max-Age=2592000");
        assert_eq!(all[1], "session=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0; Secure");
    }

    #[test]
    fn sign_in_error_codes() {
        assert_eq!(sign_in_message("1"), Some("Invalid email"));
        assert_eq!(sign_in_message("session"), Some("Session expired"));
        assert_eq!(sign_in_message("other"), None);
        assert!(!cookie_safe("a;b"));
        assert!(cookie_safe("eyJhbGciOi.abc-123_"));
    }

    #[test]
    fn list_params_from_proxy_body() {
        let p = list_params(&json!({ "skip": 40, "keyword": "cs", "programId": "p1" }), 20);
        assert_eq!(p, ListParams { skip: 40, take: 20, keyword: Some("cs".into()), filter_id: Some("p1".into()) });
        let fields = fields_of(&json!({ "id": "x", "name": "n" }));
        assert!(fields.get("id").is_none());
    }
}
