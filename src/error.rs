//! Unified application error model and mapping helpers.
//! `AppError` is what the HTTP surface returns; `ClientError` is what the
//! backend resource client produces and is folded into `AppError` at the edge.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Generic text shown to users for failures that carry no domain message.
pub const GENERIC_FAILURE: &str = "An error occurred";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    Domain { code: String, message: String },
    Upstream { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Domain { code, .. }
            | AppError::Upstream { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Domain { message, .. }
            | AppError::Upstream { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn domain<S: Into<String>>(code: S, msg: S) -> Self { AppError::Domain { code: code.into(), message: msg.into() } }
    pub fn upstream<S: Into<String>>(code: S, msg: S) -> Self { AppError::Upstream { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            // Backend domain failures travel inside a successful transport response.
            AppError::Domain { .. } => 200,
            AppError::Upstream { .. } => 502,
            AppError::Internal { .. } => 500,
        }
    }

    /// JSON body in the `{error, message}` envelope the backend itself uses.
    pub fn envelope(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.code_str(), "message": self.message() })
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

/// Failures of a single backend call. Transport, HTTP status and domain
/// failures stay distinct so callers can react to each.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("no session token")]
    Unauthorized,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("backend returned HTTP {status}")]
    Http { status: u16 },
    #[error("{0}")]
    Domain(String),
    #[error("malformed backend response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Text suitable for a user-facing notification: domain messages verbatim,
    /// everything else generic.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Domain(msg) => msg.clone(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unauthorized => AppError::auth("unauthorized", "no valid session"),
            ClientError::Domain(msg) => AppError::Domain { code: "domain_error".into(), message: msg },
            ClientError::Http { status } => AppError::Upstream { code: "backend_status".into(), message: format!("backend returned HTTP {}", status) },
            ClientError::Transport(msg) => AppError::Upstream { code: "backend_unreachable".into(), message: msg },
            ClientError::Decode(msg) => AppError::Upstream { code: "backend_malformed".into(), message: msg },
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
