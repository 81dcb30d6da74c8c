//! Per-request session gate.
//!
//! The session cookie holds an opaque backend token. Each protected page
//! resolves it through `/user/current`; any failure clears the cookie and sends
//! the browser back to sign-in.

use tracing::{debug, warn};

use crate::client::ResourceClient;
use crate::model::User;

pub const SIGN_IN_PATH: &str = "/sign-in";
pub const SESSION_EXPIRED_PATH: &str = "/sign-in?error=session";

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Redirect { location: &'static str, clear_cookie: bool },
    Render(User),
}

#[derive(Clone)]
pub struct SessionResolver {
    client: ResourceClient,
}

impl SessionResolver {
    /// `client` is the unauthenticated base client; the token is bound per call.
    pub fn new(client: ResourceClient) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, token: Option<&str>) -> Resolution {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            debug!(target: "session", "no session cookie");
            return Resolution::Redirect { location: SIGN_IN_PATH, clear_cookie: true };
        };
        match self.client.with_token(token).current_user().await {
            Ok(user) => {
                debug!(target: "session", user = %user.id, "session resolved");
                Resolution::Render(user)
            }
            Err(e) => {
                warn!(target: "session", error = %e, "session rejected");
                Resolution::Redirect { location: SESSION_EXPIRED_PATH, clear_cookie: true }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Failure, FakeBackend};
    use serde_json::json;

    fn resolver(backend: &std::sync::Arc<FakeBackend>) -> SessionResolver {
        SessionResolver::new(ResourceClient::new(backend.clone()))
    }

    #[tokio::test]
    async fn missing_cookie_redirects_without_backend_call() {
        let backend = FakeBackend::new();
        let r = resolver(&backend).resolve(None).await;
        assert_eq!(r, Resolution::Redirect { location: SIGN_IN_PATH, clear_cookie: true });
        assert_eq!(resolver(&backend).resolve(Some("")).await, r);
        assert_eq!(backend.calls("/user/current"), 0);
    }

    #[tokio::test]
    async fn rejected_token_redirects_with_error() {
        let backend = FakeBackend::new();
        let r = resolver(&backend).resolve(Some("stale")).await;
        assert_eq!(r, Resolution::Redirect { location: SESSION_EXPIRED_PATH, clear_cookie: true });

        backend.add_session("tok", json!({ "id": "u1", "email": "a@school.edu" }));
        backend.fail_next("/user/current", Failure::Transport);
        let r = resolver(&backend).resolve(Some("tok")).await;
        assert!(matches!(r, Resolution::Redirect { clear_cookie: true, .. }));
    }

    #[tokio::test]
    async fn valid_token_renders_user() {
        let backend = FakeBackend::new();
        backend.add_session("tok", json!({ "id": "u1", "email": "a@school.edu", "isDisabled": true }));
        match resolver(&backend).resolve(Some("tok")).await {
            Resolution::Render(user) => {
                assert_eq!(user.id, "u1");
                assert!(user.is_disabled());
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
