//! Request-to-session resolution.
//!
//! Resolution order, first match wins:
//!
//! 1. `Authorization: Bearer <session token>`: a verified token yields an
//!    identity-only session for its shop (no access token). An invalid token
//!    is logged and resolution falls through.
//! 2. `shopify_app_session` cookie: the sealed id is opened and loaded from
//!    the session store. A plain or forged id is ignored.
//! 3. `shopify_session_data` cookie: the sealed envelope is opened.
//! 4. Otherwise no session.
//!
//! Every failure along the way degrades to "no session". Nothing here returns
//! an error or panics.

use crate::auth::{Session, SessionToken};
use crate::config::AppConfig;
use crate::sessions::cookies::{cookie_value, SESSION_DATA_COOKIE, SESSION_ID_COOKIE};
use crate::sessions::SessionStore;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use std::sync::Arc;

/// Resolves the merchant session behind a request.
#[derive(Debug, Clone)]
pub struct SessionResolver {
    config: Arc<AppConfig>,
    sessions: Arc<SessionStore>,
}

impl SessionResolver {
    /// Creates a resolver.
    #[must_use]
    pub const fn new(config: Arc<AppConfig>, sessions: Arc<SessionStore>) -> Self {
        Self { config, sessions }
    }

    /// Resolves the session for a request's headers.
    pub async fn resolve(&self, headers: &HeaderMap) -> Option<Session> {
        if let Some(session) = self.from_bearer(headers) {
            return Some(session);
        }

        if let Some(sealed) = cookie_value(headers, SESSION_ID_COOKIE) {
            match self.sessions.cipher().open_id(&sealed) {
                Ok(id) => {
                    if let Some(session) = self.sessions.load(&id).await {
                        return Some(session);
                    }
                    tracing::debug!(session_id = %id, "session cookie did not match a stored session");
                }
                Err(e) => tracing::debug!(error = %e, "session id cookie rejected"),
            }
        }

        let envelope = cookie_value(headers, SESSION_DATA_COOKIE)?;
        match self.sessions.cipher().open(&envelope) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::debug!(error = %e, "session data cookie rejected");
                None
            }
        }
    }

    /// Returns the raw bearer token, if the request carries one.
    #[must_use]
    pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = value.trim().split_once(' ')?;
        let token = token.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
    }

    fn from_bearer(&self, headers: &HeaderMap) -> Option<Session> {
        let token = Self::bearer_token(headers)?;
        match SessionToken::decode(token, &self.config).and_then(|claims| claims.shop()) {
            Ok(shop) => Some(Session::identity_only(shop)),
            Err(e) => {
                tracing::debug!(error = %e, "bearer session token rejected, trying cookies");
                None
            }
        }
    }
}
