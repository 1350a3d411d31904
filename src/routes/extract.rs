//! Request guards.
//!
//! Each trust model has its own extractor type, so a handler's signature
//! states which check ran before it:
//!
//! - [`VerifiedWebhook`]: HMAC over the raw body (webhook routes)
//! - [`ShopSession`]: any resolved session (identity)
//! - [`OfflineSession`]: a session that can call the Admin API

use crate::auth::Session;
use crate::routes::ApiError;
use crate::state::AppState;
use crate::webhooks::{
    verify_webhook, WebhookContext, WebhookError, WebhookRequest, HEADER_API_VERSION, HEADER_HMAC,
    HEADER_SHOP_DOMAIN, HEADER_TOPIC, HEADER_WEBHOOK_ID,
};
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

/// Largest webhook body read before verification.
pub const MAX_WEBHOOK_BODY_BYTES: usize = 1024 * 1024;

/// A webhook delivery whose signature has been verified.
#[derive(Debug, Clone)]
pub struct VerifiedWebhook {
    /// Delivery metadata.
    pub context: WebhookContext,
    /// The exact bytes that were verified.
    pub body: Bytes,
}

/// Rejection for [`VerifiedWebhook`]: always `401 Unauthorized`.
#[derive(Debug)]
pub struct WebhookRejection(pub WebhookError);

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl FromRequest<AppState> for VerifiedWebhook {
    type Rejection = WebhookRejection;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let headers = &parts.headers;
        let webhook_id = header(headers, HEADER_WEBHOOK_ID);

        let body = axum::body::to_bytes(body, MAX_WEBHOOK_BODY_BYTES)
            .await
            .map_err(|e| {
                let error = WebhookError::BodyUnreadable {
                    reason: e.to_string(),
                };
                tracing::warn!(webhook_id = webhook_id.as_deref(), error = %error, "webhook rejected");
                WebhookRejection(error)
            })?;

        let request = WebhookRequest::new(
            body.to_vec(),
            header(headers, HEADER_HMAC).unwrap_or_default(),
            header(headers, HEADER_TOPIC),
            header(headers, HEADER_SHOP_DOMAIN),
            header(headers, HEADER_API_VERSION),
            webhook_id,
        );

        match verify_webhook(state.config(), &request) {
            Ok(context) => Ok(Self { context, body }),
            Err(error) => {
                tracing::warn!(
                    path = %parts.uri.path(),
                    topic = request.topic(),
                    shop = request.shop_domain(),
                    webhook_id = request.webhook_id(),
                    "webhook signature verification failed"
                );
                Err(WebhookRejection(error))
            }
        }
    }
}

/// The resolved session of a dashboard request.
///
/// A bearer-derived session identifies the shop but has no access token.
#[derive(Debug, Clone)]
pub struct ShopSession(pub Session);

impl FromRequestParts<AppState> for ShopSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state
            .resolver()
            .resolve(&parts.headers)
            .await
            .map(Self)
            .ok_or_else(|| ApiError::Unauthorized("no session".to_string()))
    }
}

/// A session holding an Admin API access token.
///
/// When the resolved session is identity-only, the shop's persisted offline
/// session is loaded instead.
#[derive(Debug, Clone)]
pub struct OfflineSession(pub Session);

impl FromRequestParts<AppState> for OfflineSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ShopSession(session) = ShopSession::from_request_parts(parts, state).await?;
        if session.has_access_token() {
            return Ok(Self(session));
        }

        let offline_id = Session::offline_id(&session.shop);
        state
            .sessions()
            .load(&offline_id)
            .await
            .filter(Session::has_access_token)
            .map(Self)
            .ok_or_else(|| {
                tracing::debug!(shop = %session.shop, "no offline session with an access token");
                ApiError::Unauthorized(format!("no offline session for {}", session.shop))
            })
    }
}
