//! HTTP surface.
//!
//! | Method | Path | Guard |
//! |---|---|---|
//! | POST | `/api/webhooks` | [`VerifiedWebhook`] |
//! | POST | `/api/webhooks/customers/data_request` | [`VerifiedWebhook`] |
//! | POST | `/api/webhooks/customers/redact` | [`VerifiedWebhook`] |
//! | POST | `/api/webhooks/shop/redact` | [`VerifiedWebhook`] |
//! | POST | `/api/webhooks/app/uninstalled` | [`VerifiedWebhook`] |
//! | GET | `/api/session` | [`ShopSession`] |
//! | POST | `/api/auth/token-exchange` | bearer session token |
//! | POST | `/api/billing/sync` | [`OfflineSession`] |
//! | GET | `/health` | none |
//!
//! Other methods on these paths get `405 Method Not Allowed`.

mod api;
mod error;
mod extract;
mod webhooks;

pub use error::ApiError;
pub use extract::{
    OfflineSession, ShopSession, VerifiedWebhook, WebhookRejection, MAX_WEBHOOK_BODY_BYTES,
};

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/webhooks", post(webhooks::unified))
        .route(
            "/api/webhooks/customers/data_request",
            post(webhooks::customers_data_request),
        )
        .route("/api/webhooks/customers/redact", post(webhooks::customers_redact))
        .route("/api/webhooks/shop/redact", post(webhooks::shop_redact))
        .route("/api/webhooks/app/uninstalled", post(webhooks::app_uninstalled))
        .route("/api/session", get(api::session))
        .route("/api/auth/token-exchange", post(api::token_exchange))
        .route("/api/billing/sync", post(api::billing_sync))
        .route("/health", get(api::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
