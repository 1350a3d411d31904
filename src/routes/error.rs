//! HTTP error responses for the dashboard API.
//!
//! Webhook routes never use [`ApiError`]: after verification they always
//! answer 200, and before it they answer a plain `401 Unauthorized`.

use crate::auth::AuthError;
use crate::billing::BillingError;
use crate::clients::AdminApiError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors returned by session-guarded API routes.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No usable session for the request.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Session token validation or token exchange failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Billing sync failed.
    #[error(transparent)]
    Billing(#[from] BillingError),

    /// Internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_)
            | Self::Auth(AuthError::InvalidSessionToken { .. })
            | Self::Billing(BillingError::Admin(AdminApiError::MissingAccessToken { .. })) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Auth(AuthError::TokenExchangeFailed { .. })
            | Self::Billing(BillingError::Admin(_) | BillingError::Malformed(_)) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Billing(BillingError::Store(_)) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "API request failed");
            match status {
                StatusCode::BAD_GATEWAY => "External service error".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            tracing::debug!(error = %self, "API request rejected");
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
