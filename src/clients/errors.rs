//! Admin API error types.
//!
//! - [`AdminApiError::MissingAccessToken`]: the session cannot call the API
//! - [`AdminApiError::Response`]: a non-2xx answer that is not retried
//! - [`AdminApiError::MaxRetries`]: 429 or 500 on every attempt
//! - [`AdminApiError::Network`]: the request never got an answer

use thiserror::Error;

/// Errors from Admin API requests.
#[derive(Debug, Error)]
pub enum AdminApiError {
    /// The session has no access token.
    #[error("Session for {shop} has no access token")]
    MissingAccessToken {
        /// Shop domain of the session.
        shop: String,
    },

    /// Shopify answered with a non-successful status.
    #[error("Admin API request failed ({code}): {message}")]
    Response {
        /// HTTP status code.
        code: u16,
        /// Serialized `errors` / `error` fields from the body.
        message: String,
        /// `X-Request-Id` of the failed request.
        error_reference: Option<String>,
    },

    /// Every attempt was throttled or failed with 500.
    #[error("Exceeded maximum retry count of {tries}. Last message: {message}")]
    MaxRetries {
        /// Status of the last attempt.
        code: u16,
        /// Attempts made.
        tries: u32,
        /// Serialized error of the last attempt.
        message: String,
    },

    /// Transport failure.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AdminApiError {
    /// Returns the HTTP status when Shopify answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Response { code, .. } | Self::MaxRetries { code, .. } => Some(*code),
            Self::MissingAccessToken { .. } | Self::Network(_) => None,
        }
    }
}
