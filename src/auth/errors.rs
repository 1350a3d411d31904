//! Authentication error types.

use thiserror::Error;

/// Errors from session-token validation and token exchange.
///
/// The session resolver never surfaces these to callers: a failed token
/// falls through to the cookie-backed resolution steps.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The session token could not be decoded or failed validation.
    #[error("Invalid session token: {reason}")]
    InvalidSessionToken {
        /// Why the token was rejected.
        reason: String,
    },

    /// Shopify rejected the token exchange request.
    #[error("Token exchange failed with status {status}: {message}")]
    TokenExchangeFailed {
        /// HTTP status code, or 0 for network errors.
        status: u16,
        /// Response body or error description.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_exchange_failed_message_includes_status() {
        let error = AuthError::TokenExchangeFailed {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Token exchange failed with status 502: bad gateway"
        );
    }

    #[test]
    fn test_auth_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AuthError>();
    }
}
