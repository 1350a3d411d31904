//! Webhook error types.
//!
//! - [`WebhookError::InvalidHmac`]: signature verification failed; the only
//!   webhook failure that reaches the sender as a non-200 (401)
//! - [`WebhookError::InvalidPayload`]: a verified body could not be
//!   normalized; logged and acknowledged
//! - [`WebhookError::BodyUnreadable`]: the request body could not be read in
//!   full; treated as a verification failure

use thiserror::Error;

/// Errors from webhook verification and payload parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// Webhook signature verification failed.
    #[error("Webhook signature verification failed")]
    InvalidHmac,

    /// The request body could not be read.
    #[error("Webhook body could not be read: {reason}")]
    BodyUnreadable {
        /// Why reading stopped.
        reason: String,
    },

    /// The verified payload does not describe a usable request.
    #[error("Invalid webhook payload: {reason}")]
    InvalidPayload {
        /// What was missing or malformed.
        reason: String,
    },
}
