//! Configuration error types.
//!
//! All configuration constructors return `Result<T, ConfigError>` so a
//! misconfigured process fails at start-up instead of running with defaults.
//!
//! # Example
//!
//! ```rust
//! use giveaway_app::{ApiKey, ConfigError};
//!
//! let result = ApiKey::new("");
//! assert!(matches!(result, Err(ConfigError::EmptyApiKey)));
//! ```

use thiserror::Error;

/// Errors that can occur while building the application configuration.
///
/// Each variant names the offending value or variable so the operator can fix
/// the deployment without reading the source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// API key cannot be empty.
    #[error("API key cannot be empty. Please provide a valid Shopify API key.")]
    EmptyApiKey,

    /// API secret key cannot be empty.
    #[error("API secret key cannot be empty. Please provide a valid Shopify API secret key.")]
    EmptyApiSecretKey,

    /// Shop domain is invalid.
    #[error("Invalid shop domain '{domain}'. Expected format: 'shop-name' or 'shop-name.myshopify.com'.")]
    InvalidShopDomain {
        /// The invalid domain that was provided.
        domain: String,
    },

    /// API version is invalid.
    #[error("Invalid API version '{version}'. Expected format: 'YYYY-MM' (e.g., '2025-10') or 'unstable'.")]
    InvalidApiVersion {
        /// The invalid version string that was provided.
        version: String,
    },

    /// Session encryption key is invalid.
    #[error("Invalid session encryption key: {reason}")]
    InvalidEncryptionKey {
        /// Why the key was rejected.
        reason: String,
    },

    /// A required field is missing.
    #[error("Missing required field: '{field}'. This field must be set before building the configuration.")]
    MissingRequiredField {
        /// The name of the missing field.
        field: &'static str,
    },

    /// A required environment variable is not set.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// The variable name.
        name: String,
    },

    /// An environment variable is set but cannot be used.
    #[error("Invalid environment variable {name}: {reason}")]
    InvalidEnvVar {
        /// The variable name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}
