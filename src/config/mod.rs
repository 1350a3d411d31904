//! Application configuration.
//!
//! [`AppConfig`] holds the credentials and runtime settings shared by every
//! component: the Shopify API key and secret (plus an optional previous
//! secret for key rotation), the session encryption key, the Admin API
//! version and the listen address.
//!
//! There are no default secrets. A process that cannot build an [`AppConfig`]
//! must not start.
//!
//! # Example
//!
//! ```rust
//! use giveaway_app::{AppConfig, ApiKey, ApiSecretKey, EncryptionKey};
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("my-api-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("my-secret").unwrap())
//!     .session_key(EncryptionKey::from_hex(
//!         "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
//!     ).unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.api_version().as_ref(), "2025-10");
//! assert!(!config.is_production());
//! ```

mod newtypes;

pub use newtypes::{ApiKey, ApiSecretKey, ApiVersion, EncryptionKey, ShopDomain};

use crate::error::ConfigError;
use std::net::SocketAddr;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Configuration for the app server.
///
/// `AppConfig` is `Clone`, `Send` and `Sync` and is shared through the
/// application state.
///
/// # Key Rotation
///
/// When `old_api_secret_key` is set, webhook signatures and session tokens
/// that fail against the primary secret are retried against the old one, so
/// deliveries signed before a secret rotation still verify.
#[derive(Clone, Debug)]
pub struct AppConfig {
    api_key: ApiKey,
    api_secret_key: ApiSecretKey,
    old_api_secret_key: Option<ApiSecretKey>,
    session_key: EncryptionKey,
    api_version: ApiVersion,
    is_production: bool,
    bind_addr: SocketAddr,
}

impl AppConfig {
    /// Creates a new builder for constructing an `AppConfig`.
    #[must_use]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::new()
    }

    /// Builds the configuration from process environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    ///
    /// Required: `SHOPIFY_API_KEY`, `SHOPIFY_API_SECRET`,
    /// `SESSION_ENCRYPTION_KEY`. Optional: `SHOPIFY_API_SECRET_OLD`,
    /// `SHOPIFY_API_VERSION`, `APP_ENV`, `HOST`, `PORT`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or any value
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get_required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar {
                    name: name.to_string(),
                })
        };
        let get_optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut builder = Self::builder()
            .api_key(ApiKey::new(get_required("SHOPIFY_API_KEY")?)?)
            .api_secret_key(ApiSecretKey::new(get_required("SHOPIFY_API_SECRET")?)?)
            .session_key(EncryptionKey::from_hex(&get_required(
                "SESSION_ENCRYPTION_KEY",
            )?)?)
            .is_production(get_optional("APP_ENV").is_some_and(|env| env == "production"));

        if let Some(old) = get_optional("SHOPIFY_API_SECRET_OLD") {
            builder = builder.old_api_secret_key(ApiSecretKey::new(old)?);
        }
        if let Some(version) = get_optional("SHOPIFY_API_VERSION") {
            builder = builder.api_version(ApiVersion::new(version)?);
        }

        let host = get_optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = get_optional("PORT").unwrap_or_else(|| "3000".to_string());
        let bind_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                name: "HOST/PORT".to_string(),
                reason: e.to_string(),
            })?;

        builder.bind_addr(bind_addr).build()
    }

    /// Returns the API key.
    #[must_use]
    pub const fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Returns the API secret key.
    #[must_use]
    pub const fn api_secret_key(&self) -> &ApiSecretKey {
        &self.api_secret_key
    }

    /// Returns the previous API secret key, if configured.
    #[must_use]
    pub const fn old_api_secret_key(&self) -> Option<&ApiSecretKey> {
        self.old_api_secret_key.as_ref()
    }

    /// Returns the key used to seal session envelopes.
    #[must_use]
    pub const fn session_key(&self) -> &EncryptionKey {
        &self.session_key
    }

    /// Returns the Admin API version.
    #[must_use]
    pub const fn api_version(&self) -> &ApiVersion {
        &self.api_version
    }

    /// Returns `true` when running in production.
    ///
    /// Session cookies carry `Secure` only in production.
    #[must_use]
    pub const fn is_production(&self) -> bool {
        self.is_production
    }

    /// Returns the address the HTTP server listens on.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}

/// Builder for [`AppConfig`].
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    api_key: Option<ApiKey>,
    api_secret_key: Option<ApiSecretKey>,
    old_api_secret_key: Option<ApiSecretKey>,
    session_key: Option<EncryptionKey>,
    api_version: Option<ApiVersion>,
    is_production: bool,
    bind_addr: Option<SocketAddr>,
}

impl AppConfigBuilder {
    /// Creates a new builder with no values set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key (required).
    #[must_use]
    pub fn api_key(mut self, key: ApiKey) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the API secret key (required).
    #[must_use]
    pub fn api_secret_key(mut self, key: ApiSecretKey) -> Self {
        self.api_secret_key = Some(key);
        self
    }

    /// Sets the previous API secret key, accepted during rotation.
    #[must_use]
    pub fn old_api_secret_key(mut self, key: ApiSecretKey) -> Self {
        self.old_api_secret_key = Some(key);
        self
    }

    /// Sets the session envelope key (required).
    #[must_use]
    pub fn session_key(mut self, key: EncryptionKey) -> Self {
        self.session_key = Some(key);
        self
    }

    /// Sets the Admin API version. Defaults to [`ApiVersion::DEFAULT`].
    #[must_use]
    pub fn api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = Some(version);
        self
    }

    /// Marks the deployment as production.
    #[must_use]
    pub const fn is_production(mut self, is_production: bool) -> Self {
        self.is_production = is_production;
        self
    }

    /// Sets the listen address. Defaults to `0.0.0.0:3000`.
    #[must_use]
    pub const fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = Some(addr);
        self
    }

    /// Builds the [`AppConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if `api_key`,
    /// `api_secret_key` or `session_key` is not set.
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let api_key = self
            .api_key
            .ok_or(ConfigError::MissingRequiredField { field: "api_key" })?;
        let api_secret_key = self.api_secret_key.ok_or(ConfigError::MissingRequiredField {
            field: "api_secret_key",
        })?;
        let session_key = self.session_key.ok_or(ConfigError::MissingRequiredField {
            field: "session_key",
        })?;
        let bind_addr = match self.bind_addr {
            Some(addr) => addr,
            None => DEFAULT_BIND_ADDR
                .parse()
                .map_err(|_| ConfigError::InvalidEnvVar {
                    name: "HOST/PORT".to_string(),
                    reason: "default bind address".to_string(),
                })?,
        };

        Ok(AppConfig {
            api_key,
            api_secret_key,
            old_api_secret_key: self.old_api_secret_key,
            session_key,
            api_version: self.api_version.unwrap_or_default(),
            is_production: self.is_production,
            bind_addr,
        })
    }
}

// Verify AppConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AppConfig>();
};
