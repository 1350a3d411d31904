//! # Giveaway App Server
//!
//! Server side of a Shopify embedded app that runs an Instagram giveaway
//! popup on checkout and order pages. This crate owns the parts with a
//! correctness contract:
//!
//! - webhook HMAC verification over the raw request body ([`webhooks`])
//! - session-token and cookie session resolution ([`sessions`])
//! - an encrypted, dual-keyed session store with a bounded in-memory
//!   fallback for store outages ([`sessions::SessionStore`])
//! - the mandatory compliance webhooks ([`compliance`])
//! - billing and trial sync from the Admin API ([`billing`])
//! - the axum HTTP surface tying them together ([`routes`])
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use giveaway_app::routes::router;
//! use giveaway_app::store::{DisabledAssets, MemoryStore};
//! use giveaway_app::{AppConfig, AppState};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::from_env()?;
//! let addr = config.bind_addr();
//! let state = AppState::new(config, Arc::new(MemoryStore::new()), Arc::new(DisabledAssets));
//!
//! let listener = tokio::net::TcpListener::bind(addr).await?;
//! axum::serve(listener, router(state)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Trust Model
//!
//! Webhook routes trust only the HMAC signature; dashboard routes trust only
//! a resolved session. The two guards are distinct extractor types
//! ([`routes::VerifiedWebhook`], [`routes::ShopSession`],
//! [`routes::OfflineSession`]).

pub mod auth;
pub mod billing;
pub mod clients;
pub mod compliance;
pub mod config;
pub mod error;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod store;
pub mod webhooks;

// Re-export public types at crate root for convenience
pub use auth::{AuthError, Session, SessionToken};
pub use config::{ApiKey, ApiSecretKey, ApiVersion, AppConfig, AppConfigBuilder, EncryptionKey, ShopDomain};
pub use error::ConfigError;
pub use state::AppState;

pub use compliance::{ComplianceError, ComplianceService};
pub use sessions::{SessionResolver, SessionStore};
pub use store::{DocumentStore, StoreError};
pub use webhooks::{verify_hmac, verify_webhook, WebhookError};
