//! Application state shared across handlers.

use crate::auth::TokenExchangeClient;
use crate::billing::BillingService;
use crate::compliance::ComplianceService;
use crate::config::AppConfig;
use crate::sessions::{SessionCipher, SessionResolver, SessionStore};
use crate::store::{AssetStore, DocumentStore};
use std::sync::Arc;

/// Services behind the HTTP surface.
///
/// Cheap to clone; every component is shared.
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    sessions: Arc<SessionStore>,
    resolver: SessionResolver,
    compliance: Arc<ComplianceService>,
    billing: Arc<BillingService>,
    token_exchange: Arc<TokenExchangeClient>,
}

impl AppState {
    /// Wires the services over one document store and one asset store.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        assets: Arc<dyn AssetStore>,
    ) -> Self {
        let config = Arc::new(config);
        let sessions = Arc::new(SessionStore::new(
            Arc::clone(&store),
            SessionCipher::new(config.session_key()),
        ));

        Self {
            resolver: SessionResolver::new(Arc::clone(&config), Arc::clone(&sessions)),
            compliance: Arc::new(ComplianceService::new(
                Arc::clone(&store),
                Arc::clone(&sessions),
                assets,
            )),
            billing: Arc::new(BillingService::new(store, config.api_version().clone())),
            token_exchange: Arc::new(TokenExchangeClient::new()),
            config,
            sessions,
        }
    }

    /// Replaces the token exchange client.
    #[must_use]
    pub fn with_token_exchange(mut self, client: TokenExchangeClient) -> Self {
        self.token_exchange = Arc::new(client);
        self
    }

    /// Replaces the billing service.
    #[must_use]
    pub fn with_billing(mut self, billing: BillingService) -> Self {
        self.billing = Arc::new(billing);
        self
    }

    /// Returns the app configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns the session store.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Returns the session resolver.
    #[must_use]
    pub const fn resolver(&self) -> &SessionResolver {
        &self.resolver
    }

    /// Returns the compliance service.
    #[must_use]
    pub fn compliance(&self) -> &ComplianceService {
        &self.compliance
    }

    /// Returns the billing service.
    #[must_use]
    pub fn billing(&self) -> &BillingService {
        &self.billing
    }

    /// Returns the token exchange client.
    #[must_use]
    pub fn token_exchange(&self) -> &TokenExchangeClient {
        &self.token_exchange
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
