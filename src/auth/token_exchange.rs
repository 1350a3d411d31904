//! OAuth 2.0 token exchange (RFC 8693) for embedded apps.
//!
//! An embedded app trades the App Bridge session token for an offline access
//! token without a redirect-based OAuth flow. The resulting offline session is
//! what the session store persists and what billing sync uses for Admin API
//! calls.
//!
//! # Token Types
//!
//! - Grant type: `urn:ietf:params:oauth:grant-type:token-exchange`
//! - Subject token type: `urn:ietf:params:oauth:token-type:id_token`
//! - Requested token type: `urn:shopify:params:oauth:token-type:offline-access-token`

use crate::auth::{AuthError, Session, SessionToken};
use crate::config::{AppConfig, ShopDomain};
use serde::{Deserialize, Serialize};

const TOKEN_EXCHANGE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const ID_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:id_token";
const OFFLINE_ACCESS_TOKEN_TYPE: &str = "urn:shopify:params:oauth:token-type:offline-access-token";

#[derive(Debug, Serialize)]
struct TokenExchangeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
    subject_token: &'a str,
    subject_token_type: &'a str,
    requested_token_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenExchangeErrorResponse {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    #[serde(default)]
    scope: String,
}

/// Client for Shopify's `/admin/oauth/access_token` endpoint.
///
/// By default requests go to `https://<shop>`. [`TokenExchangeClient::with_base_url`]
/// points them elsewhere, which is how tests aim it at a mock server.
#[derive(Debug, Clone, Default)]
pub struct TokenExchangeClient {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl TokenExchangeClient {
    /// Creates a client that talks to the shop's own domain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client that sends every request to `base_url`.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: Some(base_url.into().trim_end_matches('/').to_string()),
        }
    }

    /// Exchanges a session token for an offline access token.
    ///
    /// The session token is validated locally first, and the shop is taken
    /// from its `dest` claim.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidSessionToken`] if the token fails validation or
    ///   Shopify answers `400 invalid_subject_token`
    /// - [`AuthError::TokenExchangeFailed`] for any other failure
    pub async fn exchange_offline_token(
        &self,
        config: &AppConfig,
        session_token: &str,
    ) -> Result<Session, AuthError> {
        let shop = SessionToken::decode(session_token, config)?.shop()?;
        let token_url = self.token_url(&shop);

        let request_body = TokenExchangeRequest {
            client_id: config.api_key().as_ref(),
            client_secret: config.api_secret_key().as_ref(),
            grant_type: TOKEN_EXCHANGE_GRANT_TYPE,
            subject_token: session_token,
            subject_token_type: ID_TOKEN_TYPE,
            requested_token_type: OFFLINE_ACCESS_TOKEN_TYPE,
        };

        let response = self
            .http
            .post(&token_url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed {
                status: 0,
                message: format!("Network error: {e}"),
            })?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();

            if status == 400 {
                let rejected = serde_json::from_str::<TokenExchangeErrorResponse>(&error_body)
                    .ok()
                    .and_then(|e| e.error)
                    .is_some_and(|e| e == "invalid_subject_token");
                if rejected {
                    return Err(AuthError::InvalidSessionToken {
                        reason: "Session token was rejected by token exchange".to_string(),
                    });
                }
            }

            return Err(AuthError::TokenExchangeFailed {
                status,
                message: error_body,
            });
        }

        let token_response: AccessTokenResponse =
            response
                .json()
                .await
                .map_err(|e| AuthError::TokenExchangeFailed {
                    status,
                    message: format!("Failed to parse token response: {e}"),
                })?;

        tracing::info!(shop = %shop, "exchanged session token for offline access token");

        Ok(Session::offline(
            shop,
            token_response.access_token,
            token_response.scope,
        ))
    }

    fn token_url(&self, shop: &ShopDomain) -> String {
        let base = self
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{shop}"));
        format!("{base}/admin/oauth/access_token")
    }
}
