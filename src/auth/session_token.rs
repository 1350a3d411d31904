//! App Bridge session tokens.
//!
//! Embedded admin pages and checkout UI extensions authenticate their fetches
//! with a short-lived HS256 JWT signed with the app's API secret. The token
//! proves which shop a request comes from; it never grants API access.
//!
//! # Claims
//!
//! - `dest`: the shop, e.g. `https://shop.myshopify.com` (admin) or
//!   `shop.myshopify.com` (checkout extensions)
//! - `aud`: must equal the app's API key
//! - `exp` / `nbf`: checked with a 10 second leeway
//! - `iss`, `sub`, `iat`, `jti`, `sid`: informational
//!
//! # Dual-Key Validation
//!
//! Decoding tries the primary secret, then the previous secret if one is
//! configured.

use crate::auth::AuthError;
use crate::config::{AppConfig, ShopDomain};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

const JWT_LEEWAY_SECS: u64 = 10;

/// Decoded claims of a session token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionToken {
    /// Issuer, e.g. `https://shop.myshopify.com/admin`.
    #[serde(default)]
    pub iss: Option<String>,

    /// Destination shop.
    pub dest: String,

    /// Audience (the app's API key).
    pub aud: String,

    /// Subject: a user id for admin tokens, a customer gid for extensions.
    #[serde(default)]
    pub sub: Option<String>,

    /// Expiration timestamp.
    pub exp: i64,

    /// Not-before timestamp.
    #[serde(default)]
    pub nbf: Option<i64>,

    /// Issued-at timestamp.
    #[serde(default)]
    pub iat: Option<i64>,

    /// Token id.
    #[serde(default)]
    pub jti: Option<String>,

    /// Shopify session id.
    #[serde(default)]
    pub sid: Option<String>,
}

impl SessionToken {
    /// Decodes and validates a session token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSessionToken`] if the signature, expiry or
    /// audience check fails against every configured secret.
    pub fn decode(token: &str, config: &AppConfig) -> Result<Self, AuthError> {
        let claims = match Self::decode_with_key(token, config.api_secret_key().as_ref()) {
            Ok(claims) => claims,
            Err(primary_err) => config
                .old_api_secret_key()
                .and_then(|old_key| Self::decode_with_key(token, old_key.as_ref()).ok())
                .ok_or_else(|| AuthError::InvalidSessionToken {
                    reason: format!("Error decoding session token: {primary_err}"),
                })?,
        };

        if claims.aud != config.api_key().as_ref() {
            return Err(AuthError::InvalidSessionToken {
                reason: "Session token had invalid API key".to_string(),
            });
        }

        Ok(claims)
    }

    fn decode_with_key(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = JWT_LEEWAY_SECS;
        validation.validate_aud = false;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp"]);

        let key = DecodingKey::from_secret(secret.as_bytes());
        Ok(decode::<Self>(token, &key, &validation)?.claims)
    }

    /// Returns the validated shop domain from the `dest` claim.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSessionToken`] if `dest` is not a
    /// `*.myshopify.com` domain.
    pub fn shop(&self) -> Result<ShopDomain, AuthError> {
        ShopDomain::new(self.dest.as_str()).map_err(|e| AuthError::InvalidSessionToken {
            reason: e.to_string(),
        })
    }
}

// Verify SessionToken is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SessionToken>();
};
