//! Webhook signature verification.
//!
//! Shopify signs each delivery with HMAC-SHA256 over the raw request body
//! using the app's API secret. Verification must run on the exact bytes
//! received, before any JSON parsing.
//!
//! - [`verify_webhook`]: uses [`AppConfig`] and supports key rotation
//! - [`verify_hmac`]: low-level check against one secret
//!
//! # Example
//!
//! ```rust
//! use giveaway_app::auth::hmac::compute_signature_base64;
//! use giveaway_app::webhooks::{verify_webhook, WebhookRequest, WebhookTopic};
//! use giveaway_app::{AppConfig, ApiKey, ApiSecretKey, EncryptionKey};
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("test-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("my-secret").unwrap())
//!     .session_key(EncryptionKey::from_hex(&"00".repeat(32)).unwrap())
//!     .build()
//!     .unwrap();
//!
//! let body = br#"{"shop_domain":"example.myshopify.com"}"#;
//! let request = WebhookRequest::new(
//!     body.to_vec(),
//!     compute_signature_base64(body, "my-secret"),
//!     Some("shop/redact".to_string()),
//!     Some("example.myshopify.com".to_string()),
//!     Some("2025-10".to_string()),
//!     Some("webhook-123".to_string()),
//! );
//!
//! let context = verify_webhook(&config, &request).unwrap();
//! assert_eq!(context.topic(), Some(WebhookTopic::ShopRedact));
//! assert_eq!(context.shop_domain(), Some("example.myshopify.com"));
//! ```

use crate::auth::hmac::verify_signature_base64;
use crate::config::AppConfig;
use crate::webhooks::{WebhookError, WebhookTopic};

// ============================================================================
// Header Constants
// ============================================================================

/// HMAC signature header (base64).
pub const HEADER_HMAC: &str = "X-Shopify-Hmac-Sha256";

/// Topic header, e.g. `customers/redact`.
pub const HEADER_TOPIC: &str = "X-Shopify-Topic";

/// Shop domain header.
pub const HEADER_SHOP_DOMAIN: &str = "X-Shopify-Shop-Domain";

/// API version the payload was rendered with.
pub const HEADER_API_VERSION: &str = "X-Shopify-API-Version";

/// Unique delivery id, used for log correlation.
pub const HEADER_WEBHOOK_ID: &str = "X-Shopify-Webhook-Id";

// ============================================================================
// WebhookRequest
// ============================================================================

/// An inbound delivery: raw body plus the Shopify headers.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    body: Vec<u8>,
    hmac_header: String,
    topic: Option<String>,
    shop_domain: Option<String>,
    api_version: Option<String>,
    webhook_id: Option<String>,
}

impl WebhookRequest {
    /// Creates a webhook request. An absent signature is an empty string.
    #[must_use]
    pub fn new(
        body: Vec<u8>,
        hmac_header: String,
        topic: Option<String>,
        shop_domain: Option<String>,
        api_version: Option<String>,
        webhook_id: Option<String>,
    ) -> Self {
        Self {
            body,
            hmac_header,
            topic,
            shop_domain,
            api_version,
            webhook_id,
        }
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the signature header value.
    #[must_use]
    pub fn hmac_header(&self) -> &str {
        &self.hmac_header
    }

    /// Returns the topic header value.
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Returns the shop domain header value.
    #[must_use]
    pub fn shop_domain(&self) -> Option<&str> {
        self.shop_domain.as_deref()
    }

    /// Returns the API version header value.
    #[must_use]
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    /// Returns the delivery id header value.
    #[must_use]
    pub fn webhook_id(&self) -> Option<&str> {
        self.webhook_id.as_deref()
    }
}

// ============================================================================
// WebhookContext
// ============================================================================

/// Metadata of a verified delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookContext {
    topic: Option<WebhookTopic>,
    topic_raw: String,
    shop_domain: Option<String>,
    api_version: Option<String>,
    webhook_id: Option<String>,
}

impl WebhookContext {
    /// Returns the parsed topic, or `None` for topics this app does not handle.
    #[must_use]
    pub const fn topic(&self) -> Option<WebhookTopic> {
        self.topic
    }

    /// Returns the topic header as received.
    #[must_use]
    pub fn topic_raw(&self) -> &str {
        &self.topic_raw
    }

    /// Returns the shop domain header, if present.
    #[must_use]
    pub fn shop_domain(&self) -> Option<&str> {
        self.shop_domain.as_deref()
    }

    /// Returns the API version header, if present.
    #[must_use]
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    /// Returns the delivery id, if present.
    #[must_use]
    pub fn webhook_id(&self) -> Option<&str> {
        self.webhook_id.as_deref()
    }
}

// ============================================================================
// Verification Functions
// ============================================================================

/// Verifies a signature against one secret.
///
/// Fails closed on an empty secret or signature and on malformed base64.
#[must_use]
pub fn verify_hmac(raw_body: &[u8], hmac_header: &str, secret: &str) -> bool {
    verify_signature_base64(raw_body, hmac_header, secret)
}

/// Verifies a delivery against the primary secret, then the previous one.
///
/// # Errors
///
/// Returns [`WebhookError::InvalidHmac`] if no configured secret matches.
pub fn verify_webhook(
    config: &AppConfig,
    request: &WebhookRequest,
) -> Result<WebhookContext, WebhookError> {
    let body = request.body();
    let hmac_header = request.hmac_header();

    let verified = verify_hmac(body, hmac_header, config.api_secret_key().as_ref())
        || config
            .old_api_secret_key()
            .is_some_and(|old| verify_hmac(body, hmac_header, old.as_ref()));

    if !verified {
        return Err(WebhookError::InvalidHmac);
    }

    let topic_raw = request.topic().unwrap_or_default().to_string();
    let topic = topic_raw.parse().ok();

    Ok(WebhookContext {
        topic,
        topic_raw,
        shop_domain: request.shop_domain().map(String::from),
        api_version: request.api_version().map(String::from),
        webhook_id: request.webhook_id().map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hmac::compute_signature_base64;
    use crate::config::{ApiKey, ApiSecretKey, EncryptionKey};

    fn config(secret: &str, old: Option<&str>) -> AppConfig {
        let mut builder = AppConfig::builder()
            .api_key(ApiKey::new("key").unwrap())
            .api_secret_key(ApiSecretKey::new(secret).unwrap())
            .session_key(EncryptionKey::from_hex(&"00".repeat(32)).unwrap());
        if let Some(old) = old {
            builder = builder.old_api_secret_key(ApiSecretKey::new(old).unwrap());
        }
        builder.build().unwrap()
    }

    fn request(body: &[u8], hmac: String, topic: Option<&str>) -> WebhookRequest {
        WebhookRequest::new(
            body.to_vec(),
            hmac,
            topic.map(String::from),
            Some("shop.myshopify.com".to_string()),
            None,
            Some("webhook-1".to_string()),
        )
    }

    // ========================================================================
    // Header Constants Tests
    // ========================================================================

    #[test]
    fn test_header_names_are_case_insensitive_matches_of_shopify_headers() {
        assert!(HEADER_HMAC.eq_ignore_ascii_case("x-shopify-hmac-sha256"));
        assert!(HEADER_TOPIC.eq_ignore_ascii_case("x-shopify-topic"));
        assert!(HEADER_SHOP_DOMAIN.eq_ignore_ascii_case("x-shopify-shop-domain"));
    }

    // ========================================================================
    // verify_webhook Tests
    // ========================================================================

    #[test]
    fn test_verify_webhook_with_primary_secret() {
        let body = b"{}";
        let req = request(
            body,
            compute_signature_base64(body, "secret"),
            Some("customers/redact"),
        );
        let context = verify_webhook(&config("secret", None), &req).unwrap();

        assert_eq!(context.topic(), Some(WebhookTopic::CustomersRedact));
        assert_eq!(context.topic_raw(), "customers/redact");
        assert_eq!(context.webhook_id(), Some("webhook-1"));
    }

    #[test]
    fn test_verify_webhook_falls_back_to_old_secret() {
        let body = b"{}";
        let req = request(body, compute_signature_base64(body, "old"), None);
        assert!(verify_webhook(&config("new", Some("old")), &req).is_ok());
    }

    #[test]
    fn test_verify_webhook_rejects_unknown_secret() {
        let body = b"{}";
        let req = request(body, compute_signature_base64(body, "other"), None);
        assert_eq!(
            verify_webhook(&config("new", Some("old")), &req),
            Err(WebhookError::InvalidHmac)
        );
    }

    #[test]
    fn test_verify_webhook_rejects_missing_signature() {
        let req = request(b"{}", String::new(), Some("shop/redact"));
        assert_eq!(
            verify_webhook(&config("secret", None), &req),
            Err(WebhookError::InvalidHmac)
        );
    }

    #[test]
    fn test_unknown_topic_is_verified_but_unparsed() {
        let body = b"{}";
        let req = request(
            body,
            compute_signature_base64(body, "secret"),
            Some("orders/create"),
        );
        let context = verify_webhook(&config("secret", None), &req).unwrap();
        assert_eq!(context.topic(), None);
        assert_eq!(context.topic_raw(), "orders/create");
    }

    #[test]
    fn test_reserialized_json_does_not_verify() {
        let body = br#"{"shop": "shop.myshopify.com",  "customer": {"id": 1}}"#;
        let hmac = compute_signature_base64(body, "secret");

        let parsed: serde_json::Value = serde_json::from_slice(body).unwrap();
        let reserialized = serde_json::to_vec(&parsed).unwrap();

        assert!(verify_hmac(body, &hmac, "secret"));
        assert!(!verify_hmac(&reserialized, &hmac, "secret"));
    }
}
