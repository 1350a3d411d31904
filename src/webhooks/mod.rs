//! Webhook verification and payload normalization.
//!
//! Every delivery is verified on its raw bytes before anything else happens
//! ([`verify_webhook`]). A verified body is then normalized into a
//! [`CompliancePayload`] for its topic.
//!
//! # Example
//!
//! ```rust
//! use giveaway_app::webhooks::{verify_hmac, CompliancePayload, WebhookTopic};
//! use giveaway_app::auth::hmac::compute_signature_base64;
//!
//! let body = br#"{"shop_domain":"my-store.myshopify.com"}"#;
//! let signature = compute_signature_base64(body, "secret");
//! assert!(verify_hmac(body, &signature, "secret"));
//!
//! let payload = CompliancePayload::parse(WebhookTopic::ShopRedact, None, body).unwrap();
//! assert_eq!(payload.shop().as_ref(), "my-store.myshopify.com");
//! ```

mod errors;
mod payload;
mod topic;
pub mod verification;

pub use errors::WebhookError;
pub use payload::{CompliancePayload, CustomerRequest, ShopRequest};
pub use topic::{UnknownTopic, WebhookTopic};
pub use verification::{
    verify_hmac, verify_webhook, WebhookContext, WebhookRequest, HEADER_API_VERSION, HEADER_HMAC,
    HEADER_SHOP_DOMAIN, HEADER_TOPIC, HEADER_WEBHOOK_ID,
};
