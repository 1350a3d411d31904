//! Normalization of compliance webhook payloads.
//!
//! Shopify has spelled the same facts several ways across topics and API
//! versions. Each body is parsed once into a canonical record:
//!
//! - shop: `X-Shopify-Shop-Domain` header, else `shop_domain`, `shop`,
//!   `myshopify_domain`, `domain` (the first valid `*.myshopify.com` wins)
//! - customer id: `customer.id`, else `customer_id` (number or string)
//! - email: `customer.email`, else `email`
//! - orders: `orders_requested` or `orders_to_redact`

use crate::config::ShopDomain;
use crate::webhooks::{WebhookError, WebhookTopic};
use serde_json::Value;

/// Canonical customer-scoped request (`customers/*` topics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRequest {
    /// Shop the customer belongs to.
    pub shop: ShopDomain,
    /// Customer id as a string.
    pub customer_id: Option<String>,
    /// Customer email.
    pub email: Option<String>,
    /// Customer phone.
    pub phone: Option<String>,
    /// Order ids named in the request.
    pub orders: Vec<String>,
    /// Data request id (`customers/data_request` only).
    pub data_request_id: Option<String>,
}

/// Canonical shop-scoped request (`shop/redact`, `app/uninstalled`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopRequest {
    /// The shop whose data is affected.
    pub shop: ShopDomain,
}

/// A normalized compliance payload, one variant per topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompliancePayload {
    /// `customers/data_request`
    DataRequest(CustomerRequest),
    /// `customers/redact`
    CustomerRedact(CustomerRequest),
    /// `shop/redact`
    ShopRedact(ShopRequest),
    /// `app/uninstalled`
    Uninstalled(ShopRequest),
}

impl CompliancePayload {
    /// Parses a verified body for `topic`.
    ///
    /// A body that is not JSON is treated as empty, so a shop header alone
    /// is enough for shop-scoped topics.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidPayload`] if no valid shop domain can be
    /// found in the header or the body.
    pub fn parse(
        topic: WebhookTopic,
        shop_header: Option<&str>,
        body: &[u8],
    ) -> Result<Self, WebhookError> {
        let raw = RawPayload::from_body(topic, body);

        let shop = raw
            .shop(shop_header)
            .ok_or_else(|| WebhookError::InvalidPayload {
                reason: "no valid shop domain in header or body".to_string(),
            })?;

        Ok(match topic {
            WebhookTopic::CustomersDataRequest => Self::DataRequest(raw.customer(shop)),
            WebhookTopic::CustomersRedact => Self::CustomerRedact(raw.customer(shop)),
            WebhookTopic::ShopRedact => Self::ShopRedact(ShopRequest { shop }),
            WebhookTopic::AppUninstalled => Self::Uninstalled(ShopRequest { shop }),
        })
    }

    /// Returns the shop the payload concerns.
    #[must_use]
    pub fn shop(&self) -> &ShopDomain {
        match self {
            Self::DataRequest(request) | Self::CustomerRedact(request) => &request.shop,
            Self::ShopRedact(request) | Self::Uninstalled(request) => &request.shop,
        }
    }
}

/// Candidate fields pulled from a body one at a time, so a field of an
/// unexpected type only drops itself.
#[derive(Debug, Default)]
struct RawPayload {
    body: Value,
}

impl RawPayload {
    fn from_body(topic: WebhookTopic, body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        let body = serde_json::from_slice(body).unwrap_or_else(|e| {
            tracing::warn!(topic = %topic, error = %e, "webhook body is not JSON");
            Value::Null
        });
        Self { body }
    }

    fn text(&self, pointer: &str) -> Option<String> {
        self.body
            .pointer(pointer)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn id(&self, pointer: &str) -> Option<String> {
        self.body.pointer(pointer).and_then(id_string)
    }

    fn ids(&self, pointer: &str) -> Vec<String> {
        self.body
            .pointer(pointer)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(id_string).collect())
            .unwrap_or_default()
    }

    fn shop(&self, header: Option<&str>) -> Option<ShopDomain> {
        let header = header.map(str::to_string);
        [header]
            .into_iter()
            .chain(
                ["/shop_domain", "/shop", "/myshopify_domain", "/domain"]
                    .into_iter()
                    .map(|pointer| self.text(pointer)),
            )
            .flatten()
            .find_map(|candidate| ShopDomain::new(candidate).ok())
    }

    fn customer(&self, shop: ShopDomain) -> CustomerRequest {
        CustomerRequest {
            shop,
            customer_id: self.id("/customer/id").or_else(|| self.id("/customer_id")),
            email: self
                .text("/customer/email")
                .or_else(|| self.text("/email")),
            phone: self.text("/customer/phone"),
            orders: self
                .ids("/orders_requested")
                .into_iter()
                .chain(self.ids("/orders_to_redact"))
                .collect(),
            data_request_id: self.id("/data_request/id"),
        }
    }
}

/// Renders a numeric or string id; anything else is not an id.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        _ => None,
    }
}
