//! Webhook topics handled by the app.

use std::fmt;
use std::str::FromStr;

/// A compliance or lifecycle webhook topic.
///
/// # Example
///
/// ```rust
/// use giveaway_app::webhooks::WebhookTopic;
///
/// let topic: WebhookTopic = "customers/redact".parse().unwrap();
/// assert_eq!(topic, WebhookTopic::CustomersRedact);
/// assert_eq!(topic.to_string(), "customers/redact");
/// assert!("orders/create".parse::<WebhookTopic>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookTopic {
    /// `customers/data_request`: export a customer's stored data.
    CustomersDataRequest,
    /// `customers/redact`: remove a customer's personal data.
    CustomersRedact,
    /// `shop/redact`: delete everything stored for a shop.
    ShopRedact,
    /// `app/uninstalled`: the merchant removed the app.
    AppUninstalled,
}

impl WebhookTopic {
    /// All handled topics.
    pub const ALL: [Self; 4] = [
        Self::CustomersDataRequest,
        Self::CustomersRedact,
        Self::ShopRedact,
        Self::AppUninstalled,
    ];

    /// Returns the topic as Shopify spells it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CustomersDataRequest => "customers/data_request",
            Self::CustomersRedact => "customers/redact",
            Self::ShopRedact => "shop/redact",
            Self::AppUninstalled => "app/uninstalled",
        }
    }

    /// Returns `true` for the topics that carry a customer.
    #[must_use]
    pub const fn is_customer_topic(self) -> bool {
        matches!(self, Self::CustomersDataRequest | Self::CustomersRedact)
    }
}

impl fmt::Display for WebhookTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unhandled topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTopic(pub String);

impl fmt::Display for UnknownTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unhandled webhook topic '{}'", self.0)
    }
}

impl std::error::Error for UnknownTopic {}

impl FromStr for WebhookTopic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|topic| topic.as_str() == normalized)
            .ok_or_else(|| UnknownTopic(s.to_string()))
    }
}
