//! Outbound Shopify API clients.
//!
//! Only the Admin REST API is used: billing sync reads recurring application
//! charges through [`AdminClient`].

mod admin;
mod errors;

pub use admin::{AdminClient, DEFAULT_TRIES, RETRY_WAIT_TIME};
pub use errors::AdminApiError;
