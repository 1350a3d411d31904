//! Merchant session lifecycle.
//!
//! - [`SessionCipher`]: AES-256-GCM session envelopes
//! - [`SessionStore`]: dual-keyed encrypted persistence with a bounded
//!   in-memory fallback
//! - [`SessionResolver`]: bearer token, then session cookie, then sealed
//!   cookie
//! - [`cookies`]: session cookie parsing and construction

pub mod cookies;
mod envelope;
mod resolver;
mod store;

pub use envelope::{EnvelopeError, SessionCipher};
pub use resolver::SessionResolver;
pub use store::{SessionStore, FALLBACK_CAPACITY};
