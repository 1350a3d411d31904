//! Merchant authentication.
//!
//! - [`Session`]: one merchant's OAuth grant
//! - [`SessionToken`]: App Bridge session-token validation (identity only)
//! - [`TokenExchangeClient`]: trades a session token for an offline access token
//! - [`hmac`]: HMAC-SHA256 signing and constant-time verification
//!
//! # Trust Levels
//!
//! A session token proves "this request comes from shop X" and nothing more.
//! Only a persisted or cookie-sealed offline session carries the access token
//! needed for Admin API calls.

mod errors;
pub mod hmac;
pub mod session;
mod session_token;
mod token_exchange;

pub use errors::AuthError;
pub use session::Session;
pub use session_token::SessionToken;
pub use token_exchange::TokenExchangeClient;
