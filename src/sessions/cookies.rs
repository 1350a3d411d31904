//! Session cookies.
//!
//! Two cookies carry a merchant session between requests:
//!
//! - `shopify_app_session`: the sealed session id, looked up in the session
//!   store
//! - `shopify_session_data`: the sealed session envelope, used when the
//!   store has no record
//!
//! Both are `HttpOnly`, `SameSite=None`, `Path=/`, one year `Max-Age`, and
//! `Secure` in production.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use cookie::{Cookie, SameSite};

/// Name of the session-id cookie.
pub const SESSION_ID_COOKIE: &str = "shopify_app_session";

/// Name of the sealed session-data cookie.
pub const SESSION_DATA_COOKIE: &str = "shopify_session_data";

const MAX_AGE_DAYS: i64 = 365;

/// Returns the value of the named cookie from the request headers.
#[must_use]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Builds the two session cookies from a sealed id and a sealed session.
#[must_use]
pub fn session_cookies(sealed_id: &str, envelope: &str, secure: bool) -> [Cookie<'static>; 2] {
    [
        build(SESSION_ID_COOKIE, sealed_id, secure),
        build(SESSION_DATA_COOKIE, envelope, secure),
    ]
}

fn build(name: &'static str, value: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::None)
        .max_age(cookie::time::Duration::days(MAX_AGE_DAYS))
        .path("/")
        .build()
}
