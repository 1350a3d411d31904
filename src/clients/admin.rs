//! Admin REST API client.
//!
//! [`AdminClient`] sends authenticated `GET` requests to
//! `https://<shop>/admin/api/<version>/<path>` with the session's access
//! token, retrying throttled (429) and failed (500) responses.

use crate::auth::Session;
use crate::clients::AdminApiError;
use crate::config::ApiVersion;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::time::Duration;

/// Fixed wait between retries when no `Retry-After` applies.
pub const RETRY_WAIT_TIME: u64 = 1;

/// Attempts made per request by default.
pub const DEFAULT_TRIES: u32 = 3;

const USER_AGENT: &str = concat!("giveaway-shopify-app/", env!("CARGO_PKG_VERSION"));

/// Client for the Shopify Admin REST API.
///
/// # Example
///
/// ```rust
/// use giveaway_app::clients::AdminClient;
/// use giveaway_app::config::ApiVersion;
/// use giveaway_app::{Session, ShopDomain};
///
/// let session = Session::offline(
///     ShopDomain::new("my-store").unwrap(),
///     "shpat_123".to_string(),
///     String::new(),
/// );
/// let client = AdminClient::new(&session, &ApiVersion::default()).unwrap();
/// assert_eq!(client.base_uri(), "https://my-store.myshopify.com");
/// assert_eq!(client.base_path(), "/admin/api/2025-10");
/// ```
#[derive(Debug, Clone)]
pub struct AdminClient {
    client: reqwest::Client,
    base_uri: String,
    base_path: String,
    access_token: String,
    tries: u32,
}

// Verify AdminClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AdminClient>();
};

impl AdminClient {
    /// Creates a client for the session's shop.
    ///
    /// # Errors
    ///
    /// Returns [`AdminApiError::MissingAccessToken`] if the session has no
    /// usable access token.
    pub fn new(session: &Session, api_version: &ApiVersion) -> Result<Self, AdminApiError> {
        let access_token = session
            .access_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AdminApiError::MissingAccessToken {
                shop: session.shop.to_string(),
            })?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_uri: format!("https://{}", session.shop),
            base_path: format!("/admin/api/{}", api_version.as_ref()),
            access_token,
            tries: DEFAULT_TRIES,
        })
    }

    /// Sends requests to `base_uri` instead of the shop domain.
    #[must_use]
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the number of attempts per request (at least one).
    #[must_use]
    pub fn with_tries(mut self, tries: u32) -> Self {
        self.tries = tries.max(1);
        self
    }

    /// Returns the base URI, e.g. `https://my-store.myshopify.com`.
    #[must_use]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Returns the base path, e.g. `/admin/api/2025-10`.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Sends `GET <base>/<path>` and returns the JSON body.
    ///
    /// # Errors
    ///
    /// - [`AdminApiError::Response`] for a non-2xx status other than 429/500
    /// - [`AdminApiError::MaxRetries`] when every attempt got 429 or 500
    /// - [`AdminApiError::Network`] on transport failure
    pub async fn get(&self, path: &str) -> Result<Value, AdminApiError> {
        let url = format!(
            "{}{}/{}",
            self.base_uri,
            self.base_path,
            path.trim_start_matches('/')
        );

        let mut tries: u32 = 0;
        loop {
            tries += 1;

            let response = self
                .client
                .get(&url)
                .header("X-Shopify-Access-Token", &self.access_token)
                .header("Accept", "application/json")
                .header("User-Agent", USER_AGENT)
                .send()
                .await?;

            let code = response.status().as_u16();
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            let body: Value = if text.is_empty() {
                Value::Object(serde_json::Map::new())
            } else {
                serde_json::from_str(&text)
                    .unwrap_or_else(|_| serde_json::json!({ "raw_body": text }))
            };

            if let Some(reason) = header_str(&headers, "x-shopify-api-deprecated-reason") {
                tracing::warn!(path, reason, "deprecated Admin API request");
            }

            if (200..300).contains(&code) {
                return Ok(body);
            }

            let message = serialize_error(&body);
            if code != 429 && code != 500 {
                return Err(AdminApiError::Response {
                    code,
                    message,
                    error_reference: header_str(&headers, "x-request-id").map(String::from),
                });
            }

            if tries >= self.tries {
                return Err(AdminApiError::MaxRetries {
                    code,
                    tries: self.tries,
                    message,
                });
            }

            let delay = retry_delay(&headers, code);
            tracing::debug!(path, code, tries, ?delay, "retrying Admin API request");
            tokio::time::sleep(delay).await;
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// 429 honours `Retry-After` (seconds); 500 always waits the fixed time.
fn retry_delay(headers: &HeaderMap, code: u16) -> Duration {
    if code == 429 {
        if let Some(seconds) = header_str(headers, "retry-after")
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        {
            return Duration::from_secs_f64(seconds);
        }
    }
    Duration::from_secs(RETRY_WAIT_TIME)
}

fn serialize_error(body: &Value) -> String {
    let mut error_body = serde_json::Map::new();
    for key in ["errors", "error", "error_description"] {
        if let Some(value) = body.get(key) {
            error_body.insert(key.to_string(), value.clone());
        }
    }
    serde_json::to_string(&error_body).unwrap_or_else(|_| "{}".to_string())
}
