//! Object storage for shop assets (logo and banner images).

use super::StoreError;
use async_trait::async_trait;

const DEFAULT_STORAGE_ENDPOINT: &str = "https://firebasestorage.googleapis.com";

/// Deletes stored binary assets.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Deletes one object. Deleting a missing object succeeds.
    async fn delete_object(&self, path: &str) -> Result<(), StoreError>;
}

/// Firebase Storage over its REST API.
#[derive(Clone)]
pub struct FirebaseStorage {
    http: reqwest::Client,
    endpoint: String,
    bucket: String,
    access_token: Option<String>,
}

impl FirebaseStorage {
    /// Creates a client for `bucket`.
    pub fn new(bucket: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: DEFAULT_STORAGE_ENDPOINT.to_string(),
            bucket: bucket.into(),
            access_token,
        }
    }

    /// Overrides the API root.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/v0/b/{}/o/{}",
            self.endpoint,
            self.bucket,
            urlencoding::encode(path)
        )
    }
}

impl std::fmt::Debug for FirebaseStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseStorage")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AssetStore for FirebaseStorage {
    async fn delete_object(&self, path: &str) -> Result<(), StoreError> {
        let mut request = self.http.delete(self.object_url(path));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(StoreError::Unavailable(format!("{status}: {message}")))
        } else {
            Err(StoreError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Asset store used when no bucket is configured.
///
/// Deletions are logged and reported as successful.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledAssets;

#[async_trait]
impl AssetStore for DisabledAssets {
    async fn delete_object(&self, path: &str) -> Result<(), StoreError> {
        tracing::warn!(path, "asset storage not configured, skipping delete");
        Ok(())
    }
}

/// Recovers an object path from a stored asset reference.
///
/// Accepts Firebase download URLs
/// (`https://firebasestorage.googleapis.com/v0/b/<bucket>/o/<encoded>?alt=media&token=...`),
/// `gs://<bucket>/<path>` URIs and bare object paths.
#[must_use]
pub fn object_path_from_url(reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    if let Some(rest) = reference.strip_prefix("gs://") {
        return rest
            .split_once('/')
            .map(|(_, path)| path.to_string())
            .filter(|path| !path.is_empty());
    }

    if reference.starts_with("http://") || reference.starts_with("https://") {
        let (_, encoded) = reference.split_once("/o/")?;
        let encoded = encoded.split(['?', '#']).next().unwrap_or_default();
        if encoded.is_empty() {
            return None;
        }
        return urlencoding::decode(encoded).ok().map(|p| p.into_owned());
    }

    Some(reference.trim_start_matches('/').to_string())
}
