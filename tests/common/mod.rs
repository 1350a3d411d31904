//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use giveaway_app::auth::hmac::compute_signature_base64;
use giveaway_app::store::{
    AssetStore, Document, DocumentStore, Filter, MemoryStore, Snapshot, StoreError, WriteOp,
};
use giveaway_app::{ApiKey, ApiSecretKey, AppConfig, EncryptionKey};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

pub const API_KEY: &str = "test-api-key";
pub const API_SECRET: &str = "test-api-secret";
pub const SESSION_KEY_HEX: &str =
    "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
pub const SHOP: &str = "shop.myshopify.com";

pub fn config() -> AppConfig {
    AppConfig::builder()
        .api_key(ApiKey::new(API_KEY).unwrap())
        .api_secret_key(ApiSecretKey::new(API_SECRET).unwrap())
        .session_key(EncryptionKey::from_hex(SESSION_KEY_HEX).unwrap())
        .build()
        .unwrap()
}

pub fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

// ============================================================================
// Stores
// ============================================================================

/// A [`MemoryStore`] that counts every call.
#[derive(Debug, Default)]
pub struct SpyStore {
    pub inner: MemoryStore,
    calls: AtomicUsize,
}

impl SpyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for SpyStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.record();
        self.inner.get(collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
        self.record();
        self.inner.set(collection, id, data).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.record();
        self.inner.delete(collection, id).await
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<Snapshot>, StoreError> {
        self.record();
        self.inner.query(collection, filters).await
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        self.record();
        self.inner.commit(writes).await
    }
}

/// A store whose every call fails as unavailable.
#[derive(Debug, Default)]
pub struct DownStore;

fn down() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl DocumentStore for DownStore {
    async fn get(&self, _: &str, _: &str) -> Result<Option<Document>, StoreError> {
        Err(down())
    }

    async fn set(&self, _: &str, _: &str, _: Document) -> Result<(), StoreError> {
        Err(down())
    }

    async fn delete(&self, _: &str, _: &str) -> Result<(), StoreError> {
        Err(down())
    }

    async fn query(&self, _: &str, _: &[Filter]) -> Result<Vec<Snapshot>, StoreError> {
        Err(down())
    }

    async fn commit(&self, _: Vec<WriteOp>) -> Result<(), StoreError> {
        Err(down())
    }
}

/// A [`MemoryStore`] where every call touching one collection fails.
#[derive(Debug)]
pub struct BrokenCollectionStore {
    pub inner: MemoryStore,
    broken: &'static str,
}

impl BrokenCollectionStore {
    pub fn new(broken: &'static str) -> Self {
        Self {
            inner: MemoryStore::new(),
            broken,
        }
    }

    fn check(&self, collection: &str) -> Result<(), StoreError> {
        if collection == self.broken {
            Err(StoreError::Rejected {
                status: 403,
                message: format!("{collection} is read-only"),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for BrokenCollectionStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.check(collection)?;
        self.inner.get(collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
        self.check(collection)?;
        self.inner.set(collection, id, data).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check(collection)?;
        self.inner.delete(collection, id).await
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<Snapshot>, StoreError> {
        self.check(collection)?;
        self.inner.query(collection, filters).await
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        for write in &writes {
            let (WriteOp::Set { collection, .. }
            | WriteOp::Update { collection, .. }
            | WriteOp::Delete { collection, .. }) = write;
            self.check(collection)?;
        }
        self.inner.commit(writes).await
    }
}

/// Records deleted asset paths, optionally failing one path.
#[derive(Debug, Default)]
pub struct RecordingAssets {
    deleted: Mutex<Vec<String>>,
    failing: Option<String>,
}

impl RecordingAssets {
    pub fn failing_on(path: &str) -> Self {
        Self {
            failing: Some(path.to_string()),
            ..Self::default()
        }
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetStore for RecordingAssets {
    async fn delete_object(&self, path: &str) -> Result<(), StoreError> {
        if self.failing.as_deref() == Some(path) {
            return Err(StoreError::Unavailable(format!("{path}: storage timeout")));
        }
        self.deleted.lock().unwrap().push(path.to_string());
        Ok(())
    }
}

pub fn assets() -> Arc<RecordingAssets> {
    Arc::new(RecordingAssets::default())
}

// ============================================================================
// Requests
// ============================================================================

/// Builds a webhook POST signed with `secret`.
pub fn signed_webhook(path: &str, topic: &str, body: &str, secret: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("Content-Type", "application/json")
        .header("X-Shopify-Hmac-Sha256", compute_signature_base64(body.as_bytes(), secret))
        .header("X-Shopify-Topic", topic)
        .header("X-Shopify-Shop-Domain", SHOP)
        .header("X-Shopify-Webhook-Id", "webhook-test-1")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// ============================================================================
// Session tokens
// ============================================================================

#[derive(Debug, Serialize)]
struct TestJwtClaims {
    iss: String,
    dest: String,
    aud: String,
    sub: Option<String>,
    exp: i64,
    nbf: i64,
    iat: i64,
    jti: String,
    sid: Option<String>,
}

fn current_timestamp() -> i64 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs();
    i64::try_from(secs).unwrap()
}

/// Creates an App Bridge session token for `shop`.
pub fn session_token(shop: &str, api_key: &str, secret: &str) -> String {
    let now = current_timestamp();
    let claims = TestJwtClaims {
        iss: format!("https://{shop}/admin"),
        dest: format!("https://{shop}"),
        aud: api_key.to_string(),
        sub: Some("42".to_string()),
        exp: now + 300,
        nbf: now - 10,
        iat: now,
        jti: format!("test-jti-{now}"),
        sid: Some("test-session-id".to_string()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
