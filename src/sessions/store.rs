//! Encrypted session persistence with an in-memory fallback.
//!
//! Each session is sealed into an envelope and written to the `sessions`
//! collection twice, under its id and under its shop domain, as
//! `{data, shop, updatedAt}`. Both writes go in one batch.
//!
//! # Degraded Mode
//!
//! When the document store fails (an I/O error, not a clean miss), writes and
//! reads go to a bounded process-local map instead. The map holds envelopes,
//! never plaintext sessions. It is not durable: a new [`SessionStore`] starts
//! with an empty map. Every fallback read or write is logged at warn level
//! with `source = "fallback"`; durable operations log `source = "durable"`.

use crate::auth::Session;
use crate::config::ShopDomain;
use crate::sessions::SessionCipher;
use crate::store::{collections, Document, DocumentStore, Filter, StoreError, WriteOp};
use dashmap::DashMap;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Maximum number of keys held in the fallback map.
pub const FALLBACK_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct FallbackEntry {
    envelope: String,
    shop: String,
}

/// Session persistence over a [`DocumentStore`].
pub struct SessionStore {
    store: Arc<dyn DocumentStore>,
    cipher: SessionCipher,
    fallback: DashMap<String, FallbackEntry>,
    capacity: usize,
}

impl SessionStore {
    /// Creates a session store.
    pub fn new(store: Arc<dyn DocumentStore>, cipher: SessionCipher) -> Self {
        Self {
            store,
            cipher,
            fallback: DashMap::new(),
            capacity: FALLBACK_CAPACITY,
        }
    }

    /// Overrides the fallback map capacity.
    #[must_use]
    pub const fn with_fallback_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Returns the cipher used for envelopes.
    #[must_use]
    pub const fn cipher(&self) -> &SessionCipher {
        &self.cipher
    }

    /// Returns the number of keys held in the fallback map.
    #[must_use]
    pub fn fallback_len(&self) -> usize {
        self.fallback.len()
    }

    /// Persists a session under its id and its shop domain.
    ///
    /// Returns `false` only if the session cannot be sealed, or if the
    /// document store is down and the fallback map is full.
    pub async fn store(&self, session: &Session) -> bool {
        let envelope = match self.cipher.seal(session) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(session_id = %session.id, error = %e, "failed to seal session");
                return false;
            }
        };

        let shop = session.shop.to_string();
        let keys = Self::keys_for(&session.id, &shop);
        let document = Self::document(&envelope, &shop);
        let writes = keys
            .iter()
            .map(|key| WriteOp::set(collections::SESSIONS, key.clone(), document.clone()))
            .collect();

        match self.store.commit(writes).await {
            Ok(()) => {
                for key in &keys {
                    self.fallback.remove(key);
                }
                tracing::debug!(session_id = %session.id, shop = %shop, source = "durable", "session stored");
                true
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session.id,
                    shop = %shop,
                    source = "fallback",
                    error = %e,
                    "document store unavailable, keeping session in memory"
                );
                self.remember(&keys, &envelope, &shop)
            }
        }
    }

    /// Loads a session by id or shop domain.
    ///
    /// A clean miss returns `None` without consulting the fallback map. A
    /// store error, an undecryptable envelope or a malformed document also
    /// yield `None` (after trying the fallback map for store errors).
    pub async fn load(&self, id: &str) -> Option<Session> {
        match self.store.get(collections::SESSIONS, id).await {
            Ok(Some(document)) => {
                let session = self.open_document(id, &document);
                if session.is_some() {
                    tracing::debug!(session_id = id, source = "durable", "session loaded");
                }
                session
            }
            Ok(None) => None,
            Err(e) => {
                let session = self
                    .fallback
                    .get(id)
                    .and_then(|entry| self.cipher.open(&entry.envelope).ok());
                tracing::warn!(
                    session_id = id,
                    source = "fallback",
                    found = session.is_some(),
                    error = %e,
                    "document store unavailable, reading session from memory"
                );
                session
            }
        }
    }

    /// Deletes a session under every key it is stored by.
    ///
    /// Per-key failures are logged and skipped. Always returns `true`.
    pub async fn delete(&self, id: &str) -> bool {
        let mut keys = BTreeSet::from([id.to_string()]);
        if let Some(session) = self.load(id).await {
            keys.insert(session.id);
            keys.insert(session.shop.to_string());
        }

        for key in &keys {
            if let Err(e) = self.store.delete(collections::SESSIONS, key).await {
                tracing::warn!(key = %key, error = %e, "failed to delete session key");
            }
            self.fallback.remove(key);
        }
        true
    }

    /// Returns every session stored for a shop, de-duplicated by id.
    pub async fn find_by_shop(&self, shop: &ShopDomain) -> Vec<Session> {
        let envelopes: Vec<String> = match self
            .store
            .query(collections::SESSIONS, &[Filter::eq("shop", shop.as_ref())])
            .await
        {
            Ok(snapshots) => snapshots
                .iter()
                .filter_map(|s| s.data.get("data").and_then(Value::as_str))
                .map(str::to_string)
                .collect(),
            Err(e) => {
                tracing::warn!(shop = %shop, source = "fallback", error = %e, "document store unavailable, searching sessions in memory");
                self.fallback
                    .iter()
                    .filter(|entry| entry.shop == shop.as_ref())
                    .map(|entry| entry.envelope.clone())
                    .collect()
            }
        };

        let unique: BTreeMap<String, Session> = envelopes
            .iter()
            .filter_map(|envelope| self.cipher.open(envelope).ok())
            .map(|session| (session.id.clone(), session))
            .collect();
        unique.into_values().collect()
    }

    /// Deletes every session document for a shop in one batch.
    ///
    /// Fallback entries for the shop are purged regardless of the outcome.
    ///
    /// # Errors
    ///
    /// Returns the store error if the lookup or the batch delete fails.
    pub async fn delete_by_shop(&self, shop: &ShopDomain) -> Result<usize, StoreError> {
        self.fallback.retain(|_, entry| entry.shop != shop.as_ref());

        let snapshots = self
            .store
            .query(collections::SESSIONS, &[Filter::eq("shop", shop.as_ref())])
            .await?;

        let mut keys: BTreeSet<String> = snapshots.into_iter().map(|s| s.id).collect();
        keys.insert(shop.to_string());
        keys.insert(Session::offline_id(shop));

        let count = keys.len();
        self.store
            .commit(
                keys.into_iter()
                    .map(|key| WriteOp::delete(collections::SESSIONS, key))
                    .collect(),
            )
            .await?;
        Ok(count)
    }

    fn keys_for(id: &str, shop: &str) -> Vec<String> {
        if id == shop {
            vec![id.to_string()]
        } else {
            vec![id.to_string(), shop.to_string()]
        }
    }

    fn document(envelope: &str, shop: &str) -> Document {
        let mut document = Document::new();
        document.insert("data".to_string(), json!(envelope));
        document.insert("shop".to_string(), json!(shop));
        document.insert(
            "updatedAt".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        document
    }

    fn open_document(&self, id: &str, document: &Document) -> Option<Session> {
        let Some(envelope) = document.get("data").and_then(Value::as_str) else {
            tracing::warn!(session_id = id, "session document has no envelope");
            return None;
        };
        match self.cipher.open(envelope) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(session_id = id, error = %e, "stored session could not be opened");
                None
            }
        }
    }

    fn remember(&self, keys: &[String], envelope: &str, shop: &str) -> bool {
        let new_keys = keys
            .iter()
            .filter(|key| !self.fallback.contains_key(*key))
            .count();
        if self.fallback.len() + new_keys > self.capacity {
            tracing::error!(
                shop,
                capacity = self.capacity,
                source = "fallback",
                "session fallback map is full, session not stored"
            );
            return false;
        }

        for key in keys {
            self.fallback.insert(
                key.clone(),
                FallbackEntry {
                    envelope: envelope.to_string(),
                    shop: shop.to_string(),
                },
            );
        }
        true
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("fallback_len", &self.fallback.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
