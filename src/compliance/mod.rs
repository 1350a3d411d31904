//! Compliance webhook handling.
//!
//! [`ComplianceService`] carries out the four mandatory data lifecycle
//! topics once a delivery has been verified:
//!
//! - `customers/data_request`: read-only export of a customer's submissions
//! - `customers/redact`: remove PII from a customer's submissions, keeping the
//!   records for aggregate counts
//! - `shop/redact`: delete everything stored for a shop
//! - `app/uninstalled`: drop the shop's sessions and stored assets, then the
//!   same teardown as `shop/redact`
//!
//! Every effect is idempotent, so a redelivered webhook is harmless.
//!
//! # Customer Resolution
//!
//! Submissions are looked up by `shop` + `customerId` first. Only when that
//! finds nothing is `shop` + `customerEmail` tried.
//!
//! # Batching
//!
//! Writes within one collection are committed as one atomic batch (split at
//! [`MAX_BATCH_WRITES`]). There is no atomicity across collections: a failure
//! in one collection is logged and the others still proceed.

use crate::config::ShopDomain;
use crate::sessions::SessionStore;
use crate::store::{
    collections, object_path_from_url, AssetStore, DocumentStore, Filter, Snapshot, StoreError,
    WriteOp, MAX_BATCH_WRITES,
};
use crate::webhooks::{CompliancePayload, CustomerRequest};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

/// Submission fields that identify a person.
pub const PII_FIELDS: [&str; 4] = ["customerId", "customerEmail", "customerName", "customerPhone"];

/// Collections cleared by a shop teardown, in order.
pub const SHOP_COLLECTIONS: [&str; 4] = [
    collections::SUBMISSIONS,
    collections::SETTINGS,
    collections::MERCHANTS,
    collections::SESSIONS,
];

/// Profile fields that may reference stored images.
const ASSET_FIELDS: [&str; 4] = ["logoPath", "bannerPath", "logoUrl", "bannerUrl"];

/// Errors raised while processing a verified compliance webhook.
///
/// These are logged by the HTTP layer and never turned into a non-200
/// response.
#[derive(Debug, Error)]
pub enum ComplianceError {
    /// A document store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Some collections could not be cleared.
    #[error("Shop teardown incomplete, failed collections: {failed:?}")]
    PartialTeardown {
        /// Collections whose deletion failed.
        failed: Vec<String>,
        /// What was deleted before and after the failures.
        report: TeardownReport,
    },
}

/// Export returned for `customers/data_request`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataExport {
    /// Shop domain.
    pub shop: String,
    /// Customer id from the request.
    pub customer_id: Option<String>,
    /// Customer email from the request.
    pub email: Option<String>,
    /// Matching submissions, each with its document `id`.
    pub submissions: Vec<Value>,
}

/// Documents deleted by a shop teardown, per collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    /// Deleted document count per collection.
    pub deleted: BTreeMap<String, usize>,
}

impl TeardownReport {
    /// Total number of deleted documents.
    #[must_use]
    pub fn total(&self) -> usize {
        self.deleted.values().sum()
    }
}

/// Result of a processed compliance payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ComplianceOutcome {
    /// Data export for `customers/data_request`.
    Exported(DataExport),
    /// Number of submissions redacted.
    Redacted(usize),
    /// Shop teardown summary.
    TornDown(TeardownReport),
}

/// Executes compliance operations against the stores.
#[derive(Clone)]
pub struct ComplianceService {
    store: Arc<dyn DocumentStore>,
    sessions: Arc<SessionStore>,
    assets: Arc<dyn AssetStore>,
}

impl ComplianceService {
    /// Creates a compliance service.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        sessions: Arc<SessionStore>,
        assets: Arc<dyn AssetStore>,
    ) -> Self {
        Self {
            store,
            sessions,
            assets,
        }
    }

    /// Routes a normalized payload to its handler.
    ///
    /// # Errors
    ///
    /// Returns the handler's [`ComplianceError`].
    pub async fn handle(
        &self,
        payload: &CompliancePayload,
    ) -> Result<ComplianceOutcome, ComplianceError> {
        match payload {
            CompliancePayload::DataRequest(request) => {
                self.data_request(request).await.map(ComplianceOutcome::Exported)
            }
            CompliancePayload::CustomerRedact(request) => {
                self.redact_customer(request).await.map(ComplianceOutcome::Redacted)
            }
            CompliancePayload::ShopRedact(request) => {
                self.redact_shop(&request.shop).await.map(ComplianceOutcome::TornDown)
            }
            CompliancePayload::Uninstalled(request) => {
                self.uninstall(&request.shop).await.map(ComplianceOutcome::TornDown)
            }
        }
    }

    /// Exports every submission stored for the customer.
    ///
    /// # Errors
    ///
    /// Returns [`ComplianceError::Store`] if a lookup fails.
    pub async fn data_request(
        &self,
        request: &CustomerRequest,
    ) -> Result<DataExport, ComplianceError> {
        let submissions = self.find_customer_submissions(request).await?;

        tracing::info!(
            shop = %request.shop,
            data_request_id = request.data_request_id.as_deref().unwrap_or_default(),
            count = submissions.len(),
            "customer data request processed"
        );

        Ok(DataExport {
            shop: request.shop.to_string(),
            customer_id: request.customer_id.clone(),
            email: request.email.clone(),
            submissions: submissions
                .into_iter()
                .map(|snapshot| {
                    let mut data = snapshot.data;
                    data.insert("id".to_string(), Value::String(snapshot.id));
                    Value::Object(data)
                })
                .collect(),
        })
    }

    /// Removes PII from the customer's submissions and marks them redacted.
    ///
    /// Returns the number of submissions changed. Records already redacted no
    /// longer match the customer and are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`ComplianceError::Store`] if the lookup or the batch fails.
    pub async fn redact_customer(&self, request: &CustomerRequest) -> Result<usize, ComplianceError> {
        let submissions = self.find_customer_submissions(request).await?;
        if submissions.is_empty() {
            tracing::info!(shop = %request.shop, "no submissions to redact");
            return Ok(0);
        }

        let redacted_at = chrono::Utc::now().to_rfc3339();
        let writes: Vec<WriteOp> = submissions
            .iter()
            .map(|snapshot| {
                let mut set = crate::store::Document::new();
                set.insert("redacted".to_string(), json!(true));
                set.insert("redactedAt".to_string(), json!(redacted_at));
                WriteOp::Update {
                    collection: collections::SUBMISSIONS.to_string(),
                    id: snapshot.id.clone(),
                    set,
                    remove: PII_FIELDS.iter().map(ToString::to_string).collect(),
                    must_exist: true,
                }
            })
            .collect();

        let count = writes.len();
        self.commit_chunked(writes).await?;

        tracing::info!(shop = %request.shop, count, "customer submissions redacted");
        Ok(count)
    }

    /// Deletes every document stored for a shop.
    ///
    /// Each collection is cleared in its own batch. The profile document
    /// `users/<shop>` is deleted last.
    ///
    /// # Errors
    ///
    /// Returns [`ComplianceError::PartialTeardown`] naming the collections
    /// that failed; the others are still cleared.
    pub async fn redact_shop(&self, shop: &ShopDomain) -> Result<TeardownReport, ComplianceError> {
        let mut report = TeardownReport::default();
        let mut failed = Vec::new();

        for collection in SHOP_COLLECTIONS {
            match self.clear_collection(collection, shop).await {
                Ok(count) => {
                    report.deleted.insert(collection.to_string(), count);
                }
                Err(e) => {
                    tracing::error!(shop = %shop, collection, error = %e, "failed to clear collection");
                    failed.push(collection.to_string());
                }
            }
        }

        match self.delete_if_exists(collections::USERS, shop.as_ref()).await {
            Ok(count) => {
                report.deleted.insert(collections::USERS.to_string(), count);
            }
            Err(e) => {
                tracing::error!(shop = %shop, collection = collections::USERS, error = %e, "failed to delete shop profile");
                failed.push(collections::USERS.to_string());
            }
        }

        tracing::info!(shop = %shop, deleted = report.total(), failed = failed.len(), "shop data teardown finished");

        if failed.is_empty() {
            Ok(report)
        } else {
            Err(ComplianceError::PartialTeardown { failed, report })
        }
    }

    /// Handles an uninstall: sessions first, then assets, then the teardown.
    ///
    /// # Errors
    ///
    /// Returns the teardown's error. Session and asset failures are logged
    /// and do not stop the teardown.
    pub async fn uninstall(&self, shop: &ShopDomain) -> Result<TeardownReport, ComplianceError> {
        match self.sessions.delete_by_shop(shop).await {
            Ok(count) => tracing::info!(shop = %shop, count, "sessions removed on uninstall"),
            Err(e) => tracing::error!(shop = %shop, error = %e, "failed to remove sessions on uninstall"),
        }

        let profile = match self.store.get(collections::USERS, shop.as_ref()).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::error!(shop = %shop, error = %e, "failed to read shop profile, skipping asset cleanup");
                None
            }
        };

        if let Some(profile) = profile {
            let paths: BTreeSet<String> = ASSET_FIELDS
                .iter()
                .filter_map(|field| profile.get(*field).and_then(Value::as_str))
                .filter_map(object_path_from_url)
                .collect();

            for path in paths {
                match self.assets.delete_object(&path).await {
                    Ok(()) => tracing::info!(shop = %shop, path = %path, "asset deleted"),
                    Err(e) => {
                        tracing::error!(shop = %shop, path = %path, error = %e, "failed to delete asset");
                    }
                }
            }
        }

        self.redact_shop(shop).await
    }

    async fn find_customer_submissions(
        &self,
        request: &CustomerRequest,
    ) -> Result<Vec<Snapshot>, StoreError> {
        let shop = Filter::eq("shop", request.shop.as_ref());

        if let Some(customer_id) = &request.customer_id {
            let by_id = self
                .store
                .query(
                    collections::SUBMISSIONS,
                    &[shop.clone(), Filter::eq("customerId", customer_id.as_str())],
                )
                .await?;
            if !by_id.is_empty() {
                return Ok(by_id);
            }
        }

        if let Some(email) = &request.email {
            return self
                .store
                .query(
                    collections::SUBMISSIONS,
                    &[shop, Filter::eq("customerEmail", email.as_str())],
                )
                .await;
        }

        Ok(Vec::new())
    }

    async fn clear_collection(&self, collection: &str, shop: &ShopDomain) -> Result<usize, StoreError> {
        let mut ids: BTreeSet<String> = self
            .store
            .query(collection, &[Filter::eq("shop", shop.as_ref())])
            .await?
            .into_iter()
            .map(|snapshot| snapshot.id)
            .collect();

        if self.store.get(collection, shop.as_ref()).await?.is_some() {
            ids.insert(shop.to_string());
        }

        let count = ids.len();
        self.commit_chunked(
            ids.into_iter()
                .map(|id| WriteOp::delete(collection, id))
                .collect(),
        )
        .await?;
        Ok(count)
    }

    async fn delete_if_exists(&self, collection: &str, id: &str) -> Result<usize, StoreError> {
        if self.store.get(collection, id).await?.is_none() {
            return Ok(0);
        }
        self.store.delete(collection, id).await?;
        Ok(1)
    }

    async fn commit_chunked(&self, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        for chunk in writes.chunks(MAX_BATCH_WRITES) {
            self.store.commit(chunk.to_vec()).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ComplianceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplianceService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Session;
    use crate::config::EncryptionKey;
    use crate::sessions::SessionCipher;
    use crate::store::{DisabledAssets, Document, MemoryStore};

    fn shop() -> ShopDomain {
        ShopDomain::new("shop").unwrap()
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn service() -> (ComplianceService, Arc<MemoryStore>, Arc<SessionStore>) {
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(SessionStore::new(
            store.clone(),
            SessionCipher::new(&EncryptionKey::from_hex(&"42".repeat(32)).unwrap()),
        ));
        let service = ComplianceService::new(store.clone(), sessions.clone(), Arc::new(DisabledAssets));
        (service, store, sessions)
    }

    async fn seed_submission(store: &MemoryStore, id: &str, shop: &str, customer_id: &str, email: &str) {
        store
            .set(
                collections::SUBMISSIONS,
                id,
                doc(json!({
                    "shop": shop,
                    "customerId": customer_id,
                    "customerEmail": email,
                    "customerName": "Jane",
                    "customerPhone": "555",
                    "instagramHandle": "@jane",
                    "submissionCount": 2,
                })),
            )
            .await
            .unwrap();
    }

    fn customer(customer_id: Option<&str>, email: Option<&str>) -> CustomerRequest {
        CustomerRequest {
            shop: shop(),
            customer_id: customer_id.map(String::from),
            email: email.map(String::from),
            phone: None,
            orders: Vec::new(),
            data_request_id: None,
        }
    }

    #[tokio::test]
    async fn test_data_request_matches_shop_and_customer_id() {
        let (service, store, _) = service().await;
        seed_submission(&store, "a", "shop.myshopify.com", "1234", "x@example.com").await;
        seed_submission(&store, "b", "other.myshopify.com", "1234", "x@example.com").await;
        seed_submission(&store, "c", "shop.myshopify.com", "999", "y@example.com").await;

        let export = service
            .data_request(&customer(Some("1234"), Some("x@example.com")))
            .await
            .unwrap();

        assert_eq!(export.submissions.len(), 1);
        assert_eq!(export.submissions[0]["id"], "a");
        assert_eq!(export.submissions[0]["instagramHandle"], "@jane");
    }

    #[tokio::test]
    async fn test_email_is_used_only_when_id_finds_nothing() {
        let (service, store, _) = service().await;
        seed_submission(&store, "a", "shop.myshopify.com", "1234", "x@example.com").await;
        seed_submission(&store, "b", "shop.myshopify.com", "555", "x@example.com").await;

        let by_id = service
            .data_request(&customer(Some("1234"), Some("x@example.com")))
            .await
            .unwrap();
        assert_eq!(by_id.submissions.len(), 1);

        let by_email = service
            .data_request(&customer(Some("0000"), Some("x@example.com")))
            .await
            .unwrap();
        assert_eq!(by_email.submissions.len(), 2);

        let neither = service.data_request(&customer(None, None)).await.unwrap();
        assert!(neither.submissions.is_empty());
    }

    #[tokio::test]
    async fn test_redact_customer_removes_pii_and_keeps_records() {
        let (service, store, _) = service().await;
        seed_submission(&store, "a", "shop.myshopify.com", "1234", "x@example.com").await;

        let count = service
            .redact_customer(&customer(Some("1234"), None))
            .await
            .unwrap();
        assert_eq!(count, 1);

        let record = store.get(collections::SUBMISSIONS, "a").await.unwrap().unwrap();
        for field in PII_FIELDS {
            assert!(!record.contains_key(field), "{field} should be removed");
        }
        assert_eq!(record["redacted"], true);
        assert!(record["redactedAt"].is_string());
        assert_eq!(record["submissionCount"], 2);
        assert_eq!(record["instagramHandle"], "@jane");
    }

    #[tokio::test]
    async fn test_redact_customer_twice_is_a_no_op() {
        let (service, store, _) = service().await;
        seed_submission(&store, "a", "shop.myshopify.com", "1234", "x@example.com").await;
        let request = customer(Some("1234"), Some("x@example.com"));

        service.redact_customer(&request).await.unwrap();
        let after_first = store.get(collections::SUBMISSIONS, "a").await.unwrap();

        assert_eq!(service.redact_customer(&request).await.unwrap(), 0);
        let after_second = store.get(collections::SUBMISSIONS, "a").await.unwrap();
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_redact_shop_clears_all_collections() {
        let (service, store, sessions) = service().await;
        for id in ["s1", "s2", "s3"] {
            seed_submission(&store, id, "shop.myshopify.com", id, "e@example.com").await;
        }
        seed_submission(&store, "keep", "other.myshopify.com", "1", "e@example.com").await;
        store
            .set(collections::SETTINGS, "shop.myshopify.com", doc(json!({"shop": "shop.myshopify.com"})))
            .await
            .unwrap();
        store
            .set(collections::MERCHANTS, "shop.myshopify.com", doc(json!({"plan": {}})))
            .await
            .unwrap();
        store
            .set(collections::USERS, "shop.myshopify.com", doc(json!({"name": "Shop"})))
            .await
            .unwrap();
        sessions
            .store(&Session::offline(shop(), "t".to_string(), String::new()))
            .await;

        let report = service.redact_shop(&shop()).await.unwrap();

        assert_eq!(report.deleted["submissions"], 3);
        assert_eq!(report.deleted["settings"], 1);
        assert_eq!(report.deleted["merchants"], 1);
        assert_eq!(report.deleted["sessions"], 2);
        assert_eq!(report.deleted["users"], 1);
        assert_eq!(store.count(collections::SUBMISSIONS).await, 1);
        assert_eq!(store.count(collections::SESSIONS).await, 0);

        let again = service.redact_shop(&shop()).await.unwrap();
        assert_eq!(again.total(), 0);
    }

    #[tokio::test]
    async fn test_large_teardown_is_split_into_batches() {
        let (service, store, _) = service().await;
        for i in 0..(MAX_BATCH_WRITES + 20) {
            store
                .set(
                    collections::SUBMISSIONS,
                    &format!("sub-{i}"),
                    doc(json!({"shop": "shop.myshopify.com"})),
                )
                .await
                .unwrap();
        }

        let report = service.redact_shop(&shop()).await.unwrap();
        assert_eq!(report.deleted["submissions"], MAX_BATCH_WRITES + 20);
        assert_eq!(store.count(collections::SUBMISSIONS).await, 0);
    }
}
