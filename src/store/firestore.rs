//! Firestore REST v1 document store.
//!
//! Documents are read and written through the public REST API:
//!
//! - `GET/PATCH/DELETE {database}/documents/{collection}/{id}`
//! - `POST {database}/documents:runQuery` for equality queries
//! - `POST {database}/documents:commit` for atomic batches
//!
//! JSON values are converted to and from Firestore's typed value
//! representation (`stringValue`, `integerValue`, `mapValue`, ...).

use super::{Document, DocumentStore, Filter, Snapshot, StoreError, WriteOp};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_DATABASE: &str = "(default)";

/// Connection settings for [`FirestoreStore`].
#[derive(Clone)]
pub struct FirestoreConfig {
    project_id: String,
    database: String,
    access_token: Option<String>,
    endpoint: String,
}

impl FirestoreConfig {
    /// Creates settings for the default database of a project.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_string(),
            access_token: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Reads `FIRESTORE_PROJECT_ID`, `FIRESTORE_DATABASE`,
    /// `FIRESTORE_ACCESS_TOKEN` and `FIRESTORE_EMULATOR_HOST`.
    ///
    /// Returns `None` when no project id is configured.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let mut config = Self::new(var("FIRESTORE_PROJECT_ID")?);
        if let Some(database) = var("FIRESTORE_DATABASE") {
            config = config.database(database);
        }
        if let Some(token) = var("FIRESTORE_ACCESS_TOKEN") {
            config = config.access_token(token);
        }
        if let Some(host) = var("FIRESTORE_EMULATOR_HOST") {
            config = config
                .endpoint(format!("http://{host}/v1"))
                .access_token("owner");
        }
        Some(config)
    }

    /// Sets the database id.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets the OAuth bearer token sent with every request.
    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the API root, e.g. an emulator or a mock server.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the project id.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Returns the bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database
        )
    }
}

impl std::fmt::Debug for FirestoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreConfig")
            .field("project_id", &self.project_id)
            .field("database", &self.database)
            .field("access_token", &self.access_token.as_ref().map(|_| "*****"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// A [`DocumentStore`] backed by Firestore.
#[derive(Debug, Clone)]
pub struct FirestoreStore {
    http: reqwest::Client,
    config: FirestoreConfig,
}

// Verify FirestoreStore is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<FirestoreStore>();
};

impl FirestoreStore {
    /// Creates a store for the given settings.
    #[must_use]
    pub fn new(config: FirestoreConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.documents_root(),
            collection,
            urlencoding::encode(id)
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{}",
            self.config.endpoint,
            self.document_name(collection, id)
        )
    }

    fn root_url(&self, action: &str) -> String {
        format!(
            "{}/{}:{action}",
            self.config.endpoint,
            self.config.documents_root()
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        if status.is_server_error() || status.as_u16() == 429 {
            Err(StoreError::Unavailable(format!("{status}: {message}")))
        } else {
            Err(StoreError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn json(response: reqwest::Response) -> Result<Value, StoreError> {
        response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))
    }

    fn encode_write(&self, write: &WriteOp) -> Value {
        match write {
            WriteOp::Set {
                collection,
                id,
                data,
            } => json!({
                "update": {
                    "name": self.document_name(collection, id),
                    "fields": encode_fields(data),
                }
            }),
            WriteOp::Update {
                collection,
                id,
                set,
                remove,
                must_exist,
            } => {
                let field_paths: Vec<&str> = set
                    .keys()
                    .map(String::as_str)
                    .chain(remove.iter().map(String::as_str))
                    .collect();
                let mut write = json!({
                    "update": {
                        "name": self.document_name(collection, id),
                        "fields": encode_fields(set),
                    },
                    "updateMask": { "fieldPaths": field_paths },
                });
                if *must_exist {
                    write["currentDocument"] = json!({ "exists": true });
                }
                write
            }
            WriteOp::Delete { collection, id } => json!({
                "delete": self.document_name(collection, id),
            }),
        }
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let response = self
            .send(self.http.get(self.document_url(collection, id)))
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = Self::json(Self::check(response).await?).await?;
        Ok(Some(decode_fields(body.get("fields"))?))
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
        let body = json!({ "fields": encode_fields(&data) });
        let response = self
            .send(self.http.patch(self.document_url(collection, id)).json(&body))
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let response = self
            .send(self.http.delete(self.document_url(collection, id)))
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<Snapshot>, StoreError> {
        let mut structured_query = json!({ "from": [{ "collectionId": collection }] });
        if let Some(filter) = encode_filters(filters) {
            structured_query["where"] = filter;
        }
        let body = json!({ "structuredQuery": structured_query });

        let response = self
            .send(self.http.post(self.root_url("runQuery")).json(&body))
            .await?;
        let results = Self::json(Self::check(response).await?).await?;
        let Value::Array(results) = results else {
            return Err(StoreError::Malformed(
                "runQuery response is not an array".to_string(),
            ));
        };

        results
            .iter()
            .filter_map(|result| result.get("document"))
            .map(|document| {
                let name = document
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| StoreError::Malformed("document without name".to_string()))?;
                let id = name.rsplit('/').next().unwrap_or(name);
                Ok(Snapshot {
                    id: urlencoding::decode(id)
                        .map_or_else(|_| id.to_string(), std::borrow::Cow::into_owned),
                    data: decode_fields(document.get("fields"))?,
                })
            })
            .collect()
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }
        let body = json!({
            "writes": writes.iter().map(|w| self.encode_write(w)).collect::<Vec<_>>(),
        });
        let response = self
            .send(self.http.post(self.root_url("commit")).json(&body))
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

fn encode_filters(filters: &[Filter]) -> Option<Value> {
    let mut encoded: Vec<Value> = filters
        .iter()
        .map(|f| {
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": f.field },
                    "op": "EQUAL",
                    "value": encode_value(&f.value),
                }
            })
        })
        .collect();
    match encoded.len() {
        0 => None,
        1 => encoded.pop(),
        _ => Some(json!({ "compositeFilter": { "op": "AND", "filters": encoded } })),
    }
}

fn encode_fields(data: &Document) -> Value {
    Value::Object(
        data.iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

/// Converts a JSON value into Firestore's typed value form.
pub(crate) fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => n.as_i64().map_or_else(
            || json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
            |i| json!({ "integerValue": i.to_string() }),
        ),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

fn decode_fields(fields: Option<&Value>) -> Result<Document, StoreError> {
    match fields {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(fields)) => fields
            .iter()
            .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
            .collect(),
        Some(_) => Err(StoreError::Malformed("fields is not an object".to_string())),
    }
}

/// Converts a Firestore typed value back into plain JSON.
///
/// Timestamps, references and bytes become strings.
pub(crate) fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Err(StoreError::Malformed(format!("untyped value: {value}")));
    };
    Ok(match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or_default()),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .or_else(|| inner.as_i64())
            .map_or(Value::Null, Value::from),
        "doubleValue" => inner.as_f64().map_or(Value::Null, Value::from),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" | "geoPointValue" => {
            inner.clone()
        }
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect::<Result<_, _>>())
                .transpose()?
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(decode_fields(inner.get("fields"))?),
        other => {
            return Err(StoreError::Malformed(format!("unknown value type {other}")));
        }
    })
}
