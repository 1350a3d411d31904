//! Document store abstraction.
//!
//! The app keeps its data in a Firestore-shaped document store: named
//! collections of JSON documents addressed by id, equality queries on fields,
//! and atomic batch commits. [`DocumentStore`] is the interface the session
//! store and compliance handlers depend on.
//!
//! # Implementations
//!
//! - [`MemoryStore`]: process-local, used for development and tests
//! - [`FirestoreStore`]: Firestore REST v1
//!
//! Binary assets (logo and banner images) live in object storage behind
//! [`AssetStore`].

mod assets;
mod firestore;
mod memory;

pub use assets::{object_path_from_url, AssetStore, DisabledAssets, FirebaseStorage};
pub use firestore::{FirestoreConfig, FirestoreStore};
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// A document's fields.
pub type Document = Map<String, Value>;

/// Firestore accepts at most this many writes in one commit.
pub const MAX_BATCH_WRITES: usize = 500;

/// Collection names.
pub mod collections {
    /// Giveaway entries.
    pub const SUBMISSIONS: &str = "submissions";
    /// Per-shop popup settings.
    pub const SETTINGS: &str = "settings";
    /// Merchant records, including the synced billing plan.
    pub const MERCHANTS: &str = "merchants";
    /// Encrypted session envelopes.
    pub const SESSIONS: &str = "sessions";
    /// Shop profile documents, keyed by shop domain.
    pub const USERS: &str = "users";
}

/// A document read from a query, with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Document id within its collection.
    pub id: String,
    /// Document fields.
    pub data: Document,
}

/// An equality filter on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Field name.
    pub field: String,
    /// Value the field must equal.
    pub value: Value,
}

impl Filter {
    /// Creates a `field == value` filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Returns `true` if the document satisfies this filter.
    #[must_use]
    pub fn matches(&self, data: &Document) -> bool {
        data.get(&self.field) == Some(&self.value)
    }
}

/// One write in an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Replace the document.
    Set {
        /// Collection name.
        collection: String,
        /// Document id.
        id: String,
        /// New contents.
        data: Document,
    },
    /// Merge fields into the document and remove others.
    Update {
        /// Collection name.
        collection: String,
        /// Document id.
        id: String,
        /// Fields to set (merged with the existing ones).
        set: Document,
        /// Fields to remove. Removing an absent field is a no-op.
        remove: Vec<String>,
        /// Fail the whole batch if the document does not exist.
        must_exist: bool,
    },
    /// Delete the document. Deleting a missing document succeeds.
    Delete {
        /// Collection name.
        collection: String,
        /// Document id.
        id: String,
    },
}

impl WriteOp {
    /// Creates a delete write.
    pub fn delete(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Delete {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates a set write.
    pub fn set(collection: impl Into<String>, id: impl Into<String>, data: Document) -> Self {
        Self::Set {
            collection: collection.into(),
            id: id.into(),
            data,
        }
    }
}

/// Errors from the document store.
///
/// A missing document is never an error: reads return `Ok(None)` and
/// deletes succeed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or failed internally.
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the request.
    #[error("Document store rejected the request ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error description from the store.
        message: String,
    },

    /// A batch update required a document that does not exist.
    #[error("Document {collection}/{id} does not exist")]
    Missing {
        /// Collection name.
        collection: String,
        /// Document id.
        id: String,
    },

    /// The store returned data that could not be decoded.
    #[error("Malformed document store response: {0}")]
    Malformed(String),
}

/// Async document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads one document. A missing document is `Ok(None)`.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Replaces one document.
    async fn set(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError>;

    /// Deletes one document. Deleting a missing document succeeds.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Returns every document matching all `filters`.
    async fn query(&self, collection: &str, filters: &[Filter])
        -> Result<Vec<Snapshot>, StoreError>;

    /// Applies all writes atomically.
    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), StoreError>;
}
