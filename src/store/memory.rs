//! In-process document store.

use super::{Document, DocumentStore, Filter, Snapshot, StoreError, WriteOp};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

type Collections = HashMap<String, BTreeMap<String, Document>>;

/// A [`DocumentStore`] held in memory.
///
/// Used when no Firestore project is configured and in tests. Data lives as
/// long as the value does. Batch commits are all-or-nothing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    fn apply(collections: &mut Collections, write: WriteOp) -> Result<(), StoreError> {
        match write {
            WriteOp::Set {
                collection,
                id,
                data,
            } => {
                collections.entry(collection).or_default().insert(id, data);
            }
            WriteOp::Update {
                collection,
                id,
                set,
                remove,
                must_exist,
            } => {
                let docs = collections.entry(collection.clone()).or_default();
                if must_exist && !docs.contains_key(&id) {
                    return Err(StoreError::Missing { collection, id });
                }
                let doc = docs.entry(id).or_default();
                for field in &remove {
                    doc.remove(field);
                }
                doc.extend(set);
            }
            WriteOp::Delete { collection, id } => {
                if let Some(docs) = collections.get_mut(&collection) {
                    docs.remove(&id);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        if let Some(docs) = self.collections.write().await.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<Snapshot>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, data)| filters.iter().all(|f| f.matches(data)))
                    .map(|(id, data)| Snapshot {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut guard = self.collections.write().await;
        let mut staged = guard.clone();
        for write in writes {
            Self::apply(&mut staged, write)?;
        }
        *guard = staged;
        Ok(())
    }
}
