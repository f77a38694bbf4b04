//! In-memory backend for record stores.
//!
//! Collections are kept as ordered maps from identity to document behind one
//! async-aware read-write lock. Scans run in identity order, so unsorted pagination
//! is stable from one call to the next.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use mea::rwlock::RwLock;
use tracing::trace;

use quarry_core::{
    backend::{StoreBackend, StoreBackendBuilder, WriteOp},
    error::{StoreError, StoreResult},
    index::IndexSpec,
    predicate::Expr,
    query::Query,
    record::{ID_FIELD, take_assigned_id},
};

use crate::evaluator::{DocumentEvaluator, compare_documents};

#[derive(Debug, Default, Clone)]
struct Collection {
    documents: BTreeMap<ObjectId, Document>,
    indexes: Vec<IndexSpec>,
}

impl Collection {
    fn matching(&self, filter: Option<&Expr>) -> StoreResult<Vec<&Document>> {
        let mut found = Vec::new();

        for document in self.documents.values() {
            if DocumentEvaluator::matches(document, filter)? {
                found.push(document);
            }
        }

        Ok(found)
    }

    fn insert(&mut self, name: &str, mut document: Document) -> StoreResult<ObjectId> {
        let id = match take_assigned_id(&mut document) {
            Some(id) if self.documents.contains_key(&id) => {
                return Err(StoreError::Persistence(format!(
                    "record {id} already exists in collection {name}"
                )));
            }
            Some(id) => id,
            None => {
                let id = ObjectId::new();
                document.insert(ID_FIELD, id);
                id
            }
        };

        self.documents.insert(id, document);
        Ok(id)
    }

    fn replace(&mut self, name: &str, id: &ObjectId, mut document: Document) -> StoreResult<()> {
        let slot = self
            .documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_hex(), name.to_string()))?;

        document.insert(ID_FIELD, *id);
        *slot = document;
        Ok(())
    }

    fn delete(&mut self, name: &str, id: &ObjectId) -> StoreResult<()> {
        self.documents
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_hex(), name.to_string()))
    }

    fn apply(&mut self, name: &str, op: WriteOp) -> StoreResult<ObjectId> {
        match op {
            WriteOp::Insert(document) => self.insert(name, document),
            WriteOp::Replace(id, document) => self.replace(name, &id, document).map(|_| id),
            WriteOp::Delete(id) => self.delete(name, &id).map(|_| id),
        }
    }
}

/// Thread-safe in-memory backend.
///
/// Cloning is cheap and every clone shares the same data, so one instance can back
/// several stores at once.
///
/// # Example
///
/// ```ignore
/// use quarry_memory::MemoryBackend;
/// use quarry_core::backend::StoreBackend;
/// use bson::doc;
///
/// let backend = MemoryBackend::new();
/// let id = backend.insert("users", doc! { "name": "Alice" }).await?;
/// let user = backend.find_by_id("users", &id).await?;
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> MemoryBackendBuilder {
        MemoryBackendBuilder
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn find_many(&self, collection: &str, query: Query) -> StoreResult<Vec<Document>> {
        trace!(collection, ?query, "find_many");

        let collections = self.collections.read().await;
        let Some(col) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut found = col.matching(query.filter.as_ref())?;

        if !query.sort.is_empty() {
            found.sort_by(|a, b| compare_documents(a, b, &query.sort));
        }

        let skip = usize::try_from(query.skip).unwrap_or(0);
        let limit = query
            .limit
            .and_then(|limit| usize::try_from(limit).ok())
            .unwrap_or(usize::MAX);

        Ok(found.into_iter().skip(skip).take(limit).cloned().collect())
    }

    async fn count_documents(&self, collection: &str, filter: Option<&Expr>) -> StoreResult<u64> {
        trace!(collection, ?filter, "count_documents");

        let collections = self.collections.read().await;
        match collections.get(collection) {
            Some(col) => Ok(col.matching(filter)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, filter: Option<&Expr>) -> StoreResult<u64> {
        trace!(collection, ?filter, "delete_many");

        let mut collections = self.collections.write().await;
        let Some(col) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let doomed = col
            .documents
            .iter()
            .map(|(id, document)| DocumentEvaluator::matches(document, filter).map(|hit| (*id, hit)))
            .collect::<StoreResult<Vec<_>>>()?;

        let mut deleted = 0;
        for (id, hit) in doomed {
            if hit {
                col.documents.remove(&id);
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    async fn find_by_id(&self, collection: &str, id: &ObjectId) -> StoreResult<Document> {
        trace!(collection, %id, "find_by_id");

        self.collections
            .read()
            .await
            .get(collection)
            .and_then(|col| col.documents.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_hex(), collection.to_string()))
    }

    async fn insert(&self, collection: &str, document: Document) -> StoreResult<ObjectId> {
        trace!(collection, "insert");

        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(collection, document)
    }

    async fn replace_by_id(&self, collection: &str, id: &ObjectId, document: Document) -> StoreResult<()> {
        trace!(collection, %id, "replace_by_id");

        match self.collections.write().await.get_mut(collection) {
            Some(col) => col.replace(collection, id, document),
            None => Err(StoreError::NotFound(id.to_hex(), collection.to_string())),
        }
    }

    async fn delete_by_id(&self, collection: &str, id: &ObjectId) -> StoreResult<()> {
        trace!(collection, %id, "delete_by_id");

        match self.collections.write().await.get_mut(collection) {
            Some(col) => col.delete(collection, id),
            None => Err(StoreError::NotFound(id.to_hex(), collection.to_string())),
        }
    }

    async fn create_index(&self, collection: &str, spec: &IndexSpec) -> StoreResult<()> {
        trace!(collection, index = %spec.name(), "create_index");

        let mut collections = self.collections.write().await;
        let col = collections.entry(collection.to_string()).or_default();

        if !col.indexes.contains(spec) {
            col.indexes.push(spec.clone());
        }

        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexSpec>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|col| col.indexes.clone())
            .unwrap_or_default())
    }

    async fn run_in_transaction(&self, collection: &str, ops: Vec<WriteOp>) -> StoreResult<Vec<ObjectId>> {
        trace!(collection, ops = ops.len(), "run_in_transaction");

        let mut collections = self.collections.write().await;
        let mut staged = collections.get(collection).cloned().unwrap_or_default();

        let ids = ops
            .into_iter()
            .map(|op| staged.apply(collection, op))
            .collect::<StoreResult<Vec<_>>>()?;

        collections.insert(collection.to_string(), staged);
        Ok(ids)
    }
}

/// Builder for [`MemoryBackend`]. Building always succeeds.
#[derive(Debug, Default)]
pub struct MemoryBackendBuilder;

#[async_trait]
impl StoreBackendBuilder for MemoryBackendBuilder {
    type Backend = MemoryBackend;

    async fn build(self) -> StoreResult<Self::Backend> {
        Ok(MemoryBackend::new())
    }
}
