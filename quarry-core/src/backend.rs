//! Storage backend abstraction: the database collaborator the store talks to.
//!
//! The [`StoreBackend`] trait is the complete contract the query builder and store
//! need from a database: filtered reads, counts, deletes, identity lookups, writes,
//! index creation and a single-collection transaction. Implementations are
//! required to be thread-safe (`Send + Sync`) and own any pooling, retries or
//! timeouts themselves.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use std::fmt::Debug;

use crate::{
    error::StoreResult,
    index::IndexSpec,
    predicate::Expr,
    query::Query,
};

/// A write executed as part of [`StoreBackend::run_in_transaction`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a document, assigning an identity if its `_id` is zero or absent.
    Insert(Document),
    /// Replace the document with the given identity.
    Replace(ObjectId, Document),
    /// Delete the document with the given identity.
    Delete(ObjectId),
}

/// Abstract interface for document database backends.
///
/// All methods address one collection by name. Filters are passed as `Option<&Expr>`
/// where `None` matches every document.
///
/// # Error Handling
///
/// Write failures are reported as [`StoreError::Persistence`](crate::error::StoreError::Persistence),
/// read failures as [`StoreError::Backend`](crate::error::StoreError::Backend) and identity
/// misses as [`StoreError::NotFound`](crate::error::StoreError::NotFound).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the documents matching `query.filter`, sorted, skipped and limited
    /// as the query says.
    async fn find_many(&self, collection: &str, query: Query) -> StoreResult<Vec<Document>>;

    /// Counts the documents matching `filter`.
    async fn count_documents(&self, collection: &str, filter: Option<&Expr>) -> StoreResult<u64>;

    /// Deletes the documents matching `filter` and returns how many were removed.
    async fn delete_many(&self, collection: &str, filter: Option<&Expr>) -> StoreResult<u64>;

    /// Looks up one document by identity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`](crate::error::StoreError::NotFound) when no document has `id`.
    async fn find_by_id(&self, collection: &str, id: &ObjectId) -> StoreResult<Document>;

    /// Inserts a document and returns its identity.
    ///
    /// If the document's `_id` is zero or absent the backend assigns a fresh one.
    async fn insert(&self, collection: &str, document: Document) -> StoreResult<ObjectId>;

    /// Replaces the document with identity `id`.
    async fn replace_by_id(
        &self,
        collection: &str,
        id: &ObjectId,
        document: Document,
    ) -> StoreResult<()>;

    /// Deletes the document with identity `id`.
    async fn delete_by_id(&self, collection: &str, id: &ObjectId) -> StoreResult<()>;

    /// Creates an index unless an identical one already exists.
    async fn create_index(&self, collection: &str, spec: &IndexSpec) -> StoreResult<()>;

    /// Lists the indexes created through [`create_index`](Self::create_index).
    async fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexSpec>>;

    /// Applies `ops` atomically: either every write commits or none does.
    ///
    /// Returns one identity per op, in order (the assigned identity for inserts).
    async fn run_in_transaction(
        &self,
        collection: &str,
        ops: Vec<WriteOp>,
    ) -> StoreResult<Vec<ObjectId>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> StoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> StoreResult<Self::Backend>;
}
