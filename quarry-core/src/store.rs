//! Typed record storage over one collection.
//!
//! A [`Store`] binds a backend, a collection name and a record type together. It
//! carries a list of default clauses that every query it hands out starts with, and
//! decides between insert and replace on save from the record's identity.
//!
//! # Example
//!
//! ```ignore
//! use quarry::{memory::MemoryBackend, store::Store};
//!
//! let mut downloads = Store::<_, Download>::new(MemoryBackend::new(), "downloads");
//! downloads.set_query_defaults([Clause::eq("_type", "Download")?.into()]);
//!
//! let mut download = Download::new("queued");
//! downloads.save(&mut download).await?;
//!
//! let queued = downloads.query().eq("status", "queued").run().await?;
//! ```

use std::{fmt, marker::PhantomData};

use bson::oid::ObjectId;
use chrono::Utc;
use tracing::{debug, info};

use crate::{
    backend::{StoreBackend, WriteOp},
    config::StoreConfig,
    error::{StoreError, StoreResult},
    index::{IndexSpec, Indexed, parse_descriptor},
    predicate::Expr,
    query::{DEFAULT_LIMIT, Query, QueryBuilder},
    record::{Record, RecordExt, is_zero_id, parse_id},
};

/// A strongly-typed store for records of type `R` kept in one collection of `B`.
pub struct Store<B: StoreBackend, R: Record> {
    backend: B,
    collection: String,
    defaults: Vec<Expr>,
    default_limit: i64,
    _marker: PhantomData<fn() -> R>,
}

impl<B: StoreBackend, R: Record> Store<B, R> {
    /// Creates a store over `collection` with no default clauses.
    pub fn new(backend: B, collection: impl Into<String>) -> Self {
        let collection = collection.into();
        info!(collection = %collection, "store created");

        Self {
            backend,
            collection,
            defaults: Vec::new(),
            default_limit: DEFAULT_LIMIT,
            _marker: PhantomData,
        }
    }

    /// Creates a store from `config`, then provisions the configured indexes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Configuration`] if the config is invalid, or any error
    /// raised while parsing or creating the configured indexes.
    pub async fn open(backend: B, config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;

        let store = Self::new(backend, config.collection.clone()).with_default_limit(config.default_limit);

        if let Some(indexes) = config.indexes.as_deref() {
            store.create_indexes(indexes).await?;
        }

        Ok(store)
    }

    /// Sets the limit new builders start with.
    pub fn with_default_limit(mut self, limit: i64) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn default_limit(&self) -> i64 {
        self.default_limit
    }

    /// The clauses every query from this store starts with.
    pub fn query_defaults(&self) -> &[Expr] {
        &self.defaults
    }

    /// Appends clauses to the defaults. Builders already handed out keep the
    /// defaults they were created with.
    pub fn set_query_defaults(&mut self, clauses: impl IntoIterator<Item = Expr>) {
        self.defaults.extend(clauses);
    }

    /// Returns a fresh builder seeded with a copy of the store defaults.
    pub fn query(&self) -> QueryBuilder<'_, B, R> {
        QueryBuilder::new(self, self.defaults.clone())
    }

    pub(crate) async fn find_records(&self, query: Query) -> StoreResult<Vec<R>> {
        self.backend
            .find_many(&self.collection, query)
            .await?
            .into_iter()
            .map(R::from_document)
            .collect()
    }

    /// Loads the record with the given hex identity.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidIdentity`] if `id` is not 24 hex characters
    /// - [`StoreError::NotFound`] if no record has that identity
    pub async fn get(&self, id: &str) -> StoreResult<R> {
        self.get_by_id(&parse_id(id)?).await
    }

    /// Loads the record with the given identity.
    pub async fn get_by_id(&self, id: &ObjectId) -> StoreResult<R> {
        debug!(collection = %self.collection, id = %id, "get");

        let document = self.backend.find_by_id(&self.collection, id).await?;
        R::from_document(document)
    }

    /// Loads the record with the given hex identity into `out`.
    ///
    /// `out` is left untouched on error.
    pub async fn find(&self, id: &str, out: &mut R) -> StoreResult<()> {
        self.find_by_id(&parse_id(id)?, out).await
    }

    /// Loads the record with the given identity into `out`.
    pub async fn find_by_id(&self, id: &ObjectId, out: &mut R) -> StoreResult<()> {
        *out = self.get_by_id(id).await?;
        Ok(())
    }

    /// Inserts `record` if it has never been persisted, otherwise replaces the stored
    /// version.
    ///
    /// On insert the backend-assigned identity is written back into `record`. The
    /// record is only touched once the write succeeds.
    pub async fn save(&self, record: &mut R) -> StoreResult<()> {
        let creating = record.is_new();
        let mut staged = record.clone();
        staged.touch(Utc::now(), creating);

        if creating {
            let id = self.backend.insert(&self.collection, staged.to_document()?).await?;
            staged.set_id(id);

            debug!(collection = %self.collection, id = %id, "inserted");
        } else {
            let id = *staged.id();
            self.backend
                .replace_by_id(&self.collection, &id, staged.to_document()?)
                .await?;

            debug!(collection = %self.collection, id = %id, "replaced");
        }

        *record = staged;
        Ok(())
    }

    /// Inserts `record` inside a backend transaction, writing the assigned identity
    /// back into it once the transaction commits.
    pub async fn create_with_transaction(&self, record: &mut R) -> StoreResult<()> {
        let mut staged = record.clone();
        staged.touch(Utc::now(), true);

        let ids = self
            .backend
            .run_in_transaction(&self.collection, vec![WriteOp::Insert(staged.to_document()?)])
            .await?;

        let id = ids
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Persistence("transaction returned no identity".into()))?;
        staged.set_id(id);
        *record = staged;

        debug!(collection = %self.collection, id = %id, "inserted in transaction");
        Ok(())
    }

    fn persisted_id(record: &R) -> StoreResult<ObjectId> {
        let id = *record.id();

        if is_zero_id(&id) {
            return Err(StoreError::InvalidIdentity("record has not been persisted".into()));
        }

        Ok(id)
    }

    /// Replaces the stored version of an already persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidIdentity`] if `record` has a zero identity.
    pub async fn update(&self, record: &mut R) -> StoreResult<()> {
        let id = Self::persisted_id(record)?;
        let mut staged = record.clone();
        staged.touch(Utc::now(), false);

        self.backend
            .replace_by_id(&self.collection, &id, staged.to_document()?)
            .await?;

        *record = staged;
        Ok(())
    }

    /// Deletes an already persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidIdentity`] if `record` has a zero identity.
    pub async fn delete(&self, record: &R) -> StoreResult<()> {
        let id = Self::persisted_id(record)?;

        debug!(collection = %self.collection, id = %id, "delete");
        self.backend.delete_by_id(&self.collection, &id).await
    }

    /// Counts records matching `filter` exactly as given.
    ///
    /// Store defaults are not applied here, unlike [`QueryBuilder::count`].
    pub async fn count(&self, filter: impl Into<Option<Expr>>) -> StoreResult<u64> {
        let filter = filter.into();
        debug!(collection = %self.collection, filter = ?filter, "store count");

        self.backend
            .count_documents(&self.collection, filter.as_ref())
            .await
    }

    /// Creates one index unless an identical one exists.
    pub async fn create_index(&self, spec: &IndexSpec) -> StoreResult<()> {
        info!(collection = %self.collection, index = %spec.name(), "ensuring index");
        self.backend.create_index(&self.collection, spec).await
    }

    /// Creates every index named by a descriptor such as `"created_at;name:1,age:-1"`.
    pub async fn create_indexes(&self, descriptor: &str) -> StoreResult<()> {
        for spec in parse_descriptor(descriptor)? {
            self.create_index(&spec).await?;
        }

        Ok(())
    }

    /// Creates the single-field indexes `R` declares on its fields.
    pub async fn create_declared_indexes(&self) -> StoreResult<()>
    where
        R: Indexed,
    {
        for field in R::declared_indexes() {
            self.create_index(&field.to_spec()).await?;
        }

        Ok(())
    }

    pub async fn list_indexes(&self) -> StoreResult<Vec<IndexSpec>> {
        self.backend.list_indexes(&self.collection).await
    }

    /// Consumes the store and shuts its backend down.
    pub async fn shutdown(self) -> StoreResult<()> {
        info!(collection = %self.collection, "store shutting down");
        self.backend.shutdown().await
    }
}

impl<B: StoreBackend, R: Record> fmt::Debug for Store<B, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.backend)
            .field("collection", &self.collection)
            .field("defaults", &self.defaults)
            .field("default_limit", &self.default_limit)
            .finish()
    }
}
