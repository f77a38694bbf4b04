use std::time::Duration;

use async_trait::async_trait;
use bson::{Bson, Document, doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{
    Client, ClientSession, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind},
    options::{ClientOptions, FindOptions, IndexOptions},
};
use tracing::{debug, trace};

use quarry_core::{
    backend::{StoreBackend, StoreBackendBuilder, WriteOp},
    error::{StoreError, StoreResult},
    index::{IndexDirection, IndexKey, IndexSpec},
    predicate::Expr,
    query::Query,
    record::{ID_FIELD, take_assigned_id},
};

use crate::query::MongoQueryTranslator;

/// Server error code for a namespace (collection) that does not exist.
const NAMESPACE_NOT_FOUND: i32 = 26;

fn read_error(err: MongoError) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn write_error(err: MongoError) -> StoreError {
    StoreError::Persistence(err.to_string())
}

fn not_found(id: &ObjectId, collection: &str) -> StoreError {
    StoreError::NotFound(id.to_hex(), collection.to_string())
}

/// Ensures `document` carries an identity, generating one when it is zero or absent.
fn assign_id(document: &mut Document) -> ObjectId {
    match take_assigned_id(document) {
        Some(id) => id,
        None => {
            let id = ObjectId::new();
            document.insert(ID_FIELD, id);
            id
        }
    }
}

/// Rebuilds an [`IndexSpec`] from a listed index. Returns `None` for the
/// built-in `_id` index.
fn spec_from_model(model: &IndexModel) -> Option<IndexSpec> {
    let mut keys = Vec::new();

    for (field, value) in &model.keys {
        match field.as_str() {
            "_fts" => {
                let weights = model.options.as_ref().and_then(|o| o.weights.as_ref());
                keys.extend(
                    weights
                        .into_iter()
                        .flat_map(|w| w.keys())
                        .map(|f| IndexKey::new(f.clone(), IndexDirection::Text)),
                );
            }
            "_ftsx" => {}
            _ => {
                let direction = match value {
                    Bson::String(kind) => IndexDirection::parse(kind),
                    Bson::Int32(n) if *n < 0 => IndexDirection::Descending,
                    Bson::Int64(n) if *n < 0 => IndexDirection::Descending,
                    Bson::Double(n) if *n < 0.0 => IndexDirection::Descending,
                    _ => IndexDirection::Ascending,
                };
                keys.push(IndexKey::new(field.clone(), direction));
            }
        }
    }

    let spec = IndexSpec::new(keys);
    (spec != IndexSpec::single(ID_FIELD, IndexDirection::Ascending) && !spec.keys.is_empty())
        .then_some(spec)
}

/// MongoDB backend for record stores.
///
/// Reads map driver failures to [`StoreError::Backend`], writes to
/// [`StoreError::Persistence`].
#[derive(Debug, Clone)]
pub struct MongoDbBackend {
    client: Client,
    database: String,
}

impl MongoDbBackend {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self { client, database: database.into() }
    }

    pub fn builder(uri: &str, database: &str) -> MongoDbBackendBuilder {
        MongoDbBackendBuilder::new(uri, database)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, name: &str) -> MongoCollection<Document> {
        self.client.database(&self.database).collection(name)
    }

    async fn apply(
        &self,
        collection: &str,
        session: &mut ClientSession,
        op: WriteOp,
    ) -> StoreResult<ObjectId> {
        let col = self.get_collection(collection);

        match op {
            WriteOp::Insert(mut document) => {
                let id = assign_id(&mut document);
                col.insert_one(document)
                    .session(&mut *session)
                    .await
                    .map_err(write_error)?;
                Ok(id)
            }
            WriteOp::Replace(id, mut document) => {
                document.insert(ID_FIELD, id);
                let result = col
                    .replace_one(doc! { ID_FIELD: id }, document)
                    .session(&mut *session)
                    .await
                    .map_err(write_error)?;

                if result.matched_count == 0 {
                    return Err(not_found(&id, collection));
                }
                Ok(id)
            }
            WriteOp::Delete(id) => {
                let result = col
                    .delete_one(doc! { ID_FIELD: id })
                    .session(&mut *session)
                    .await
                    .map_err(write_error)?;

                if result.deleted_count == 0 {
                    return Err(not_found(&id, collection));
                }
                Ok(id)
            }
        }
    }
}

#[async_trait]
impl StoreBackend for MongoDbBackend {
    async fn find_many(&self, collection: &str, query: Query) -> StoreResult<Vec<Document>> {
        trace!(collection, ?query, "find_many");

        let skip = u64::try_from(query.skip)
            .map_err(|_| StoreError::Backend(format!("skip must not be negative, got {}", query.skip)))?;

        let mut options = FindOptions::default();
        options.limit = query.limit;
        options.skip = (skip > 0).then_some(skip);
        if !query.sort.is_empty() {
            options.sort = Some(MongoQueryTranslator::sort(&query.sort));
        }

        self.get_collection(collection)
            .find(MongoQueryTranslator::filter(query.filter.as_ref())?)
            .with_options(options)
            .await
            .map_err(read_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(read_error)
    }

    async fn count_documents(&self, collection: &str, filter: Option<&Expr>) -> StoreResult<u64> {
        trace!(collection, ?filter, "count_documents");

        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::filter(filter)?)
            .await
            .map_err(read_error)
    }

    async fn delete_many(&self, collection: &str, filter: Option<&Expr>) -> StoreResult<u64> {
        trace!(collection, ?filter, "delete_many");

        Ok(self
            .get_collection(collection)
            .delete_many(MongoQueryTranslator::filter(filter)?)
            .await
            .map_err(write_error)?
            .deleted_count)
    }

    async fn find_by_id(&self, collection: &str, id: &ObjectId) -> StoreResult<Document> {
        trace!(collection, %id, "find_by_id");

        self.get_collection(collection)
            .find_one(doc! { ID_FIELD: *id })
            .await
            .map_err(read_error)?
            .ok_or_else(|| not_found(id, collection))
    }

    async fn insert(&self, collection: &str, mut document: Document) -> StoreResult<ObjectId> {
        let id = assign_id(&mut document);
        trace!(collection, %id, "insert");

        self.get_collection(collection)
            .insert_one(document)
            .await
            .map_err(write_error)?;

        Ok(id)
    }

    async fn replace_by_id(&self, collection: &str, id: &ObjectId, mut document: Document) -> StoreResult<()> {
        trace!(collection, %id, "replace_by_id");
        document.insert(ID_FIELD, *id);

        let result = self
            .get_collection(collection)
            .replace_one(doc! { ID_FIELD: *id }, document)
            .await
            .map_err(write_error)?;

        if result.matched_count == 0 {
            return Err(not_found(id, collection));
        }

        Ok(())
    }

    async fn delete_by_id(&self, collection: &str, id: &ObjectId) -> StoreResult<()> {
        trace!(collection, %id, "delete_by_id");

        let result = self
            .get_collection(collection)
            .delete_one(doc! { ID_FIELD: *id })
            .await
            .map_err(write_error)?;

        if result.deleted_count == 0 {
            return Err(not_found(id, collection));
        }

        Ok(())
    }

    async fn create_index(&self, collection: &str, spec: &IndexSpec) -> StoreResult<()> {
        trace!(collection, index = %spec.name(), "create_index");

        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                    .keys(MongoQueryTranslator::index_keys(spec))
                    .options(IndexOptions::builder().name(spec.name()).build())
                    .build(),
            )
            .await
            .map_err(write_error)?;

        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexSpec>> {
        let cursor = match self.get_collection(collection).list_indexes().await {
            Ok(cursor) => cursor,
            Err(err) => match *err.kind {
                ErrorKind::Command(ref command) if command.code == NAMESPACE_NOT_FOUND => {
                    return Ok(Vec::new());
                }
                _ => return Err(read_error(err)),
            },
        };

        Ok(cursor
            .try_collect::<Vec<IndexModel>>()
            .await
            .map_err(read_error)?
            .iter()
            .filter_map(spec_from_model)
            .collect())
    }

    async fn run_in_transaction(&self, collection: &str, ops: Vec<WriteOp>) -> StoreResult<Vec<ObjectId>> {
        trace!(collection, ops = ops.len(), "run_in_transaction");

        let mut session = self.client.start_session().await.map_err(write_error)?;
        session.start_transaction().await.map_err(write_error)?;

        let mut ids = Vec::with_capacity(ops.len());
        for op in ops {
            match self.apply(collection, &mut session, op).await {
                Ok(id) => ids.push(id),
                Err(err) => {
                    if let Err(abort) = session.abort_transaction().await {
                        debug!(collection, error = %abort, "transaction abort failed");
                    }
                    return Err(err);
                }
            }
        }

        session.commit_transaction().await.map_err(write_error)?;
        Ok(ids)
    }

    async fn shutdown(self) -> StoreResult<()> {
        self.client.shutdown().await;
        Ok(())
    }
}

/// Builder for [`MongoDbBackend`].
///
/// Building parses the connection string and pings the server, so an unreachable
/// database fails here with [`StoreError::Connection`] rather than on first use.
#[derive(Debug, Clone)]
pub struct MongoDbBackendBuilder {
    uri: String,
    database: String,
    connect_timeout: Duration,
}

impl MongoDbBackendBuilder {
    pub fn new(uri: &str, database: &str) -> Self {
        Self {
            uri: uri.to_string(),
            database: database.to_string(),
            connect_timeout: Duration::from_secs(120),
        }
    }

    /// Bounds both connecting and server selection. Defaults to 120 seconds.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbBackendBuilder {
    type Backend = MongoDbBackend;

    async fn build(self) -> StoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        options.connect_timeout = Some(self.connect_timeout);
        options.server_selection_timeout = Some(self.connect_timeout);

        let client = Client::with_options(options).map_err(|e| StoreError::Connection(e.to_string()))?;

        client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        debug!(database = %self.database, "connected");
        Ok(MongoDbBackend::new(client, self.database))
    }
}
