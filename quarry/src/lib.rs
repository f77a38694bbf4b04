//! Typed record stores with a composable query builder, over pluggable document
//! database backends.
//!
//! This crate is the entry point of the quarry project. It re-exports the core types
//! from the sub-crates and gives access to the available backends.
//!
//! # Features
//!
//! - **Typed stores** - Serde structs in, serde structs out, with insert-or-replace saves
//! - **Query builder** - Chainable filters, OR groups, multi-key sorting and pagination
//! - **Batching** - Page through large result sets with a callback
//! - **Index provisioning** - From descriptor strings or `#[derive(Indexed)]`
//! - **Multiple backends** - In-memory for development and tests, MongoDB for production
//!
//! # Quick Start
//!
//! ```ignore
//! use quarry::{prelude::*, memory::MemoryBackend};
//! use bson::oid::ObjectId;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Indexed)]
//! pub struct Download {
//!     #[serde(rename = "_id", default = "zero_id")]
//!     pub id: ObjectId,
//!     #[index]
//!     pub status: String,
//!     pub size: i64,
//! }
//!
//! impl Record for Download {
//!     fn id(&self) -> &ObjectId { &self.id }
//!     fn set_id(&mut self, id: ObjectId) { self.id = id; }
//! }
//!
//! #[tokio::main]
//! async fn main() -> StoreResult<()> {
//!     let mut store = Store::<_, Download>::new(MemoryBackend::new(), "downloads");
//!     store.create_declared_indexes().await?;
//!
//!     let mut download = Download { id: zero_id(), status: "queued".into(), size: 0 };
//!     store.save(&mut download).await?;
//!
//!     let pending = store
//!         .query()
//!         .is_in("status", vec!["queued", "loading"])
//!         .desc("size")
//!         .run()
//!         .await?;
//!
//!     store
//!         .query()
//!         .eq("status", "done")
//!         .batch(100, |page| {
//!             for download in page {
//!                 println!("{download:?}");
//!             }
//!             Ok(())
//!         })
//!         .await?;
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use quarry_core::{backend, config, error, index, page, predicate, query, record, store};
pub use quarry_macros::Indexed;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend.
pub mod memory {
    pub use quarry_memory::{MemoryBackend, MemoryBackendBuilder};
}

/// MongoDB storage backend.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use quarry_mongodb::{MongoDbBackend, MongoDbBackendBuilder};
}

/// Connects to the MongoDB server named by `config` and opens a store over its
/// collection, provisioning any configured indexes.
///
/// # Errors
///
/// Returns [`StoreError::Connection`](error::StoreError::Connection) if the server
/// cannot be reached within the configured timeout.
#[cfg(feature = "mongodb")]
pub async fn connect<R: record::Record>(
    config: &config::StoreConfig,
) -> error::StoreResult<store::Store<mongodb::MongoDbBackend, R>> {
    use backend::StoreBackendBuilder;

    config.validate()?;

    let backend = mongodb::MongoDbBackend::builder(&config.uri, &config.database)
        .connect_timeout(config.connect_timeout())
        .build()
        .await?;

    store::Store::open(backend, config).await
}
