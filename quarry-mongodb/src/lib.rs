//! MongoDB backend for quarry stores.
//!
//! This crate implements the `StoreBackend` trait on top of the official async
//! MongoDB driver. Filters are translated into native query documents, sorting and
//! pagination become find options, and transactions run in a client session.
//!
//! To use this backend, enable the `mongodb` feature of `quarry`:
//!
//! ```toml
//! [dependencies]
//! quarry = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use quarry::{backend::StoreBackendBuilder, mongodb::MongoDbBackend, store::Store};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MongoDbBackend::builder("mongodb://localhost:27017", "media")
//!         .connect_timeout(Duration::from_secs(10))
//!         .build()
//!         .await?;
//!
//!     let episodes = Store::<_, Episode>::new(backend, "episodes");
//!     episodes.create_indexes("series_id;release_date:desc").await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as quarry_mongodb;

pub mod query;
pub mod store;

pub use store::{MongoDbBackend, MongoDbBackendBuilder};
