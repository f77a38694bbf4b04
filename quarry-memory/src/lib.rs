//! In-memory backend for quarry stores.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend`
//! trait. It is the reference backend for tests and local development: filters,
//! multi-key sorting, pagination, index bookkeeping and all-or-nothing transactions
//! behave the way the MongoDB backend does, without a server.
//!
//! # Quick Start
//!
//! ```ignore
//! use quarry::{memory::MemoryBackend, store::Store};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Store::<_, Download>::new(MemoryBackend::new(), "downloads");
//!
//!     let mut download = Download::new("queued");
//!     store.save(&mut download).await?;
//!
//!     assert_eq!(store.query().count().await?, 1);
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as quarry_memory;

pub mod evaluator;
pub mod store;

pub use store::{MemoryBackend, MemoryBackendBuilder};
