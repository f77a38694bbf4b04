//! Typed record storage and a composable query builder over document databases.
//!
//! This crate is the core of the quarry project and provides:
//!
//! - **Records** ([`record`]) - The trait typed records implement, and identity helpers
//! - **Predicates** ([`predicate`]) - Clauses and AND/OR groups that make up a filter
//! - **Query builder** ([`query`]) - Chainable predicate, sort and pagination accumulator
//! - **Store** ([`store`]) - CRUD over one collection, with per-store default clauses
//! - **Indexes** ([`index`]) - Index descriptors and field-level index declarations
//! - **Backend abstraction** ([`backend`]) - The contract database backends implement
//! - **Configuration** ([`config`]) - Connection and startup settings
//! - **Error handling** ([`error`]) - Error and result types
//! - **Pages** ([`page`]) - Pages handed out by batched traversal
//!
//! # Example
//!
//! ```ignore
//! use quarry::prelude::*;
//!
//! let store = Store::<_, Download>::new(MemoryBackend::new(), "downloads");
//! let active = store
//!     .query()
//!     .is_in("status", vec!["searching", "loading"])
//!     .desc("created_at")
//!     .run()
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as quarry_core;

pub mod backend;
pub mod config;
pub mod error;
pub mod index;
pub mod page;
pub mod predicate;
pub mod query;
pub mod record;
pub mod store;
