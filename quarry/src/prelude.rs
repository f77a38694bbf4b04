//! Convenient re-exports of commonly used quarry types.
//!
//! ```ignore
//! use quarry::prelude::*;
//! ```

pub use quarry_core::{
    backend::{StoreBackend, StoreBackendBuilder, WriteOp},
    config::StoreConfig,
    error::{StoreError, StoreResult},
    index::{FieldIndex, IndexDirection, IndexKey, IndexSpec, Indexed, parse_descriptor},
    page::Page,
    predicate::{Clause, Expr, Operator, QueryVisitor},
    query::{Query, QueryBuilder, Sort, SortDirection},
    record::{Record, RecordExt, is_zero_id, parse_id, zero_id},
    store::Store,
};
pub use quarry_macros::Indexed;
