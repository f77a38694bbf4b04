//! Query construction and execution.
//!
//! A [`QueryBuilder`] is obtained from [`Store::query`], already seeded with the
//! store's default clauses. Predicates, sort keys and pagination are chained onto it
//! and a terminal call (`run`, `count`, `delete_many`, `batch`, ...) compiles the
//! accumulated state into one filter and hands it to the backend.
//!
//! ```ignore
//! let recent = store
//!     .query()
//!     .eq("_type", "Episode")
//!     .lt("release_date", tomorrow)
//!     .gt("release_date", yesterday)
//!     .asc("release_date")
//!     .run()
//!     .await?;
//! ```
//!
//! # Compilation
//!
//! Clauses are AND-combined only when there is more than one. A single clause is
//! used bare, and no clauses at all compile to `None`, which matches every record.

use std::fmt;

use bson::Bson;
use tracing::debug;

use crate::{
    backend::StoreBackend,
    error::{StoreError, StoreResult},
    page::Page,
    predicate::{Clause, Expr},
    record::Record,
    store::Store,
};

/// Limit applied to builders that never call [`QueryBuilder::limit`].
pub const DEFAULT_LIMIT: i64 = 25;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// A compiled query as handed to [`StoreBackend::find_many`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Filter to match records against. `None` matches everything.
    pub filter: Option<Expr>,
    /// Sort keys, highest priority first.
    pub sort: Vec<Sort>,
    /// Number of matching records to skip. Passed through uninterpreted.
    pub skip: i64,
    /// Maximum number of records to return. `None` is unbounded.
    pub limit: Option<i64>,
}

impl Query {
    /// Creates an unsorted, unbounded query with the given filter.
    pub fn new(filter: Option<Expr>) -> Self {
        Query { filter, ..Default::default() }
    }
}

/// Compiles a clause list into a single filter.
pub(crate) fn compile(clauses: &[Expr]) -> Option<Expr> {
    match clauses {
        [] => None,
        [only] => Some(only.clone()),
        all => Some(Expr::And(all.to_vec())),
    }
}

/// Chainable accumulator of predicates, sort keys and pagination for one store.
///
/// Mutators consume and return the builder. Terminal calls borrow it, so a builder
/// may be extended and run again. A predicate with an invalid field does not fail
/// the chain; the error is held and returned by the next terminal call, before
/// anything reaches the backend.
pub struct QueryBuilder<'a, B: StoreBackend, R: Record> {
    store: &'a Store<B, R>,
    clauses: Vec<Expr>,
    sort: Vec<Sort>,
    limit: i64,
    skip: i64,
    rejected: Option<StoreError>,
}

impl<'a, B: StoreBackend, R: Record> QueryBuilder<'a, B, R> {
    pub(crate) fn new(store: &'a Store<B, R>, clauses: Vec<Expr>) -> Self {
        QueryBuilder {
            store,
            clauses,
            sort: Vec::new(),
            limit: store.default_limit(),
            skip: 0,
            rejected: None,
        }
    }

    /// A builder over the same store with no clauses, used for sub-groups.
    fn sibling(&self) -> Self {
        QueryBuilder::new(self.store, Vec::new())
    }

    fn reject(&mut self, err: StoreError) {
        self.rejected.get_or_insert(err);
    }

    fn push(mut self, clause: StoreResult<Clause>) -> Self {
        match clause {
            Ok(clause) => self.clauses.push(clause.into()),
            Err(err) => self.reject(err),
        }
        self
    }

    fn absorb(&mut self, other: QueryBuilder<'a, B, R>) -> Vec<Expr> {
        if let Some(err) = other.rejected {
            self.reject(err);
        }
        other.clauses
    }

    /// Adds an equality clause.
    pub fn eq(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.push(Clause::eq(field, value))
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.push(Clause::ne(field, value))
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.push(Clause::lt(field, value))
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.push(Clause::lte(field, value))
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.push(Clause::gt(field, value))
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.push(Clause::gte(field, value))
    }

    /// Matches records whose field equals any of `values`.
    ///
    /// ```ignore
    /// store.query().is_in("status", vec!["searching", "loading"])
    /// ```
    pub fn is_in(self, field: impl Into<String>, values: impl Into<Bson>) -> Self {
        self.push(Clause::is_in(field, values))
    }

    pub fn not_in(self, field: impl Into<String>, values: impl Into<Bson>) -> Self {
        self.push(Clause::not_in(field, values))
    }

    pub fn exists(self, field: impl Into<String>) -> Self {
        self.push(Clause::exists(field))
    }

    pub fn not_exists(self, field: impl Into<String>) -> Self {
        self.push(Clause::not_exists(field))
    }

    /// Adds an equality clause only when `condition` holds.
    pub fn when(self, condition: bool, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        if condition { self.eq(field, value) } else { self }
    }

    /// Adds any prebuilt expression as one clause.
    pub fn with(mut self, expr: impl Into<Expr>) -> Self {
        self.clauses.push(expr.into());
        self
    }

    /// Adds one OR group built from the clauses `f` adds to a fresh builder.
    ///
    /// ```ignore
    /// store.query().or(|q| q.eq("status", "done").eq("status", "failed"))
    /// ```
    ///
    /// If `f` adds nothing, nothing is added.
    pub fn or<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let group = f(self.sibling());
        let clauses = self.absorb(group);

        if !clauses.is_empty() {
            self.clauses.push(Expr::Or(clauses));
        }
        self
    }

    /// Adds `OR(AND(a), AND(b))` where `a` and `b` are the clauses `f` adds to two
    /// fresh builders.
    ///
    /// ```ignore
    /// store.query().complex_or(|a, b| (
    ///     a.eq("status", "done").gt("size", 0),
    ///     b.eq("force", true),
    /// ))
    /// ```
    pub fn complex_or<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Self, Self) -> (Self, Self),
    {
        let (a, b) = f(self.sibling(), self.sibling());
        let a = self.absorb(a);
        let b = self.absorb(b);

        self.clauses.push(Expr::Or(vec![Expr::And(a), Expr::And(b)]));
        self
    }

    fn add_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(Sort { field: field.into(), direction });
        self
    }

    /// Appends an ascending sort key. Earlier keys take priority.
    pub fn asc(self, field: impl Into<String>) -> Self {
        self.add_sort(field, SortDirection::Asc)
    }

    /// Appends a descending sort key. Earlier keys take priority.
    pub fn desc(self, field: impl Into<String>) -> Self {
        self.add_sort(field, SortDirection::Desc)
    }

    /// Sets the maximum number of records returned. Zero or negative removes the
    /// limit entirely.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Sets how many matching records to skip.
    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = skip;
        self
    }

    /// The accumulated clauses, store defaults first.
    pub fn clauses(&self) -> &[Expr] {
        &self.clauses
    }

    /// Compiles the accumulated clauses into one filter.
    ///
    /// # Errors
    ///
    /// Returns the first [`StoreError::InvalidField`] recorded while chaining.
    pub fn filter(&self) -> StoreResult<Option<Expr>> {
        match &self.rejected {
            Some(err) => Err(err.clone()),
            None => Ok(compile(&self.clauses)),
        }
    }

    /// Compiles filter, sort and pagination into the query `run` would execute.
    pub fn to_query(&self) -> StoreResult<Query> {
        Ok(self.paginated(self.filter()?))
    }

    fn paginated(&self, filter: Option<Expr>) -> Query {
        Query {
            filter,
            sort: self.sort.clone(),
            skip: self.skip,
            limit: (self.limit > 0).then_some(self.limit),
        }
    }

    /// Executes the query and returns the matching records in order.
    pub async fn run(&self) -> StoreResult<Vec<R>> {
        let query = self.to_query()?;

        debug!(
            collection = self.store.collection(),
            filter = ?query.filter,
            skip = query.skip,
            limit = ?query.limit,
            "running query"
        );

        self.store.find_records(query).await
    }

    /// Executes the query and returns the first record, if any.
    pub async fn first(&self) -> StoreResult<Option<R>> {
        let mut query = self.to_query()?;
        query.limit = Some(1);

        Ok(self.store.find_records(query).await?.into_iter().next())
    }

    /// Executes `filter` verbatim, ignoring every accumulated clause (store defaults
    /// included) but keeping this builder's sort and pagination.
    ///
    /// Invalid fields held by the builder belong to the ignored clauses and do not
    /// fail this call.
    pub async fn raw(&self, filter: impl Into<Option<Expr>>) -> StoreResult<Vec<R>> {
        let query = self.paginated(filter.into());

        debug!(
            collection = self.store.collection(),
            filter = ?query.filter,
            skip = query.skip,
            limit = ?query.limit,
            "running raw query"
        );

        self.store.find_records(query).await
    }

    /// Counts the records matching the accumulated clauses. Sort and pagination
    /// are ignored.
    pub async fn count(&self) -> StoreResult<u64> {
        let filter = self.filter()?;

        debug!(collection = self.store.collection(), filter = ?filter, "counting");

        self.store
            .backend()
            .count_documents(self.store.collection(), filter.as_ref())
            .await
    }

    /// Deletes the records matching the accumulated clauses and returns how many
    /// were removed. Sort and pagination are ignored.
    pub async fn delete_many(&self) -> StoreResult<u64> {
        let filter = self.filter()?;

        debug!(collection = self.store.collection(), filter = ?filter, "deleting");

        self.store
            .backend()
            .delete_many(self.store.collection(), filter.as_ref())
            .await
    }

    /// Walks every matching record in pages of `size`, in ascending skip order.
    ///
    /// When everything fits in one page, `f` is called exactly once (possibly with an
    /// empty page). The walk stops at the first error from the backend or from `f`;
    /// pages already handed to `f` are not revisited.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if `size` is not positive.
    pub async fn batch<F>(&mut self, size: i64, mut f: F) -> StoreResult<()>
    where
        F: FnMut(Page<R>) -> StoreResult<()>,
    {
        if size <= 0 {
            return Err(StoreError::InvalidArgument(format!("batch size must be positive, got {size}")));
        }

        let total = self.count().await?;
        self.limit = size;
        self.skip = 0;

        if total <= size as u64 {
            let items = self.run().await?;
            return f(Page::new(items, 0, total));
        }

        while (self.skip as u64) < total {
            let items = self.run().await?;

            debug!(
                collection = self.store.collection(),
                skip = self.skip,
                size = items.len(),
                total,
                "batch page"
            );

            f(Page::new(items, self.skip, total))?;
            self.skip += size;
        }

        Ok(())
    }
}

impl<B: StoreBackend, R: Record> fmt::Debug for QueryBuilder<'_, B, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("collection", &self.store.collection())
            .field("clauses", &self.clauses)
            .field("sort", &self.sort)
            .field("limit", &self.limit)
            .field("skip", &self.skip)
            .finish()
    }
}
