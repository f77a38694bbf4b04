//! Predicate model: single-field clauses and their boolean composition.
//!
//! A [`Clause`] compares one field against a value with an [`Operator`]. Clauses are
//! combined into [`Expr`] trees tagged `And`/`Or`. Backends never see storage syntax
//! from here; they translate an [`Expr`] through a [`QueryVisitor`].
//!
//! ```ignore
//! use quarry::predicate::{Clause, Expr};
//!
//! let expr = Expr::from(Clause::eq("status", "done")?)
//!     .and(Clause::gt("size", 1024)?.into());
//! ```

use std::fmt;

use bson::Bson;

use crate::error::{StoreError, StoreResult};

/// Comparison operators a [`Clause`] can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equal to.
    Eq,
    /// Not equal to. Also matches records without the field.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Equal to any element of an array value.
    In,
    /// Equal to none of the elements of an array value.
    NotIn,
    /// The field is present.
    Exists,
    /// The field is absent.
    NotExists,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Exists => "exists",
            Operator::NotExists => "not_exists",
        })
    }
}

/// One comparison over a single field.
///
/// Fields are private: a clause cannot change after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    field: String,
    op: Operator,
    value: Bson,
}

impl Clause {
    /// Builds a clause, rejecting empty field names.
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Bson>) -> StoreResult<Self> {
        let field = field.into();

        if field.trim().is_empty() {
            return Err(StoreError::InvalidField(field));
        }

        Ok(Clause { field, op, value: value.into() })
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> StoreResult<Self> {
        Self::new(field, Operator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> StoreResult<Self> {
        Self::new(field, Operator::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> StoreResult<Self> {
        Self::new(field, Operator::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> StoreResult<Self> {
        Self::new(field, Operator::Lte, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> StoreResult<Self> {
        Self::new(field, Operator::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> StoreResult<Self> {
        Self::new(field, Operator::Gte, value)
    }

    /// Matches when the field equals any element of `values`.
    pub fn is_in(field: impl Into<String>, values: impl Into<Bson>) -> StoreResult<Self> {
        Self::new(field, Operator::In, values)
    }

    /// Matches when the field equals none of the elements of `values`.
    pub fn not_in(field: impl Into<String>, values: impl Into<Bson>) -> StoreResult<Self> {
        Self::new(field, Operator::NotIn, values)
    }

    pub fn exists(field: impl Into<String>) -> StoreResult<Self> {
        Self::new(field, Operator::Exists, true)
    }

    pub fn not_exists(field: impl Into<String>) -> StoreResult<Self> {
        Self::new(field, Operator::NotExists, false)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn op(&self) -> Operator {
        self.op
    }

    pub fn value(&self) -> &Bson {
        &self.value
    }
}

/// A filter expression: a single clause or a combinator-tagged group.
///
/// Groups keep their members in insertion order, so two expressions built by the
/// same sequence of calls compare equal.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A single comparison.
    Clause(Clause),
    /// All members must match. An empty group matches everything.
    And(Vec<Expr>),
    /// Any member must match. An empty group matches nothing.
    Or(Vec<Expr>),
}

impl Expr {
    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    ///
    /// If this expression is already an OR, the other expression is appended
    /// to the list. Otherwise, a new OR expression is created.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }
}

impl From<Clause> for Expr {
    fn from(clause: Clause) -> Self {
        Expr::Clause(clause)
    }
}

/// Walks an [`Expr`] tree. Backends implement this to translate filters into their
/// native form or to evaluate them directly.
pub trait QueryVisitor {
    type Output;
    type Error: Into<StoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_clause(&mut self, clause: &Clause) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Clause(clause) => self.visit_clause(clause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_reject_empty_fields() {
        assert!(matches!(Clause::eq("", 1), Err(StoreError::InvalidField(_))));
        assert!(matches!(Clause::not_in("   ", vec![1, 2]), Err(StoreError::InvalidField(_))));
        assert!(matches!(Clause::exists(""), Err(StoreError::InvalidField(_))));
    }

    #[test]
    fn constructors_tag_the_operator() {
        let cases = [
            (Clause::eq("a", 1).unwrap(), Operator::Eq),
            (Clause::ne("a", 1).unwrap(), Operator::Ne),
            (Clause::lt("a", 1).unwrap(), Operator::Lt),
            (Clause::lte("a", 1).unwrap(), Operator::Lte),
            (Clause::gt("a", 1).unwrap(), Operator::Gt),
            (Clause::gte("a", 1).unwrap(), Operator::Gte),
            (Clause::is_in("a", vec![1]).unwrap(), Operator::In),
            (Clause::not_in("a", vec![1]).unwrap(), Operator::NotIn),
            (Clause::exists("a").unwrap(), Operator::Exists),
            (Clause::not_exists("a").unwrap(), Operator::NotExists),
        ];

        for (clause, op) in cases {
            assert_eq!(clause.op(), op);
            assert_eq!(clause.field(), "a");
        }
    }

    #[test]
    fn and_flattens_into_existing_group() {
        let a: Expr = Clause::eq("a", 1).unwrap().into();
        let b: Expr = Clause::eq("b", 2).unwrap().into();
        let c: Expr = Clause::eq("c", 3).unwrap().into();

        let expr = a.clone().and(b.clone()).and(c.clone());
        assert_eq!(expr, Expr::And(vec![a.clone(), b.clone(), c.clone()]));

        let expr = a.clone().or(b.clone());
        assert_eq!(expr, Expr::Or(vec![a, b]));
    }
}
