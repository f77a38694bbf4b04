//! Filter evaluation and ordering for in-memory documents.
//!
//! Matching follows the document-database conventions the MongoDB backend gets for
//! free: dotted paths reach into nested documents, array fields match when any
//! element does, and a missing field only satisfies `ne`, `not_in`, `not_exists` and
//! equality against null.

use std::cmp::Ordering;

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use quarry_core::{
    error::{StoreError, StoreResult},
    predicate::{Clause, Expr, Operator, QueryVisitor},
    query::{Sort, SortDirection},
};

/// Comparable view of a BSON value.
///
/// Both integer widths share `Int` and compare exactly. An integer against a double
/// compares as `f64`, so `1` and `1.0` are equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(Vec<(&'a str, Comparable<'a>)>),
    /// Binary, regex, decimal and the like. Never equal to anything.
    Opaque,
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(values) => Comparable::Array(values.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Opaque,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Int(a), Comparable::Int(b)) => a == b,
            (Comparable::Int(a), Comparable::Number(b)) => (*a as f64) == *b,
            (Comparable::Number(a), Comparable::Int(b)) => *a == (*b as f64),
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Int(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Number(b)) => (*a as f64).partial_cmp(b),
            (Comparable::Number(a), Comparable::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Comparable<'_> {
    /// Position of this value's kind in MongoDB's cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Int(_) | Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Opaque => 6,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
        }
    }
}

/// Resolves a dotted path such as `meta.source.name` or `tags.0`.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Equality with array fields matching element-wise.
fn matches_eq(field: &Bson, value: &Bson) -> bool {
    let expected = Comparable::from(value);
    let actual = Comparable::from(field);

    if actual == expected {
        return true;
    }

    match actual {
        Comparable::Array(items) => items.iter().any(|item| item == &expected),
        _ => false,
    }
}

fn matches_ordering(field: &Bson, value: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let expected = Comparable::from(value);

    match field {
        Bson::Array(items) => items
            .iter()
            .any(|item| Comparable::from(item).partial_cmp(&expected).is_some_and(&accept)),
        _ => Comparable::from(field).partial_cmp(&expected).is_some_and(accept),
    }
}

fn expect_array<'a>(clause: &'a Clause) -> StoreResult<&'a [Bson]> {
    match clause.value() {
        Bson::Array(values) => Ok(values),
        other => Err(StoreError::Backend(format!(
            "`{}` on {:?} needs an array, got {other}",
            clause.op(),
            clause.field()
        ))),
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> StoreResult<bool> {
        self.visit_expr(expr)
    }

    /// True if `document` matches `filter`. `None` matches everything.
    pub fn matches(document: &Document, filter: Option<&Expr>) -> StoreResult<bool> {
        match filter {
            Some(expr) => DocumentEvaluator::new(document).evaluate(expr),
            None => Ok(true),
        }
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = StoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_clause(&mut self, clause: &Clause) -> Result<Self::Output, Self::Error> {
        let value = clause.value();
        let field = lookup(self.document, clause.field());

        Ok(match (clause.op(), field) {
            (Operator::Exists, found) => found.is_some(),
            (Operator::NotExists, found) => found.is_none(),

            (Operator::In, found) => {
                let values = expect_array(clause)?;
                match found {
                    Some(field) => values.iter().any(|v| matches_eq(field, v)),
                    None => values.iter().any(|v| matches!(v, Bson::Null)),
                }
            }
            (Operator::NotIn, found) => {
                let values = expect_array(clause)?;
                match found {
                    Some(field) => !values.iter().any(|v| matches_eq(field, v)),
                    None => !values.iter().any(|v| matches!(v, Bson::Null)),
                }
            }

            (Operator::Eq, None) => matches!(value, Bson::Null),
            (Operator::Ne, None) => !matches!(value, Bson::Null),
            (_, None) => false,

            (Operator::Eq, Some(field)) => matches_eq(field, value),
            (Operator::Ne, Some(field)) => !matches_eq(field, value),
            (Operator::Lt, Some(field)) => matches_ordering(field, value, Ordering::is_lt),
            (Operator::Lte, Some(field)) => matches_ordering(field, value, Ordering::is_le),
            (Operator::Gt, Some(field)) => matches_ordering(field, value, Ordering::is_gt),
            (Operator::Gte, Some(field)) => matches_ordering(field, value, Ordering::is_ge),
        })
    }
}

/// Orders two documents by `sort`, earlier keys first.
///
/// Values of different kinds order by kind first: missing and null, numbers,
/// strings, documents, arrays, other binary-like values, object ids, booleans,
/// then dates. Values of one kind that do not order compare equal.
pub(crate) fn compare_documents(a: &Document, b: &Document, sort: &[Sort]) -> Ordering {
    for key in sort {
        let left = lookup(a, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);
        let right = lookup(b, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = left
            .rank()
            .cmp(&right.rank())
            .then_with(|| left.partial_cmp(&right).unwrap_or(Ordering::Equal));

        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn eval(document: &Document, clause: StoreResult<Clause>) -> StoreResult<bool> {
        DocumentEvaluator::new(document).evaluate(&clause.unwrap().into())
    }

    #[test]
    fn numbers_compare_across_widths() {
        let document = doc! { "n": 3_i64 };

        assert!(eval(&document, Clause::eq("n", 3)).unwrap());
        assert!(eval(&document, Clause::gt("n", 2.5)).unwrap());
        assert!(eval(&document, Clause::lte("n", 3)).unwrap());
        assert!(!eval(&document, Clause::lt("n", 3)).unwrap());
    }

    #[test]
    fn large_integers_compare_exactly() {
        let document = doc! { "n": 9_007_199_254_740_992_i64 };

        assert!(!eval(&document, Clause::eq("n", 9_007_199_254_740_993_i64)).unwrap());
        assert!(eval(&document, Clause::ne("n", 9_007_199_254_740_993_i64)).unwrap());
        assert!(eval(&document, Clause::lt("n", 9_007_199_254_740_993_i64)).unwrap());
        assert!(eval(&document, Clause::eq("n", 9_007_199_254_740_992_i64)).unwrap());
    }

    #[test]
    fn dotted_paths_reach_nested_fields() {
        let document = doc! { "meta": { "source": { "name": "rss" } }, "tags": ["a", "b"] };

        assert!(eval(&document, Clause::eq("meta.source.name", "rss")).unwrap());
        assert!(eval(&document, Clause::eq("tags.1", "b")).unwrap());
        assert!(eval(&document, Clause::not_exists("meta.source.url")).unwrap());
    }

    #[test]
    fn missing_fields() {
        let document = doc! { "a": 1 };

        assert!(eval(&document, Clause::ne("b", 1)).unwrap());
        assert!(eval(&document, Clause::not_in("b", vec![1, 2])).unwrap());
        assert!(eval(&document, Clause::eq("b", Bson::Null)).unwrap());
        assert!(!eval(&document, Clause::eq("b", 1)).unwrap());
        assert!(!eval(&document, Clause::gt("b", 0)).unwrap());
        assert!(!eval(&document, Clause::is_in("b", vec![1])).unwrap());
    }

    #[test]
    fn array_fields_match_element_wise() {
        let document = doc! { "tags": ["anime", "movie"], "scores": [1, 9] };

        assert!(eval(&document, Clause::eq("tags", "movie")).unwrap());
        assert!(!eval(&document, Clause::ne("tags", "movie")).unwrap());
        assert!(eval(&document, Clause::is_in("tags", vec!["series", "anime"])).unwrap());
        assert!(eval(&document, Clause::gt("scores", 5)).unwrap());
        assert!(!eval(&document, Clause::gt("scores", 9)).unwrap());
    }

    #[test]
    fn in_requires_an_array() {
        let document = doc! { "a": 1 };
        assert!(matches!(eval(&document, Clause::is_in("a", 1)), Err(StoreError::Backend(_))));
        assert!(matches!(eval(&document, Clause::not_in("a", "x")), Err(StoreError::Backend(_))));
    }

    #[test]
    fn empty_groups() {
        let document = doc! { "a": 1 };

        assert!(DocumentEvaluator::new(&document).evaluate(&Expr::And(vec![])).unwrap());
        assert!(!DocumentEvaluator::new(&document).evaluate(&Expr::Or(vec![])).unwrap());
    }

    #[test]
    fn object_ids_compare() {
        let low = ObjectId::from_bytes([0; 12]);
        let high = ObjectId::from_bytes([1; 12]);
        let document = doc! { "ref": high };

        assert!(eval(&document, Clause::eq("ref", high)).unwrap());
        assert!(eval(&document, Clause::gt("ref", low)).unwrap());
    }

    #[test]
    fn sort_puts_missing_first_and_honors_key_priority() {
        let docs = [
            doc! { "k": 1, "n": 2 },
            doc! { "n": 5 },
            doc! { "k": 1, "n": 1 },
            doc! { "k": 0, "n": 9 },
        ];
        let sort = [
            Sort { field: "k".into(), direction: SortDirection::Asc },
            Sort { field: "n".into(), direction: SortDirection::Desc },
        ];

        let mut sorted = docs.to_vec();
        sorted.sort_by(|a, b| compare_documents(a, b, &sort));

        let ns = sorted.iter().map(|d| d.get_i32("n").unwrap()).collect::<Vec<_>>();
        assert_eq!(ns, vec![5, 9, 2, 1]);
    }

    #[test]
    fn sort_orders_mixed_kinds_by_type() {
        let docs = [
            doc! { "id": 0, "v": "text" },
            doc! { "id": 1, "v": true },
            doc! { "id": 2, "v": 7 },
            doc! { "id": 3 },
            doc! { "id": 4, "v": 2.5 },
        ];
        let sort = [Sort { field: "v".into(), direction: SortDirection::Asc }];

        let mut sorted = docs.to_vec();
        sorted.sort_by(|a, b| compare_documents(a, b, &sort));

        let ids = sorted.iter().map(|d| d.get_i32("id").unwrap()).collect::<Vec<_>>();
        assert_eq!(ids, vec![3, 4, 2, 0, 1]);

        sorted.sort_by(|a, b| compare_documents(b, a, &sort));
        let ids = sorted.iter().map(|d| d.get_i32("id").unwrap()).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 0, 2, 4, 3]);
    }
}
