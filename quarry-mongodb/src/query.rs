//! Translation of predicate trees into MongoDB filter documents.

use bson::{Bson, Document, doc};

use quarry_core::{
    error::{StoreError, StoreResult},
    index::{IndexDirection, IndexSpec},
    predicate::{Clause, Expr, Operator, QueryVisitor},
    query::{Sort, SortDirection},
};

/// Translates [`Expr`] trees into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates an optional filter. `None` becomes `{}`.
    pub fn filter(filter: Option<&Expr>) -> StoreResult<Document> {
        match filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }

    pub fn sort(sort: &[Sort]) -> Document {
        sort.iter()
            .map(|key| {
                let direction = match key.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                };
                (key.field.clone(), Bson::Int32(direction))
            })
            .collect()
    }

    pub fn index_keys(spec: &IndexSpec) -> Document {
        spec.keys
            .iter()
            .map(|key| {
                let value = match key.direction {
                    IndexDirection::Ascending => Bson::Int32(1),
                    IndexDirection::Descending => Bson::Int32(-1),
                    IndexDirection::Text => Bson::String("text".into()),
                };
                (key.field.clone(), value)
            })
            .collect()
    }

    fn visit_all(&mut self, exprs: &[Expr]) -> StoreResult<Vec<Document>> {
        exprs.iter().map(|expr| self.visit_expr(expr)).collect()
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = StoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! { "$and": self.visit_all(exprs)? })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        // `$or` must be non-empty; no document lacks `_id`.
        if exprs.is_empty() {
            return Ok(doc! { "_id": { "$exists": false } });
        }

        Ok(doc! { "$or": self.visit_all(exprs)? })
    }

    fn visit_clause(&mut self, clause: &Clause) -> Result<Self::Output, Self::Error> {
        let value = clause.value();

        let condition = match clause.op() {
            Operator::Eq => doc! { "$eq": value },
            Operator::Ne => doc! { "$ne": value },
            Operator::Lt => doc! { "$lt": value },
            Operator::Lte => doc! { "$lte": value },
            Operator::Gt => doc! { "$gt": value },
            Operator::Gte => doc! { "$gte": value },
            Operator::In | Operator::NotIn => {
                let Bson::Array(values) = value else {
                    return Err(StoreError::Backend(format!(
                        "`{}` on {:?} needs an array, got {value}",
                        clause.op(),
                        clause.field()
                    )));
                };

                match clause.op() {
                    Operator::In => doc! { "$in": values },
                    _ => doc! { "$nin": values },
                }
            }
            Operator::Exists => doc! { "$exists": true },
            Operator::NotExists => doc! { "$exists": false },
        };

        Ok(doc! { clause.field(): condition })
    }
}
