//! Expression evaluation against BSON documents.
//!
//! This is the interpreter behind every [`ViewDefinition`](crate::view::ViewDefinition): a
//! compiled [`Expr`] is walked node by node against a document, so predicates never need to
//! be turned into executable code.

use std::{cmp::Ordering, collections::HashMap, convert::Infallible};

use bson::{Bson, Document, datetime::DateTime};

use crate::query::{Expr, FieldOp, QueryVisitor};

/// Comparable representation of BSON values.
///
/// Integers compare exactly with each other and are widened to `f64` against floats, so that
/// `2`, `2i64` and `2.0` compare equal. Values of different kinds are never equal and have no
/// ordering.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Integer(i64::from(*value)),
            Bson::Int64(value) => Comparable::Integer(*value),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Integer(a), Comparable::Integer(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::Integer(a), Comparable::Number(b))
            | (Comparable::Number(b), Comparable::Integer(a)) => (*a as f64) == *b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Integer(a), Comparable::Integer(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::Integer(a), Comparable::Number(b)) => (*a as f64).partial_cmp(b),
            (Comparable::Number(a), Comparable::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a possibly dotted field path inside a document.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    if let Some(value) = document.get(path) {
        return Some(value);
    }

    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Orders two optional field values; missing and incomparable values sort as equal.
pub fn compare_values(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let left = left.map(Comparable::from).unwrap_or(Comparable::Null);
    let right = right.map(Comparable::from).unwrap_or(Comparable::Null);

    left.partial_cmp(&right).unwrap_or(Ordering::Equal)
}

/// Evaluates expressions against a single document.
pub struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns whether the document satisfies the expression.
    pub fn matches(document: &'a Document, expr: &Expr) -> bool {
        match DocumentEvaluator::new(document).visit_expr(expr) {
            Ok(matched) => matched,
            Err(never) => match never {},
        }
    }

    fn is_member(field_value: &Bson, candidates: &Bson) -> bool {
        let candidates = match candidates {
            Bson::Array(values) => values.iter().map(Comparable::from).collect::<Vec<_>>(),
            single => vec![Comparable::from(single)],
        };

        match Comparable::from(field_value) {
            Comparable::Array(items) => items.iter().any(|item| candidates.contains(item)),
            value => candidates.contains(&value),
        }
    }
}

// Missing fields fail (or, for negations, pass) their comparison instead of erroring.
impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = Infallible;

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

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = match lookup(self.document, field) {
            Some(field_value) => field_value,
            None => return Ok(matches!(op, FieldOp::Ne | FieldOp::NotIn)),
        };

        Ok(match op {
            FieldOp::Eq => Comparable::from(field_value) == Comparable::from(value),
            FieldOp::Ne => Comparable::from(field_value) != Comparable::from(value),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match Comparable::from(field_value).partial_cmp(&Comparable::from(value)) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            }
            FieldOp::In => Self::is_member(field_value, value),
            FieldOp::NotIn => !Self::is_member(field_value, value),
        })
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    fn eval(document: &Document, query: Document) -> bool {
        DocumentEvaluator::matches(document, &Expr::compile(&query))
    }

    #[test]
    fn equality_normalizes_numbers() {
        let document = doc! { "count": 2i64, "ratio": 0.5 };

        assert!(eval(&document, doc! { "count": 2 }));
        assert!(eval(&document, doc! { "count": 2.0 }));
        assert!(!eval(&document, doc! { "count": "2" }));
        assert!(eval(&document, doc! { "ratio": { "$ne": 1 } }));
    }

    #[test]
    fn large_integers_compare_exactly() {
        let big = 9_007_199_254_740_993i64;
        let document = doc! { "id": big };

        assert!(eval(&document, doc! { "id": big }));
        assert!(!eval(&document, doc! { "id": big - 1 }));
        assert!(eval(&document, doc! { "id": { "$gt": big - 1 } }));
        assert!(!eval(&document, doc! { "id": { "$lt": big } }));
        assert_eq!(
            compare_values(Some(&Bson::Int64(big)), Some(&Bson::Int64(big - 1))),
            Ordering::Greater
        );
    }

    #[test]
    fn ordering_is_numeric_or_lexical() {
        let document = doc! { "count": 10, "name": "beta" };

        assert!(eval(&document, doc! { "count": { "$gt": 9, "$lte": 10 } }));
        assert!(!eval(&document, doc! { "count": { "$lt": 10 } }));
        assert!(eval(&document, doc! { "name": { "$gte": "alpha", "$lt": "gamma" } }));
        assert!(!eval(&document, doc! { "name": { "$gt": 1 } }));
    }

    #[test]
    fn membership_is_exact() {
        let document = doc! { "tag": "red", "tags": ["a", "b"] };

        assert!(eval(&document, doc! { "tag": { "$in": ["blue", "red"] } }));
        assert!(!eval(&document, doc! { "tag": { "$in": ["RED", "re"] } }));
        assert!(eval(&document, doc! { "tag": { "$nin": ["re", "blue"] } }));
        assert!(eval(&document, doc! { "tags": { "$in": ["b", "z"] } }));
        assert!(!eval(&document, doc! { "tags": { "$nin": ["a"] } }));
    }

    #[test]
    fn missing_fields_only_pass_negations() {
        let document = doc! { "other": 1 };

        assert!(!eval(&document, doc! { "a": 1 }));
        assert!(!eval(&document, doc! { "a": { "$gt": 0 } }));
        assert!(!eval(&document, doc! { "a": { "$in": [1] } }));
        assert!(eval(&document, doc! { "a": { "$ne": 1 } }));
        assert!(eval(&document, doc! { "a": { "$nin": [1] } }));
    }

    #[test]
    fn or_and_nested_paths() {
        let document = doc! { "kind": "note", "address": { "city": "Oslo" } };

        assert!(eval(&document, doc! { "address.city": "Oslo" }));
        assert!(eval(&document, doc! { "$or": [{ "kind": "task" }, { "address.city": "Oslo" }] }));
        assert!(!eval(&document, doc! { "$or": [{ "kind": "task" }, { "kind": "note", "address.city": "Rome" }] }));
        assert!(!eval(&document, doc! { "$or": [] }));
    }
}
