//! Query compilation and find filters.
//!
//! A query is a mapping from field name to either a scalar (implicit equality) or an
//! operator object:
//!
//! ```ignore
//! use bson::doc;
//! use revlayer::query::Expr;
//!
//! let expr = Expr::compile(&doc! {
//!     "status": "active",
//!     "age": { "$gte": 18, "$lt": 65 },
//!     "$or": [{ "role": "admin" }, { "role": { "$in": ["owner", "editor"] } }],
//! });
//! ```
//!
//! Compilation produces an [`Expr`] tree of field/operator/literal nodes. The tree is plain
//! data: backends either interpret it (see [`crate::evaluator`]) or translate it through a
//! [`QueryVisitor`]. Nothing the caller supplies is ever executed as code.
//!
//! # Operators
//!
//! | key             | operator           |
//! |-----------------|--------------------|
//! | `$in`           | [`FieldOp::In`]    |
//! | `$nin`          | [`FieldOp::NotIn`] |
//! | `$ne`, `$not`   | [`FieldOp::Ne`]    |
//! | `$lt`, `$lte`   | [`FieldOp::Lt`], [`FieldOp::Lte`] |
//! | `$gt`, `$gte`   | [`FieldOp::Gt`], [`FieldOp::Gte`] |
//!
//! Unknown operator keys are ignored. The reserved top-level key `$or` takes a sequence of
//! sub-queries; each sub-query is the conjunction of its fields and the sub-queries are
//! joined by OR.

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Top-level key holding a disjunction of sub-queries.
pub const OR_KEY: &str = "$or";

/// Field comparison operators.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldOp {
    /// Equal to.
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// The field equals one of the listed values.
    In,
    /// The field equals none of the listed values.
    NotIn,
}

impl FieldOp {
    /// Maps an operator key of the query language to its operator.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "$in" => Some(FieldOp::In),
            "$nin" => Some(FieldOp::NotIn),
            "$ne" | "$not" => Some(FieldOp::Ne),
            "$lt" => Some(FieldOp::Lt),
            "$lte" => Some(FieldOp::Lte),
            "$gt" => Some(FieldOp::Gt),
            "$gte" => Some(FieldOp::Gte),
            _ => None,
        }
    }
}

/// A compiled predicate over a document.
///
/// `And(vec![])` matches every document and `Or(vec![])` matches none.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Field comparison expression.
    Field {
        /// The field name, dotted for nested documents.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The literal to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: impl Into<String>, op: FieldOp, value: impl Into<Bson>) -> Self {
        Expr::Field { field: field.into(), op, value: value.into() }
    }

    /// An expression that matches every document.
    pub fn all() -> Self {
        Expr::And(Vec::new())
    }

    /// Combines this expression with another using logical AND.
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
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Compiles a query mapping into an expression.
    ///
    /// The result is the conjunction of one condition per field, with `$or` contributing a
    /// single disjunction. Unsupported operators and other `$`-prefixed top-level keys are
    /// skipped.
    pub fn compile(query: &Document) -> Self {
        let mut conditions = Vec::with_capacity(query.len());

        for (key, value) in query {
            if key.as_str() == OR_KEY {
                conditions.push(Self::compile_or(value));
            } else if key.starts_with('$') {
                continue;
            } else {
                conditions.extend(Self::compile_field(key, value));
            }
        }

        match conditions.len() {
            1 => conditions.remove(0),
            _ => Expr::And(conditions),
        }
    }

    fn compile_or(value: &Bson) -> Self {
        let branches = match value {
            Bson::Array(items) => items
                .iter()
                .filter_map(Bson::as_document)
                .map(Self::compile)
                .collect(),
            Bson::Document(single) => vec![Self::compile(single)],
            _ => Vec::new(),
        };

        Expr::Or(branches)
    }

    fn compile_field(field: &str, value: &Bson) -> Vec<Self> {
        let operators = match value {
            Bson::Document(ops) if ops.keys().any(|key| key.starts_with('$')) => ops,
            _ => return vec![Expr::field(field, FieldOp::Eq, value.clone())],
        };

        operators
            .iter()
            .filter_map(|(key, operand)| {
                FieldOp::from_key(key).map(|op| Expr::field(field, op, operand.clone()))
            })
            .collect()
    }
}

/// Sort direction for find results.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// Sort specification for find results.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Non-predicate parts of a find request.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Filters {
    /// Maximum number of documents to return, capped by the configured maximum.
    pub limit: Option<usize>,
    /// Number of matching documents to skip.
    pub skip: Option<usize>,
    /// Ordering applied to the returned page.
    pub sort: Option<Sort>,
    /// Field allow-list.
    pub select: Option<Vec<String>>,
    /// A persisted view (`design/view`) to invoke instead of compiling the query.
    pub view: Option<String>,
}

impl Filters {
    /// Creates a new filters builder for fluent construction.
    pub fn builder() -> FiltersBuilder {
        FiltersBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FiltersBuilder {
    filters: Filters,
}

impl FiltersBuilder {
    /// Creates a new filters builder.
    pub fn new() -> Self {
        FiltersBuilder { filters: Filters::default() }
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.filters.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: usize) -> Self {
        self.filters.skip = Some(skip);
        self
    }

    /// Sets the sort specification.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.filters.sort = Some(Sort { field: field.into(), direction });
        self
    }

    /// Restricts results to the given fields.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Invokes a persisted view instead of compiling the query.
    pub fn view(mut self, name: impl Into<String>) -> Self {
        self.filters.view = Some(name.into());
        self
    }

    /// Builds and returns the final filters.
    pub fn build(self) -> Filters {
        self.filters
    }
}

/// Splits a raw query into its predicate part and its [`Filters`].
///
/// Recognised keys are `$limit`, `$skip`, `$sort` (`{ field: 1 | -1 }`), `$select` (array of
/// field names) and `q` (a persisted view name). Everything else is left in the returned
/// query.
pub fn parse_query(mut raw: Document) -> (Document, Filters) {
    let filters = Filters {
        limit: raw.remove("$limit").and_then(|value| as_count(&value)),
        skip: raw.remove("$skip").and_then(|value| as_count(&value)),
        sort: raw.remove("$sort").and_then(|value| parse_sort(&value)),
        select: raw.remove("$select").and_then(|value| parse_select(&value)),
        view: raw.remove("q").and_then(|value| match value {
            Bson::String(name) if !name.is_empty() => Some(name),
            _ => None,
        }),
    };

    (raw, filters)
}

fn as_count(value: &Bson) -> Option<usize> {
    match value {
        Bson::Int32(n) => usize::try_from(*n).ok(),
        Bson::Int64(n) => usize::try_from(*n).ok(),
        Bson::Double(n) if *n >= 0.0 && n.is_finite() => Some(*n as usize),
        Bson::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_sort(value: &Bson) -> Option<Sort> {
    let (field, direction) = value.as_document()?.iter().next()?;

    let descending = match direction {
        Bson::Int32(n) => *n < 0,
        Bson::Int64(n) => *n < 0,
        Bson::Double(n) => *n < 0.0,
        Bson::String(s) => s == "-1" || s.eq_ignore_ascii_case("desc"),
        _ => false,
    };

    Some(Sort {
        field: field.clone(),
        direction: if descending { SortDirection::Desc } else { SortDirection::Asc },
    })
}

fn parse_select(value: &Bson) -> Option<Vec<String>> {
    match value {
        Bson::Array(items) => Some(
            items
                .iter()
                .filter_map(Bson::as_str)
                .map(str::to_string)
                .collect(),
        ),
        Bson::String(field) => Some(vec![field.clone()]),
        _ => None,
    }
}

/// Walks an [`Expr`] tree, producing a backend-specific output.
pub trait QueryVisitor {
    type Output;
    type Error: Into<StoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}
