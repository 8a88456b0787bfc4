//! View definitions: a compiled predicate plus a projection.
//!
//! A [`ViewDefinition`] is plain data. Stores evaluate it transiently, or persist it inside a
//! design document as
//!
//! ```text
//! { "_id": "_design/<design>", "views": { "<view>": { "map": <definition> } } }
//! ```
//!
//! and evaluate it again when the view is invoked by name.

use bson::{Bson, Document, de::deserialize_from_bson, doc, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};

use crate::{
    document::{DESIGN_PREFIX, document_id, is_design_id},
    error::{StoreError, StoreResult},
    evaluator::DocumentEvaluator,
    projection::Projection,
    query::Expr,
};

/// Key under which design documents keep their views.
pub const VIEWS_FIELD: &str = "views";
/// Key under which a view keeps its definition.
pub const MAP_FIELD: &str = "map";

/// A predicate and the shape of the rows it emits.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ViewDefinition {
    pub predicate: Expr,
    pub projection: Projection,
}

impl ViewDefinition {
    pub fn new(predicate: Expr, projection: Projection) -> Self {
        Self { predicate, projection }
    }

    /// Compiles a query mapping and an optional field allow-list into a view.
    pub fn compile(query: &Document, select: Option<&[String]>) -> Self {
        Self::new(Expr::compile(query), Projection::new(select))
    }

    /// Emits the projected document if it satisfies the predicate.
    pub fn map(&self, document: &Document) -> Option<Document> {
        DocumentEvaluator::matches(document, &self.predicate)
            .then(|| self.projection.apply(document))
    }

    /// Runs the view over a set of stored documents.
    ///
    /// Design documents are never emitted. `total_rows` counts every emitted row before
    /// `skip` and `limit` are applied.
    pub fn evaluate<'a, I>(&self, documents: I, options: &ViewOptions) -> ViewResult
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let emitted = documents
            .into_iter()
            .filter_map(|document| {
                let id = document_id(document)?;
                if is_design_id(id) {
                    return None;
                }

                self.map(document).map(|value| ViewRow {
                    id: id.to_string(),
                    key: Bson::Null,
                    value,
                })
            })
            .collect::<Vec<_>>();

        let total_rows = emitted.len();

        ViewResult {
            total_rows,
            offset: options.skip,
            rows: emitted
                .into_iter()
                .skip(options.skip)
                .take(options.limit.unwrap_or(usize::MAX))
                .collect(),
        }
    }

    /// Encodes the view as the body of a design document.
    pub fn to_design_document(&self, view: &str) -> StoreResult<Document> {
        Ok(doc! {
            VIEWS_FIELD: {
                view: { MAP_FIELD: serialize_to_bson(self)? },
            },
        })
    }

    /// Decodes a named view from a design document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the design document has no such view, and
    /// [`StoreError::Serialization`] if the stored definition is malformed.
    pub fn from_design_document(design: &Document, view: &str) -> StoreResult<Self> {
        let definition = design
            .get(VIEWS_FIELD)
            .and_then(Bson::as_document)
            .and_then(|views| views.get(view))
            .and_then(Bson::as_document)
            .and_then(|view| view.get(MAP_FIELD))
            .ok_or_else(|| {
                StoreError::NotFound(
                    format!("{}/_view/{}", document_id(design).unwrap_or_default(), view),
                    String::new(),
                )
            })?;

        Ok(deserialize_from_bson(definition.clone())?)
    }
}

/// Pagination options passed to a view.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewOptions {
    pub limit: Option<usize>,
    pub skip: usize,
}

impl ViewOptions {
    pub fn new(limit: usize, skip: usize) -> Self {
        Self { limit: Some(limit), skip }
    }
}

/// One emitted row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ViewRow {
    /// Identifier of the source document.
    pub id: String,
    pub key: Bson,
    pub value: Document,
}

/// Rows returned by a view invocation.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ViewResult {
    /// Number of rows the view emits before `skip`/`limit`.
    pub total_rows: usize,
    pub offset: usize,
    pub rows: Vec<ViewRow>,
}

/// A `design/view` reference to a persisted view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewName {
    pub design: String,
    pub view: String,
}

impl ViewName {
    pub fn new(design: impl Into<String>, view: impl Into<String>) -> Self {
        Self { design: design.into(), view: view.into() }
    }

    /// Parses `design/view`, also accepting a leading `_design/`.
    ///
    /// The design part is lower-cased, matching how design documents are named on create.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.strip_prefix(DESIGN_PREFIX).unwrap_or(name);
        let (design, view) = name.split_once('/')?;

        if design.is_empty() || view.is_empty() || view.contains('/') {
            return None;
        }

        Some(Self::new(design.to_lowercase(), view))
    }

    /// Identifier of the design document holding the view.
    pub fn design_id(&self) -> String {
        format!("{DESIGN_PREFIX}{}", self.design)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn documents() -> Vec<Document> {
        vec![
            doc! { "_id": "a", "_rev": "1-a", "message": "test", "n": 1 },
            doc! { "_id": "b", "_rev": "1-b", "message": "other", "n": 2 },
            doc! { "_id": "c", "_rev": "1-c", "message": "test", "n": 3 },
            doc! { "_id": "_design/x", "_rev": "1-d", "message": "test" },
        ]
    }

    #[test]
    fn evaluate_skips_design_documents_and_counts_before_limit() {
        let view = ViewDefinition::compile(&doc! { "message": "test" }, None);
        let docs = documents();

        let result = view.evaluate(&docs, &ViewOptions::new(1, 0));

        assert_eq!(result.total_rows, 2);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].id, "a");
        assert_eq!(result.rows[0].value, docs[0]);

        let result = view.evaluate(&docs, &ViewOptions::new(5, 1));
        assert_eq!(result.offset, 1);
        assert_eq!(result.rows.iter().map(|row| row.id.as_str()).collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn design_document_round_trip() {
        let select = vec!["n".to_string()];
        let view = ViewDefinition::compile(&doc! { "n": { "$gte": 2 } }, Some(select.as_slice()));

        let mut design = view.to_design_document("temp").unwrap();
        design.insert("_id", "_design/reports");

        assert_eq!(ViewDefinition::from_design_document(&design, "temp").unwrap(), view);
        assert!(matches!(
            ViewDefinition::from_design_document(&design, "other"),
            Err(StoreError::NotFound(..))
        ));
    }

    #[test]
    fn view_names_need_design_and_view() {
        assert_eq!(ViewName::parse("reports/by_day"), Some(ViewName::new("reports", "by_day")));
        assert_eq!(ViewName::parse("_design/reports/by_day").unwrap().design_id(), "_design/reports");
        assert_eq!(ViewName::parse("reports"), None);
        assert_eq!(ViewName::parse("/by_day"), None);
        assert_eq!(ViewName::parse("a/b/c"), None);
    }

    #[test]
    fn view_names_lowercase_the_design() {
        assert_eq!(ViewName::parse("Reports/byDay"), Some(ViewName::new("reports", "byDay")));
        assert_eq!(ViewName::parse("_design/Reports/byDay").unwrap().design_id(), "_design/reports");
    }
}
