//! Document representation and identifier normalization.
//!
//! Documents are schemaless BSON documents. Once persisted they carry the store's identifier
//! under [`ID_FIELD`] and a revision token under [`REV_FIELD`]. Those internal names never
//! leave the service: public results expose the identifier as [`PUBLIC_ID_FIELD`] and drop
//! the revision.

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_value, to_value};

use crate::error::{StoreError, StoreResult};

/// Internal identifier field.
pub const ID_FIELD: &str = "_id";
/// Internal revision field.
pub const REV_FIELD: &str = "_rev";
/// Identifier field exposed to callers.
pub const PUBLIC_ID_FIELD: &str = "id";
/// Namespace reserved for design documents.
pub const DESIGN_PREFIX: &str = "_design/";

/// Identifier and revision of a document after a successful write.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    pub id: String,
    pub rev: String,
}

impl DocumentMeta {
    pub fn new(id: impl Into<String>, rev: impl Into<String>) -> Self {
        Self { id: id.into(), rev: rev.into() }
    }
}

/// Returns `true` if the identifier lives in the design-document namespace.
pub fn is_design_id(id: &str) -> bool {
    id.starts_with(DESIGN_PREFIX)
}

/// Reads the internal identifier of a stored document.
pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Bson::as_str)
}

/// Reads the internal revision of a stored document.
pub fn document_rev(doc: &Document) -> Option<&str> {
    doc.get(REV_FIELD).and_then(Bson::as_str)
}

/// Removes every caller-supplied identifier field and returns the identifier, preferring
/// the internal name over the public one.
pub fn take_identifier(doc: &mut Document) -> Option<String> {
    let internal = doc.remove(ID_FIELD);
    let public = doc.remove(PUBLIC_ID_FIELD);

    internal
        .into_iter()
        .chain(public)
        .find_map(|value| match value {
            Bson::String(id) if !id.is_empty() => Some(id),
            Bson::Null | Bson::String(_) => None,
            other => Some(other.to_string()),
        })
}

/// Converts a stored document into its public shape: `id` first, no `_id`, no `_rev`.
pub fn to_public(mut doc: Document) -> Document {
    let id = doc.remove(ID_FIELD);
    doc.remove(REV_FIELD);

    match id {
        Some(id) => {
            let mut public = Document::new();
            public.insert(PUBLIC_ID_FIELD, id);
            for (key, value) in doc {
                public.insert(key, value);
            }
            public
        }
        None => doc,
    }
}

/// Converts a document to a JSON value for a hosting layer.
pub fn to_json(doc: &Document) -> StoreResult<Value> {
    Ok(to_value(doc)?)
}

/// Creates a document from a JSON object.
///
/// # Errors
///
/// Returns [`StoreError::InvalidDocument`] if the value is not a JSON object.
pub fn from_json(value: Value) -> StoreResult<Document> {
    if !value.is_object() {
        return Err(StoreError::InvalidDocument("Expected a JSON object".into()));
    }

    Ok(from_value(value)?)
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use serde_json::json;

    use super::*;

    #[test]
    fn public_shape_renames_id_and_drops_revision() {
        let doc = doc! { "_id": "abc", "_rev": "1-x", "message": "hi" };

        assert_eq!(to_public(doc), doc! { "id": "abc", "message": "hi" });
    }

    #[test]
    fn take_identifier_strips_both_names() {
        let mut doc = doc! { "id": "public", "_id": "internal", "message": "hi" };

        assert_eq!(take_identifier(&mut doc), Some("internal".to_string()));
        assert_eq!(doc, doc! { "message": "hi" });

        let mut doc = doc! { "id": "x" };
        assert_eq!(take_identifier(&mut doc), Some("x".to_string()));

        let mut doc = doc! { "message": "hi" };
        assert_eq!(take_identifier(&mut doc), None);
    }

    #[test]
    fn json_objects_convert_to_documents() {
        let doc = from_json(json!({ "message": "test", "count": 2 })).unwrap();
        assert_eq!(doc.get("message").and_then(Bson::as_str), Some("test"));
        assert_eq!(to_json(&doc).unwrap(), json!({ "message": "test", "count": 2 }));

        assert!(matches!(from_json(json!([1, 2])), Err(StoreError::InvalidDocument(_))));
    }
}
