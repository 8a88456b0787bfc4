//! Result shapes emitted by views.

use bson::Document;
use serde::{Deserialize, Serialize};

use crate::document::{ID_FIELD, REV_FIELD};

/// The shape of each row a view emits.
///
/// Identifier and revision are always part of the shape, so the service can normalize them
/// afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// The whole document.
    #[default]
    All,
    /// Identifier, revision and the listed fields. Missing fields are left out.
    Fields(Vec<String>),
}

impl Projection {
    /// Builds a projection from an optional field allow-list.
    pub fn new(select: Option<&[String]>) -> Self {
        match select {
            Some(fields) => Projection::Fields(fields.to_vec()),
            None => Projection::All,
        }
    }

    /// Applies the projection to a stored document.
    pub fn apply(&self, document: &Document) -> Document {
        let fields = match self {
            Projection::All => return document.clone(),
            Projection::Fields(fields) => fields,
        };

        let mut projected = Document::new();

        for key in [ID_FIELD, REV_FIELD].into_iter().chain(fields.iter().map(String::as_str)) {
            if projected.contains_key(key) {
                continue;
            }
            if let Some(value) = document.get(key) {
                projected.insert(key, value.clone());
            }
        }

        projected
    }
}
