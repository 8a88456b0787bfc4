//! CRUD and query service over one database of a revisioned document store.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use revlayer::{prelude::*, memory::InMemoryStore};
//!
//! let service = Service::builder()
//!     .connection(InMemoryStore::new())
//!     .model("messages")
//!     .paginate(Paginate::new(Some(5), Some(15)))
//!     .build()?;
//!
//! service.create(doc! { "message": "test" }).await?;
//!
//! let page = service.find(doc! { "message": "test" }, Filters::default()).await?;
//! assert_eq!(page.data[0].get_str("message")?, "test");
//! ```

use bson::{Bson, Document};
use futures::future::try_join_all;
use tracing::debug;

use crate::{
    backend::StoreBackend,
    database::Database,
    document::{
        DocumentMeta, ID_FIELD, PUBLIC_ID_FIELD, REV_FIELD, document_rev, is_design_id,
        take_identifier, to_public,
    },
    error::{ServiceError, ServiceResult, StoreError, StoreResult},
    evaluator::{compare_values, lookup},
    executor::{ViewExecutor, ViewPlan},
    page::{Paginate, Paginated},
    query::{Filters, SortDirection, parse_query},
    view::{ViewDefinition, ViewName, ViewOptions, ViewRow},
};

pub const MISSING_OPTIONS: &str = "Store options have to be provided";
pub const MISSING_CONNECTION: &str = "You must provide a store connection";
pub const MISSING_MODEL: &str = "You must provide a model name";
pub const UPDATE_REQUIRES_MULTI: &str = "Not replacing multiple records. Did you mean `patch`?";

/// One document or a batch of documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<T> {
    Single(T),
    Multi(Vec<T>),
}

impl<T> Payload<T> {
    /// Returns the single item, if this is not a batch.
    pub fn into_single(self) -> Option<T> {
        match self {
            Payload::Single(item) => Some(item),
            Payload::Multi(_) => None,
        }
    }

    /// Returns the batch, if this is one.
    pub fn into_multi(self) -> Option<Vec<T>> {
        match self {
            Payload::Single(_) => None,
            Payload::Multi(items) => Some(items),
        }
    }
}

impl From<Document> for Payload<Document> {
    fn from(document: Document) -> Self {
        Payload::Single(document)
    }
}

impl From<Vec<Document>> for Payload<Document> {
    fn from(documents: Vec<Document>) -> Self {
        Payload::Multi(documents)
    }
}

/// Parameters of [`Service::remove`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveParams {
    /// Revision the deletion is conditioned on. Fetched from the store when absent.
    pub rev: Option<String>,
}

impl RemoveParams {
    pub fn with_rev(rev: impl Into<String>) -> Self {
        Self { rev: Some(rev.into()) }
    }
}

/// Exposes create/read/update/delete/patch/find over one database.
///
/// Returned documents carry their identifier as `id`; `_id` and `_rev` never appear.
#[derive(Debug)]
pub struct Service<B: StoreBackend> {
    database: Database<B>,
    model: String,
    paginate: Paginate,
}

impl<B: StoreBackend> Service<B> {
    /// Creates a builder for the service.
    pub fn builder() -> ServiceBuilder<B> {
        ServiceBuilder::default()
    }

    /// Name of the model, which is also the database name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Pagination settings.
    pub fn paginate(&self) -> &Paginate {
        &self.paginate
    }

    /// The injected store connection.
    pub fn connection(&self) -> &B {
        self.database.backend()
    }

    /// Makes sure the database exists, creating it if needed.
    ///
    /// Operations do this on first use; calling it up front surfaces initialization failures
    /// early.
    pub async fn connect(&self) -> ServiceResult<()> {
        self.database.open().await?;

        Ok(())
    }

    /// Finds documents matching a query.
    ///
    /// With `filters.view` set the named persisted view is invoked instead of compiling the
    /// query. `total` in the returned envelope counts matches before `skip` and `limit`.
    ///
    /// `filters.sort` only orders the returned page. The view picks the page by `skip` and
    /// `limit` in document-id order, so sorting does not choose which documents fall inside it.
    pub async fn find(&self, query: Document, filters: Filters) -> ServiceResult<Paginated<Document>> {
        let plan = match &filters.view {
            Some(name) => ViewPlan::Direct(ViewName::parse(name).ok_or_else(|| {
                ServiceError::InvalidInput(format!("View `{name}` must be named `design/view`"))
            })?),
            None => ViewPlan::Compiled(ViewDefinition::compile(&query, filters.select.as_deref())),
        };

        let limit = self.paginate.limit(filters.limit);
        let skip = filters.skip.unwrap_or(0);

        debug!(model = %self.model, limit, skip, "find");

        let backend = self.database.open().await?;
        let result = ViewExecutor::new(backend, self.database.name())
            .execute(&plan, ViewOptions::new(limit, skip))
            .await?;

        let mut data = result
            .rows
            .into_iter()
            .map(|row| shape_row(row, filters.select.as_deref()))
            .collect::<Vec<_>>();

        if let Some(sort) = &filters.sort {
            data.sort_by(|a, b| {
                let ordering = compare_values(lookup(a, &sort.field), lookup(b, &sort.field));
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        Ok(Paginated::builder(data)
            .with_total(result.total_rows)
            .with_limit(limit)
            .with_skip(skip)
            .build())
    }

    /// Finds documents with a raw query carrying `$limit`, `$skip`, `$sort`, `$select` or `q`.
    pub async fn find_raw(&self, raw: Document) -> ServiceResult<Paginated<Document>> {
        let (query, filters) = parse_query(raw);

        self.find(query, filters).await
    }

    /// Fetches a document by identifier.
    pub async fn get(&self, id: &str) -> ServiceResult<Document> {
        Ok(to_public(self.fetch(id).await?))
    }

    /// Fetches a document with its internal `_id` and `_rev` fields.
    pub(crate) async fn fetch(&self, id: &str) -> StoreResult<Document> {
        self.database
            .open()
            .await?
            .get_document(self.database.name(), id)
            .await
    }

    /// Creates one document or a batch.
    ///
    /// A caller-supplied `_id`/`id` becomes the document identifier (lower-cased inside the
    /// design-document namespace) and is removed from the stored body. Batches are returned
    /// in input order.
    pub async fn create(&self, data: impl Into<Payload<Document>>) -> ServiceResult<Payload<Document>> {
        let backend = self.database.open().await?;

        Ok(match data.into() {
            Payload::Single(document) => Payload::Single(self.create_one(backend, document).await?),
            Payload::Multi(documents) => Payload::Multi(
                try_join_all(
                    documents
                        .into_iter()
                        .map(|document| self.create_one(backend, document)),
                )
                .await?,
            ),
        })
    }

    async fn create_one(&self, backend: &B, mut document: Document) -> StoreResult<Document> {
        let id = take_identifier(&mut document).map(|id| {
            if is_design_id(&id.to_lowercase()) {
                id.to_lowercase()
            } else {
                id
            }
        });
        document.remove(REV_FIELD);

        let meta = backend
            .save_document(self.database.name(), id.as_deref(), document.clone())
            .await?;

        document.insert(ID_FIELD, meta.id);

        Ok(to_public(document))
    }

    /// Merges fields into a stored document and returns the refreshed document.
    ///
    /// Identifier fields in `data` are ignored.
    pub async fn patch(&self, id: &str, data: Document) -> ServiceResult<Document> {
        let mut partial = data;
        take_identifier(&mut partial);
        partial.remove(REV_FIELD);

        self.database
            .open()
            .await?
            .merge_document(self.database.name(), id, partial)
            .await?;

        self.get(id).await
    }

    /// Replaces a batch of documents, each identified by its own `_id`/`id`.
    ///
    /// `update` is a bulk operation: a single document is rejected with
    /// [`ServiceError::InvalidInput`] before any I/O, pointing the caller at
    /// [`Service::patch`]. The `id` argument is not used for batches.
    ///
    /// A document carrying `_rev` replaces the stored one only if that revision is still
    /// current, and fails with [`ServiceError::Conflict`] otherwise. Documents without `_rev`
    /// are merged like [`Service::patch`].
    pub async fn update(&self, _id: &str, data: impl Into<Payload<Document>>) -> ServiceResult<Vec<Document>> {
        let documents = data
            .into()
            .into_multi()
            .ok_or_else(|| ServiceError::InvalidInput(UPDATE_REQUIRES_MULTI.to_string()))?;

        let targets = documents
            .into_iter()
            .map(|document| {
                identifier_of(&document)
                    .map(|id| (id, document))
                    .ok_or_else(|| ServiceError::InvalidInput("Every updated document needs an id".to_string()))
            })
            .collect::<ServiceResult<Vec<_>>>()?;

        try_join_all(
            targets
                .into_iter()
                .map(|(id, document)| async move { self.update_one(&id, document).await }),
        )
        .await
    }

    async fn update_one(&self, id: &str, mut document: Document) -> ServiceResult<Document> {
        if document_rev(&document).is_none() {
            return self.patch(id, document).await;
        }

        take_identifier(&mut document);

        self.database
            .open()
            .await?
            .save_document(self.database.name(), Some(id), document)
            .await?;

        self.get(id).await
    }

    /// Deletes a document.
    ///
    /// Without an explicit revision the current one is read first and the deletion is
    /// conditioned on it. A concurrent write between the read and the delete makes the delete
    /// fail with [`ServiceError::Conflict`]; it is not retried.
    pub async fn remove(&self, id: &str, params: RemoveParams) -> ServiceResult<DocumentMeta> {
        let backend = self.database.open().await?;

        let rev = match params.rev {
            Some(rev) => rev,
            None => {
                let current = self.fetch(id).await?;
                document_rev(&current)
                    .map(str::to_string)
                    .ok_or_else(|| StoreError::InvalidDocument(format!("Document {id} has no revision")))?
            }
        };

        Ok(backend
            .remove_document(self.database.name(), id, &rev)
            .await?)
    }
}

fn identifier_of(document: &Document) -> Option<String> {
    [ID_FIELD, PUBLIC_ID_FIELD]
        .into_iter()
        .find_map(|field| match document.get(field) {
            Some(Bson::String(id)) if !id.is_empty() => Some(id.clone()),
            _ => None,
        })
}

fn shape_row(row: ViewRow, select: Option<&[String]>) -> Document {
    let mut value = row.value;
    if !value.contains_key(ID_FIELD) {
        value.insert(ID_FIELD, row.id);
    }

    let public = to_public(value);

    match select {
        Some(fields) => public
            .into_iter()
            .filter(|(key, _)| key == PUBLIC_ID_FIELD || fields.iter().any(|field| field == key))
            .collect(),
        None => public,
    }
}

/// Builder for [`Service`].
#[derive(Debug)]
pub struct ServiceBuilder<B> {
    connection: Option<B>,
    model: Option<String>,
    paginate: Option<Paginate>,
}

impl<B> Default for ServiceBuilder<B> {
    fn default() -> Self {
        Self {
            connection: None,
            model: None,
            paginate: None,
        }
    }
}

impl<B: StoreBackend> ServiceBuilder<B> {
    /// Sets the store connection the service owns.
    pub fn connection(mut self, connection: B) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Sets the model name. It is lower-cased and used as the database name.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the pagination settings. Defaults to none configured.
    pub fn paginate(mut self, paginate: Paginate) -> Self {
        self.paginate = Some(paginate);
        self
    }

    /// Builds the service without performing I/O.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidInput`] when nothing was configured, when the
    /// connection is missing, or when the model name is missing or empty.
    pub fn build(self) -> ServiceResult<Service<B>> {
        let ServiceBuilder { connection, model, paginate } = self;

        if connection.is_none() && model.is_none() && paginate.is_none() {
            return Err(ServiceError::InvalidInput(MISSING_OPTIONS.to_string()));
        }

        let connection = connection.ok_or_else(|| ServiceError::InvalidInput(MISSING_CONNECTION.to_string()))?;
        let model = model
            .filter(|model| !model.is_empty())
            .ok_or_else(|| ServiceError::InvalidInput(MISSING_MODEL.to_string()))?
            .to_lowercase();

        Ok(Service {
            database: Database::new(connection, model.clone()),
            model,
            paginate: paginate.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn shaped_rows_expose_id_and_selected_fields_only() {
        let row = ViewRow {
            id: "a".into(),
            key: Bson::Null,
            value: doc! { "_id": "a", "_rev": "1-x", "message": "hi", "count": 2 },
        };
        let select = vec!["count".to_string()];

        assert_eq!(shape_row(row.clone(), None), doc! { "id": "a", "message": "hi", "count": 2 });
        assert_eq!(shape_row(row, Some(select.as_slice())), doc! { "id": "a", "count": 2 });
    }

    #[test]
    fn shaped_rows_take_id_from_the_row() {
        let row = ViewRow {
            id: "a".into(),
            key: Bson::Null,
            value: doc! { "message": "hi" },
        };

        assert_eq!(shape_row(row, None), doc! { "id": "a", "message": "hi" });
    }

    #[test]
    fn identifier_prefers_internal_name() {
        assert_eq!(identifier_of(&doc! { "id": "b", "_id": "a" }), Some("a".to_string()));
        assert_eq!(identifier_of(&doc! { "id": "b" }), Some("b".to_string()));
        assert_eq!(identifier_of(&doc! { "id": "" }), None);
    }
}
