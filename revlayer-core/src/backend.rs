//! Storage backend abstraction for revisioned document stores.
//!
//! The [`StoreBackend`] trait is the minimum surface the service needs from a store: database
//! existence and creation, revisioned document reads and writes, and view evaluation.
//! Connection lifecycle and wire protocol belong to the implementation.
//!
//! # Revisions
//!
//! Every successful write produces a new revision token. Writes that name a revision
//! ([`StoreBackend::remove_document`], or [`StoreBackend::save_document`] with a `_rev` in
//! the body) must fail with [`StoreError::Conflict`](crate::error::StoreError::Conflict)
//! when the stored revision differs.
//!
//! # Views
//!
//! [`StoreBackend::evaluate_transient_view`] may fail with
//! [`StoreError::ViewUnsupported`](crate::error::StoreError::ViewUnsupported) on deployments
//! that only run persisted views. Callers then fall back to
//! [`StoreBackend::create_view`] and [`StoreBackend::invoke_view`].

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use bson::Document;

use crate::{
    document::DocumentMeta,
    error::StoreResult,
    view::{ViewDefinition, ViewName, ViewOptions, ViewResult},
};

/// Abstract interface for revisioned document stores.
///
/// All implementations must be thread-safe; a single backend is shared by every request
/// served through a [`Service`](crate::service::Service).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns whether the database exists.
    async fn database_exists(&self, database: &str) -> StoreResult<bool>;

    /// Creates a database.
    ///
    /// Fails with [`StoreError::DatabaseExists`](crate::error::StoreError::DatabaseExists) if
    /// it is already present.
    async fn create_database(&self, database: &str) -> StoreResult<()>;

    /// Fetches a document, including its `_id` and `_rev` fields.
    async fn get_document(&self, database: &str, id: &str) -> StoreResult<Document>;

    /// Saves a document under the given identifier, or under a store-assigned one.
    ///
    /// A `_rev` in the body makes the write conditional on that revision.
    async fn save_document(
        &self,
        database: &str,
        id: Option<&str>,
        body: Document,
    ) -> StoreResult<DocumentMeta>;

    /// Merges the given fields into the stored document.
    async fn merge_document(
        &self,
        database: &str,
        id: &str,
        partial: Document,
    ) -> StoreResult<DocumentMeta>;

    /// Deletes a document if its current revision is `rev`.
    async fn remove_document(&self, database: &str, id: &str, rev: &str) -> StoreResult<DocumentMeta>;

    /// Evaluates a view without persisting it.
    async fn evaluate_transient_view(
        &self,
        database: &str,
        definition: &ViewDefinition,
        options: ViewOptions,
    ) -> StoreResult<ViewResult>;

    /// Persists a view inside a new design document.
    async fn create_view(
        &self,
        database: &str,
        name: &ViewName,
        definition: &ViewDefinition,
    ) -> StoreResult<DocumentMeta>;

    /// Invokes a persisted view by name.
    async fn invoke_view(
        &self,
        database: &str,
        name: &ViewName,
        options: ViewOptions,
    ) -> StoreResult<ViewResult>;
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend + ?Sized,
{
    async fn database_exists(&self, database: &str) -> StoreResult<bool> {
        (**self).database_exists(database).await
    }

    async fn create_database(&self, database: &str) -> StoreResult<()> {
        (**self).create_database(database).await
    }

    async fn get_document(&self, database: &str, id: &str) -> StoreResult<Document> {
        (**self).get_document(database, id).await
    }

    async fn save_document(
        &self,
        database: &str,
        id: Option<&str>,
        body: Document,
    ) -> StoreResult<DocumentMeta> {
        (**self).save_document(database, id, body).await
    }

    async fn merge_document(
        &self,
        database: &str,
        id: &str,
        partial: Document,
    ) -> StoreResult<DocumentMeta> {
        (**self).merge_document(database, id, partial).await
    }

    async fn remove_document(&self, database: &str, id: &str, rev: &str) -> StoreResult<DocumentMeta> {
        (**self).remove_document(database, id, rev).await
    }

    async fn evaluate_transient_view(
        &self,
        database: &str,
        definition: &ViewDefinition,
        options: ViewOptions,
    ) -> StoreResult<ViewResult> {
        (**self)
            .evaluate_transient_view(database, definition, options)
            .await
    }

    async fn create_view(
        &self,
        database: &str,
        name: &ViewName,
        definition: &ViewDefinition,
    ) -> StoreResult<DocumentMeta> {
        (**self).create_view(database, name, definition).await
    }

    async fn invoke_view(
        &self,
        database: &str,
        name: &ViewName,
        options: ViewOptions,
    ) -> StoreResult<ViewResult> {
        (**self).invoke_view(database, name, options).await
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn database_exists(&self, database: &str) -> StoreResult<bool> {
        (**self).database_exists(database).await
    }

    async fn create_database(&self, database: &str) -> StoreResult<()> {
        (**self).create_database(database).await
    }

    async fn get_document(&self, database: &str, id: &str) -> StoreResult<Document> {
        (**self).get_document(database, id).await
    }

    async fn save_document(
        &self,
        database: &str,
        id: Option<&str>,
        body: Document,
    ) -> StoreResult<DocumentMeta> {
        (**self).save_document(database, id, body).await
    }

    async fn merge_document(
        &self,
        database: &str,
        id: &str,
        partial: Document,
    ) -> StoreResult<DocumentMeta> {
        (**self).merge_document(database, id, partial).await
    }

    async fn remove_document(&self, database: &str, id: &str, rev: &str) -> StoreResult<DocumentMeta> {
        (**self).remove_document(database, id, rev).await
    }

    async fn evaluate_transient_view(
        &self,
        database: &str,
        definition: &ViewDefinition,
        options: ViewOptions,
    ) -> StoreResult<ViewResult> {
        (**self)
            .evaluate_transient_view(database, definition, options)
            .await
    }

    async fn create_view(
        &self,
        database: &str,
        name: &ViewName,
        definition: &ViewDefinition,
    ) -> StoreResult<DocumentMeta> {
        (**self).create_view(database, name, definition).await
    }

    async fn invoke_view(
        &self,
        database: &str,
        name: &ViewName,
        options: ViewOptions,
    ) -> StoreResult<ViewResult> {
        (**self).invoke_view(database, name, options).await
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> StoreResult<Self::Backend>;
}
