//! In-memory storage implementation for revisioned document stores.
//!
//! Documents are kept per database in ordered maps behind an async-aware read-write lock.
//! Every write bumps the document's revision, and writes naming a stale revision fail the
//! way a real revisioned store would.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use bson::{Bson, Document};
use mea::rwlock::RwLock;
use tracing::debug;
use uuid::Uuid;

use revlayer_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::{DocumentMeta, ID_FIELD, REV_FIELD},
    error::{StoreError, StoreResult},
    view::{ViewDefinition, ViewName, ViewOptions, ViewResult},
};

#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    rev: String,
    body: Document,
}

impl StoredDocument {
    fn new(seq: u64, body: Document) -> Self {
        Self {
            seq,
            rev: format!("{seq}-{}", Uuid::new_v4().simple()),
            body,
        }
    }

    fn meta(&self, id: &str) -> DocumentMeta {
        DocumentMeta::new(id, self.rev.clone())
    }

    /// The document as the store returns it, with `_id` and `_rev` first.
    fn materialize(&self, id: &str) -> Document {
        let mut document = Document::new();
        document.insert(ID_FIELD, id);
        document.insert(REV_FIELD, self.rev.clone());

        for (key, value) in &self.body {
            document.insert(key.clone(), value.clone());
        }

        document
    }
}

type DatabaseMap = BTreeMap<String, StoredDocument>;
type StoreMap = HashMap<String, DatabaseMap>;

/// Thread-safe in-memory revisioned document store.
///
/// `InMemoryStore` is cloneable and keeps its state behind an `Arc`, so clones share the same
/// databases. Views scan every document in the database.
///
/// Transient view evaluation can be switched off with
/// [`InMemoryStoreBuilder::transient_views`] to mimic deployments that only run persisted
/// views.
///
/// # Example
///
/// ```ignore
/// use revlayer_memory::InMemoryStore;
/// use revlayer::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.create_database("messages").await?;
///
/// let meta = store.save_document("messages", Some("a"), doc! { "text": "hi" }).await?;
/// let stored = store.get_document("messages", &meta.id).await?;
/// assert_eq!(stored.get_str("_rev")?, meta.rev);
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
    transient_views: bool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store that evaluates transient views.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
            transient_views: true,
        }
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    ///
    /// ```ignore
    /// use revlayer_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().transient_views(false).build().await?;
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Whether transient views are evaluated.
    pub fn transient_views(&self) -> bool {
        self.transient_views
    }

    /// Identifiers of every document in a database, design documents included.
    pub async fn document_ids(&self, database: &str) -> StoreResult<Vec<String>> {
        let store = self.store.read().await;
        let documents = store
            .get(database)
            .ok_or_else(|| StoreError::DatabaseNotFound(database.to_string()))?;

        Ok(documents.keys().cloned().collect())
    }

    async fn run_view(
        &self,
        database: &str,
        definition: &ViewDefinition,
        options: ViewOptions,
    ) -> StoreResult<ViewResult> {
        let store = self.store.read().await;
        let documents = store
            .get(database)
            .ok_or_else(|| StoreError::DatabaseNotFound(database.to_string()))?
            .iter()
            .map(|(id, stored)| stored.materialize(id))
            .collect::<Vec<_>>();

        Ok(definition.evaluate(&documents, &options))
    }
}

fn revision_of(body: &mut Document) -> StoreResult<Option<String>> {
    match body.remove(REV_FIELD) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::String(rev)) => Ok(Some(rev)),
        Some(other) => Err(StoreError::InvalidDocument(format!("{REV_FIELD} must be a string, got {other}"))),
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn database_exists(&self, database: &str) -> StoreResult<bool> {
        Ok(self.store.read().await.contains_key(database))
    }

    async fn create_database(&self, database: &str) -> StoreResult<()> {
        let mut store = self.store.write().await;

        if store.contains_key(database) {
            return Err(StoreError::DatabaseExists(database.to_string()));
        }

        store.insert(database.to_string(), DatabaseMap::new());
        debug!(database, "created in-memory database");

        Ok(())
    }

    async fn get_document(&self, database: &str, id: &str) -> StoreResult<Document> {
        let store = self.store.read().await;
        let documents = store
            .get(database)
            .ok_or_else(|| StoreError::DatabaseNotFound(database.to_string()))?;

        documents
            .get(id)
            .map(|stored| stored.materialize(id))
            .ok_or_else(|| StoreError::NotFound(id.to_string(), database.to_string()))
    }

    async fn save_document(
        &self,
        database: &str,
        id: Option<&str>,
        mut body: Document,
    ) -> StoreResult<DocumentMeta> {
        let expected = revision_of(&mut body)?;
        body.remove(ID_FIELD);

        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        let mut store = self.store.write().await;
        let documents = store
            .get_mut(database)
            .ok_or_else(|| StoreError::DatabaseNotFound(database.to_string()))?;

        let seq = match documents.get(&id) {
            Some(current) if expected.as_deref() == Some(current.rev.as_str()) => current.seq + 1,
            None if expected.is_none() => 1,
            _ => return Err(StoreError::Conflict(id, database.to_string())),
        };

        let stored = StoredDocument::new(seq, body);
        let meta = stored.meta(&id);
        documents.insert(id, stored);

        Ok(meta)
    }

    async fn merge_document(
        &self,
        database: &str,
        id: &str,
        partial: Document,
    ) -> StoreResult<DocumentMeta> {
        let mut store = self.store.write().await;
        let documents = store
            .get_mut(database)
            .ok_or_else(|| StoreError::DatabaseNotFound(database.to_string()))?;

        let current = documents
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string(), database.to_string()))?;

        let mut body = current.body.clone();
        for (key, value) in partial {
            if key != ID_FIELD && key != REV_FIELD {
                body.insert(key, value);
            }
        }

        let stored = StoredDocument::new(current.seq + 1, body);
        let meta = stored.meta(id);
        documents.insert(id.to_string(), stored);

        Ok(meta)
    }

    async fn remove_document(&self, database: &str, id: &str, rev: &str) -> StoreResult<DocumentMeta> {
        let mut store = self.store.write().await;
        let documents = store
            .get_mut(database)
            .ok_or_else(|| StoreError::DatabaseNotFound(database.to_string()))?;

        let current = documents
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string(), database.to_string()))?;

        if current.rev != rev {
            return Err(StoreError::Conflict(id.to_string(), database.to_string()));
        }

        let tombstone = StoredDocument::new(current.seq + 1, Document::new());
        documents.remove(id);

        Ok(tombstone.meta(id))
    }

    async fn evaluate_transient_view(
        &self,
        database: &str,
        definition: &ViewDefinition,
        options: ViewOptions,
    ) -> StoreResult<ViewResult> {
        if !self.transient_views {
            return Err(StoreError::ViewUnsupported);
        }

        self.run_view(database, definition, options).await
    }

    async fn create_view(
        &self,
        database: &str,
        name: &ViewName,
        definition: &ViewDefinition,
    ) -> StoreResult<DocumentMeta> {
        let design = definition.to_design_document(&name.view)?;

        self.save_document(database, Some(&name.design_id()), design)
            .await
    }

    async fn invoke_view(
        &self,
        database: &str,
        name: &ViewName,
        options: ViewOptions,
    ) -> StoreResult<ViewResult> {
        let design = self
            .get_document(database, &name.design_id())
            .await?;
        let definition = ViewDefinition::from_design_document(&design, &name.view)?;

        self.run_view(database, &definition, options).await
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Debug, Clone)]
pub struct InMemoryStoreBuilder {
    transient_views: bool,
}

impl Default for InMemoryStoreBuilder {
    fn default() -> Self {
        Self { transient_views: true }
    }
}

impl InMemoryStoreBuilder {
    /// Whether the store evaluates transient views. Defaults to `true`.
    pub fn transient_views(mut self, enabled: bool) -> Self {
        self.transient_views = enabled;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        Ok(InMemoryStore {
            store: Arc::new(RwLock::new(StoreMap::new())),
            transient_views: self.transient_views,
        })
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use revlayer_core::query::{Expr, FieldOp};
    use revlayer_core::projection::Projection;

    use super::*;

    async fn store_with(database: &str) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.create_database(database).await.unwrap();
        store
    }

    #[tokio::test]
    async fn creating_a_database_twice_is_reported() {
        let store = store_with("db").await;

        assert!(store.database_exists("db").await.unwrap());
        assert_eq!(
            store.create_database("db").await,
            Err(StoreError::DatabaseExists("db".into()))
        );
    }

    #[tokio::test]
    async fn missing_database_is_reported() {
        let store = InMemoryStore::new();

        assert_eq!(
            store.get_document("nope", "a").await,
            Err(StoreError::DatabaseNotFound("nope".into()))
        );
    }

    #[tokio::test]
    async fn writes_bump_revisions() {
        let store = store_with("db").await;

        let first = store.save_document("db", Some("a"), doc! { "n": 1 }).await.unwrap();
        assert!(first.rev.starts_with("1-"));

        let second = store.merge_document("db", "a", doc! { "m": 2 }).await.unwrap();
        assert!(second.rev.starts_with("2-"));

        let stored = store.get_document("db", "a").await.unwrap();
        assert_eq!(stored, doc! { "_id": "a", "_rev": second.rev.clone(), "n": 1, "m": 2 });
    }

    #[tokio::test]
    async fn assigned_identifiers_are_unique() {
        let store = store_with("db").await;

        let a = store.save_document("db", None, doc! {}).await.unwrap();
        let b = store.save_document("db", None, doc! {}).await.unwrap();

        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn stale_revisions_conflict() {
        let store = store_with("db").await;
        let first = store.save_document("db", Some("a"), doc! { "n": 1 }).await.unwrap();
        store.merge_document("db", "a", doc! { "n": 2 }).await.unwrap();

        let conflict = Err(StoreError::Conflict("a".into(), "db".into()));

        assert_eq!(store.save_document("db", Some("a"), doc! { "n": 3 }).await, conflict);
        assert_eq!(
            store.save_document("db", Some("a"), doc! { "_rev": first.rev.clone(), "n": 3 }).await,
            conflict
        );
        assert_eq!(store.remove_document("db", "a", &first.rev).await, conflict);
    }

    #[tokio::test]
    async fn removing_with_current_revision_deletes() {
        let store = store_with("db").await;
        let meta = store.save_document("db", Some("a"), doc! {}).await.unwrap();

        let removed = store.remove_document("db", "a", &meta.rev).await.unwrap();

        assert_eq!(removed.id, "a");
        assert!(removed.rev.starts_with("2-"));
        assert_eq!(
            store.get_document("db", "a").await,
            Err(StoreError::NotFound("a".into(), "db".into()))
        );
    }

    #[tokio::test]
    async fn transient_views_can_be_disabled() {
        let store = InMemoryStore::builder().transient_views(false).build().await.unwrap();
        store.create_database("db").await.unwrap();

        let result = store
            .evaluate_transient_view("db", &ViewDefinition::new(Expr::all(), Projection::All), ViewOptions::default())
            .await;

        assert_eq!(result, Err(StoreError::ViewUnsupported));
    }

    #[tokio::test]
    async fn persisted_views_are_invoked_by_name() {
        let store = store_with("db").await;
        store.save_document("db", Some("a"), doc! { "n": 1 }).await.unwrap();
        store.save_document("db", Some("b"), doc! { "n": 5 }).await.unwrap();

        let name = ViewName::new("by_n", "big");
        let definition = ViewDefinition::new(Expr::field("n", FieldOp::Gt, 2), Projection::All);
        let meta = store.create_view("db", &name, &definition).await.unwrap();
        assert_eq!(meta.id, "_design/by_n");

        let result = store.invoke_view("db", &name, ViewOptions::default()).await.unwrap();

        assert_eq!(result.total_rows, 1);
        assert_eq!(result.rows[0].id, "b");

        assert!(matches!(
            store.invoke_view("db", &ViewName::new("by_n", "small"), ViewOptions::default()).await,
            Err(StoreError::NotFound(..))
        ));
    }
}
