//! Handle to a single named database.

use tokio::sync::OnceCell;
use tracing::debug;

use crate::{
    backend::StoreBackend,
    error::{StoreError, StoreResult},
};

/// Owns the backend connection for one database and makes sure the database exists.
///
/// The existence check runs once per handle. A failed check is not memoized, so the next
/// operation retries it.
#[derive(Debug)]
pub struct Database<B: StoreBackend> {
    backend: B,
    name: String,
    ready: OnceCell<()>,
}

impl<B: StoreBackend> Database<B> {
    /// Creates a handle. No I/O happens until [`Database::open`] is awaited.
    pub fn new(backend: B, name: impl Into<String>) -> Self {
        Self {
            backend,
            name: name.into(),
            ready: OnceCell::new(),
        }
    }

    /// Returns the database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the backend without checking that the database exists.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the backend once the database is known to exist.
    pub async fn open(&self) -> StoreResult<&B> {
        self.ready
            .get_or_try_init(|| self.ensure_exists())
            .await?;

        Ok(&self.backend)
    }

    async fn ensure_exists(&self) -> StoreResult<()> {
        if self.backend.database_exists(&self.name).await? {
            return Ok(());
        }

        match self.backend.create_database(&self.name).await {
            Ok(()) => {
                debug!(database = %self.name, "created database");
                Ok(())
            }
            Err(StoreError::DatabaseExists(_)) => {
                debug!(database = %self.name, "database was created concurrently");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
