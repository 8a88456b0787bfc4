//! Execution of views against a store.
//!
//! A [`ViewPlan`] either names a persisted view, which is invoked directly, or carries a
//! compiled [`ViewDefinition`]. Compiled views are first evaluated transiently. When the
//! store rejects transient views the definition is persisted under a design document unique
//! to the call, invoked by name, and the design document is deleted again whether or not the
//! invocation succeeded.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    backend::StoreBackend,
    error::{StoreError, StoreResult},
    view::{ViewDefinition, ViewName, ViewOptions, ViewResult},
};

/// Prefix of the design documents created on the fallback path.
pub const FALLBACK_DESIGN_PREFIX: &str = "revlayer-";
/// View name used inside fallback design documents.
pub const FALLBACK_VIEW: &str = "temp";

/// What a find runs against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewPlan {
    /// Invoke a pre-existing persisted view.
    Direct(ViewName),
    /// Evaluate a compiled view.
    Compiled(ViewDefinition),
}

/// Runs [`ViewPlan`]s against one database.
#[derive(Debug)]
pub struct ViewExecutor<'a, B: StoreBackend> {
    backend: &'a B,
    database: &'a str,
}

impl<'a, B: StoreBackend> ViewExecutor<'a, B> {
    pub fn new(backend: &'a B, database: &'a str) -> Self {
        Self { backend, database }
    }

    /// Executes the plan with the given pagination options.
    pub async fn execute(&self, plan: &ViewPlan, options: ViewOptions) -> StoreResult<ViewResult> {
        match plan {
            ViewPlan::Direct(name) => {
                debug!(database = self.database, design = %name.design, view = %name.view, "invoking persisted view");
                self.backend
                    .invoke_view(self.database, name, options)
                    .await
            }
            ViewPlan::Compiled(definition) => {
                match self
                    .backend
                    .evaluate_transient_view(self.database, definition, options)
                    .await
                {
                    Err(StoreError::ViewUnsupported) => self.fallback(definition, options).await,
                    result => result,
                }
            }
        }
    }

    async fn fallback(&self, definition: &ViewDefinition, options: ViewOptions) -> StoreResult<ViewResult> {
        let name = ViewName::new(
            format!("{FALLBACK_DESIGN_PREFIX}{}", Uuid::new_v4().simple()),
            FALLBACK_VIEW,
        );

        debug!(database = self.database, design = %name.design, "transient views unsupported, persisting view");

        let meta = self.backend
            .create_view(self.database, &name, definition)
            .await?;

        let result = self.backend
            .invoke_view(self.database, &name, options)
            .await;

        if let Err(err) = self.backend
            .remove_document(self.database, &meta.id, &meta.rev)
            .await
        {
            warn!(database = self.database, design = %meta.id, error = %err, "failed to delete fallback design document");
        }

        result
    }
}
