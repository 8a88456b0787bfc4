//! Convenient re-exports of commonly used types from revlayer.
//!
//! ```ignore
//! use revlayer::prelude::*;
//! ```

pub use revlayer_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::DocumentMeta,
    error::{ServiceError, ServiceResult, StoreError, StoreResult},
    page::{Paginate, Paginated},
    query::{Expr, FieldOp, Filters, FiltersBuilder, QueryVisitor, Sort, SortDirection, parse_query},
    service::{Payload, RemoveParams, Service, ServiceBuilder},
    view::{ViewDefinition, ViewName, ViewOptions, ViewResult},
};
