//! Error types and result types for store and service operations.
//!
//! Two layers of errors exist:
//!
//! - [`StoreError`] is what a [`StoreBackend`](crate::backend::StoreBackend) reports. Every
//!   variant carries an HTTP-style status code, available through [`StoreError::status`].
//! - [`ServiceError`] is the small domain taxonomy the [`Service`](crate::service::Service)
//!   exposes to its host. Store errors are translated into it exactly once, at the boundary
//!   of each public operation, through the `From<StoreError>` implementation.

use std::convert::Infallible;

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents the failures a document store can report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The requested document (or named view) does not exist.
    /// The first argument is the document ID, the second is the database name.
    #[error("Document {0} not found in database {1}")]
    NotFound(String, String),
    /// The requested database does not exist.
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),
    /// The supplied revision does not match the stored one.
    /// The first argument is the document ID, the second is the database name.
    #[error("Document update conflict on {0} in database {1}")]
    Conflict(String, String),
    /// The database was already created, usually by a concurrent creator.
    #[error("Database {0} already exists")]
    DatabaseExists(String),
    /// The deployment refuses to evaluate views that are not persisted.
    #[error("Transient views are not supported by this store")]
    ViewUnsupported,
    /// The document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// Serialization/deserialization error when converting between BSON and JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Transport or driver error with no status attached.
    #[error("Backend error: {0}")]
    Backend(String),
    /// A raw status reply from the store.
    #[error("Store responded with {status} {error}: {reason}")]
    Status {
        status: u16,
        error: String,
        reason: String,
    },
}

impl StoreError {
    /// Returns the status code the store associates with this failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::NotFound(..) | StoreError::DatabaseNotFound(_) => Some(404),
            StoreError::Conflict(..) => Some(409),
            StoreError::DatabaseExists(_) => Some(412),
            StoreError::ViewUnsupported => Some(410),
            StoreError::InvalidDocument(_) => Some(400),
            StoreError::Serialization(_) | StoreError::Backend(_) => None,
            StoreError::Status { status, .. } => Some(*status),
        }
    }
}

/// A specialized `Result` type for backend operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for StoreError {
    fn from(err: SerdeJsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<Infallible> for StoreError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Domain errors surfaced by the service.
///
/// `NotFound` and `Conflict` are kept apart from `General` so a hosting layer can map them
/// to distinct response codes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// The target document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The revision used for a write is stale.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The caller supplied malformed options or payloads. Raised before any I/O.
    #[error("{0}")]
    InvalidInput(String),
    /// Every other store failure, including transport errors.
    #[error("General store failure: {message}")]
    General {
        message: String,
        status: Option<u16>,
    },
}

impl ServiceError {
    /// Returns the status code a hosting layer should respond with.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::NotFound(_) => 404,
            ServiceError::Conflict(_) => 409,
            ServiceError::InvalidInput(_) => 400,
            ServiceError::General { .. } => 500,
        }
    }
}

/// A specialized `Result` type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err.status() {
            Some(404) => ServiceError::NotFound(err.to_string()),
            Some(409) => ServiceError::Conflict(err.to_string()),
            status => ServiceError::General {
                message: err.to_string(),
                status,
            },
        }
    }
}
