//! A service layer that exposes create/read/update/patch/remove/find over a revisioned
//! document store.
//!
//! A [`Service`](service::Service) owns one store connection and one database, named after
//! the service's model. Queries are compiled into view definitions that the store evaluates
//! transiently; stores that refuse transient views get the view persisted in a temporary
//! design document for the duration of the call.
//!
//! # Quick Start
//!
//! ```ignore
//! use bson::doc;
//! use revlayer::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = Service::builder()
//!         .connection(InMemoryStore::new())
//!         .model("messages")
//!         .paginate(Paginate::new(Some(10), Some(50)))
//!         .build()?;
//!
//!     service.create(vec![
//!         doc! { "text": "hello", "votes": 3 },
//!         doc! { "text": "world", "votes": 8 },
//!     ]).await?;
//!
//!     let page = service
//!         .find(doc! { "votes": { "$gt": 5 } }, Filters::default())
//!         .await?;
//!
//!     assert_eq!(page.total, 1);
//!     assert_eq!(page.data[0].get_str("text")?, "world");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Raw queries
//!
//! Hosts that receive queries as a single document can let the service split out the
//! pagination and view keys:
//!
//! ```ignore
//! let page = service
//!     .find_raw(doc! { "$limit": 2, "$sort": { "votes": -1 }, "text": { "$ne": "hello" } })
//!     .await?;
//! ```
//!
//! # Persisted views
//!
//! ```ignore
//! let page = service
//!     .find(doc! {}, Filters::builder().view("stats/by_votes").build())
//!     .await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory revisioned store for development and testing

pub mod prelude;

pub use revlayer_core::{
    backend, database, document, error, evaluator, executor, page, projection, query, service, view,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use revlayer_memory::{InMemoryStore, InMemoryStoreBuilder};
}
