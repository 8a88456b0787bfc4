//! A service layer over revisioned document stores.
//!
//! This crate is the core of the revlayer project and provides:
//!
//! - **Store backend abstraction** ([`backend`]) - The operations a revisioned store must offer
//! - **Database handle** ([`database`]) - Lazily makes sure the target database exists
//! - **Query compilation** ([`query`]) - Turns query documents into typed predicate trees
//! - **Predicate evaluation** ([`evaluator`]) - Interprets predicates against documents
//! - **Projections** ([`projection`]) - Field selection for view output
//! - **Views** ([`view`], [`executor`]) - View definitions and their execution strategies
//! - **Service** ([`service`]) - Create/read/update/patch/remove/find over one database
//! - **Error handling** ([`error`]) - Store errors and the service error taxonomy
//! - **Pagination** ([`page`]) - Limits and the paginated result envelope
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use revlayer::{prelude::*, memory::InMemoryStore};
//!
//! let service = Service::builder()
//!     .connection(InMemoryStore::new())
//!     .model("todos")
//!     .build()?;
//!
//! let page = service
//!     .find(doc! { "done": false }, Filters::builder().limit(10).build())
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as revlayer_core;

pub mod backend;
pub mod database;
pub mod document;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod page;
pub mod projection;
pub mod query;
pub mod service;
pub mod view;
