//! In-memory revisioned document store for revlayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It behaves like a revisioned document database: every write produces a new revision,
//! conditional writes naming a stale revision conflict, and views run either transiently or
//! from design documents. It is meant for development and testing.
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
//!         .model("users")
//!         .build()?;
//!
//!     service.create(doc! { "name": "Alice" }).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as revlayer_memory;

pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
