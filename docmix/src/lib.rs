//! Main docmix crate: a document store adapter with an operator-suffixed filter language.
//!
//! This crate is the primary entry point. It re-exports the core types from the sub-crates
//! and gives access to the storage backends.
//!
//! # Features
//!
//! - **Filter expressions** - `{"count.max__gte": 6, "title__prefix": "test"}` compiled into
//!   native queries, with OR groups and dotted paths
//! - **Identifier normalization** - Callers see a string `id`; backends store a native `_id`
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//! - **Paged results** - `find` reports the total match count alongside one page
//!
//! # Quick Start
//!
//! ```ignore
//! use docmix::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     store.create("test").await?;
//!
//!     let document = to_document(json!({ "title": "test4", "count": { "min": 4, "max": 8 } }))?;
//!     let id = store.insert("test", &document).await?;
//!
//!     let result = store
//!         .query("test")
//!         .filter("count.max__gte", 6)
//!         .filter("title__prefix", "test")
//!         .sort("title", SortDirection::Desc)
//!         .limit(10)
//!         .execute()
//!         .await?;
//!
//!     println!("{} match(es), first page: {:?}", result.total, result.documents());
//!
//!     store.delete("test", &to_filter(json!({ "id": id }))?).await?;
//!     store.shutdown().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use docmix_core::{backend, builder, config, document, error, filter, id, page, query, store};

// Re-export the value types used at the boundaries.
pub use bson;
pub use serde_json;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmix_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmix_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
