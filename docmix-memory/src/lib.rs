//! In-memory document storage backend for docmix.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development,
//! testing, and small deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **MongoDB-like matching** - Dotted paths, array fields, cross-type numeric comparison
//! - **Full query support** - Filtering, sorting, pagination and projection
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
//!
//!     let id = store.insert("users", &to_document(json!({ "name": "Alice" }))?).await?;
//!     let user = store.get("users", id.as_deref().unwrap_or_default()).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmix_memory;

pub mod store;
mod evaluator;
mod path;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
