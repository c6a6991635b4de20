//! MongoDB backend implementation for docmix.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait. Compiled
//! query trees are translated into MongoDB filter documents and run by the server.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmix = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docmix::{prelude::*, mongodb::MongoDbStoreBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoreConfig::new("my_database");
//!     let backend = MongoDbStoreBuilder::from_config(&config).build().await?;
//!     let store = DocumentStore::with_config(backend, config);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmix_mongodb;

pub mod store;
mod query;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
