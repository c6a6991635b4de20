//! Core of the docmix document store adapter.
//!
//! This crate provides:
//!
//! - **Filter compiler** ([`filter`]) - Operator-suffixed filter expressions to query trees
//! - **Query trees** ([`query`]) - The compiled form consumed by backends, plus a visitor
//! - **Identifier codec** ([`id`]) - Logical `id` strings to backend-native `_id` and back
//! - **Store backend abstraction** ([`backend`]) - The driver-side collaborator trait
//! - **Document store** ([`store`]) - The caller-facing adapter
//! - **Fluent queries** ([`builder`]) - Deferred query construction
//! - **Documents and results** ([`document`], [`page`]) - Caller-facing value types
//! - **Configuration** ([`config`]) and **errors** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use docmix::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//! let filter = to_filter(json!({ "count.max__gte": 6, "title__prefix": "test" }))?;
//! let result = store.find("test", &filter, FindOptions::default()).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmix_core;

pub mod backend;
pub mod builder;
pub mod config;
pub mod document;
pub mod error;
pub mod filter;
pub mod id;
pub mod page;
pub mod query;
pub mod store;
