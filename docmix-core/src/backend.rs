//! Storage backend abstraction for the document store.
//!
//! The [`StoreBackend`] trait is the driver-side collaborator of the adapter: a handle bound
//! to one database that can manage collections and run single-collection commands. Backends
//! receive BSON documents and compiled [`Expr`] trees with backend field names (`_id`);
//! identifier and shape normalization has already happened in [`crate::store`].
//!
//! # Examples
//!
//! ```ignore
//! use docmix::backend::StoreBackend;
//! use docmix::query::Expr;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! let id = backend.insert_one("users", doc! { "name": "Alice", "age": 30 }).await?;
//! let total = backend.count("users", &Expr::match_all()).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::BoxStream;
use std::fmt::Debug;

use crate::{
    error::DocumentStoreResult,
    query::{Expr, IndexSpec, Query},
};

/// A stream of documents produced by [`StoreBackend::find`].
pub type DocumentCursor = BoxStream<'static, DocumentStoreResult<Document>>;

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. Timeouts and retries are the backend's business; the adapter never retries.
///
/// # Error Handling
///
/// Failures of the backend itself are reported as
/// [`DocumentStoreError::BackendUnavailable`](crate::error::DocumentStoreError::BackendUnavailable)
/// with the underlying cause as the error source. Operation-specific conditions use
/// `AlreadyExists` / `NotFound`.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Creates a new, empty collection.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if a collection with this name exists.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops a collection and all its documents. Dropping a missing collection succeeds.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Creates the given indexes on a collection.
    async fn create_indexes(&self, collection: &str, indexes: Vec<IndexSpec>) -> DocumentStoreResult<()>;

    /// Inserts a single document, creating the collection if needed.
    ///
    /// If the document has no `_id`, the backend assigns one.
    ///
    /// # Returns
    ///
    /// The identifier the backend reports for the new document, if any.
    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<Option<Bson>>;

    /// Returns the first document matching `filter`.
    async fn find_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<Option<Document>>;

    /// Runs a query and returns a cursor over the matching documents.
    ///
    /// A missing collection yields an empty cursor.
    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<DocumentCursor>;

    /// Applies `update` as a partial field-set (`$set`) to every document matching `filter`.
    ///
    /// # Returns
    ///
    /// The number of documents whose content actually changed.
    async fn update_many(&self, collection: &str, filter: &Expr, update: Document) -> DocumentStoreResult<u64>;

    /// Deletes every document matching `filter` and returns how many were removed.
    async fn delete_many(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64>;

    /// Counts the documents matching `filter`.
    async fn count(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (*self).create_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (*self).drop_collection(name).await
    }

    async fn create_indexes(&self, collection: &str, indexes: Vec<IndexSpec>) -> DocumentStoreResult<()> {
        (*self).create_indexes(collection, indexes).await
    }

    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<Option<Bson>> {
        (*self).insert_one(collection, document).await
    }

    async fn find_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<Option<Document>> {
        (*self).find_one(collection, filter).await
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<DocumentCursor> {
        (*self).find(collection, query).await
    }

    async fn update_many(&self, collection: &str, filter: &Expr, update: Document) -> DocumentStoreResult<u64> {
        (*self).update_many(collection, filter, update).await
    }

    async fn delete_many(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        (*self).delete_many(collection, filter).await
    }

    async fn count(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        (*self).count(collection, filter).await
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
