//! In-memory storage implementation for document stores.
//!
//! Collections are insertion-ordered maps of BSON documents keyed by `_id`, guarded by a
//! single async-aware read-write lock.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use futures::{StreamExt, stream};
use indexmap::IndexMap;
use log::debug;
use mea::rwlock::RwLock;

use docmix_core::{
    backend::{DocumentCursor, StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    id::NATIVE_ID_FIELD,
    query::{Expr, IndexSpec, Query},
};

use crate::{
    evaluator::{Matcher, compare_documents},
    path,
};

type CollectionMap = IndexMap<String, Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// Implements [`StoreBackend`] with MongoDB-like matching, sorting and projection, so the
/// adapter behaves the same against it as against a real server for the supported filter
/// language. Indexes are accepted and ignored.
///
/// `InMemoryStore` is cloneable; clones share the same underlying data.
///
/// # Example
///
/// ```ignore
/// use docmix_memory::InMemoryStore;
/// use docmix::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let id = store.insert_one("users", doc! { "name": "Alice", "age": 30 }).await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (`_id` key -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self { store: Arc::new(RwLock::new(StoreMap::new())) }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Names of the existing collections, sorted.
    pub async fn collection_names(&self) -> Vec<String> {
        let mut names = self.store.read().await.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }
}

/// Map key for an `_id` value. Distinct BSON values render distinctly.
fn id_key(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        if store.contains_key(name) {
            return Err(DocumentStoreError::AlreadyExists(format!("collection `{name}`")));
        }

        store.insert(name.to_string(), CollectionMap::new());
        debug!("created collection {name}");

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        if self.store.write().await.remove(name).is_some() {
            debug!("dropped collection {name}");
        }

        Ok(())
    }

    async fn create_indexes(&self, collection: &str, indexes: Vec<IndexSpec>) -> DocumentStoreResult<()> {
        for index in &indexes {
            index.validate()?;
        }

        debug!("ignoring {} index(es) on {collection}", indexes.len());
        Ok(())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<Option<Bson>> {
        let (id, document) = match document.get(NATIVE_ID_FIELD) {
            Some(id) => (id.clone(), document),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                let mut with_id = Document::new();
                with_id.insert(NATIVE_ID_FIELD, id.clone());
                for (key, value) in document {
                    with_id.insert(key, value);
                }
                (id, with_id)
            }
        };

        let mut store = self.store.write().await;
        let collection_map = store.entry(collection.to_string()).or_default();
        let key = id_key(&id);

        if collection_map.contains_key(&key) {
            return Err(DocumentStoreError::AlreadyExists(format!(
                "document {id} in collection `{collection}`"
            )));
        }

        collection_map.insert(key, document);

        Ok(Some(id))
    }

    async fn find_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<Option<Document>> {
        let matcher = Matcher::new(filter)?;
        let store = self.store.read().await;

        Ok(store
            .get(collection)
            .and_then(|documents| documents.values().find(|doc| matcher.matches(doc)))
            .cloned())
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<DocumentCursor> {
        let matcher = Matcher::new(&query.filter)?;
        let store = self.store.read().await;

        let mut documents = match store.get(collection) {
            Some(documents) => documents
                .values()
                .filter(|doc| matcher.matches(doc))
                .cloned()
                .collect::<Vec<_>>(),
            None => Vec::new(),
        };

        if !query.sort.is_empty() {
            documents.sort_by(|a, b| compare_documents(a, b, &query.sort));
        }

        let documents = documents
            .into_iter()
            .skip(to_usize(query.skip))
            .take(query.limit.map(to_usize).unwrap_or(usize::MAX))
            .map(|doc| match &query.projection {
                Some(fields) => path::project(&doc, fields),
                None => doc,
            })
            .map(Ok)
            .collect::<Vec<_>>();

        Ok(stream::iter(documents).boxed())
    }

    async fn update_many(&self, collection: &str, filter: &Expr, update: Document) -> DocumentStoreResult<u64> {
        let matcher = Matcher::new(filter)?;
        let mut store = self.store.write().await;

        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let mut modified = 0;

        for document in documents.values_mut().filter(|doc| matcher.matches(doc)) {
            // A document is written back only once every field of the patch applied.
            let mut patched = document.clone();
            let mut changed = false;
            for (field, value) in &update {
                changed |= path::set(&mut patched, field, value.clone())?;
            }
            if changed {
                *document = patched;
                modified += 1;
            }
        }

        Ok(modified)
    }

    async fn delete_many(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        let matcher = Matcher::new(filter)?;
        let mut store = self.store.write().await;

        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let before = documents.len();
        documents.retain(|_, doc| !matcher.matches(doc));

        Ok((before - documents.len()) as u64)
    }

    async fn count(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        let matcher = Matcher::new(filter)?;
        let store = self.store.read().await;

        Ok(store
            .get(collection)
            .map(|documents| documents.values().filter(|doc| matcher.matches(doc)).count() as u64)
            .unwrap_or(0))
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// ```ignore
/// use docmix_memory::InMemoryStore;
/// use docmix::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance. Always succeeds.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docmix_core::query::{FieldOp, SortDirection};
    use futures::TryStreamExt;

    fn field(field: &str, op: FieldOp, value: impl Into<Bson>) -> Expr {
        Expr::And(vec![Expr::field(field.to_string(), op, value.into())])
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store
                .insert_one("items", doc! { "title": format!("item{i}"), "rank": 4 - i, "group": i % 2 })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn collection_lifecycle() {
        let store = InMemoryStore::new();

        store.create_collection("items").await.unwrap();
        assert!(matches!(
            store.create_collection("items").await,
            Err(DocumentStoreError::AlreadyExists(_))
        ));
        assert_eq!(store.collection_names().await, vec!["items".to_string()]);

        store.drop_collection("items").await.unwrap();
        store.drop_collection("items").await.unwrap();
        assert!(store.collection_names().await.is_empty());
    }

    #[tokio::test]
    async fn insert_assigns_object_ids_and_rejects_duplicates() {
        let store = InMemoryStore::new();

        let id = store.insert_one("items", doc! { "title": "a" }).await.unwrap();
        let Some(Bson::ObjectId(oid)) = id else {
            panic!("expected a generated ObjectId, got {id:?}");
        };

        let stored = store
            .find_one("items", &field("_id", FieldOp::Eq, oid))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, doc! { "_id": oid, "title": "a" });

        assert!(matches!(
            store.insert_one("items", doc! { "_id": oid, "title": "b" }).await,
            Err(DocumentStoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn find_filters_sorts_pages_and_projects() {
        let store = seeded().await;
        let query = Query::new(field("group", FieldOp::Eq, 0))
            .sort("rank", SortDirection::Asc)
            .skip(1)
            .limit(5)
            .projection(vec!["title".to_string()]);

        let documents = store
            .find("items", query)
            .await
            .unwrap()
            .try_collect::<Vec<_>>()
            .await
            .unwrap();

        let titles = documents
            .iter()
            .map(|doc| doc.get_str("title").unwrap())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["item2", "item0"]);
        assert!(documents.iter().all(|doc| doc.contains_key("_id") && !doc.contains_key("rank")));
    }

    #[tokio::test]
    async fn missing_collections_are_empty() {
        let store = InMemoryStore::new();
        let all = Expr::match_all();

        assert_eq!(store.count("nothing", &all).await.unwrap(), 0);
        assert_eq!(store.delete_many("nothing", &all).await.unwrap(), 0);
        assert_eq!(store.update_many("nothing", &all, doc! { "a": 1 }).await.unwrap(), 0);
        assert!(store.find_one("nothing", &all).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_counts_only_changed_documents() {
        let store = seeded().await;

        let modified = store
            .update_many("items", &Expr::match_all(), doc! { "group": 1 })
            .await
            .unwrap();
        assert_eq!(modified, 3);

        let modified = store
            .update_many("items", &field("title", FieldOp::Eq, "item0"), doc! { "stats.views": 10 })
            .await
            .unwrap();
        assert_eq!(modified, 1);
        assert_eq!(store.count("items", &field("stats.views", FieldOp::Gte, 10)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_update_leaves_document_untouched() {
        let store = InMemoryStore::new();
        store.insert_one("items", doc! { "title": "a", "n": 1 }).await.unwrap();

        let result = store
            .update_many("items", &Expr::match_all(), doc! { "n": 99, "title.inner": 2 })
            .await;
        assert!(matches!(result, Err(DocumentStoreError::InvalidDocument(_))));

        let stored = store.find_one("items", &Expr::match_all()).await.unwrap().unwrap();
        assert_eq!(stored.get("n"), Some(&Bson::Int32(1)));
        assert_eq!(stored.get("title"), Some(&Bson::String("a".into())));
    }

    #[tokio::test]
    async fn delete_removes_matching_documents() {
        let store = seeded().await;

        let deleted = store
            .delete_many("items", &field("rank", FieldOp::Lt, 2))
            .await
            .unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(store.count("items", &Expr::match_all()).await.unwrap(), 3);
    }
}
