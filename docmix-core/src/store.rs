//! The document store adapter.
//!
//! [`DocumentStore`] is the caller-facing façade over a [`StoreBackend`]. It compiles filter
//! expressions, normalizes identifiers in both directions and shapes results. It holds no
//! mutable state: every call compiles a fresh query and issues independent backend calls,
//! so one instance can be shared freely across tasks.
//!
//! # Example
//!
//! ```ignore
//! use docmix::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!
//! let id = store
//!     .insert("test", json!({ "title": "test1", "count": { "min": 1, "max": 1 } }).as_object().unwrap())
//!     .await?
//!     .unwrap();
//!
//! let result = store
//!     .find("test", json!({ "count.max__gte": 1 }).as_object().unwrap(), FindOptions::default())
//!     .await?;
//! assert!(result.total >= 1);
//!
//! store.delete("test", json!({ "id": id }).as_object().unwrap()).await?;
//! ```

use futures::{StreamExt, TryStreamExt};
use indexmap::IndexMap;
use log::{debug, trace};

use crate::{
    backend::StoreBackend,
    builder::QueryBuilder,
    config::{DeleteScope, StoreConfig},
    document::{Document, DocumentExt, FilterExpression},
    error::{DocumentStoreError, DocumentStoreResult},
    filter::compile,
    id::{ID_FIELD, IdCodec, NATIVE_ID_FIELD, ObjectIdCodec},
    page::{FindOptions, FindResult},
    query::{Expr, FieldOp, IndexSpec, Query},
};

/// A document store bound to one backend namespace.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug, Clone)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
    config: StoreConfig,
    codec: ObjectIdCodec,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend and default configuration.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, StoreConfig::default())
    }

    /// Creates a new document store with the given backend and configuration.
    pub fn with_config(backend: B, config: StoreConfig) -> Self {
        Self { backend, config, codec: ObjectIdCodec }
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Creates a new collection.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the collection exists, `BackendUnavailable` if the backend fails.
    pub async fn create(&self, name: &str) -> DocumentStoreResult<()> {
        debug!("creating collection {name}");
        self.backend.create_collection(name).await
    }

    /// Drops a collection. Dropping a missing collection is not an error.
    pub async fn drop(&self, name: &str) -> DocumentStoreResult<()> {
        debug!("dropping collection {name}");
        self.backend.drop_collection(name).await
    }

    /// Drops and recreates a collection.
    ///
    /// The two steps are not atomic. If recreating fails after the drop succeeded, the
    /// collection is left absent and the error is returned; callers should treat a failed
    /// truncate as leaving the collection in an unknown state.
    pub async fn truncate(&self, name: &str) -> DocumentStoreResult<()> {
        debug!("truncating collection {name}");
        self.backend.drop_collection(name).await?;
        self.backend.create_collection(name).await
    }

    /// Creates indexes on a collection. The specifications are passed through unchanged.
    pub async fn create_indexes(&self, name: &str, indexes: Vec<IndexSpec>) -> DocumentStoreResult<()> {
        for index in &indexes {
            index.validate()?;
        }

        debug!("creating {} index(es) on {name}", indexes.len());
        self.backend.create_indexes(name, indexes).await
    }

    /// Inserts one document.
    ///
    /// A caller-supplied `id` must be a valid identifier string and becomes the stored
    /// identifier; otherwise the backend assigns one.
    ///
    /// # Returns
    ///
    /// The new document's `id`, or `None` if the backend reported no identifier.
    pub async fn insert(&self, name: &str, document: &Document) -> DocumentStoreResult<Option<String>> {
        let document = self.codec.inbound_document(document)?;
        let inserted = self.backend.insert_one(name, document).await?;

        debug!("inserted document into {name}");
        Ok(inserted.and_then(|id| self.codec.encode(&id)))
    }

    /// Retrieves one document by `id`. Returns `None` if it does not exist.
    pub async fn get(&self, name: &str, id: &str) -> DocumentStoreResult<Option<Document>> {
        let filter = self.id_clause(id)?;

        self.backend
            .find_one(name, &filter)
            .await?
            .map(|document| self.codec.outbound_document(document))
            .transpose()
    }

    /// Retrieves several documents by `id` in a single backend call.
    ///
    /// # Returns
    ///
    /// A map from `id` to document containing only the documents found. Missing ids are
    /// absent from the map rather than an error.
    pub async fn get_many<I, S>(&self, name: &str, ids: I) -> DocumentStoreResult<IndexMap<String, Document>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let clauses = ids
            .into_iter()
            .map(|id| self.id_clause(id.as_ref()))
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        if clauses.is_empty() {
            return Ok(IndexMap::new());
        }

        let documents = self.collect(name, Query::new(Expr::Or(clauses))).await?;

        Ok(documents
            .into_iter()
            .filter_map(|document| {
                let id = document.get(ID_FIELD)?.as_str()?.to_string();
                Some((id, document))
            })
            .collect())
    }

    /// Applies `patch` as a partial field-set to every document matching `filter`.
    ///
    /// Fields not named in `patch` are left untouched. Dotted keys set nested fields.
    ///
    /// # Returns
    ///
    /// The number of documents actually modified, which can be lower than the number matched
    /// when values were already equal.
    pub async fn update(&self, name: &str, filter: &FilterExpression, patch: &Document) -> DocumentStoreResult<u64> {
        if patch.contains_key(ID_FIELD) || patch.contains_key(NATIVE_ID_FIELD) {
            return Err(DocumentStoreError::InvalidDocument(
                "the document identifier cannot be updated".to_string(),
            ));
        }

        let filter = self.compile_filter(filter)?;
        let patch = patch.to_bson()?;

        if patch.is_empty() {
            return Ok(0);
        }

        let modified = self.backend.update_many(name, &filter, patch).await?;
        debug!("updated {modified} document(s) in {name}");

        Ok(modified)
    }

    /// Deletes the documents matching `filter`.
    ///
    /// With the default [`DeleteScope::FirstClause`], only the first compiled clause of
    /// `filter` selects documents; later keys are ignored. Use
    /// [`DeleteScope::AllClauses`] to honor the whole filter.
    ///
    /// # Returns
    ///
    /// The number of documents deleted (zero when nothing matched).
    pub async fn delete(&self, name: &str, filter: &FilterExpression) -> DocumentStoreResult<u64> {
        let filter = self.compile_filter(filter)?;

        let filter = match self.config.delete_scope {
            DeleteScope::AllClauses => filter,
            DeleteScope::FirstClause => {
                let mut clauses = filter.into_clauses().into_iter();
                let first = clauses.next().unwrap_or_else(Expr::match_all);

                let ignored = clauses.len();
                if ignored != 0 {
                    debug!("delete on {name} ignores {ignored} filter clause(s) after the first");
                }
                first
            }
        };

        let deleted = self.backend.delete_many(name, &filter).await?;
        debug!("deleted {deleted} document(s) from {name}");

        Ok(deleted)
    }

    /// Finds documents matching `filter`.
    ///
    /// `total` in the result counts every match regardless of `start` and `limit`. When
    /// nothing matches the result is `{ total: 0, data: None }` and no query is run.
    pub async fn find(&self, name: &str, filter: &FilterExpression, options: FindOptions) -> DocumentStoreResult<FindResult> {
        let filter = self.compile_filter(filter)?;
        let limit = options.limit.unwrap_or(self.config.default_limit);

        let mut query = Query::new(filter).skip(options.start).limit(limit);
        // An empty field list selects whole documents, as with no list at all.
        if let Some(fields) = options.fields.as_ref().filter(|fields| !fields.is_empty()) {
            query = query.projection(
                fields
                    .iter()
                    .map(|field| self.codec.inbound_field(field))
                    .collect(),
            );
        }
        for (field, direction) in options.sort.iter().flatten() {
            query = query.sort(self.codec.inbound_field(field), *direction);
        }

        let total = self.backend.count(name, &query.filter).await?;
        debug!("find on {name}: {total} match(es)");

        if total == 0 {
            return Ok(FindResult::empty());
        }
        if limit == 0 {
            return Ok(FindResult { total, data: Some(Vec::new()) });
        }

        Ok(FindResult {
            total,
            data: Some(self.collect(name, query).await?),
        })
    }

    /// Starts a fluent query against a collection. Nothing is sent to the backend until
    /// [`QueryBuilder::execute`] is called.
    pub fn query(&self, name: &str) -> QueryBuilder<'_, B> {
        QueryBuilder::new(self, name)
    }

    /// Cleanly shuts down the store and its backend.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }

    fn compile_filter(&self, filter: &FilterExpression) -> DocumentStoreResult<Expr> {
        let expr = self.codec.inbound_filter(&compile(filter)?)?;
        trace!("compiled filter {filter:?} into {expr:?}");

        Ok(expr)
    }

    fn id_clause(&self, id: &str) -> DocumentStoreResult<Expr> {
        Ok(Expr::field(
            NATIVE_ID_FIELD.to_string(),
            FieldOp::Eq,
            self.codec.decode(id)?.into(),
        ))
    }

    async fn collect(&self, name: &str, query: Query) -> DocumentStoreResult<Vec<Document>> {
        self.backend
            .find(name, query)
            .await?
            .map(|document| document.and_then(|document| self.codec.outbound_document(document)))
            .try_collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bson::{Bson, doc, oid::ObjectId};
    use futures::stream;
    use serde_json::json;

    use super::*;
    use crate::{
        backend::DocumentCursor,
        document::{to_document, to_filter},
        query::SortDirection,
    };

    #[derive(Debug, Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<&'static str>>,
        filters: Mutex<Vec<Expr>>,
        queries: Mutex<Vec<Query>>,
        matches: u64,
        documents: Vec<bson::Document>,
        fail_create: bool,
    }

    impl RecordingBackend {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StoreBackend for RecordingBackend {
        async fn create_collection(&self, _name: &str) -> DocumentStoreResult<()> {
            self.record("create_collection");
            if self.fail_create {
                return Err(DocumentStoreError::backend("connection reset"));
            }
            Ok(())
        }

        async fn drop_collection(&self, _name: &str) -> DocumentStoreResult<()> {
            self.record("drop_collection");
            Ok(())
        }

        async fn create_indexes(&self, _collection: &str, _indexes: Vec<IndexSpec>) -> DocumentStoreResult<()> {
            self.record("create_indexes");
            Ok(())
        }

        async fn insert_one(&self, _collection: &str, document: bson::Document) -> DocumentStoreResult<Option<Bson>> {
            self.record("insert_one");
            Ok(document.get("_id").cloned())
        }

        async fn find_one(&self, _collection: &str, filter: &Expr) -> DocumentStoreResult<Option<bson::Document>> {
            self.record("find_one");
            self.filters.lock().unwrap().push(filter.clone());
            Ok(self.documents.first().cloned())
        }

        async fn find(&self, _collection: &str, query: Query) -> DocumentStoreResult<DocumentCursor> {
            self.record("find");
            self.queries.lock().unwrap().push(query);
            Ok(stream::iter(self.documents.clone().into_iter().map(Ok)).boxed())
        }

        async fn update_many(&self, _collection: &str, filter: &Expr, _update: bson::Document) -> DocumentStoreResult<u64> {
            self.record("update_many");
            self.filters.lock().unwrap().push(filter.clone());
            Ok(1)
        }

        async fn delete_many(&self, _collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
            self.record("delete_many");
            self.filters.lock().unwrap().push(filter.clone());
            Ok(1)
        }

        async fn count(&self, _collection: &str, _filter: &Expr) -> DocumentStoreResult<u64> {
            self.record("count");
            Ok(self.matches)
        }
    }

    fn eq(field: &str, value: impl Into<Bson>) -> Expr {
        Expr::field(field.to_string(), FieldOp::Eq, value.into())
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_backend() {
        let store = DocumentStore::new(RecordingBackend::default());

        let bad_filter = to_filter(json!({ "title__near": "x" })).unwrap();
        assert!(store.find("test", &bad_filter, FindOptions::default()).await.is_err());
        assert!(store.delete("test", &bad_filter).await.is_err());
        assert!(store.get("test", "123").await.is_err());
        assert!(store.get_many("test", ["123"]).await.is_err());
        assert!(store.insert("test", &to_document(json!({ "_id": 1 })).unwrap()).await.is_err());

        let patch = to_document(json!({ "id": "x" })).unwrap();
        assert!(store.update("test", &to_filter(json!({})).unwrap(), &patch).await.is_err());

        let empty = IndexSpec { keys: Vec::new(), unique: false, name: None };
        assert!(store.create_indexes("test", vec![empty]).await.is_err());

        assert!(store.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn find_counts_before_querying() {
        let store = DocumentStore::new(RecordingBackend::default());
        let filter = to_filter(json!({ "title": "test1" })).unwrap();

        let result = store.find("test", &filter, FindOptions::default()).await.unwrap();

        assert_eq!(result, FindResult::empty());
        assert_eq!(store.backend().calls(), vec!["count"]);

        let store = DocumentStore::new(RecordingBackend { matches: 3, ..Default::default() });
        let result = store.find("test", &filter, FindOptions::new().with_limit(0)).await.unwrap();

        assert_eq!(result, FindResult { total: 3, data: Some(Vec::new()) });
        assert_eq!(store.backend().calls(), vec!["count"]);
    }

    #[tokio::test]
    async fn find_builds_backend_query_with_native_field_names() {
        let oid = ObjectId::new();
        let backend = RecordingBackend {
            matches: 40,
            documents: vec![doc! { "_id": oid, "title": "test1" }],
            ..Default::default()
        };
        let store = DocumentStore::new(backend);

        let options = FindOptions::new()
            .with_fields(["id", "title"])
            .with_sort("id", SortDirection::Desc)
            .with_start(5);
        let result = store
            .find("test", &to_filter(json!({ "title": "test1" })).unwrap(), options)
            .await
            .unwrap();

        assert_eq!(result.total, 40);
        assert_eq!(result.documents(), &[to_document(json!({ "id": oid.to_hex(), "title": "test1" })).unwrap()]);

        let queries = store.backend().queries.lock().unwrap().clone();
        let expected = Query::new(Expr::And(vec![eq("title", "test1")]))
            .projection(vec!["_id".to_string(), "title".to_string()])
            .sort("_id", SortDirection::Desc)
            .skip(5)
            .limit(25);
        assert_eq!(queries, vec![expected]);
    }

    #[tokio::test]
    async fn empty_field_list_means_no_projection() {
        let store = DocumentStore::new(RecordingBackend { matches: 1, ..Default::default() });

        store
            .find(
                "test",
                &to_filter(json!({})).unwrap(),
                FindOptions::new().with_fields(Vec::<String>::new()),
            )
            .await
            .unwrap();

        let queries = store.backend().queries.lock().unwrap().clone();
        assert_eq!(queries[0].projection, None);
    }

    #[tokio::test]
    async fn get_many_issues_one_query() {
        let store = DocumentStore::new(RecordingBackend::default());
        let (a, b) = (ObjectId::new(), ObjectId::new());

        let found = store.get_many("test", [a.to_hex(), b.to_hex()]).await.unwrap();

        assert!(found.is_empty());
        assert_eq!(store.backend().calls(), vec!["find"]);

        let queries = store.backend().queries.lock().unwrap().clone();
        assert_eq!(queries[0].filter, Expr::Or(vec![eq("_id", a), eq("_id", b)]));
    }

    #[tokio::test]
    async fn delete_scope_selects_clauses() {
        let filter = to_filter(json!({ "title": "test1", "balance__gt": 10 })).unwrap();

        let store = DocumentStore::new(RecordingBackend::default());
        store.delete("test", &filter).await.unwrap();
        assert_eq!(store.backend().filters.lock().unwrap()[0], eq("title", "test1"));

        let config = StoreConfig::default().with_delete_scope(DeleteScope::AllClauses);
        let store = DocumentStore::with_config(RecordingBackend::default(), config);
        store.delete("test", &filter).await.unwrap();
        assert_eq!(store.backend().filters.lock().unwrap()[0], compile(&filter).unwrap());
    }

    #[tokio::test]
    async fn truncate_surfaces_failed_recreate() {
        let store = DocumentStore::new(RecordingBackend { fail_create: true, ..Default::default() });

        assert!(matches!(
            store.truncate("test").await,
            Err(DocumentStoreError::BackendUnavailable(_))
        ));
        assert_eq!(store.backend().calls(), vec!["drop_collection", "create_collection"]);
    }

    #[tokio::test]
    async fn insert_returns_caller_supplied_id() {
        let store = DocumentStore::new(RecordingBackend::default());
        let id = ObjectId::new().to_hex();

        let inserted = store
            .insert("test", &to_document(json!({ "id": id, "title": "test1" })).unwrap())
            .await
            .unwrap();

        assert_eq!(inserted, Some(id));
    }
}
