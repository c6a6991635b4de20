use std::time::Duration;

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::{StreamExt, TryStreamExt, stream};
use log::debug;
use mongodb::{
    Client, Collection as MongoCollection, Database, IndexModel,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, IndexOptions},
};

use docmix_core::{
    backend::{DocumentCursor, StoreBackend, StoreBackendBuilder},
    config::{ConnectionOptions, StoreConfig},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, IndexSpec, Query, QueryVisitor},
};

use crate::query::{MongoQueryTranslator, projection_document, sort_document};

/// NamespaceNotFound
const NAMESPACE_NOT_FOUND: i32 = 26;
/// NamespaceExists
const NAMESPACE_EXISTS: i32 = 48;
/// DuplicateKey
const DUPLICATE_KEY: i32 = 11000;

/// MongoDB storage backend bound to one database.
#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: Database,
}

impl MongoDbStore {
    pub fn new(client: Client, database: &str) -> Self {
        let database = client.database(database);
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    /// The database this store is bound to.
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.database.collection(collection_name)
    }

    fn translate(filter: &Expr) -> DocumentStoreResult<Document> {
        MongoQueryTranslator.visit_expr(filter)
    }
}

/// Server error code carried by a command or write error, if any.
fn error_code(err: &MongoError) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => Some(command.code),
        ErrorKind::Write(WriteFailure::WriteError(write)) => Some(write.code),
        _ => None,
    }
}

fn backend_error(err: MongoError) -> DocumentStoreError {
    DocumentStoreError::backend(err)
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        match self.database.create_collection(name).await {
            Ok(()) => {
                debug!("created collection {name}");
                Ok(())
            }
            Err(e) if error_code(&e) == Some(NAMESPACE_EXISTS) => {
                Err(DocumentStoreError::AlreadyExists(format!("collection `{name}`")))
            }
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        match self.get_collection(name).drop().await {
            Ok(()) => {
                debug!("dropped collection {name}");
                Ok(())
            }
            Err(e) if error_code(&e) == Some(NAMESPACE_NOT_FOUND) => Ok(()),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn create_indexes(&self, collection: &str, indexes: Vec<IndexSpec>) -> DocumentStoreResult<()> {
        if indexes.is_empty() {
            return Ok(());
        }

        let models = indexes
            .into_iter()
            .map(|index| -> DocumentStoreResult<IndexModel> {
                index.validate()?;

                let keys = index
                    .keys
                    .iter()
                    .map(|(field, direction)| (field.clone(), Bson::Int32(direction.as_i32())))
                    .collect::<Document>();

                Ok(IndexModel::builder()
                    .keys(keys)
                    .options(
                        IndexOptions::builder()
                            .unique(index.unique)
                            .name(index.name)
                            .build(),
                    )
                    .build())
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        let created = models.len();

        self.get_collection(collection)
            .create_indexes(models)
            .await
            .map_err(backend_error)?;

        debug!("created {created} index(es) on {collection}");
        Ok(())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<Option<Bson>> {
        match self.get_collection(collection).insert_one(document).await {
            Ok(result) => Ok(Some(result.inserted_id)),
            Err(e) if error_code(&e) == Some(DUPLICATE_KEY) => Err(DocumentStoreError::AlreadyExists(
                format!("document in collection `{collection}`"),
            )),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn find_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(Self::translate(filter)?)
            .await
            .map_err(backend_error)
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<DocumentCursor> {
        // The server reads a zero limit as "no limit".
        if query.limit == Some(0) {
            return Ok(stream::empty().boxed());
        }

        let filter = Self::translate(&query.filter)?;

        let mut options = FindOptions::default();

        if let Some(fields) = &query.projection {
            options.projection = Some(projection_document(fields));
        }
        if !query.sort.is_empty() {
            options.sort = Some(sort_document(&query.sort));
        }
        if query.skip > 0 {
            options.skip = Some(query.skip);
        }
        if let Some(limit) = query.limit {
            options.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let cursor = self
            .get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(backend_error)?;

        Ok(cursor.map_err(backend_error).boxed())
    }

    async fn update_many(&self, collection: &str, filter: &Expr, update: Document) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .update_many(Self::translate(filter)?, doc! { "$set": update })
            .await
            .map_err(backend_error)?
            .modified_count)
    }

    async fn delete_many(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_many(Self::translate(filter)?)
            .await
            .map_err(backend_error)?
            .deleted_count)
    }

    async fn count(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(Self::translate(filter)?)
            .await
            .map_err(backend_error)
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Connects a [`MongoDbStore`] from a connection string and database name.
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    options: ConnectionOptions,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            options: ConnectionOptions::default(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(&config.connection_string, &config.db_name).with_options(config.options.clone())
    }

    /// Client settings applied after the connection string is parsed.
    pub fn with_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }
}

/// Overrides parsed client options with the configured ones. Unset fields are left alone.
fn apply_options(client_options: &mut ClientOptions, options: &ConnectionOptions) {
    if let Some(app_name) = &options.app_name {
        client_options.app_name = Some(app_name.clone());
    }
    if let Some(ms) = options.connect_timeout_ms {
        client_options.connect_timeout = Some(Duration::from_millis(ms));
    }
    if let Some(ms) = options.server_selection_timeout_ms {
        client_options.server_selection_timeout = Some(Duration::from_millis(ms));
    }
    if let Some(size) = options.max_pool_size {
        client_options.max_pool_size = Some(size);
    }
    if let Some(size) = options.min_pool_size {
        client_options.min_pool_size = Some(size);
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;
        apply_options(&mut options, &self.options);
        let client = Client::with_options(options)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        debug!("connected mongodb store to database {}", self.database);

        Ok(MongoDbStore::new(client, &self.database))
    }
}
