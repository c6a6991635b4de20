//! Fluent query construction over a [`DocumentStore`].
//!
//! ```ignore
//! let result = store
//!     .query("test")
//!     .filter("count.max__gte", 6)
//!     .or_group([("count.min__gte", json!(2)), ("title", json!("test4"))])
//!     .fields(["title", "id"])
//!     .sort("count.max", SortDirection::Desc)
//!     .limit(10)
//!     .execute()
//!     .await?;
//! ```

use serde_json::{Map, Value};

use crate::{
    backend::StoreBackend,
    document::FilterExpression,
    error::DocumentStoreResult,
    page::{FindOptions, FindResult},
    query::SortDirection,
    store::DocumentStore,
};

/// Accumulates filter, projection, sort and pagination for one `find` call.
///
/// Building is free of side effects; the backend is only contacted by [`execute`], which
/// consumes the builder.
///
/// [`execute`]: QueryBuilder::execute
#[derive(Debug)]
pub struct QueryBuilder<'a, B: StoreBackend> {
    store: &'a DocumentStore<B>,
    collection: String,
    filter: FilterExpression,
    options: FindOptions,
    or_groups: usize,
}

impl<'a, B: StoreBackend> QueryBuilder<'a, B> {
    pub(crate) fn new(store: &'a DocumentStore<B>, collection: &str) -> Self {
        Self {
            store,
            collection: collection.to_string(),
            filter: FilterExpression::new(),
            options: FindOptions::default(),
            or_groups: 0,
        }
    }

    /// Adds one filter entry. `key` may carry an operator suffix (`count__gte`).
    ///
    /// Setting the same key twice keeps the last value.
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }

    /// Adds every entry of a filter expression.
    pub fn filters(mut self, filter: FilterExpression) -> Self {
        self.filter.extend(filter);
        self
    }

    /// Adds an OR group: a document matches if any of the entries matches.
    ///
    /// A group without entries adds nothing.
    pub fn or_group<I, K>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let group = entries
            .into_iter()
            .map(|(key, value)| {
                let mut entry = Map::new();
                entry.insert(key.into(), value);
                Value::Object(entry)
            })
            .collect::<Vec<_>>();

        if group.is_empty() {
            return self;
        }

        // Bare keys without the operator delimiter; the name itself is never interpreted.
        self.filter.insert(format!("$or{}", self.or_groups), Value::Array(group));
        self.or_groups += 1;
        self
    }

    /// Restricts returned documents to the given fields.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = self.options.with_fields(fields);
        self
    }

    /// Appends a sort key.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.options = self.options.with_sort(field, direction);
        self
    }

    /// Sets the number of matching documents to skip.
    pub fn start(mut self, start: u64) -> Self {
        self.options = self.options.with_start(start);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: u64) -> Self {
        self.options = self.options.with_limit(limit);
        self
    }

    /// The filter expression accumulated so far.
    pub fn filter_expression(&self) -> &FilterExpression {
        &self.filter
    }

    /// The find options accumulated so far.
    pub fn options(&self) -> &FindOptions {
        &self.options
    }

    /// Runs the query.
    pub async fn execute(self) -> DocumentStoreResult<FindResult> {
        self.store
            .find(&self.collection, &self.filter, self.options)
            .await
    }
}
