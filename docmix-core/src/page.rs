//! Pagination and result types for `find`.
//!
//! [`FindOptions`] carries projection, sort and pagination for one call; [`FindResult`] is
//! what comes back: the full match count plus one page of documents.

use serde::{Deserialize, Serialize};

use crate::{document::Document, query::SortDirection};

/// Default number of documents returned by `find`.
pub const DEFAULT_LIMIT: u64 = 25;

/// The result of a `find` call.
///
/// `total` is the number of documents matching the filter, independent of `start` and
/// `limit`. `data` is `None` exactly when nothing matched.
///
/// # Example
///
/// ```ignore
/// let result = store.find("test", &filter, FindOptions::default()).await?;
///
/// match result.data {
///     Some(documents) => assert!(documents.len() as u64 <= result.total),
///     None => assert_eq!(result.total, 0),
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FindResult {
    /// Total count of matching documents across all pages.
    pub total: u64,
    /// The documents in this page, or `None` when `total` is zero.
    pub data: Option<Vec<Document>>,
}

impl FindResult {
    /// The result for a filter matching nothing.
    pub fn empty() -> Self {
        Self { total: 0, data: None }
    }

    /// Returns the documents in this page (empty when nothing matched).
    pub fn documents(&self) -> &[Document] {
        self.data.as_deref().unwrap_or_default()
    }
}

impl Default for FindResult {
    fn default() -> Self {
        Self::empty()
    }
}

/// Projection, sort and pagination for a `find` call.
///
/// Field names are caller names; `id` addresses the document identifier.
///
/// ```ignore
/// let options = FindOptions::default()
///     .with_fields(["title", "id"])
///     .with_sort("count.max", SortDirection::Desc)
///     .with_start(10)
///     .with_limit(5);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FindOptions {
    /// Fields to include in returned documents. `None` returns whole documents.
    pub fields: Option<Vec<String>>,
    /// Sort keys, applied in order.
    pub sort: Option<Vec<(String, SortDirection)>>,
    /// Number of matching documents to skip.
    pub start: u64,
    /// Maximum number of documents to return. `None` uses the store's default limit.
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self { fields: None, sort: None, start: 0, limit: None }
    }

    /// Restricts returned documents to the given fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Appends a sort key.
    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort
            .get_or_insert_with(Vec::new)
            .push((field.into(), direction));
        self
    }

    /// Sets the number of documents to skip.
    pub fn with_start(mut self, start: u64) -> Self {
        self.start = start;
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl Default for FindOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_serializes_data_as_null() {
        assert_eq!(
            serde_json::to_value(FindResult::empty()).unwrap(),
            serde_json::json!({ "total": 0, "data": null })
        );
        assert!(FindResult::empty().documents().is_empty());
    }

    #[test]
    fn sort_keys_accumulate_in_order() {
        let options = FindOptions::default()
            .with_sort("a", SortDirection::Asc)
            .with_sort("b", SortDirection::Desc);

        assert_eq!(
            options.sort,
            Some(vec![("a".to_string(), SortDirection::Asc), ("b".to_string(), SortDirection::Desc)])
        );
    }
}
