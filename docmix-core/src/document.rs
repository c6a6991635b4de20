//! Caller-facing document types and conversion to and from the BSON storage format.
//!
//! Callers only ever see [`Document`] and [`serde_json::Value`]. Backends only ever see
//! [`bson::Document`]. [`DocumentExt`] is the single place where the two meet.

use bson::{Bson, de::deserialize_from_bson, ser::serialize_to_bson};
use serde_json::{Map, Value};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// An ordered mapping from field name to value, as seen by callers.
///
/// Values are arbitrary JSON: null, booleans, numbers, strings, arrays and nested objects.
/// Insertion order is preserved.
pub type Document = Map<String, Value>;

/// A filter expression: filter key to filter value.
///
/// Keys are bare field paths (`title`, `count.max`) meaning equality, or field paths with an
/// operator suffix (`count.max__gte`). See [`crate::filter`] for the full grammar.
pub type FilterExpression = Map<String, Value>;

/// Conversion utilities between caller documents and BSON.
pub trait DocumentExt: Sized {
    /// Converts this document to a BSON document for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be represented in BSON (e.g. an unsigned
    /// integer larger than `i64::MAX`).
    fn to_bson(&self) -> DocumentStoreResult<bson::Document>;

    /// Creates a caller document from a BSON document.
    ///
    /// BSON types without a JSON counterpart (dates, nested ObjectIds, binary) are rendered
    /// in their extended JSON form.
    fn from_bson(document: bson::Document) -> DocumentStoreResult<Self>;
}

impl DocumentExt for Document {
    fn to_bson(&self) -> DocumentStoreResult<bson::Document> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "expected a document, got {other}"
            ))),
        }
    }

    fn from_bson(document: bson::Document) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }
}

/// Extracts the object map of a JSON value as a document.
///
/// # Errors
///
/// `InvalidDocument` if the value is not an object.
pub fn to_document(value: Value) -> DocumentStoreResult<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "a document must be an object, got {other}"
        ))),
    }
}

/// Extracts the object map of a JSON value as a filter expression.
///
/// # Errors
///
/// `InvalidFilter` if the value is not an object.
pub fn to_filter(value: Value) -> DocumentStoreResult<FilterExpression> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DocumentStoreError::InvalidFilter(format!(
            "a filter expression must be an object, got {other}"
        ))),
    }
}

/// Converts a single JSON value to BSON.
pub fn value_to_bson(value: &Value) -> DocumentStoreResult<Bson> {
    Ok(serialize_to_bson(value)?)
}
