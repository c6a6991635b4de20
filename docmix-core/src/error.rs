//! Error types and result types for document store operations.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`]. Validation
//! failures (identifiers, filter keys, document shape) are raised before any backend call;
//! backend failures are propagated with their underlying cause preserved.

use std::error::Error as StdError;

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Boxed error type used to carry the underlying cause of a backend failure.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// A supplied `id` string cannot be parsed into the backend-native identifier type.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
    /// A filter key uses an operator token outside the recognized set.
    #[error("Unknown filter operator: {0}")]
    UnknownOperator(String),
    /// The filter expression is structurally malformed.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    /// The document violates shape constraints (e.g. a non-object or a patch touching `id`).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The backend call itself failed. Never retried.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(#[source] BoxError),
    /// The target (collection or document) already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    /// The target does not exist and the operation requires it to.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
}

impl DocumentStoreError {
    /// Wraps any backend failure, keeping it as the error source.
    pub fn backend(err: impl Into<BoxError>) -> Self {
        DocumentStoreError::BackendUnavailable(err.into())
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
