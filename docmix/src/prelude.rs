//! Convenient re-exports of commonly used types from docmix.
//!
//! ```ignore
//! use docmix::prelude::*;
//! ```

pub use docmix_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    builder::QueryBuilder,
    config::{DeleteScope, StoreConfig},
    document::{Document, DocumentExt, FilterExpression, to_document, to_filter},
    error::{DocumentStoreError, DocumentStoreResult},
    id::{IdCodec, ObjectIdCodec},
    page::{FindOptions, FindResult},
    query::{Expr, FieldOp, IndexSpec, QueryVisitor, SortDirection},
    store::DocumentStore,
};
