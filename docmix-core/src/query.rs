//! Query trees and backend-level query options.
//!
//! A filter expression compiles ([`crate::filter::compile`]) into an [`Expr`] tree: a
//! conjunction of single-field clauses and OR groups. Backends consume the tree through the
//! [`QueryVisitor`] trait, either translating it into their native query language or
//! evaluating it directly.
//!
//! # Example
//!
//! ```ignore
//! use docmix::query::{Expr, FieldOp, Query, SortDirection};
//! use bson::Bson;
//!
//! let filter = Expr::And(vec![
//!     Expr::field("count.max".into(), FieldOp::Gte, Bson::Int64(6)),
//! ]);
//!
//! let query = Query::new(filter)
//!     .sort("title", SortDirection::Desc)
//!     .skip(10)
//!     .limit(25);
//! ```

use std::str::FromStr;

use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// The numeric form used by document databases (`1` / `-1`).
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

impl FromStr for SortDirection {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(DocumentStoreError::InvalidFilter(format!(
                "unknown sort direction: {other}"
            ))),
        }
    }
}

/// Sort specification for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Field comparison operators in a compiled query tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to.
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Value is one of the given array of values.
    In,
    /// Value is none of the given array of values.
    NotIn,
    /// String matches the given regular expression (unanchored).
    Regex,
}

impl FieldOp {
    /// The MongoDB operator name, e.g. `$gte`.
    pub fn native_name(&self) -> &'static str {
        match self {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
            FieldOp::In => "$in",
            FieldOp::NotIn => "$nin",
            FieldOp::Regex => "$regex",
        }
    }
}

/// A compiled query tree.
///
/// The top level produced by the filter compiler is always an [`Expr::And`]; an empty
/// conjunction matches every document.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Single-field clause.
    Field {
        /// The field path (dotted for nested documents).
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// An expression matching every document.
    pub fn match_all() -> Self {
        Expr::And(Vec::new())
    }

    /// Returns `true` if this is an empty conjunction.
    pub fn is_match_all(&self) -> bool {
        matches!(self, Expr::And(clauses) if clauses.is_empty())
    }

    /// Returns the top-level clauses of a conjunction, or the expression itself.
    pub fn into_clauses(self) -> Vec<Expr> {
        match self {
            Expr::And(clauses) => clauses,
            other => vec![other],
        }
    }
}

/// A backend-level query: a compiled filter plus projection, sort and pagination.
///
/// All field names are backend names (`_id`, not `id`).
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Filter tree to match documents.
    pub filter: Expr,
    /// Fields to include. `None` returns whole documents.
    pub projection: Option<Vec<String>>,
    /// Sort keys, applied in order.
    pub sort: Vec<Sort>,
    /// Number of documents to skip.
    pub skip: u64,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
}

impl Query {
    /// Creates a query with the given filter and no projection, sort or pagination.
    pub fn new(filter: Expr) -> Self {
        Query {
            filter,
            projection: None,
            sort: Vec::new(),
            skip: 0,
            limit: None,
        }
    }

    /// Restricts returned documents to the given fields.
    pub fn projection(mut self, fields: Vec<String>) -> Self {
        self.projection = Some(fields);
        self
    }

    /// Appends a sort key.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(Sort { field: field.into(), direction });
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl Default for Query {
    fn default() -> Self {
        Query::new(Expr::match_all())
    }
}

/// An index definition passed through to the backend unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Indexed fields and their directions, in order.
    pub keys: Vec<(String, SortDirection)>,
    /// Whether the index enforces uniqueness.
    #[serde(default)]
    pub unique: bool,
    /// Optional index name. Backends derive one when absent.
    #[serde(default)]
    pub name: Option<String>,
}

impl IndexSpec {
    /// An ascending single-field index.
    pub fn ascending(field: impl Into<String>) -> Self {
        IndexSpec {
            keys: vec![(field.into(), SortDirection::Asc)],
            unique: false,
            name: None,
        }
    }

    /// Appends another key to a compound index.
    pub fn and(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push((field.into(), direction));
        self
    }

    /// Marks the index as unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Names the index.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Validates that the index has at least one key.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        if self.keys.is_empty() {
            return Err(DocumentStoreError::InvalidDocument(
                "index specification has no keys".to_string(),
            ));
        }

        Ok(())
    }
}

/// Visitor over compiled query trees.
///
/// Backends implement this to translate ([`Output`](QueryVisitor::Output) = native query)
/// or evaluate (`Output = bool`) a tree.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}
