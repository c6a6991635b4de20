//! Query tree evaluation for in-memory document filtering.
//!
//! Evaluation follows MongoDB's matching rules closely enough for the filter language:
//! dotted paths, array fields matching when any element matches, missing fields equal to
//! `null`, numbers compared across integer and floating point types, and unanchored
//! regular expressions.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, DateTime, Document, oid::ObjectId};
use regex::Regex;

use docmix_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
};

use crate::path;

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to `f64`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    ObjectId(ObjectId),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(Vec<(&'a str, Comparable<'a>)>),
    Other,
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Other,
        }
    }
}

impl Comparable<'_> {
    /// Position of the value's type in MongoDB's cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
            Comparable::Other => 10,
        }
    }

    /// Total order used for sorting: by type first, then by value.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    /// Only values of the same type are ordered, as with MongoDB's comparison operators.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// A compiled filter ready to be evaluated against many documents.
///
/// Regular expressions are compiled once up front, so matching itself cannot fail.
#[derive(Debug)]
pub(crate) struct Matcher<'e> {
    expr: &'e Expr,
    patterns: HashMap<String, Regex>,
}

impl<'e> Matcher<'e> {
    /// Prepares `expr` for evaluation.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` if a pattern is not a valid regular expression or not a string.
    pub fn new(expr: &'e Expr) -> DocumentStoreResult<Self> {
        let mut patterns = HashMap::new();
        collect_patterns(expr, &mut patterns)?;

        Ok(Self { expr, patterns })
    }

    pub fn matches(&self, document: &Document) -> bool {
        DocumentEvaluator { document, patterns: &self.patterns }
            .visit_expr(self.expr)
            .unwrap_or(false)
    }
}

fn collect_patterns(expr: &Expr, patterns: &mut HashMap<String, Regex>) -> DocumentStoreResult<()> {
    match expr {
        Expr::And(exprs) | Expr::Or(exprs) => exprs
            .iter()
            .try_for_each(|expr| collect_patterns(expr, patterns)),
        Expr::Field { op: FieldOp::Regex, value, .. } => match value {
            Bson::String(pattern) => {
                if !patterns.contains_key(pattern) {
                    let regex = Regex::new(pattern).map_err(|e| {
                        DocumentStoreError::InvalidFilter(format!("invalid pattern `{pattern}`: {e}"))
                    })?;
                    patterns.insert(pattern.clone(), regex);
                }
                Ok(())
            }
            other => Err(DocumentStoreError::InvalidFilter(format!(
                "pattern must be a string, got {other}"
            ))),
        },
        Expr::Field { .. } => Ok(()),
    }
}

/// Evaluates a query tree against one document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
    patterns: &'a HashMap<String, Regex>,
}

impl DocumentEvaluator<'_> {
    fn equals(candidates: &[&Bson], value: &Bson) -> bool {
        let expected = Comparable::from(value);

        if candidates.is_empty() {
            return expected == Comparable::Null;
        }

        candidates.iter().any(|candidate| {
            let actual = Comparable::from(*candidate);
            match &actual {
                Comparable::Array(items) => actual == expected || items.iter().any(|item| *item == expected),
                _ => actual == expected,
            }
        })
    }

    fn compares(candidates: &[&Bson], value: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
        let expected = Comparable::from(value);
        let ordered = |actual: &Comparable| actual.partial_cmp(&expected).is_some_and(&accept);

        candidates.iter().any(|candidate| match Comparable::from(*candidate) {
            Comparable::Array(items) => items.iter().any(&ordered),
            actual => ordered(&actual),
        })
    }

    fn one_of(candidates: &[&Bson], value: &Bson) -> bool {
        match value {
            Bson::Array(values) => values.iter().any(|value| Self::equals(candidates, value)),
            _ => false,
        }
    }

    fn pattern_matches(&self, candidates: &[&Bson], pattern: &Bson) -> bool {
        let Some(regex) = pattern.as_str().and_then(|p| self.patterns.get(p)) else {
            return false;
        };

        candidates.iter().any(|candidate| match candidate {
            Bson::String(s) => regex.is_match(s),
            Bson::Array(items) => items
                .iter()
                .any(|item| item.as_str().is_some_and(|s| regex.is_match(s))),
            _ => false,
        })
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let candidates = path::resolve(self.document, field);

        Ok(match op {
            FieldOp::Eq => Self::equals(&candidates, value),
            FieldOp::Ne => !Self::equals(&candidates, value),
            FieldOp::Gt => Self::compares(&candidates, value, |o| o == Ordering::Greater),
            FieldOp::Gte => Self::compares(&candidates, value, |o| o != Ordering::Less),
            FieldOp::Lt => Self::compares(&candidates, value, |o| o == Ordering::Less),
            FieldOp::Lte => Self::compares(&candidates, value, |o| o != Ordering::Greater),
            FieldOp::In => Self::one_of(&candidates, value),
            FieldOp::NotIn => !Self::one_of(&candidates, value),
            FieldOp::Regex => self.pattern_matches(&candidates, value),
        })
    }
}

/// Orders two documents by a list of sort keys.
pub(crate) fn compare_documents(a: &Document, b: &Document, sort: &[Sort]) -> Ordering {
    for key in sort {
        let left = path::get(a, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);
        let right = path::get(b, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = match key.direction {
            SortDirection::Asc => left.sort_cmp(&right),
            SortDirection::Desc => right.sort_cmp(&left),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}
