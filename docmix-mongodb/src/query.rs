//! Query translation from compiled query trees to MongoDB query syntax.

use bson::{Bson, Document, doc};

use docmix_core::{
    error::DocumentStoreError,
    query::{Expr, FieldOp, QueryVisitor, Sort},
};

/// Translates compiled query trees into MongoDB filter documents.
///
/// An empty conjunction renders as `{}`; every field clause renders in the explicit
/// operator form `{ field: { "$op": value } }`.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    fn visit_all(&mut self, exprs: &[Expr]) -> Result<Vec<Document>, DocumentStoreError> {
        exprs.iter().map(|expr| self.visit_expr(expr)).collect()
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        match exprs {
            [] => Ok(Document::new()),
            [single] => self.visit_expr(single),
            _ => Ok(doc! { "$and": self.visit_all(exprs)? }),
        }
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Err(DocumentStoreError::InvalidFilter("empty OR group".to_string()));
        }

        Ok(doc! { "$or": self.visit_all(exprs)? })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        if matches!(op, FieldOp::Regex) && !matches!(value, Bson::String(_)) {
            return Err(DocumentStoreError::InvalidFilter(format!(
                "pattern for `{field}` must be a string"
            )));
        }

        let mut condition = Document::new();
        condition.insert(op.native_name(), value.clone());

        let mut clause = Document::new();
        clause.insert(field, condition);

        Ok(clause)
    }
}

/// Renders sort keys as a MongoDB sort document.
pub(crate) fn sort_document(sort: &[Sort]) -> Document {
    sort.iter()
        .map(|key| (key.field.clone(), Bson::Int32(key.direction.as_i32())))
        .collect()
}

/// Renders a field list as an inclusion projection.
pub(crate) fn projection_document(fields: &[String]) -> Document {
    fields
        .iter()
        .map(|field| (field.clone(), Bson::Int32(1)))
        .collect()
}
