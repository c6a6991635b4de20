//! Identifier normalization between the logical `id` field and the backend-native `_id`.
//!
//! Callers address documents by a string `id`. Backends store an ObjectId under `_id`.
//! Every boundary crossing goes through an [`IdCodec`]; the native identifier type never
//! reaches a caller.

use bson::{Bson, oid::ObjectId};
use serde_json::Value;

use crate::{
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// The caller-facing identifier field.
pub const ID_FIELD: &str = "id";

/// The backend-native identifier field.
pub const NATIVE_ID_FIELD: &str = "_id";

/// Converts between the backend-native identifier and its canonical string form.
///
/// Only [`decode`](IdCodec::decode) and [`encode`](IdCodec::encode) are backend-specific;
/// the provided methods apply the normalization rule to documents, filters and field lists.
pub trait IdCodec: Send + Sync {
    /// The backend-native identifier type.
    type Native: Into<Bson>;

    /// Parses a caller-supplied string.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidIdentifier`] if `id` is not a valid identifier.
    fn decode(&self, id: &str) -> DocumentStoreResult<Self::Native>;

    /// Renders a stored identifier for callers. Returns `None` if the stored value is not
    /// of the native identifier type.
    fn encode(&self, native: &Bson) -> Option<String>;

    /// Decodes a JSON value holding a single identifier string.
    fn decode_value(&self, value: &Value) -> DocumentStoreResult<Bson> {
        match value {
            Value::String(id) => Ok(self.decode(id)?.into()),
            other => Err(DocumentStoreError::InvalidIdentifier(format!(
                "expected a string identifier, got {other}"
            ))),
        }
    }

    /// Decodes a BSON value holding a single identifier string.
    fn decode_bson(&self, value: &Bson) -> DocumentStoreResult<Bson> {
        match value {
            Bson::String(id) => Ok(self.decode(id)?.into()),
            other => Err(DocumentStoreError::InvalidIdentifier(format!(
                "expected a string identifier, got {other}"
            ))),
        }
    }

    /// Converts a caller document for storage, moving a caller-supplied `id` into the native
    /// `_id` field.
    ///
    /// The returned document has `_id` first when an `id` was present, followed by the
    /// remaining fields in their original order.
    ///
    /// # Errors
    ///
    /// `InvalidIdentifier` if `id` is not a valid identifier string; `InvalidDocument` if the
    /// caller supplied the native field directly.
    fn inbound_document(&self, document: &Document) -> DocumentStoreResult<bson::Document> {
        if document.contains_key(NATIVE_ID_FIELD) {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "`{NATIVE_ID_FIELD}` is reserved, use `{ID_FIELD}`"
            )));
        }

        let native = document
            .get(ID_FIELD)
            .map(|value| self.decode_value(value))
            .transpose()?;
        let body = document.to_bson()?;

        Ok(match native {
            Some(native) => std::iter::once((NATIVE_ID_FIELD.to_string(), native))
                .chain(body.into_iter().filter(|(k, _)| k != ID_FIELD))
                .collect(),
            None => body,
        })
    }

    /// Rewrites every clause addressing `id` to address `_id` with decoded identifiers.
    fn inbound_filter(&self, expr: &Expr) -> DocumentStoreResult<Expr> {
        IdentifierRewriter { codec: self }.visit_expr(expr)
    }

    /// Maps a caller field name (projection, sort) to its backend name.
    fn inbound_field(&self, field: &str) -> String {
        if field == ID_FIELD {
            NATIVE_ID_FIELD.to_string()
        } else {
            field.to_string()
        }
    }

    /// Converts a stored document for callers, replacing `_id` with its string form under
    /// `id` (placed first).
    fn outbound_document(&self, mut document: bson::Document) -> DocumentStoreResult<Document> {
        let native = document.remove(NATIVE_ID_FIELD);
        let body = Document::from_bson(document)?;

        Ok(match native {
            Some(native) => {
                let id = self.encode(&native).unwrap_or_else(|| match native {
                    Bson::String(s) => s,
                    other => other.to_string(),
                });

                std::iter::once((ID_FIELD.to_string(), Value::String(id)))
                    .chain(body.into_iter().filter(|(k, _)| k != ID_FIELD))
                    .collect()
            }
            None => body,
        })
    }
}

/// [`IdCodec`] for BSON ObjectIds (24 hex characters).
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectIdCodec;

impl IdCodec for ObjectIdCodec {
    type Native = ObjectId;

    fn decode(&self, id: &str) -> DocumentStoreResult<ObjectId> {
        ObjectId::parse_str(id)
            .map_err(|e| DocumentStoreError::InvalidIdentifier(format!("{id}: {e}")))
    }

    fn encode(&self, native: &Bson) -> Option<String> {
        match native {
            Bson::ObjectId(oid) => Some(oid.to_hex()),
            _ => None,
        }
    }
}

/// Walks a compiled query tree and normalizes identifier clauses.
struct IdentifierRewriter<'a, C: IdCodec + ?Sized> {
    codec: &'a C,
}

impl<C: IdCodec + ?Sized> QueryVisitor for IdentifierRewriter<'_, C> {
    type Output = Expr;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Expr, Self::Error> {
        Ok(Expr::And(
            exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        ))
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Expr, Self::Error> {
        Ok(Expr::Or(
            exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        ))
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Expr, Self::Error> {
        if field != ID_FIELD {
            return Ok(Expr::field(field.to_string(), op.clone(), value.clone()));
        }

        let native = match op {
            FieldOp::In | FieldOp::NotIn => match value {
                Bson::Array(ids) => Bson::Array(
                    ids.iter()
                        .map(|id| self.codec.decode_bson(id))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                _ => return Err(DocumentStoreError::InvalidFilter(
                    "set operators require an array value".to_string(),
                )),
            },
            FieldOp::Regex => {
                return Err(DocumentStoreError::InvalidFilter(
                    "pattern operators cannot be applied to id".to_string(),
                ));
            }
            _ => self.codec.decode_bson(value)?,
        };

        Ok(Expr::field(NATIVE_ID_FIELD.to_string(), op.clone(), native))
    }
}
