//! Compilation of filter expressions into query trees.
//!
//! A filter expression is a mapping from filter keys to values:
//!
//! - `"title": "test1"` matches documents whose `title` equals `"test1"`.
//! - `"count.max__gte": 6` applies an operator. The operator is the token after the last
//!   `__` and is one of `eq`, `not`, `gt`, `gte`, `lt`, `lte`, `in`, `!in`, `wildcard`,
//!   `prefix` (case-insensitive).
//! - `"any": [{"a__gte": 1}, {"b": 2}]` is an OR group: a bare key whose value is an array
//!   of single-entry mappings. The key itself is ignored.
//!
//! Clauses are AND-ed together in input order. An empty expression matches everything.
//!
//! ```ignore
//! use docmix::filter::compile;
//! use serde_json::json;
//!
//! let filter = json!({ "count.max__gte": 6, "status__!in": ["a", "b"] });
//! let expr = compile(filter.as_object().unwrap())?;
//! ```

use std::{fmt, str::FromStr};

use bson::Bson;
use serde_json::Value;

use crate::{
    document::{FilterExpression, value_to_bson},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp},
};

/// Separator between a field path and its operator token.
pub const OPERATOR_DELIMITER: &str = "__";

/// Operator tokens accepted after the delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    In,
    NotIn,
    Not,
    Gt,
    Gte,
    Lt,
    Lte,
    Wildcard,
    Prefix,
}

impl Operator {
    /// The query tree operator this token compiles to.
    pub fn field_op(self) -> FieldOp {
        match self {
            Operator::Eq => FieldOp::Eq,
            Operator::In => FieldOp::In,
            Operator::NotIn => FieldOp::NotIn,
            Operator::Not => FieldOp::Ne,
            Operator::Gt => FieldOp::Gt,
            Operator::Gte => FieldOp::Gte,
            Operator::Lt => FieldOp::Lt,
            Operator::Lte => FieldOp::Lte,
            Operator::Wildcard | Operator::Prefix => FieldOp::Regex,
        }
    }

    /// Applies the operator's value transform and checks the value's shape.
    pub fn transform(self, value: Bson) -> DocumentStoreResult<Bson> {
        match (self, value) {
            (Operator::In | Operator::NotIn, value @ Bson::Array(_)) => Ok(value),
            (Operator::In | Operator::NotIn, other) => Err(DocumentStoreError::InvalidFilter(
                format!("operator `{self}` requires an array value, got {other}"),
            )),
            (Operator::Wildcard, Bson::String(pattern)) => Ok(Bson::String(pattern.replace('?', "."))),
            (Operator::Prefix, Bson::String(pattern)) => Ok(Bson::String(format!("{pattern}*"))),
            (Operator::Wildcard | Operator::Prefix, other) => Err(DocumentStoreError::InvalidFilter(
                format!("operator `{self}` requires a string value, got {other}"),
            )),
            (_, value) => Ok(value),
        }
    }
}

impl FromStr for Operator {
    type Err = DocumentStoreError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Ok(match token.to_ascii_lowercase().as_str() {
            "eq" => Operator::Eq,
            "in" => Operator::In,
            "!in" => Operator::NotIn,
            "not" => Operator::Not,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "wildcard" => Operator::Wildcard,
            "prefix" => Operator::Prefix,
            _ => return Err(DocumentStoreError::UnknownOperator(token.to_string())),
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::Eq => "eq",
            Operator::In => "in",
            Operator::NotIn => "!in",
            Operator::Not => "not",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Wildcard => "wildcard",
            Operator::Prefix => "prefix",
        })
    }
}

/// Splits a filter key into its field path and operator.
///
/// Keys without the delimiter are equality on the whole key. Otherwise the key is split on
/// the last delimiter, so `a__b__gte` addresses field `a__b`.
pub fn parse_key(key: &str) -> DocumentStoreResult<(&str, Operator)> {
    match key.rsplit_once(OPERATOR_DELIMITER) {
        Some((field, token)) => {
            let operator = token.parse::<Operator>()?;

            if field.is_empty() {
                return Err(DocumentStoreError::InvalidFilter(format!(
                    "filter key `{key}` has no field path"
                )));
            }

            Ok((field, operator))
        }
        None => Ok((key, Operator::Eq)),
    }
}

/// Compiles a filter expression into a query tree.
///
/// Returns an [`Expr::And`] whose clauses follow the key order of `filter`.
///
/// # Errors
///
/// - [`DocumentStoreError::UnknownOperator`] for an unrecognized operator token.
/// - [`DocumentStoreError::InvalidFilter`] for malformed OR groups or values of the wrong
///   shape for their operator.
pub fn compile(filter: &FilterExpression) -> DocumentStoreResult<Expr> {
    Ok(Expr::And(
        filter
            .iter()
            .map(|(key, value)| compile_entry(key, value))
            .collect::<DocumentStoreResult<Vec<_>>>()?,
    ))
}

/// Compiles an optional filter expression; `None` matches everything.
pub fn compile_opt(filter: Option<&FilterExpression>) -> DocumentStoreResult<Expr> {
    match filter {
        Some(filter) => compile(filter),
        None => Ok(Expr::match_all()),
    }
}

fn compile_entry(key: &str, value: &Value) -> DocumentStoreResult<Expr> {
    match value {
        Value::Array(entries) if !key.contains(OPERATOR_DELIMITER) && is_or_group(entries) => {
            Ok(Expr::Or(
                entries
                    .iter()
                    .map(compile_or_entry)
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
            ))
        }
        _ => compile_clause(key, value),
    }
}

fn is_or_group(entries: &[Value]) -> bool {
    entries.iter().any(Value::is_object)
}

fn compile_or_entry(entry: &Value) -> DocumentStoreResult<Expr> {
    match entry {
        Value::Object(map) if map.len() == 1 => {
            let (key, value) = map.iter().next().ok_or_else(|| {
                DocumentStoreError::InvalidFilter("empty OR group entry".to_string())
            })?;
            compile_clause(key, value)
        }
        Value::Object(map) => Err(DocumentStoreError::InvalidFilter(format!(
            "OR group entries must have exactly one key, found {}",
            map.len()
        ))),
        other => Err(DocumentStoreError::InvalidFilter(format!(
            "OR group entries must be mappings, found {other}"
        ))),
    }
}

fn compile_clause(key: &str, value: &Value) -> DocumentStoreResult<Expr> {
    let (field, operator) = parse_key(key)?;

    Ok(Expr::field(
        field.to_string(),
        operator.field_op(),
        operator.transform(value_to_bson(value)?)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter(value: Value) -> FilterExpression {
        match value {
            Value::Object(map) => map,
            _ => panic!("filter must be an object"),
        }
    }

    fn clauses(value: Value) -> Vec<Expr> {
        compile(&filter(value)).unwrap().into_clauses()
    }

    fn as_i64(value: &Bson) -> i64 {
        match value {
            Bson::Int32(v) => *v as i64,
            Bson::Int64(v) => *v,
            other => panic!("not an integer: {other}"),
        }
    }

    #[test]
    fn bare_key_compiles_to_equality() {
        let clauses = clauses(json!({ "title": "test1" }));

        assert_eq!(
            clauses,
            vec![Expr::field("title".into(), FieldOp::Eq, Bson::String("test1".into()))]
        );
    }

    #[test]
    fn comparison_operators_keep_dotted_paths() {
        let clauses = clauses(json!({ "count.max__gte": 6, "count.min__LT": 2 }));

        match &clauses[..] {
            [
                Expr::Field { field: f1, op: FieldOp::Gte, value: v1 },
                Expr::Field { field: f2, op: FieldOp::Lt, value: v2 },
            ] => {
                assert_eq!(f1, "count.max");
                assert_eq!(as_i64(v1), 6);
                assert_eq!(f2, "count.min");
                assert_eq!(as_i64(v2), 2);
            }
            other => panic!("unexpected clauses: {other:?}"),
        }
    }

    #[test]
    fn operator_table() {
        let cases = [
            ("f__eq", json!(1), FieldOp::Eq),
            ("f__not", json!(1), FieldOp::Ne),
            ("f__gt", json!(1), FieldOp::Gt),
            ("f__gte", json!(1), FieldOp::Gte),
            ("f__lt", json!(1), FieldOp::Lt),
            ("f__lte", json!(1), FieldOp::Lte),
            ("f__in", json!([1, 2]), FieldOp::In),
            ("f__!in", json!([1, 2]), FieldOp::NotIn),
            ("f__wildcard", json!("a?"), FieldOp::Regex),
            ("f__prefix", json!("a"), FieldOp::Regex),
        ];

        for (key, value, expected) in cases {
            let mut map = FilterExpression::new();
            map.insert(key.to_string(), value);

            match &compile(&map).unwrap().into_clauses()[..] {
                [Expr::Field { field, op, .. }] => {
                    assert_eq!(field, "f", "{key}");
                    assert_eq!(op, &expected, "{key}");
                }
                other => panic!("{key}: unexpected clauses {other:?}"),
            }
        }
    }

    #[test]
    fn not_in_keeps_the_value_set() {
        let clauses = clauses(json!({ "status__!in": ["a", "b"] }));

        assert_eq!(
            clauses,
            vec![Expr::field(
                "status".into(),
                FieldOp::NotIn,
                Bson::Array(vec![Bson::String("a".into()), Bson::String("b".into())]),
            )]
        );
    }

    #[test]
    fn pattern_operators_transform_their_values() {
        let clauses = clauses(json!({ "name__wildcard": "te?t", "title__prefix": "tes" }));

        assert_eq!(
            clauses,
            vec![
                Expr::field("name".into(), FieldOp::Regex, Bson::String("te.t".into())),
                Expr::field("title".into(), FieldOp::Regex, Bson::String("tes*".into())),
            ]
        );
    }

    #[test]
    fn key_is_split_on_the_last_delimiter() {
        let clauses = clauses(json!({ "meta__raw__gte": 1 }));

        assert!(matches!(&clauses[0], Expr::Field { field, op: FieldOp::Gte, .. } if field == "meta__raw"));
    }

    #[test]
    fn sequence_of_mappings_is_an_or_group() {
        let clauses = clauses(json!({
            "": [{ "count.max__gte": 6 }, { "count.min__gte": 2 }],
            "title": "test4",
        }));

        assert_eq!(clauses.len(), 2);
        match &clauses[0] {
            Expr::Or(members) => {
                assert_eq!(members.len(), 2);
                assert!(matches!(&members[0], Expr::Field { field, op: FieldOp::Gte, .. } if field == "count.max"));
                assert!(matches!(&members[1], Expr::Field { field, op: FieldOp::Gte, .. } if field == "count.min"));
            }
            other => panic!("expected OR group, got {other:?}"),
        }
        assert!(matches!(&clauses[1], Expr::Field { field, op: FieldOp::Eq, .. } if field == "title"));
    }

    #[test]
    fn or_group_members_do_not_nest() {
        let clauses = clauses(json!({ "any": [{ "tags": [{ "a": 1 }] }] }));

        let Expr::Or(members) = &clauses[0] else { panic!("expected OR group") };
        assert!(matches!(&members[0], Expr::Field { field, op: FieldOp::Eq, value: Bson::Array(_) } if field == "tags"));
    }

    #[test]
    fn sequence_of_scalars_is_equality() {
        let clauses = clauses(json!({ "tags": ["a", "b"] }));

        assert!(matches!(&clauses[0], Expr::Field { field, op: FieldOp::Eq, value: Bson::Array(_) } if field == "tags"));
    }

    #[test]
    fn empty_expression_matches_everything() {
        assert!(compile(&FilterExpression::new()).unwrap().is_match_all());
        assert!(compile_opt(None).unwrap().is_match_all());
    }

    #[test]
    fn compilation_is_deterministic() {
        let input = filter(json!({
            "a__gte": 1,
            "b": "x",
            "or": [{ "c__in": [1, 2] }, { "d__wildcard": "?" }],
        }));

        assert_eq!(compile(&input).unwrap(), compile(&input).unwrap());
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = compile(&filter(json!({ "count__between": [1, 2] }))).unwrap_err();
        assert!(matches!(err, DocumentStoreError::UnknownOperator(token) if token == "between"));

        let err = compile(&filter(json!({ "count__": 1 }))).unwrap_err();
        assert!(matches!(err, DocumentStoreError::UnknownOperator(_)));
    }

    #[test]
    fn malformed_filters_are_rejected() {
        let cases = [
            json!({ "__gte": 1 }),
            json!({ "or": [{ "a": 1, "b": 2 }] }),
            json!({ "or": [{}] }),
            json!({ "or": [{ "a": 1 }, 3] }),
            json!({ "f__in": 1 }),
            json!({ "f__wildcard": 1 }),
        ];

        for case in cases {
            assert!(
                matches!(compile(&filter(case.clone())), Err(DocumentStoreError::InvalidFilter(_))),
                "{case}"
            );
        }
    }

    #[test]
    fn operators_inside_or_groups_are_validated() {
        let err = compile(&filter(json!({ "or": [{ "a__near": 1 }] }))).unwrap_err();
        assert!(matches!(err, DocumentStoreError::UnknownOperator(_)));
    }
}
