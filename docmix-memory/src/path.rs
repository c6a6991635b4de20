//! Dotted field paths over BSON documents.
//!
//! `count.max` addresses field `max` of the embedded document `count`. When a path crosses
//! an array of documents, every element is followed, as MongoDB does for queries.

use bson::{Bson, Document};

use docmix_core::error::{DocumentStoreError, DocumentStoreResult};

/// Collects every value reachable at `path`. Empty when the path does not exist.
pub(crate) fn resolve<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let mut found = Vec::new();
    collect(document, path, &mut found);
    found
}

fn collect<'a>(document: &'a Document, path: &str, found: &mut Vec<&'a Bson>) {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    let Some(value) = document.get(head) else {
        return;
    };

    match (value, rest) {
        (value, None) => found.push(value),
        (Bson::Document(inner), Some(rest)) => collect(inner, rest, found),
        (Bson::Array(items), Some(rest)) => {
            for item in items {
                if let Bson::Document(inner) = item {
                    collect(inner, rest, found);
                }
            }
        }
        _ => {}
    }
}

/// Returns the single value at `path`, following embedded documents only.
pub(crate) fn get<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    match path.split_once('.') {
        Some((head, rest)) => match document.get(head)? {
            Bson::Document(inner) => get(inner, rest),
            _ => None,
        },
        None => document.get(path),
    }
}

/// Sets the value at `path`, creating embedded documents as needed.
///
/// # Returns
///
/// `true` if the stored value changed.
///
/// # Errors
///
/// `InvalidDocument` if an intermediate path element exists but is not a document.
pub(crate) fn set(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<bool> {
    match path.split_once('.') {
        Some((head, rest)) => {
            if !document.contains_key(head) {
                document.insert(head, Document::new());
            }

            match document.get_mut(head) {
                Some(Bson::Document(inner)) => set(inner, rest, value),
                _ => Err(DocumentStoreError::InvalidDocument(format!(
                    "cannot create field `{rest}` inside non-document field `{head}`"
                ))),
            }
        }
        None => {
            if document.get(path) == Some(&value) {
                return Ok(false);
            }

            document.insert(path, value);
            Ok(true)
        }
    }
}

/// Keeps only the fields named by `paths` (plus `_id`), in the document's own field order.
pub(crate) fn project(document: &Document, paths: &[String]) -> Document {
    let mut projected = Document::new();

    for (key, value) in document {
        if key == "_id" || paths.iter().any(|path| path == key) {
            projected.insert(key.clone(), value.clone());
            continue;
        }

        let prefix = format!("{key}.");
        let nested = paths
            .iter()
            .filter_map(|path| path.strip_prefix(&prefix).map(str::to_string))
            .collect::<Vec<_>>();

        if nested.is_empty() {
            continue;
        }

        if let Bson::Document(inner) = value {
            let inner = project_nested(inner, &nested);
            if !inner.is_empty() {
                projected.insert(key.clone(), inner);
            }
        }
    }

    projected
}

fn project_nested(document: &Document, paths: &[String]) -> Document {
    let mut projected = project(document, paths);
    // `_id` is only implied at the top level.
    if !paths.iter().any(|path| path == "_id") {
        projected.remove("_id");
    }
    projected
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn resolve_follows_documents_and_arrays() {
        let document = doc! {
            "count": { "min": 1, "max": 7 },
            "items": [{ "sku": "a" }, { "sku": "b" }, 3],
        };

        assert_eq!(resolve(&document, "count.max"), vec![&Bson::Int32(7)]);
        assert_eq!(
            resolve(&document, "items.sku"),
            vec![&Bson::String("a".into()), &Bson::String("b".into())]
        );
        assert!(resolve(&document, "count.avg").is_empty());
        assert!(resolve(&document, "missing.path").is_empty());
    }

    #[test]
    fn set_creates_intermediate_documents_and_reports_changes() {
        let mut document = doc! { "title": "test" };

        assert!(set(&mut document, "count.max", Bson::Int32(2)).unwrap());
        assert_eq!(document, doc! { "title": "test", "count": { "max": 2 } });

        assert!(!set(&mut document, "count.max", Bson::Int32(2)).unwrap());
        assert!(set(&mut document, "title.inner", Bson::Null).is_err());
    }

    #[test]
    fn project_keeps_requested_paths_and_id() {
        let document = doc! {
            "_id": 1,
            "title": "test",
            "count": { "min": 1, "max": 7 },
            "balance": 10.5,
        };

        assert_eq!(
            project(&document, &["count.max".to_string(), "title".to_string()]),
            doc! { "_id": 1, "title": "test", "count": { "max": 7 } }
        );
    }
}
