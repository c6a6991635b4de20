//! Store configuration.
//!
//! [`StoreConfig`] is plain serde data; where it comes from (a file, the environment, code)
//! is up to the application.
//!
//! ```ignore
//! let config: StoreConfig = serde_json::from_str(r#"{ "db_name": "mydb_test" }"#)?;
//! assert_eq!(config.default_limit, 25);
//! ```

use serde::{Deserialize, Serialize};

use crate::page::DEFAULT_LIMIT;

/// Which compiled clauses `delete` honors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteScope {
    /// Only the first clause of the compiled filter selects documents to delete; any
    /// further keys are ignored.
    #[default]
    FirstClause,
    /// The whole filter is honored, as for `update` and `find`.
    AllClauses,
}

/// Client settings handed through to network backends.
///
/// Every field is optional; an unset field leaves the driver's own default (or whatever
/// the connection string says) in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Name the client reports to the server.
    pub app_name: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub server_selection_timeout_ms: Option<u64>,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

/// Configuration for a [`DocumentStore`](crate::store::DocumentStore) and its backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database the backend binds to.
    pub db_name: String,
    /// Connection string for network backends.
    pub connection_string: String,
    /// Page size used by `find` when the caller gives none.
    pub default_limit: u64,
    /// Which filter clauses `delete` honors.
    pub delete_scope: DeleteScope,
    /// Client settings applied on top of the connection string.
    pub options: ConnectionOptions,
}

impl StoreConfig {
    pub fn new(db_name: impl Into<String>) -> Self {
        Self { db_name: db_name.into(), ..Self::default() }
    }

    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = connection_string.into();
        self
    }

    pub fn with_default_limit(mut self, limit: u64) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_delete_scope(mut self, scope: DeleteScope) -> Self {
        self.delete_scope = scope;
        self
    }

    pub fn with_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_name: "docmix".to_string(),
            connection_string: "mongodb://127.0.0.1:27017".to_string(),
            default_limit: DEFAULT_LIMIT,
            delete_scope: DeleteScope::default(),
            options: ConnectionOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{ "db_name": "mydb_test" }"#).unwrap();

        assert_eq!(config.db_name, "mydb_test");
        assert_eq!(config.default_limit, 25);
        assert_eq!(config.delete_scope, DeleteScope::FirstClause);
        assert_eq!(config.options, ConnectionOptions::default());
    }

    #[test]
    fn delete_scope_uses_snake_case() {
        let config: StoreConfig =
            serde_json::from_str(r#"{ "delete_scope": "all_clauses", "default_limit": 10 }"#).unwrap();

        assert_eq!(config.delete_scope, DeleteScope::AllClauses);
        assert_eq!(config.default_limit, 10);
    }

    #[test]
    fn client_options_pass_through() {
        let config: StoreConfig = serde_json::from_str(
            r#"{ "db_name": "mydb_test", "options": { "app_name": "reports", "connect_timeout_ms": 1500 } }"#,
        )
        .unwrap();

        assert_eq!(config.options.app_name.as_deref(), Some("reports"));
        assert_eq!(config.options.connect_timeout_ms, Some(1500));
        assert_eq!(config.options.max_pool_size, None);
    }
}
