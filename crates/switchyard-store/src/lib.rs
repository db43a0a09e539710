//! Persistence for tool-server records, bundles, and routes.
//!
//! - [`Store`] — Async interface the HTTP services depend on
//! - [`SupabaseStore`] — Hosted Postgres through PostgREST
//! - [`SqliteStore`] — Embedded SQLite file (or in-memory for tests)
//!
//! ```rust,ignore
//! let settings = switchyard_config::Settings::from_env()?;
//! let store = switchyard_store::connect(&settings.database)?;
//! let bundle = store.get_bundle("42").await?;
//! ```

mod sqlite;
mod supabase;

pub use sqlite::SqliteStore;
pub use supabase::SupabaseStore;

use std::sync::Arc;

use async_trait::async_trait;
use switchyard_config::DatabaseConfig;
use switchyard_core::{Bundle, McpRecord, NewBundle, NewRoute, Route};
use thiserror::Error;

/// Errors raised by store backends.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{table} request failed with status {status}: {body}")]
    Api {
        table: &'static str,
        status: u16,
        body: String,
    },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Failed to prepare database: {0}")]
    Setup(String),

    #[error("Database connection lock poisoned")]
    Poisoned,

    /// A write returned no row.
    #[error("Insert into {0} returned no row")]
    EmptyInsert(&'static str),
}

/// Record storage used by the bundler and executor.
///
/// Tables: `mcp` (read-only to the services), `bundles`, `route`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetches MCP records whose id is in `ids`, in the order the ids are given.
    /// Unknown ids are skipped.
    async fn mcps_by_ids(&self, ids: &[String]) -> Result<Vec<McpRecord>, StoreError>;

    /// Registers a tool server. Not reachable over HTTP; used for seeding.
    async fn insert_mcp(&self, name: &str, parameters: &serde_json::Value) -> Result<McpRecord, StoreError>;

    async fn insert_bundle(&self, bundle: &NewBundle) -> Result<Bundle, StoreError>;

    async fn get_bundle(&self, id: &str) -> Result<Option<Bundle>, StoreError>;

    /// Replaces the bundle's `routes` array.
    async fn set_bundle_routes(&self, bundle_id: &str, route_ids: &[String]) -> Result<(), StoreError>;

    async fn insert_route(&self, route: &NewRoute) -> Result<Route, StoreError>;

    /// All routes of a bundle, ascending by `execution_order`.
    async fn routes_for_bundle(&self, bundle_id: &str) -> Result<Vec<Route>, StoreError>;
}

/// Opens the backend selected by `config`.
pub fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Store>, StoreError> {
    match config {
        DatabaseConfig::Supabase { url, api_key } => Ok(Arc::new(SupabaseStore::new(url, api_key))),
        DatabaseConfig::Sqlite { path } => Ok(Arc::new(SqliteStore::open(path)?)),
    }
}

/// Reorders `records` to follow `ids`, dropping duplicates and unknown ids.
pub(crate) fn in_request_order(ids: &[String], mut records: Vec<McpRecord>) -> Vec<McpRecord> {
    let mut ordered = Vec::with_capacity(records.len());
    for id in ids {
        if let Some(pos) = records.iter().position(|r| &r.id == id) {
            ordered.push(records.swap_remove(pos));
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mcp(id: &str) -> McpRecord {
        McpRecord {
            id: id.into(),
            name: format!("server-{id}"),
            parameters: json!({}),
        }
    }

    #[test]
    fn request_order_wins() {
        let ids = vec!["3".to_string(), "1".to_string(), "9".to_string(), "3".to_string()];
        let ordered = in_request_order(&ids, vec![mcp("1"), mcp("2"), mcp("3")]);
        let got: Vec<_> = ordered.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(got, vec!["3", "1"]);
    }
}
