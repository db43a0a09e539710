//! SQLite backend. Array and document columns are stored as JSON text.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use switchyard_core::{Bundle, McpRecord, NewBundle, NewRoute, Route};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{in_request_order, Store, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS mcp (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    parameters TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE TABLE IF NOT EXISTS bundles (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    mcps TEXT NOT NULL DEFAULT '[]',
    routes TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE TABLE IF NOT EXISTS route (
    id TEXT PRIMARY KEY,
    bundle_id TEXT NOT NULL REFERENCES bundles(id),
    task_description TEXT NOT NULL,
    tool_sequence TEXT NOT NULL DEFAULT '[]',
    notes TEXT NOT NULL DEFAULT '',
    execution_order INTEGER NOT NULL,
    mcp_tools TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (bundle_id, execution_order)
);
";

const BUNDLE_COLUMNS: &str = "id, project_id, description, mcps, routes";
const ROUTE_COLUMNS: &str = "id, bundle_id, task_description, tool_sequence, notes, execution_order, mcp_tools";

/// Single-connection SQLite store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`. `:memory:` opens a private in-memory database.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        if path == ":memory:" {
            return Self::in_memory();
        }

        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Setup(format!("failed to create {}: {}", parent.display(), e)))?;
        }
        let store = Self::init(Connection::open(path)?)?;
        info!("Database initialized at {}", path);
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn)
    }

    /// Number of rows in `route`; lets callers check for writes.
    pub fn route_count(&self) -> Result<i64, StoreError> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM route", [], |r| r.get(0))?))
    }

    /// Number of rows in `bundles`.
    pub fn bundle_count(&self) -> Result<i64, StoreError> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM bundles", [], |r| r.get(0))?))
    }
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn bundle_from_row(row: &Row<'_>) -> rusqlite::Result<Bundle> {
    Ok(Bundle {
        id: row.get(0)?,
        project_id: row.get(1)?,
        description: row.get(2)?,
        mcps: json_column(row, 3)?,
        routes: json_column(row, 4)?,
    })
}

fn route_from_row(row: &Row<'_>) -> rusqlite::Result<Route> {
    Ok(Route {
        id: row.get(0)?,
        bundle_id: row.get(1)?,
        task_description: row.get(2)?,
        tool_sequence: json_column(row, 3)?,
        notes: row.get(4)?,
        execution_order: row.get(5)?,
        mcp_tools: json_column(row, 6)?,
    })
}

fn get_bundle(conn: &Connection, id: &str) -> Result<Option<Bundle>, StoreError> {
    let sql = format!("SELECT {BUNDLE_COLUMNS} FROM bundles WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], bundle_from_row).optional()?)
}

#[async_trait]
impl Store for SqliteStore {
    async fn mcps_by_ids(&self, ids: &[String]) -> Result<Vec<McpRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.with_conn(|conn| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!("SELECT id, name, parameters FROM mcp WHERE id IN ({placeholders})");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |row| {
                Ok(McpRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    parameters: json_column(row, 2)?,
                })
            })?;
            let records = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })?;

        Ok(in_request_order(ids, records))
    }

    async fn insert_mcp(&self, name: &str, parameters: &serde_json::Value) -> Result<McpRecord, StoreError> {
        let record = McpRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            parameters: parameters.clone(),
        };
        let parameters = serde_json::to_string(parameters)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO mcp (id, name, parameters) VALUES (?1, ?2, ?3)",
                params![record.id, record.name, parameters],
            )?;
            Ok(())
        })?;
        debug!(id = %record.id, name, "Inserted mcp");
        Ok(record)
    }

    async fn insert_bundle(&self, bundle: &NewBundle) -> Result<Bundle, StoreError> {
        let id = Uuid::new_v4().to_string();
        let mcps = serde_json::to_string(&bundle.mcps)?;
        let routes = serde_json::to_string(&bundle.routes)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO bundles (id, project_id, description, mcps, routes) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, bundle.project_id, bundle.description, mcps, routes],
            )?;
            get_bundle(conn, &id)?.ok_or(StoreError::EmptyInsert("bundles"))
        })
    }

    async fn get_bundle(&self, id: &str) -> Result<Option<Bundle>, StoreError> {
        self.with_conn(|conn| get_bundle(conn, id))
    }

    async fn set_bundle_routes(&self, bundle_id: &str, route_ids: &[String]) -> Result<(), StoreError> {
        let routes = serde_json::to_string(route_ids)?;
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE bundles SET routes = ?1 WHERE id = ?2",
                params![routes, bundle_id],
            )?;
            Ok(())
        })
    }

    async fn insert_route(&self, route: &NewRoute) -> Result<Route, StoreError> {
        let id = Uuid::new_v4().to_string();
        let tool_sequence = serde_json::to_string(&route.tool_sequence)?;
        let mcp_tools = serde_json::to_string(&route.mcp_tools)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO route (id, bundle_id, task_description, tool_sequence, notes, execution_order, mcp_tools)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    route.bundle_id,
                    route.task_description,
                    tool_sequence,
                    route.notes,
                    route.execution_order,
                    mcp_tools
                ],
            )?;
            Ok(())
        })?;

        Ok(Route {
            id,
            bundle_id: route.bundle_id.clone(),
            task_description: route.task_description.clone(),
            tool_sequence: route.tool_sequence.clone(),
            notes: route.notes.clone(),
            execution_order: route.execution_order,
            mcp_tools: route.mcp_tools.clone(),
        })
    }

    async fn routes_for_bundle(&self, bundle_id: &str) -> Result<Vec<Route>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {ROUTE_COLUMNS} FROM route WHERE bundle_id = ?1 ORDER BY execution_order ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![bundle_id], route_from_row)?;
            let routes = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(routes)
        })
    }
}
