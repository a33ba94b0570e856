#![forbid(unsafe_code)]

mod attributes;
mod error;
mod listing;
mod nodes;
mod policy;
mod requests;
mod statistics;
mod types;
mod versions;

pub use error::StoreError;
pub use requests::*;
pub use types::*;

use log::debug;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sentinel node: the tree root. It is its own parent and owns the empty
/// path; it is installed with the schema and never removed.
pub const ROOT_NODE: i64 = 0;

const DB_FILE: &str = "metatree.db";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE);
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;

        install_schema(&conn)?;
        debug!("opened metadata store at {}", db_path.display());

        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS nodes (
          node INTEGER PRIMARY KEY,
          parent INTEGER NOT NULL DEFAULT 0,
          path TEXT NOT NULL DEFAULT '',
          FOREIGN KEY(parent) REFERENCES nodes(node) ON DELETE CASCADE
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_path ON nodes(path);

        CREATE TABLE IF NOT EXISTS versions (
          serial INTEGER PRIMARY KEY AUTOINCREMENT,
          node INTEGER NOT NULL,
          hash TEXT NOT NULL DEFAULT '',
          size INTEGER NOT NULL DEFAULT 0,
          source INTEGER,
          mtime REAL NOT NULL,
          muser TEXT NOT NULL DEFAULT '',
          cluster INTEGER NOT NULL DEFAULT 0,
          FOREIGN KEY(node) REFERENCES nodes(node) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_versions_node_mtime ON versions(node, mtime);

        CREATE TABLE IF NOT EXISTS attributes (
          serial INTEGER NOT NULL,
          key TEXT NOT NULL,
          value TEXT NOT NULL,
          PRIMARY KEY(serial, key),
          FOREIGN KEY(serial) REFERENCES versions(serial) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS statistics (
          node INTEGER NOT NULL,
          cluster INTEGER NOT NULL DEFAULT 0,
          population INTEGER NOT NULL DEFAULT 0,
          size INTEGER NOT NULL DEFAULT 0,
          mtime REAL NOT NULL,
          PRIMARY KEY(node, cluster),
          FOREIGN KEY(node) REFERENCES nodes(node) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS policy (
          node INTEGER NOT NULL,
          key TEXT NOT NULL,
          value TEXT NOT NULL,
          PRIMARY KEY(node, key),
          FOREIGN KEY(node) REFERENCES nodes(node) ON DELETE CASCADE
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO nodes(node, parent, path) VALUES (?1, ?1, '')",
        params![ROOT_NODE],
    )?;

    Ok(())
}

fn node_properties_tx(
    tx: &Transaction<'_>,
    node: i64,
) -> Result<Option<NodeProperties>, StoreError> {
    Ok(tx
        .query_row(
            "SELECT parent, path FROM nodes WHERE node = ?1",
            params![node],
            |row| {
                Ok(NodeProperties {
                    parent: row.get(0)?,
                    path: row.get(1)?,
                })
            },
        )
        .optional()?)
}

fn constraint_or_sql(err: rusqlite::Error, message: &'static str) -> StoreError {
    if is_constraint_violation(&err) {
        return StoreError::Constraint(message);
    }
    StoreError::Sql(err)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("FOREIGN KEY constraint failed")
                })
        }
        _ => false,
    }
}

fn to_sqlite_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidInput("numeric overflow"))
}

// Escape %, _ and the escape character itself so a path can be used as a
// literal prefix in LIKE ... ESCAPE '\'.
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn now_secs() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs_f64(),
        Err(_) => 0.0,
    }
}
