//! DuckDB executor
//!
//! Binds the `Executor` contract to an embedded DuckDB database. A single
//! connection is kept behind a mutex; every cursor runs on its own clone of it,
//! so an open cursor never blocks metadata lookups or other statements.

mod cursor;
pub mod schema;
pub mod sql_types;

pub use cursor::DuckdbCursor;

use std::path::Path;
use std::sync::LazyLock;

use duckdb::{AccessMode, Config, Connection};
use parking_lot::Mutex;
use regex::Regex;

use crate::data::error::DataError;
use crate::data::executor::{CommandTimeout, Executor, RowCursor};
use crate::data::types::{CellValue, QueryParam};
use crate::utils::sql::bind_positional;

/// Planner cardinality in `EXPLAIN` output, across DuckDB's rendering styles
static PLAN_ESTIMATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:~\s*([\d,]+)\s+rows?\b|\bEC:\s*([\d,]+)|Estimated\s+Cardinality\D{0,8}([\d,]+))")
        .expect("Invalid regex")
});

pub struct DuckdbExecutor {
    conn: Mutex<Connection>,
}

impl DuckdbExecutor {
    /// Open an existing database read-only
    pub fn open_read_only(path: &Path) -> Result<Self, DataError> {
        if !path.exists() {
            return Err(DataError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "database not found: {} (run `tracequery system init` to create one)",
                    path.display()
                ),
            )));
        }
        let config = Config::default().access_mode(AccessMode::ReadOnly)?;
        let conn = Connection::open_with_flags(path, config)?;
        tracing::debug!(path = %path.display(), "DuckDB opened read-only");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open (or create) a database and apply the schema
    pub fn create(path: &Path) -> Result<Self, DataError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(schema::SCHEMA)?;
        tracing::debug!(path = %path.display(), "DuckDB schema applied");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database with the schema applied (test utility only)
    #[cfg(test)]
    pub fn in_memory() -> Self {
        let conn = Connection::open_in_memory().expect("open in-memory DuckDB");
        conn.execute_batch(schema::SCHEMA).expect("apply schema");
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run a batch of statements on the shared connection (test utility only)
    #[cfg(test)]
    pub fn execute_batch(&self, sql: &str) -> Result<(), DataError> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    fn clone_connection(&self) -> Result<Connection, DataError> {
        Ok(self.conn.lock().try_clone()?)
    }
}

impl Executor for DuckdbExecutor {
    fn open_cursor(
        &self,
        sql: &str,
        params: &[QueryParam],
        timeout: CommandTimeout,
    ) -> Result<Box<dyn RowCursor>, DataError> {
        let (text, bound) = bind_positional(sql, params)?;
        let bound = bound.into_iter().cloned().collect();
        let cursor = DuckdbCursor::open(self.clone_connection()?, text, bound, timeout)?;
        Ok(Box::new(cursor))
    }

    fn table_row_count(
        &self,
        table: &str,
        timeout: CommandTimeout,
    ) -> Result<Option<u64>, DataError> {
        let bare = table.rsplit('.').next().unwrap_or(table);
        let params = [QueryParam::text("@table", bare)];
        let mut cursor = self.open_cursor(
            "SELECT estimated_size FROM duckdb_tables() WHERE upper(table_name) = upper(@table)",
            &params,
            timeout,
        )?;
        if !cursor.advance()? {
            return Ok(None);
        }
        Ok(cursor.value(0).as_u64())
    }

    fn plan_row_estimate(
        &self,
        sql: &str,
        params: &[QueryParam],
        timeout: CommandTimeout,
    ) -> Result<Option<u64>, DataError> {
        let plan = self.execute_tabular(&format!("EXPLAIN {}", sql), params, timeout)?;
        let text = plan
            .rows
            .iter()
            .flatten()
            .filter_map(|cell| match cell {
                CellValue::Text(s) => Some(s.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(parse_plan_estimate(&text))
    }
}

/// First cardinality estimate in rendered plan text. The root operator is
/// rendered first, so this is the estimate for the whole statement.
pub fn parse_plan_estimate(plan: &str) -> Option<u64> {
    let caps = PLAN_ESTIMATE.captures(plan)?;
    let digits = caps
        .iter()
        .skip(1)
        .flatten()
        .next()?
        .as_str()
        .replace(',', "");
    digits.parse().ok()
}
