//! Database executor traits
//!
//! The query components never talk to an engine directly. They go through
//! `Executor`, which binds named parameters, and read results through a
//! forward-only `RowCursor`.
//!
//! ## Ownership
//!
//! A cursor owns everything it needs to produce rows, including its
//! connection. Dropping (closing) the cursor releases that connection.

use std::time::Duration;

use super::error::DataError;
use super::types::{CellValue, QueryParam, Table};

/// Maximum time a single command may wait on the database.
///
/// Passed by value into every executor call; long-running operations derive
/// a longer value locally instead of mutating shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTimeout(Duration);

impl CommandTimeout {
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub const fn duration(&self) -> Duration {
        self.0
    }

    pub const fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }

    /// The longer of this timeout and `other`
    pub fn at_least(self, other: CommandTimeout) -> Self {
        Self(self.0.max(other.0))
    }
}

/// The pair of timeouts an operation may choose from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Interactive statements (page fetches, fast counts)
    pub command: CommandTimeout,
    /// Full-result counts and exports
    pub long_command: CommandTimeout,
}

impl Timeouts {
    /// Timeout for long-running work. Never shorter than `command`.
    pub fn long(&self) -> CommandTimeout {
        self.command.at_least(self.long_command)
    }
}

/// Forward-only, single-pass row reader
pub trait RowCursor: Send {
    /// Result column names, available before the first `advance`
    fn columns(&self) -> &[String];

    fn field_count(&self) -> usize {
        self.columns().len()
    }

    fn column_name(&self, index: usize) -> &str {
        &self.columns()[index]
    }

    /// Move to the next row. Returns `false` once the result set is exhausted.
    fn advance(&mut self) -> Result<bool, DataError>;

    /// Cells of the current row. Empty before the first successful `advance`.
    fn row(&self) -> &[CellValue];

    fn value(&self, index: usize) -> &CellValue {
        &self.row()[index]
    }

    fn is_null(&self, index: usize) -> bool {
        self.value(index).is_null()
    }
}

/// Parameterized statement execution
pub trait Executor: Send + Sync {
    /// Open a sequential-access cursor over `sql`
    fn open_cursor(
        &self,
        sql: &str,
        params: &[QueryParam],
        timeout: CommandTimeout,
    ) -> Result<Box<dyn RowCursor>, DataError>;

    /// Row count of `table` from engine metadata, without scanning
    fn table_row_count(
        &self,
        table: &str,
        timeout: CommandTimeout,
    ) -> Result<Option<u64>, DataError>;

    /// Planner's estimated output rows for `sql`. The statement is planned, not run.
    fn plan_row_estimate(
        &self,
        sql: &str,
        params: &[QueryParam],
        timeout: CommandTimeout,
    ) -> Result<Option<u64>, DataError>;

    /// Run `sql` and materialize the whole result
    fn execute_tabular(
        &self,
        sql: &str,
        params: &[QueryParam],
        timeout: CommandTimeout,
    ) -> Result<Table, DataError> {
        let mut cursor = self.open_cursor(sql, params, timeout)?;
        let mut table = Table {
            columns: cursor.columns().to_vec(),
            rows: Vec::new(),
        };
        while cursor.advance()? {
            table.rows.push(cursor.row().to_vec());
        }
        Ok(table)
    }

    /// Run `sql` and return the first column of the first row
    fn execute_scalar(
        &self,
        sql: &str,
        params: &[QueryParam],
        timeout: CommandTimeout,
    ) -> Result<CellValue, DataError> {
        let mut cursor = self.open_cursor(sql, params, timeout)?;
        if !cursor.advance()? {
            return Err(DataError::UnexpectedValue(
                "scalar query returned no rows".to_string(),
            ));
        }
        cursor
            .row()
            .first()
            .cloned()
            .ok_or_else(|| DataError::UnexpectedValue("scalar query returned no columns".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_at_least_keeps_longer() {
        let normal = CommandTimeout::from_secs(30);
        let long = CommandTimeout::from_secs(480);
        assert_eq!(normal.at_least(long), long);
        assert_eq!(long.at_least(normal), long);
        // The original value is untouched
        assert_eq!(normal.as_secs(), 30);
    }

    #[test]
    fn test_long_timeout_never_shorter() {
        let timeouts = Timeouts {
            command: CommandTimeout::from_secs(600),
            long_command: CommandTimeout::from_secs(480),
        };
        assert_eq!(timeouts.long().as_secs(), 600);
    }

    #[test]
    fn test_execute_scalar_and_tabular() {
        let stub = testing::StubExecutor::with_rows(
            &["KITID"],
            vec![
                vec![CellValue::Text("WO1".into())],
                vec![CellValue::Text("WO2".into())],
            ],
        );
        let timeout = CommandTimeout::from_secs(1);
        let table = stub.execute_tabular("SELECT KITID FROM t", &[], timeout).unwrap();
        assert_eq!(table.columns, vec!["KITID".to_string()]);
        assert_eq!(table.len(), 2);

        let value = stub
            .execute_scalar("SELECT COUNT(*) FROM (SELECT 1) AS counted", &[], timeout)
            .unwrap();
        assert_eq!(value, CellValue::Int(2));
    }
}

/// In-memory executor for unit tests
#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::*;
    use crate::data::types::ParamValue;

    /// Cursor over pre-built rows, optionally failing after `fail_after` rows
    pub struct VecCursor {
        columns: Vec<String>,
        rows: std::vec::IntoIter<Vec<CellValue>>,
        current: Vec<CellValue>,
        fail_after: Option<usize>,
        read: usize,
    }

    impl RowCursor for VecCursor {
        fn columns(&self) -> &[String] {
            &self.columns
        }

        fn advance(&mut self) -> Result<bool, DataError> {
            if self.fail_after == Some(self.read) {
                return Err(DataError::timeout(1));
            }
            match self.rows.next() {
                Some(row) => {
                    self.current = row;
                    self.read += 1;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        fn row(&self) -> &[CellValue] {
            &self.current
        }
    }

    /// Serves a fixed result set.
    ///
    /// `SELECT COUNT(*) ...` statements return the number of rows; statements
    /// carrying `@Offset` / `@PageSize` get that slice. Every statement is
    /// recorded.
    #[derive(Default)]
    pub struct StubExecutor {
        pub columns: Vec<String>,
        pub rows: Vec<Vec<CellValue>>,
        pub table_rows: Option<u64>,
        pub plan_rows: Option<u64>,
        pub fail_after: Option<usize>,
        pub fail_count: bool,
        pub statements: Mutex<Vec<(String, Vec<QueryParam>)>>,
    }

    impl StubExecutor {
        pub fn with_rows(columns: &[&str], rows: Vec<Vec<CellValue>>) -> Self {
            Self {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
                ..Default::default()
            }
        }

        /// `n` single-column rows numbered from 1
        pub fn numbered(n: usize) -> Self {
            let rows = (1..=n).map(|i| vec![CellValue::Int(i as i64)]).collect();
            Self::with_rows(&["KITID"], rows)
        }

        pub fn executed(&self) -> Vec<String> {
            self.statements.lock().iter().map(|(sql, _)| sql.clone()).collect()
        }

        fn int_param(params: &[QueryParam], name: &str) -> Option<usize> {
            params.iter().find(|p| p.name == name).and_then(|p| match p.value {
                ParamValue::Int(n) => usize::try_from(n).ok(),
                _ => None,
            })
        }
    }

    impl Executor for StubExecutor {
        fn open_cursor(
            &self,
            sql: &str,
            params: &[QueryParam],
            _timeout: CommandTimeout,
        ) -> Result<Box<dyn RowCursor>, DataError> {
            self.statements
                .lock()
                .push((sql.to_string(), params.to_vec()));

            if sql.starts_with("SELECT COUNT(*)") {
                if self.fail_count {
                    return Err(DataError::timeout(1));
                }
                return Ok(Box::new(VecCursor {
                    columns: vec!["count_star()".to_string()],
                    rows: vec![vec![CellValue::Int(self.rows.len() as i64)]].into_iter(),
                    current: Vec::new(),
                    fail_after: None,
                    read: 0,
                }));
            }

            let offset = Self::int_param(params, "@Offset").unwrap_or(0);
            let limit = Self::int_param(params, "@PageSize").unwrap_or(usize::MAX);
            let rows: Vec<_> = self.rows.iter().skip(offset).take(limit).cloned().collect();
            Ok(Box::new(VecCursor {
                columns: self.columns.clone(),
                rows: rows.into_iter(),
                current: Vec::new(),
                fail_after: self.fail_after,
                read: 0,
            }))
        }

        fn table_row_count(
            &self,
            _table: &str,
            _timeout: CommandTimeout,
        ) -> Result<Option<u64>, DataError> {
            Ok(self.table_rows)
        }

        fn plan_row_estimate(
            &self,
            _sql: &str,
            _params: &[QueryParam],
            _timeout: CommandTimeout,
        ) -> Result<Option<u64>, DataError> {
            Ok(self.plan_rows)
        }
    }
}
