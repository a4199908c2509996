//! Data access layer
//!
//! - `executor` - Parameterized statement execution and sequential cursors
//! - `duckdb` - DuckDB binding of the executor
//! - `types` - Parameters, cells and result pages
//! - `error` - Error type for everything on the database side

pub mod duckdb;
pub mod error;
pub mod executor;
pub mod types;

pub use duckdb::DuckdbExecutor;
pub use error::DataError;
pub use executor::{CommandTimeout, Executor, RowCursor, Timeouts};
pub use types::{CellValue, ParamType, ParamValue, QueryParam, Table};
