// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "TraceQuery";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "tracequery";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".tracequery";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "tracequery.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "TRACEQUERY_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "TRACEQUERY_LOG";

// =============================================================================
// Environment Variables - Database
// =============================================================================

/// Environment variable for the database file path
pub const ENV_DB_PATH: &str = "TRACEQUERY_DB";

/// Environment variable for the command timeout in seconds
pub const ENV_COMMAND_TIMEOUT: &str = "TRACEQUERY_TIMEOUT";

// =============================================================================
// Environment Variables - Export & Logs
// =============================================================================

/// Environment variable for the export directory
pub const ENV_EXPORT_DIR: &str = "TRACEQUERY_EXPORT_DIR";

/// Environment variable for the executed-statement log directory
pub const ENV_QUERY_LOG_DIR: &str = "TRACEQUERY_QUERY_LOG_DIR";

// =============================================================================
// Database Defaults
// =============================================================================

/// Default database file, relative to the working directory
pub const DEFAULT_DATABASE_PATH: &str = "tracequery.duckdb";

/// Default timeout for interactive commands
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Timeout for full-result counts and exports
pub const DEFAULT_LONG_COMMAND_TIMEOUT_SECS: u64 = 480;

/// Rows buffered between a cursor's producer thread and its reader
pub const CURSOR_CHANNEL_CAPACITY: usize = 1024;

// =============================================================================
// Schema
// =============================================================================

/// Fact table every query targets
pub const FACT_TABLE: &str = "TRACE_LOG";

/// Fact table timestamp column; the only ordering key
pub const ORDER_COLUMN: &str = "TRACE_LOG.TIMESTAMP";

/// Fixed join of the fact table to its two dimension tables
pub const FROM_CLAUSE: &str =
    "TRACE_LOG INNER JOIN REEL ON TRACE_LOG.RID = REEL.RID INNER JOIN PN ON REEL.SPN = PN.SPN";

/// Conjuncts of the fixed base predicate (dimension business key present)
pub const BASE_PREDICATE: &[&str] = &["PN.PN IS NOT NULL", "PN.PN <> ''"];

/// Projection used when no columns are selected
pub const DEFAULT_COLUMNS: &[&str] = &[
    "TRACE_LOG.TIMESTAMP",
    "TRACE_LOG.KITID",
    "PN.PN",
    "REEL.LOT",
    "REEL.DATECODE",
    "REEL.SUPPLIER",
    "TRACE_LOG.PCBID",
    "REEL.RID",
    "TRACE_LOG.TRACE_STATION",
    "TRACE_LOG.FCODE",
    "TRACE_LOG.LOC",
    "TRACE_LOG.MPROG",
];

/// Columns selectable in addition to the defaults
pub const EXTRA_COLUMNS: &[&str] = &["REEL.SPN"];

/// Declared width of `TRACE_LOG.KITID`
pub const KITID_MAX_LEN: u32 = 30;

// =============================================================================
// Paging
// =============================================================================

/// Rows per result page
pub const PAGE_SIZE: u64 = 50;

/// Pagination parameter names
pub const PARAM_OFFSET: &str = "@Offset";
pub const PARAM_PAGE_SIZE: &str = "@PageSize";

// =============================================================================
// Export Defaults
// =============================================================================

/// Default export directory, relative to the working directory
pub const DEFAULT_EXPORT_DIR: &str = "Export";

/// Estimated row count at which exports switch from spreadsheet to delimited text
pub const DEFAULT_SPREADSHEET_THRESHOLD: u64 = 200_000;

/// Spreadsheet hard limit (1,048,576 rows) minus the header row
pub const SPREADSHEET_MAX_DATA_ROWS: u64 = 1_048_575;

/// Default data rows per delimited-text file
pub const DEFAULT_DELIMITED_MAX_ROWS_PER_FILE: u64 = 1_000_000;

/// Default rows between sink flushes
pub const DEFAULT_FLUSH_INTERVAL_ROWS: u64 = 10_000;

/// Rows between progress reports
pub const PROGRESS_BATCH_ROWS: u64 = 1_000;

/// Worksheet name in exported workbooks
pub const SPREADSHEET_SHEET_NAME: &str = "Query Results";

// =============================================================================
// Result Grid
// =============================================================================

/// Maximum characters per cell when printing a page to the terminal
pub const GRID_MAX_CELL_CHARS: usize = 32;
