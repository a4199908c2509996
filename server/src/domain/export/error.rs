//! Export error types

use std::path::PathBuf;

use thiserror::Error;

use crate::data::error::DataError;

/// Errors from a single output file
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("Sink is not open")]
    NotOpen,
}

/// Why an export stopped early. Files already written stay on disk.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Reading from the database failed (timeout, connection, syntax)
    #[error("Reading rows failed after {rows_written} rows: {source}")]
    Source {
        rows_written: u64,
        #[source]
        source: DataError,
    },

    /// Writing an output file failed
    #[error("Writing {} failed after {rows_written} rows: {source}", .path.display())]
    Sink {
        path: PathBuf,
        rows_written: u64,
        #[source]
        source: SinkError,
    },

    #[error("Export cancelled after {rows_written} rows")]
    Cancelled { rows_written: u64 },
}

impl ExportError {
    pub fn rows_written(&self) -> u64 {
        match self {
            ExportError::Source { rows_written, .. }
            | ExportError::Sink { rows_written, .. }
            | ExportError::Cancelled { rows_written } => *rows_written,
        }
    }

    pub fn is_source_failure(&self) -> bool {
        matches!(self, ExportError::Source { .. })
    }

    pub fn is_sink_failure(&self) -> bool {
        matches!(self, ExportError::Sink { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds() {
        let source = ExportError::Source {
            rows_written: 10,
            source: DataError::timeout(480),
        };
        assert!(source.is_source_failure());
        assert!(!source.is_sink_failure());
        assert_eq!(source.rows_written(), 10);

        let sink = ExportError::Sink {
            path: PathBuf::from("/tmp/out.csv"),
            rows_written: 3,
            source: SinkError::NotOpen,
        };
        assert!(sink.is_sink_failure());
        assert_eq!(
            sink.to_string(),
            "Writing /tmp/out.csv failed after 3 rows: Sink is not open"
        );
    }

    #[test]
    fn test_cancelled_display() {
        let err = ExportError::Cancelled { rows_written: 42 };
        assert_eq!(err.to_string(), "Export cancelled after 42 rows");
        assert!(!err.is_source_failure() && !err.is_sink_failure());
    }
}
