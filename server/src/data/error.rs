//! Error type for the data layer
//!
//! Every failure that originates on the database side of an operation is a
//! `DataError`. Export code wraps it so a data-source failure can be told apart
//! from a sink failure.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    /// DuckDB database error
    #[error("DuckDB error: {0}")]
    Database(#[from] duckdb::Error),

    /// No row arrived within the command timeout
    #[error("Command timeout after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The cursor's producer stopped without finishing the result set
    #[error("Cursor error: {0}")]
    Cursor(String),

    /// A placeholder in the statement text has no matching parameter
    #[error("Unbound parameter: {0}")]
    UnboundParameter(String),

    /// A result had an unexpected shape (e.g. a scalar query returned no rows)
    #[error("Unexpected value: {0}")]
    UnexpectedValue(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    /// Create a timeout error
    pub fn timeout(timeout_secs: u64) -> Self {
        Self::Timeout { timeout_secs }
    }

    /// Check if this is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_error_display() {
        let err = DataError::timeout(480);
        assert_eq!(err.to_string(), "Command timeout after 480s");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_unbound_parameter_display() {
        let err = DataError::UnboundParameter("@pn".to_string());
        assert_eq!(err.to_string(), "Unbound parameter: @pn");
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DataError = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }
}
