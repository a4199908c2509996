//! Query compilation errors

use chrono::NaiveDate;
use thiserror::Error;

/// Input the compiler refuses before anything reaches the database
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Projection column outside the fixed schema
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Date whose following day is not representable
    #[error("Date out of range: {0}")]
    DateOutOfRange(NaiveDate),
}
