//! Output sink contract and strategy selection

use std::fmt;
use std::path::Path;

use crate::core::config::ExportConfig;
use crate::core::constants::SPREADSHEET_MAX_DATA_ROWS;
use crate::data::types::CellValue;

use super::delimited::DelimitedSink;
use super::error::SinkError;
use super::spreadsheet::SpreadsheetSink;

/// One output file.
///
/// Exactly one sink is open at a time; the pipeline closes it before opening
/// the next.
pub trait OutputSink: Send {
    fn max_rows_per_file(&self) -> u64;

    /// Header labels. Written once, before any row.
    fn write_header(&mut self, columns: &[String]) -> Result<(), SinkError>;

    fn write_row(&mut self, values: &[CellValue]) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError>;

    /// Flush and release the file. Closing twice is a no-op.
    fn close(&mut self) -> Result<(), SinkError>;

    /// Whether a file exists on disk for this sink
    fn file_created(&self) -> bool;
}

/// Output format, chosen by estimated volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStrategy {
    Spreadsheet,
    Delimited,
}

impl SinkStrategy {
    /// Spreadsheet below `threshold` estimated rows; delimited text at or
    /// above it, or when the size is unknown
    pub fn choose(estimate: Option<u64>, threshold: u64) -> Self {
        match estimate {
            Some(rows) if rows < threshold => SinkStrategy::Spreadsheet,
            _ => SinkStrategy::Delimited,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SinkStrategy::Spreadsheet => "xlsx",
            SinkStrategy::Delimited => "csv",
        }
    }

    /// Data rows per file, never above the spreadsheet format limit
    pub fn max_rows_per_file(&self, config: &ExportConfig) -> u64 {
        match self {
            SinkStrategy::Spreadsheet => config
                .spreadsheet_max_rows_per_file
                .clamp(1, SPREADSHEET_MAX_DATA_ROWS),
            SinkStrategy::Delimited => config.delimited_max_rows_per_file.max(1),
        }
    }

    pub fn open(
        &self,
        path: &Path,
        config: &ExportConfig,
    ) -> Result<Box<dyn OutputSink>, SinkError> {
        let max_rows = self.max_rows_per_file(config);
        Ok(match self {
            SinkStrategy::Spreadsheet => Box::new(SpreadsheetSink::create(path, max_rows)?),
            SinkStrategy::Delimited => Box::new(DelimitedSink::new(path, max_rows)),
        })
    }
}

impl fmt::Display for SinkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkStrategy::Spreadsheet => write!(f, "spreadsheet"),
            SinkStrategy::Delimited => write!(f, "delimited"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_by_estimate() {
        assert_eq!(SinkStrategy::choose(Some(10), 200_000), SinkStrategy::Spreadsheet);
        assert_eq!(
            SinkStrategy::choose(Some(199_999), 200_000),
            SinkStrategy::Spreadsheet
        );
        assert_eq!(SinkStrategy::choose(Some(200_000), 200_000), SinkStrategy::Delimited);
        assert_eq!(SinkStrategy::choose(None, 200_000), SinkStrategy::Delimited);
    }

    #[test]
    fn test_spreadsheet_cap_respects_format_limit() {
        let config = ExportConfig {
            spreadsheet_max_rows_per_file: 5_000_000,
            ..Default::default()
        };
        assert_eq!(
            SinkStrategy::Spreadsheet.max_rows_per_file(&config),
            SPREADSHEET_MAX_DATA_ROWS
        );
        assert_eq!(
            SinkStrategy::Delimited.max_rows_per_file(&config),
            1_000_000
        );
    }
}
