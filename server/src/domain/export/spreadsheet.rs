//! Spreadsheet (xlsx) sink
//!
//! Uses a constant-memory worksheet: each row is flushed to a temporary file
//! as soon as the next one starts, so memory stays flat regardless of volume.
//! The workbook is assembled at the target path on `close`.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook};

use crate::core::constants::SPREADSHEET_SHEET_NAME;
use crate::data::types::CellValue;

use super::error::SinkError;
use super::sink::OutputSink;

const MAX_EXACT_INTEGER: u64 = 1 << 53;

pub struct SpreadsheetSink {
    path: PathBuf,
    max_rows: u64,
    workbook: Option<Workbook>,
    header: Format,
    /// Next worksheet row; row 0 is the header
    next_row: u32,
    saved: bool,
}

impl SpreadsheetSink {
    /// Create the workbook and its single worksheet
    pub fn create(path: &Path, max_rows: u64) -> Result<Self, SinkError> {
        let mut workbook = Workbook::new();
        workbook
            .add_worksheet_with_constant_memory()
            .set_name(SPREADSHEET_SHEET_NAME)?;
        tracing::debug!(path = %path.display(), "Spreadsheet opened");
        Ok(Self {
            path: path.to_path_buf(),
            max_rows,
            workbook: Some(workbook),
            header: Format::new().set_bold(),
            next_row: 1,
            saved: false,
        })
    }
}

impl OutputSink for SpreadsheetSink {
    fn max_rows_per_file(&self) -> u64 {
        self.max_rows
    }

    fn write_header(&mut self, columns: &[String]) -> Result<(), SinkError> {
        let workbook = self.workbook.as_mut().ok_or(SinkError::NotOpen)?;
        let sheet = workbook.worksheet_from_index(0)?;
        for (col, name) in (0u16..).zip(columns) {
            sheet.write_string_with_format(0, col, name, &self.header)?;
        }
        Ok(())
    }

    fn write_row(&mut self, values: &[CellValue]) -> Result<(), SinkError> {
        let row = self.next_row;
        let workbook = self.workbook.as_mut().ok_or(SinkError::NotOpen)?;
        let sheet = workbook.worksheet_from_index(0)?;
        for (col, value) in (0u16..).zip(values) {
            match value {
                CellValue::Null => {}
                CellValue::Int(n) => match exact_number(*n) {
                    Some(number) => {
                        sheet.write_number(row, col, number)?;
                    }
                    None => {
                        sheet.write_string(row, col, n.to_string())?;
                    }
                },
                CellValue::Float(v) => {
                    sheet.write_number(row, col, *v)?;
                }
                other => {
                    sheet.write_string(row, col, other.to_string())?;
                }
            }
        }
        self.next_row += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        // Constant-memory rows are already on disk once the next row starts
        if self.workbook.is_none() {
            return Err(SinkError::NotOpen);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut workbook) = self.workbook.take() {
            workbook.save(&self.path)?;
            self.saved = true;
            tracing::debug!(
                path = %self.path.display(),
                rows = self.next_row - 1,
                "Spreadsheet saved"
            );
        }
        Ok(())
    }

    fn file_created(&self) -> bool {
        self.saved
    }
}

/// Integers beyond 2^53 lose precision as spreadsheet numbers
fn exact_number(n: i64) -> Option<f64> {
    (n.unsigned_abs() <= MAX_EXACT_INTEGER).then_some(n as f64)
}
