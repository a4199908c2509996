//! Comma-delimited text sink
//!
//! UTF-8 with a byte-order mark and CRLF line endings. The file is created on
//! the first row, so an export that yields nothing leaves nothing behind.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::data::types::CellValue;
use crate::utils::string::escape_delimited;

use super::error::SinkError;
use super::sink::OutputSink;

const BOM: &str = "\u{FEFF}";
const LINE_END: &str = "\r\n";

pub struct DelimitedSink {
    path: PathBuf,
    max_rows: u64,
    header: Vec<String>,
    writer: Option<BufWriter<File>>,
    created: bool,
}

impl DelimitedSink {
    pub fn new(path: &Path, max_rows: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            max_rows,
            header: Vec::new(),
            writer: None,
            created: false,
        }
    }

    fn write_line<'a>(
        writer: &mut BufWriter<File>,
        fields: impl Iterator<Item = Option<&'a str>>,
    ) -> Result<(), SinkError> {
        let line = fields
            .map(escape_delimited)
            .collect::<Vec<_>>()
            .join(",");
        writer.write_all(line.as_bytes())?;
        writer.write_all(LINE_END.as_bytes())?;
        Ok(())
    }

    /// Open the file and write the BOM and header
    fn writer(&mut self) -> Result<&mut BufWriter<File>, SinkError> {
        if self.writer.is_none() {
            let mut writer = BufWriter::new(File::create(&self.path)?);
            self.created = true;
            writer.write_all(BOM.as_bytes())?;
            Self::write_line(&mut writer, self.header.iter().map(|h| Some(h.as_str())))?;
            tracing::debug!(path = %self.path.display(), "Delimited file opened");
            self.writer = Some(writer);
        }
        self.writer.as_mut().ok_or(SinkError::NotOpen)
    }
}

impl OutputSink for DelimitedSink {
    fn max_rows_per_file(&self) -> u64 {
        self.max_rows
    }

    fn write_header(&mut self, columns: &[String]) -> Result<(), SinkError> {
        self.header = columns.to_vec();
        Ok(())
    }

    fn write_row(&mut self, values: &[CellValue]) -> Result<(), SinkError> {
        let texts: Vec<Option<String>> = values.iter().map(CellValue::to_text).collect();
        let writer = self.writer()?;
        Self::write_line(writer, texts.iter().map(|t| t.as_deref()))
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            tracing::debug!(path = %self.path.display(), "Delimited file closed");
        }
        Ok(())
    }

    fn file_created(&self) -> bool {
        self.created
    }
}
