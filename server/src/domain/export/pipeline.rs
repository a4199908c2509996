//! Streaming bulk export
//!
//! Runs the unpaged query through a forward-only cursor and writes each row
//! straight to the current output file. Nothing but the current row is held
//! in memory.
//!
//! ```text
//! estimate ──▶ choose sink ──▶ cursor ──▶ row ──▶ [rollover?] ──▶ sink ──▶ [flush?] ──▶ [progress?]
//! ```
//!
//! Exactly one file is open at any time. On failure or cancellation the open
//! file is closed and everything already written stays on disk.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::core::config::ExportConfig;
use crate::core::constants::PROGRESS_BATCH_ROWS;
use crate::data::executor::{CommandTimeout, Executor, RowCursor, Timeouts};
use crate::data::types::CellValue;
use crate::domain::query::{CompiledQuery, advisory_estimate};
use crate::utils::file::ensure_dir;
use crate::utils::string::translate_column_name;

use super::error::{ExportError, SinkError};
use super::naming::export_file_path;
use super::progress::{ExportEvent, ProgressObserver};
use super::sink::{OutputSink, SinkStrategy};

/// One export run: what to stream and where
#[derive(Debug, Clone)]
pub struct ExportJob {
    query: CompiledQuery,
    estimate: Option<u64>,
    strategy: SinkStrategy,
    base_name: String,
}

impl ExportJob {
    pub fn new(query: &CompiledQuery, estimate: Option<u64>, threshold: u64, base_name: &str) -> Self {
        Self {
            query: query.ordered(),
            estimate,
            strategy: SinkStrategy::choose(estimate, threshold),
            base_name: base_name.to_string(),
        }
    }

    /// Size the query and pick a sink. An unknown size is not an error.
    pub fn plan(
        executor: &dyn Executor,
        query: &CompiledQuery,
        config: &ExportConfig,
        timeouts: Timeouts,
        base_name: &str,
    ) -> Self {
        let estimate = advisory_estimate(executor, query, timeouts);
        let job = Self::new(query, estimate, config.spreadsheet_threshold, base_name);
        tracing::info!(
            estimate = ?job.estimate,
            strategy = %job.strategy,
            "Export planned"
        );
        job
    }

    pub fn strategy(&self) -> SinkStrategy {
        self.strategy
    }

    pub fn estimate(&self) -> Option<u64> {
        self.estimate
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub rows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub strategy: SinkStrategy,
    pub files: Vec<ExportedFile>,
    pub rows_written: u64,
    pub estimate: Option<u64>,
}

fn sink_error(path: &Path, rows_written: u64, source: SinkError) -> ExportError {
    ExportError::Sink {
        path: path.to_path_buf(),
        rows_written,
        source,
    }
}

/// The open output file plus everything needed to roll over to the next one
struct RollingOutput<'a> {
    job: &'a ExportJob,
    config: &'a ExportConfig,
    observer: &'a dyn ProgressObserver,
    header: Vec<String>,
    index: u32,
    path: PathBuf,
    sink: Box<dyn OutputSink>,
    rows_in_file: u64,
    files: Vec<ExportedFile>,
}

impl<'a> RollingOutput<'a> {
    fn open(
        job: &'a ExportJob,
        config: &'a ExportConfig,
        observer: &'a dyn ProgressObserver,
        header: Vec<String>,
    ) -> Result<Self, ExportError> {
        let path = export_file_path(&config.dir, &job.base_name, job.strategy, 1);
        let sink = Self::open_sink(job.strategy, &path, config, &header)
            .map_err(|e| sink_error(&path, 0, e))?;
        Ok(Self {
            job,
            config,
            observer,
            header,
            index: 1,
            path,
            sink,
            rows_in_file: 0,
            files: Vec::new(),
        })
    }

    fn open_sink(
        strategy: SinkStrategy,
        path: &Path,
        config: &ExportConfig,
        header: &[String],
    ) -> Result<Box<dyn OutputSink>, SinkError> {
        let mut sink = strategy.open(path, config)?;
        sink.write_header(header)?;
        Ok(sink)
    }

    fn write(&mut self, row: &[CellValue], rows_written: u64) -> Result<(), ExportError> {
        if self.rows_in_file >= self.sink.max_rows_per_file() {
            self.roll_over(rows_written)?;
        }
        self.sink
            .write_row(row)
            .map_err(|e| sink_error(&self.path, rows_written, e))?;
        self.rows_in_file += 1;

        if self.rows_in_file % self.config.flush_interval_rows.max(1) == 0 {
            self.sink
                .flush()
                .map_err(|e| sink_error(&self.path, rows_written + 1, e))?;
        }
        Ok(())
    }

    fn roll_over(&mut self, rows_written: u64) -> Result<(), ExportError> {
        self.close_current(rows_written)?;
        self.index += 1;
        self.path = export_file_path(
            &self.config.dir,
            &self.job.base_name,
            self.job.strategy,
            self.index,
        );
        self.sink = Self::open_sink(self.job.strategy, &self.path, self.config, &self.header)
            .map_err(|e| sink_error(&self.path, rows_written, e))?;
        self.rows_in_file = 0;
        tracing::debug!(path = %self.path.display(), "Rolled over to next file");
        Ok(())
    }

    fn close_current(&mut self, rows_written: u64) -> Result<(), ExportError> {
        self.sink
            .close()
            .map_err(|e| sink_error(&self.path, rows_written, e))?;
        if self.sink.file_created() {
            tracing::info!(path = %self.path.display(), rows = self.rows_in_file, "Export file written");
            self.files.push(ExportedFile {
                path: self.path.clone(),
                rows: self.rows_in_file,
            });
            self.observer.on_event(ExportEvent::FileFinished {
                path: self.path.clone(),
                rows: self.rows_in_file,
            });
        }
        Ok(())
    }

    fn finish(mut self, rows_written: u64) -> Result<Vec<ExportedFile>, ExportError> {
        self.close_current(rows_written)?;
        Ok(self.files)
    }

    /// Close after a failure. A close error is logged; the original error wins.
    fn abandon(mut self, rows_written: u64) {
        if let Err(e) = self.close_current(rows_written) {
            tracing::warn!(error = %e, "Failed to close export file after error");
        }
    }
}

fn stream_rows(
    cursor: &mut dyn RowCursor,
    output: &mut RollingOutput<'_>,
    rows_written: &mut u64,
    cancel: &CancellationToken,
) -> Result<(), ExportError> {
    loop {
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled {
                rows_written: *rows_written,
            });
        }
        let has_row = cursor.advance().map_err(|source| ExportError::Source {
            rows_written: *rows_written,
            source,
        })?;
        if !has_row {
            return Ok(());
        }
        output.write(cursor.row(), *rows_written)?;
        *rows_written += 1;
        if *rows_written % PROGRESS_BATCH_ROWS == 0 {
            output.observer.on_progress(*rows_written, output.job.estimate);
        }
    }
}

/// Stream the whole result of `job` to disk
pub fn run_export(
    executor: &dyn Executor,
    job: &ExportJob,
    config: &ExportConfig,
    timeout: CommandTimeout,
    observer: &dyn ProgressObserver,
    cancel: &CancellationToken,
) -> Result<ExportSummary, ExportError> {
    ensure_dir(&config.dir).map_err(|e| sink_error(&config.dir, 0, e.into()))?;
    observer.on_event(ExportEvent::Started {
        strategy: job.strategy,
        estimate: job.estimate,
    });

    let mut cursor = executor
        .open_cursor(job.query.text(), job.query.params(), timeout)
        .map_err(|source| ExportError::Source {
            rows_written: 0,
            source,
        })?;
    let header: Vec<String> = cursor
        .columns()
        .iter()
        .map(|c| translate_column_name(c).to_string())
        .collect();

    let mut output = RollingOutput::open(job, config, observer, header)?;
    let mut rows_written = 0;
    if let Err(e) = stream_rows(cursor.as_mut(), &mut output, &mut rows_written, cancel) {
        output.abandon(rows_written);
        match &e {
            ExportError::Cancelled { .. } => tracing::info!(rows_written, "Export cancelled"),
            _ => tracing::error!(error = %e, "Export failed"),
        }
        return Err(e);
    }
    drop(cursor);

    let files = output.finish(rows_written)?;
    // A full last batch was already reported
    if rows_written == 0 || rows_written % PROGRESS_BATCH_ROWS != 0 {
        observer.on_progress(rows_written, job.estimate);
    }
    tracing::info!(rows_written, files = files.len(), "Export complete");

    Ok(ExportSummary {
        strategy: job.strategy,
        files,
        rows_written,
        estimate: job.estimate,
    })
}
