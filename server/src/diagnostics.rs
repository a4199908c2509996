//! Statement and error diagnostics
//!
//! Every executed statement and every failure is emitted as a `tracing` event
//! on the `tracequery::sql` target. When a log directory is configured the same
//! record is appended to a daily file, `tracequery-YYYYMMDD.log`.
//!
//! Diagnostics never fail the caller: file errors are reported once through
//! `tracing` and otherwise ignored.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Local;
use parking_lot::Mutex;

use crate::core::constants::APP_NAME_LOWER;
use crate::data::error::DataError;
use crate::data::executor::{CommandTimeout, Executor, RowCursor};
use crate::data::types::QueryParam;

const TARGET: &str = "tracequery::sql";

pub struct QueryDiagnostics {
    dir: Option<PathBuf>,
    write_lock: Mutex<()>,
    write_failed: AtomicBool,
}

impl QueryDiagnostics {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            write_lock: Mutex::new(()),
            write_failed: AtomicBool::new(false),
        }
    }

    /// Daily log file for today, if file logging is enabled
    pub fn current_file(&self) -> Option<PathBuf> {
        self.dir.as_deref().map(|dir| {
            dir.join(format!(
                "{}-{}.log",
                APP_NAME_LOWER,
                Local::now().format("%Y%m%d")
            ))
        })
    }

    pub fn record_statement(
        &self,
        sql: &str,
        params: &[QueryParam],
        elapsed: Duration,
        label: &str,
    ) {
        let params = format_params(params);
        tracing::debug!(
            target: TARGET,
            label,
            elapsed_ms = elapsed.as_millis() as u64,
            params = %params,
            "{}",
            sql
        );
        self.append(&format!(
            "[{}] {}ms | {} | {}",
            label,
            elapsed.as_millis(),
            sql,
            params
        ));
    }

    pub fn record_error(&self, error: &dyn std::error::Error, context: &str) {
        tracing::warn!(target: TARGET, error = %error, context, "Statement failed");
        self.append(&format!("[error] {} | {}", context, error));
    }

    fn append(&self, line: &str) {
        let Some(path) = self.current_file() else {
            return;
        };
        let _guard = self.write_lock.lock();
        if let Err(e) = append_line(&path, line) {
            if !self.write_failed.swap(true, Ordering::Relaxed) {
                tracing::warn!(path = %path.display(), error = %e, "Statement log unavailable");
            }
        }
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        file,
        "{} {}",
        Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        line
    )
}

fn format_params(params: &[QueryParam]) -> String {
    params
        .iter()
        .map(|p| format!("{}={} ({})", p.name, p.value, p.param_type))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Executor decorator that reports every statement to `QueryDiagnostics`
pub struct DiagnosedExecutor {
    inner: Arc<dyn Executor>,
    diagnostics: Arc<QueryDiagnostics>,
}

impl DiagnosedExecutor {
    pub fn new(inner: Arc<dyn Executor>, diagnostics: Arc<QueryDiagnostics>) -> Self {
        Self { inner, diagnostics }
    }

    fn observe<T>(
        &self,
        sql: &str,
        params: &[QueryParam],
        label: &str,
        run: impl FnOnce() -> Result<T, DataError>,
    ) -> Result<T, DataError> {
        let started = Instant::now();
        let result = run();
        self.diagnostics
            .record_statement(sql, params, started.elapsed(), label);
        if let Err(e) = &result {
            self.diagnostics.record_error(e, label);
        }
        result
    }
}

impl Executor for DiagnosedExecutor {
    fn open_cursor(
        &self,
        sql: &str,
        params: &[QueryParam],
        timeout: CommandTimeout,
    ) -> Result<Box<dyn RowCursor>, DataError> {
        self.observe(sql, params, "cursor", || {
            self.inner.open_cursor(sql, params, timeout)
        })
    }

    fn table_row_count(
        &self,
        table: &str,
        timeout: CommandTimeout,
    ) -> Result<Option<u64>, DataError> {
        self.observe(table, &[], "table-count", || {
            self.inner.table_row_count(table, timeout)
        })
    }

    fn plan_row_estimate(
        &self,
        sql: &str,
        params: &[QueryParam],
        timeout: CommandTimeout,
    ) -> Result<Option<u64>, DataError> {
        self.observe(sql, params, "explain", || {
            self.inner.plan_row_estimate(sql, params, timeout)
        })
    }
}
