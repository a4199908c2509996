//! Search, paging, counting and export as one async service
//!
//! All database work is blocking, so each operation runs on tokio's blocking
//! pool and the async caller only awaits the result. The last search is kept
//! as the session that page navigation works on.

use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::core::config::ExportConfig;
use crate::core::constants::PAGE_SIZE;
use crate::data::error::DataError;
use crate::data::executor::{Executor, Timeouts};
use crate::domain::export::{ExportError, ExportJob, ExportSummary, ProgressObserver, run_export};
use crate::domain::query::{
    CompileError, FastCount, FilterCriteria, Navigation, Page, PageNotice, Pager,
    compile, exact_count, try_fast_count,
};
use crate::utils::time::export_base_name;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("No search has been run yet")]
    NoSearch,

    #[error("Worker task failed: {0}")]
    Task(String),
}

/// Result of a page navigation request
#[derive(Debug)]
pub enum Navigated {
    Page(Page),
    /// Input was corrected locally; the current page is unchanged
    Notice(PageNotice),
}

/// Fast-path outcome next to the exact count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountReport {
    pub fast: FastCount,
    pub exact: u64,
}

pub struct TraceQueryService {
    executor: Arc<dyn Executor>,
    timeouts: Timeouts,
    export: ExportConfig,
    session: Mutex<Option<Pager>>,
}

impl TraceQueryService {
    pub fn new(executor: Arc<dyn Executor>, timeouts: Timeouts, export: ExportConfig) -> Self {
        Self {
            executor,
            timeouts,
            export,
            session: Mutex::new(None),
        }
    }

    /// Run blocking database work off the async runtime
    async fn run_blocking<T, F>(&self, f: F) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Executor) -> Result<T, ServiceError> + Send + 'static,
    {
        let executor = Arc::clone(&self.executor);
        tokio::task::spawn_blocking(move || f(executor.as_ref()))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Query task failed");
                ServiceError::Task(e.to_string())
            })?
    }

    /// Compile, count and fetch `requested_page`. Starts a new session.
    pub async fn search(
        &self,
        criteria: &FilterCriteria,
        requested_page: u64,
    ) -> Result<Page, ServiceError> {
        let query = compile(criteria)?;
        let timeouts = self.timeouts;
        let (pager, page) = self
            .run_blocking(move |executor| {
                let mut pager = Pager::new(query, PAGE_SIZE);
                let page = pager.load(executor, requested_page, timeouts)?;
                Ok((pager, page))
            })
            .await?;
        *self.session.lock() = Some(pager);
        Ok(page)
    }

    /// Move within the current session's pages
    pub async fn navigate(&self, navigation: Navigation) -> Result<Navigated, ServiceError> {
        let mut pager = self.session.lock().clone().ok_or(ServiceError::NoSearch)?;
        let target = match pager.state().resolve(&navigation) {
            Ok(target) => target,
            Err(notice) => return Ok(Navigated::Notice(notice)),
        };

        let timeouts = self.timeouts;
        let (pager, page) = self
            .run_blocking(move |executor| {
                let page = pager.load(executor, target, timeouts)?;
                Ok((pager, page))
            })
            .await?;
        *self.session.lock() = Some(pager);
        Ok(Navigated::Page(page))
    }

    pub async fn count(&self, criteria: &FilterCriteria) -> Result<CountReport, ServiceError> {
        let query = compile(criteria)?;
        let timeouts = self.timeouts;
        self.run_blocking(move |executor| {
            let fast = try_fast_count(
                executor,
                query.without_order_by(),
                query.params(),
                timeouts.command,
            );
            let exact = match fast {
                FastCount::Exact(rows) => rows,
                _ => exact_count(executor, &query, timeouts.long())?,
            };
            Ok(CountReport { fast, exact })
        })
        .await
    }

    /// Export the full, unpaged result of `criteria`
    pub async fn export(
        &self,
        criteria: &FilterCriteria,
        observer: Arc<dyn ProgressObserver>,
        cancel: CancellationToken,
    ) -> Result<ExportSummary, ServiceError> {
        let query = compile(criteria)?;
        let timeouts = self.timeouts;
        let config = self.export.clone();
        let base_name = export_base_name(&Local::now());
        self.run_blocking(move |executor| {
            let job = ExportJob::plan(executor, &query, &config, timeouts, &base_name);
            Ok(run_export(
                executor,
                &job,
                &config,
                timeouts.long(),
                observer.as_ref(),
                &cancel,
            )?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::executor::CommandTimeout;
    use crate::data::executor::testing::StubExecutor;
    use crate::data::types::CellValue;
    use crate::domain::export::{ChannelObserver, ExportEvent, SinkStrategy};
    use tempfile::TempDir;

    const TIMEOUTS: Timeouts = Timeouts {
        command: CommandTimeout::from_secs(5),
        long_command: CommandTimeout::from_secs(60),
    };

    fn service(executor: StubExecutor, dir: &std::path::Path) -> TraceQueryService {
        TraceQueryService::new(
            Arc::new(executor),
            TIMEOUTS,
            ExportConfig {
                dir: dir.to_path_buf(),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_search_then_navigate() {
        let temp = TempDir::new().unwrap();
        let service = service(StubExecutor::numbered(125), temp.path());

        let page = service.search(&FilterCriteria::default(), 1).await.unwrap();
        assert_eq!(page.state.current_page, 1);
        assert_eq!(page.state.total_pages, 3);

        let Navigated::Page(next) = service.navigate(Navigation::Next).await.unwrap() else {
            panic!("expected a page");
        };
        assert_eq!(next.state.current_page, 2);
        assert_eq!(next.table.rows[0][0], CellValue::Int(51));

        let Navigated::Page(last) = service.navigate(Navigation::Last).await.unwrap() else {
            panic!("expected a page");
        };
        assert_eq!(last.table.len(), 25);
    }

    #[tokio::test]
    async fn test_invalid_navigation_stays_put() {
        let temp = TempDir::new().unwrap();
        let stub = StubExecutor::numbered(125);
        let service = service(stub, temp.path());
        service.search(&FilterCriteria::default(), 2).await.unwrap();

        let outcome = service
            .navigate(Navigation::Goto("x".into()))
            .await
            .unwrap();
        assert!(matches!(outcome, Navigated::Notice(PageNotice::NotANumber(_))));

        let Navigated::Page(page) = service.navigate(Navigation::Previous).await.unwrap() else {
            panic!("expected a page");
        };
        assert_eq!(page.state.current_page, 1);
    }

    #[tokio::test]
    async fn test_navigate_without_search() {
        let temp = TempDir::new().unwrap();
        let service = service(StubExecutor::numbered(1), temp.path());
        assert!(matches!(
            service.navigate(Navigation::First).await,
            Err(ServiceError::NoSearch)
        ));
    }

    #[tokio::test]
    async fn test_compile_errors_never_reach_database() {
        let temp = TempDir::new().unwrap();
        let service = service(StubExecutor::numbered(1), temp.path());
        let criteria = FilterCriteria {
            columns: vec!["REEL.COLOR".into()],
            ..Default::default()
        };
        assert!(matches!(
            service.search(&criteria, 1).await,
            Err(ServiceError::Compile(CompileError::UnknownColumn(_)))
        ));
    }

    #[tokio::test]
    async fn test_count_reports_fast_and_exact() {
        let temp = TempDir::new().unwrap();
        let stub = StubExecutor {
            plan_rows: Some(40),
            ..StubExecutor::numbered(12)
        };
        let service = service(stub, temp.path());
        let criteria = FilterCriteria {
            lot: "L1".into(),
            ..Default::default()
        };
        let report = service.count(&criteria).await.unwrap();
        assert_eq!(report.fast, FastCount::Estimated(40));
        assert_eq!(report.exact, 12);
    }

    #[tokio::test]
    async fn test_export_reports_progress_over_channel() {
        let temp = TempDir::new().unwrap();
        let stub = StubExecutor {
            table_rows: Some(3),
            ..StubExecutor::numbered(3)
        };
        let service = service(stub, temp.path());
        let (observer, mut rx) = ChannelObserver::channel();

        let summary = service
            .export(
                &FilterCriteria::default(),
                Arc::new(observer),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(summary.strategy, SinkStrategy::Spreadsheet);
        assert_eq!(summary.rows_written, 3);
        assert!(summary.files[0].path.starts_with(temp.path()));

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(ExportEvent::Started { .. })));
        assert!(events.contains(&ExportEvent::Progress {
            rows_written: 3,
            total: Some(3)
        }));
    }

    #[tokio::test]
    async fn test_export_source_failure_is_distinguished() {
        let temp = TempDir::new().unwrap();
        let stub = StubExecutor {
            table_rows: Some(5),
            fail_after: Some(1),
            ..StubExecutor::numbered(5)
        };
        let service = service(stub, temp.path());
        let (observer, _rx) = ChannelObserver::channel();
        let err = service
            .export(
                &FilterCriteria::default(),
                Arc::new(observer),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        let ServiceError::Export(export) = err else {
            panic!("expected an export error");
        };
        assert!(export.is_source_failure());
    }
}
