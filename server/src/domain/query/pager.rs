//! Offset/limit paging over a compiled query

use std::fmt;

use crate::data::error::DataError;
use crate::data::executor::{Executor, Timeouts};
use crate::data::types::Table;

use super::compiler::CompiledQuery;
use super::count::row_count_for_paging;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    pub page_size: u64,
    /// 1-based; 0 only when there are no pages
    pub current_page: u64,
    pub total_pages: u64,
    pub total_rows: u64,
}

impl PageState {
    /// Compute the page layout for `total_rows` and clamp `requested` into it
    pub fn new(total_rows: u64, page_size: u64, requested: u64) -> Self {
        let page_size = page_size.max(1);
        let total_pages = total_rows.div_ceil(page_size);
        Self {
            page_size,
            current_page: clamp_page(requested, total_pages),
            total_pages,
            total_rows,
        }
    }

    pub fn offset(&self) -> u64 {
        self.current_page.saturating_sub(1) * self.page_size
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Page a navigation request lands on.
    ///
    /// Invalid input is corrected here and reported as a notice; the caller
    /// stays on the current page and the database is not touched.
    pub fn resolve(&self, navigation: &Navigation) -> Result<u64, PageNotice> {
        if self.total_pages == 0 {
            return Err(PageNotice::NoResults);
        }
        match navigation {
            Navigation::First => Ok(1),
            Navigation::Last => Ok(self.total_pages),
            Navigation::Previous => Ok(self.current_page.saturating_sub(1).max(1)),
            Navigation::Next => Ok((self.current_page + 1).min(self.total_pages)),
            Navigation::Goto(input) => {
                let input = input.trim();
                let requested: i64 = input
                    .parse()
                    .map_err(|_| PageNotice::NotANumber(input.to_string()))?;
                if requested < 1 || requested as u64 > self.total_pages {
                    return Err(PageNotice::OutOfRange {
                        requested,
                        total_pages: self.total_pages,
                    });
                }
                Ok(requested as u64)
            }
        }
    }
}

/// `requested` clamped into `[1, total_pages]`, or 0 when there are no pages
pub fn clamp_page(requested: u64, total_pages: u64) -> u64 {
    if total_pages == 0 {
        0
    } else {
        requested.clamp(1, total_pages)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    First,
    Previous,
    Next,
    Last,
    /// Raw page-number input
    Goto(String),
}

/// Input problem corrected without a database round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageNotice {
    NotANumber(String),
    OutOfRange { requested: i64, total_pages: u64 },
    NoResults,
}

impl fmt::Display for PageNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageNotice::NotANumber(input) => write!(f, "'{}' is not a page number", input),
            PageNotice::OutOfRange {
                requested,
                total_pages,
            } => write!(
                f,
                "Page {} is out of range (1-{})",
                requested, total_pages
            ),
            PageNotice::NoResults => write!(f, "There are no result pages"),
        }
    }
}

/// One fetched page
#[derive(Debug, Clone)]
pub struct Page {
    pub table: Table,
    pub state: PageState,
    /// Requested page when it had to be clamped
    pub clamped_from: Option<u64>,
}

/// Count, clamp and fetch one page of `query`.
///
/// With zero rows the query still runs at offset 0 so column names are known.
pub fn load_page(
    executor: &dyn Executor,
    query: &CompiledQuery,
    page_size: u64,
    requested: u64,
    timeouts: Timeouts,
) -> Result<Page, DataError> {
    let total_rows = row_count_for_paging(executor, query, timeouts)?;
    let state = PageState::new(total_rows, page_size, requested);

    let paged = query.paginated(state.offset(), state.page_size);
    let table = executor.execute_tabular(paged.text(), paged.params(), timeouts.command)?;

    let clamped_from = (state.current_page != requested && state.total_pages > 0).then_some(requested);
    tracing::debug!(
        page = state.current_page,
        total_pages = state.total_pages,
        total_rows,
        rows = table.len(),
        "Loaded page"
    );
    Ok(Page {
        table,
        state,
        clamped_from,
    })
}

/// A compiled query and the page currently shown for it.
///
/// State only changes after a page was fetched successfully.
#[derive(Debug, Clone)]
pub struct Pager {
    query: CompiledQuery,
    state: PageState,
}

impl Pager {
    pub fn new(query: CompiledQuery, page_size: u64) -> Self {
        Self {
            query,
            state: PageState::new(0, page_size, 0),
        }
    }

    pub fn query(&self) -> &CompiledQuery {
        &self.query
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn load(
        &mut self,
        executor: &dyn Executor,
        requested: u64,
        timeouts: Timeouts,
    ) -> Result<Page, DataError> {
        let page = load_page(
            executor,
            &self.query,
            self.state.page_size,
            requested,
            timeouts,
        )?;
        self.state = page.state;
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DuckdbExecutor;
    use crate::data::executor::testing::StubExecutor;
    use crate::data::executor::CommandTimeout;
    use crate::data::types::{CellValue, ParamValue};
    use crate::domain::query::compiler::compile;
    use crate::domain::query::criteria::FilterCriteria;

    const TIMEOUTS: Timeouts = Timeouts {
        command: CommandTimeout::from_secs(5),
        long_command: CommandTimeout::from_secs(60),
    };

    fn query() -> CompiledQuery {
        compile(&FilterCriteria {
            station: "ST1".into(),
            ..Default::default()
        })
        .unwrap()
    }

    fn first_cell(page: &Page) -> &CellValue {
        &page.table.rows[0][0]
    }

    #[test]
    fn test_page_state_math() {
        let state = PageState::new(125, 50, 3);
        assert_eq!(state.total_pages, 3);
        assert_eq!(state.offset(), 100);
        assert!(state.has_previous());
        assert!(!state.has_next());

        assert_eq!(PageState::new(100, 50, 1).total_pages, 2);
        assert_eq!(PageState::new(1, 50, 1).total_pages, 1);

        let empty = PageState::new(0, 50, 4);
        assert_eq!(empty.total_pages, 0);
        assert_eq!(empty.current_page, 0);
        assert_eq!(empty.offset(), 0);
    }

    #[test]
    fn test_clamp_page() {
        assert_eq!(clamp_page(0, 3), 1);
        assert_eq!(clamp_page(10, 3), 3);
        assert_eq!(clamp_page(2, 3), 2);
        assert_eq!(clamp_page(5, 0), 0);
    }

    #[test]
    fn test_load_page_clamps_requests() {
        let executor = StubExecutor::numbered(125);
        let query = query();

        let low = load_page(&executor, &query, 50, 0, TIMEOUTS).unwrap();
        assert_eq!(low.state.current_page, 1);
        assert_eq!(low.state.total_pages, 3);
        assert_eq!(low.clamped_from, Some(0));
        assert_eq!(first_cell(&low), &CellValue::Int(1));

        let high = load_page(&executor, &query, 50, 10, TIMEOUTS).unwrap();
        assert_eq!(high.state.current_page, 3);
        assert_eq!(high.clamped_from, Some(10));
        assert_eq!(high.table.len(), 25);
        assert_eq!(first_cell(&high), &CellValue::Int(101));
    }

    #[test]
    fn test_load_page_binds_offset_and_limit() {
        let executor = StubExecutor::numbered(125);
        let page = load_page(&executor, &query(), 50, 2, TIMEOUTS).unwrap();
        assert_eq!(page.clamped_from, None);
        assert_eq!(page.table.len(), 50);
        assert_eq!(first_cell(&page), &CellValue::Int(51));

        let statements = executor.statements.lock();
        let (sql, params) = statements.last().unwrap();
        assert!(sql.ends_with("ORDER BY TRACE_LOG.TIMESTAMP LIMIT @PageSize OFFSET @Offset"));
        let offset = params.iter().find(|p| p.name == "@Offset").unwrap();
        assert_eq!(offset.value, ParamValue::Int(50));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_load_page_against_duckdb() {
        let executor = DuckdbExecutor::in_memory();
        executor
            .execute_batch(
                "INSERT INTO PN VALUES ('S1', 'R0402');
                 INSERT INTO REEL VALUES ('RID-1', 'S1', 'L1', '2401', 'ACME');
                 INSERT INTO TRACE_LOG
                   SELECT TIMESTAMP '2024-01-01 00:00:00' + to_minutes(range),
                          'WO' || range::VARCHAR, 'PCB', 'RID-1', 'ST1', 'F1', '1', 'P_A_1'
                   FROM range(125);",
            )
            .unwrap();
        let query = query();
        let kitid = |page: &Page, row: usize| page.table.rows[row][1].clone();

        let second = load_page(&executor, &query, 50, 2, TIMEOUTS).unwrap();
        assert_eq!(second.state.total_rows, 125);
        assert_eq!(second.state.total_pages, 3);
        assert_eq!(second.table.len(), 50);
        assert_eq!(second.table.columns[1], "KITID");
        assert_eq!(kitid(&second, 0), CellValue::Text("WO50".into()));
        assert_eq!(kitid(&second, 49), CellValue::Text("WO99".into()));

        let clamped = load_page(&executor, &query, 50, 10, TIMEOUTS).unwrap();
        assert_eq!(clamped.clamped_from, Some(10));
        assert_eq!(clamped.state.current_page, 3);
        assert_eq!(clamped.table.len(), 25);
        assert_eq!(kitid(&clamped, 0), CellValue::Text("WO100".into()));
    }

    #[test]
    fn test_empty_result_still_returns_columns() {
        let executor = StubExecutor::numbered(0);
        let page = load_page(&executor, &query(), 50, 1, TIMEOUTS).unwrap();
        assert_eq!(page.state.total_pages, 0);
        assert_eq!(page.state.current_page, 0);
        assert_eq!(page.clamped_from, None);
        assert!(page.table.is_empty());
        assert_eq!(page.table.columns, vec!["KITID".to_string()]);
    }

    #[test]
    fn test_pager_keeps_state_on_failure() {
        let mut pager = Pager::new(query(), 50);
        let executor = StubExecutor::numbered(125);
        pager.load(&executor, 2, TIMEOUTS).unwrap();
        assert_eq!(pager.state().current_page, 2);

        let failing = StubExecutor {
            fail_count: true,
            ..StubExecutor::numbered(125)
        };
        assert!(pager.load(&failing, 3, TIMEOUTS).is_err());
        assert_eq!(pager.state().current_page, 2);
        assert_eq!(pager.state().total_rows, 125);

        let broken_fetch = StubExecutor {
            fail_after: Some(0),
            ..StubExecutor::numbered(125)
        };
        assert!(pager.load(&broken_fetch, 3, TIMEOUTS).is_err());
        assert_eq!(pager.state().current_page, 2);
    }

    #[test]
    fn test_navigation_resolution() {
        let state = PageState::new(125, 50, 2);
        assert_eq!(state.resolve(&Navigation::First), Ok(1));
        assert_eq!(state.resolve(&Navigation::Previous), Ok(1));
        assert_eq!(state.resolve(&Navigation::Next), Ok(3));
        assert_eq!(state.resolve(&Navigation::Last), Ok(3));
        assert_eq!(state.resolve(&Navigation::Goto(" 3 ".into())), Ok(3));

        let last = PageState::new(125, 50, 3);
        assert_eq!(last.resolve(&Navigation::Next), Ok(3));
        let first = PageState::new(125, 50, 1);
        assert_eq!(first.resolve(&Navigation::Previous), Ok(1));
    }

    #[test]
    fn test_invalid_navigation_is_a_notice() {
        let state = PageState::new(125, 50, 2);
        assert_eq!(
            state.resolve(&Navigation::Goto("abc".into())),
            Err(PageNotice::NotANumber("abc".into()))
        );
        assert_eq!(
            state.resolve(&Navigation::Goto("0".into())),
            Err(PageNotice::OutOfRange {
                requested: 0,
                total_pages: 3
            })
        );
        assert_eq!(
            state.resolve(&Navigation::Goto("4".into())),
            Err(PageNotice::OutOfRange {
                requested: 4,
                total_pages: 3
            })
        );
        assert_eq!(
            PageState::new(0, 50, 1).resolve(&Navigation::Next),
            Err(PageNotice::NoResults)
        );
        assert_eq!(
            PageNotice::OutOfRange {
                requested: 4,
                total_pages: 3
            }
            .to_string(),
            "Page 4 is out of range (1-3)"
        );
    }
}
