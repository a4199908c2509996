//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::core::cli::{self, Commands, FilterArgs, SystemCommands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME, APP_NAME_LOWER, ENV_LOG, GRID_MAX_CELL_CHARS};
use crate::data::{DuckdbExecutor, Executor};
use crate::diagnostics::{DiagnosedExecutor, QueryDiagnostics};
use crate::domain::export::{ChannelObserver, ExportEvent, ExportSummary};
use crate::domain::query::{FilterCriteria, Navigation, Page, PageNotice, compile, find_rows};
use crate::domain::{Navigated, ServiceError, TraceQueryService};
use crate::utils::file::ensure_dir;
use crate::utils::string::{translate_column_name, truncate_chars};

pub struct CoreApp {
    pub config: AppConfig,
    pub service: TraceQueryService,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let config = AppConfig::load(&cli_config)?;

        match command {
            Commands::System {
                command: system_cmd,
            } => Self::handle_system_command(&config, system_cmd),
            Commands::Sql { filters } => Self::print_sql(&filters),
            Commands::Search {
                filters,
                page,
                find,
                interactive,
            } => {
                Self::init(config)?
                    .search(&filters, &page, find.as_deref(), interactive)
                    .await
            }
            Commands::Count { filters } => Self::init(config)?.count(&filters).await,
            Commands::Export { filters } => Self::init(config)?.export(&filters).await,
        }
    }

    fn init(config: AppConfig) -> Result<Self> {
        let database = DuckdbExecutor::open_read_only(&config.database.path)
            .with_context(|| format!("Failed to open database {}", config.database.path.display()))?;
        let diagnostics = Arc::new(QueryDiagnostics::new(config.log.query_log_dir.clone()));
        let executor: Arc<dyn Executor> =
            Arc::new(DiagnosedExecutor::new(Arc::new(database), diagnostics));
        let service =
            TraceQueryService::new(executor, config.database.timeouts(), config.export.clone());

        tracing::debug!(db = %config.database.path.display(), "Database opened");
        Ok(Self { config, service })
    }

    fn handle_system_command(config: &AppConfig, cmd: SystemCommands) -> Result<()> {
        match cmd {
            SystemCommands::Init => Self::init_database(config),
        }
    }

    fn init_database(config: &AppConfig) -> Result<()> {
        let path = &config.database.path;
        if let Some(parent) = path.parent() {
            ensure_dir(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        DuckdbExecutor::create(path)
            .with_context(|| format!("Failed to initialize database: {}", path.display()))?;
        println!("Database ready: {}", path.display());
        Ok(())
    }

    fn criteria(filters: &FilterArgs) -> Result<FilterCriteria> {
        filters.to_criteria().map_err(anyhow::Error::msg)
    }

    fn print_sql(filters: &FilterArgs) -> Result<()> {
        let criteria = Self::criteria(filters)?;
        let query = compile(&criteria)?;
        tracing::debug!(side = %criteria.side, "Compiled statement");
        println!("{}", query.text());
        for param in query.params() {
            println!("  {} = {} ({})", param.name, param.value, param.param_type);
        }
        Ok(())
    }

    async fn search(
        &self,
        filters: &FilterArgs,
        page: &str,
        find: Option<&str>,
        interactive: bool,
    ) -> Result<()> {
        let criteria = Self::criteria(filters)?;
        let requested = match page.trim().parse::<i64>() {
            Ok(n) => u64::try_from(n).unwrap_or(0),
            Err(_) => {
                println!("{}", PageNotice::NotANumber(page.trim().to_string()));
                1
            }
        };

        let page = self.service.search(&criteria, requested).await?;
        if let Some(from) = page.clamped_from {
            println!(
                "Page {} is out of range; showing page {}",
                from, page.state.current_page
            );
        }
        Self::print_page(&page, find);

        if interactive {
            self.browse(page).await?;
        }
        Ok(())
    }

    /// Read navigation commands from stdin until `q` or end of input
    async fn browse(&self, mut page: Page) -> Result<()> {
        println!("n/p/f/l: next/previous/first/last, <number>: go to page, /<keyword>: find, q: quit");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let input = line.trim();
            let navigation = match input {
                "q" | "quit" => break,
                "" => continue,
                "n" => Navigation::Next,
                "p" => Navigation::Previous,
                "f" => Navigation::First,
                "l" => Navigation::Last,
                _ => {
                    if let Some(keyword) = input.strip_prefix('/') {
                        Self::print_page(&page, Some(keyword));
                        continue;
                    }
                    Navigation::Goto(input.to_string())
                }
            };
            match self.service.navigate(navigation).await? {
                Navigated::Page(next) => {
                    page = next;
                    Self::print_page(&page, None);
                }
                Navigated::Notice(notice) => println!("{}", notice),
            }
        }
        Ok(())
    }

    fn print_page(page: &Page, find: Option<&str>) {
        let matches = match find.map(|keyword| find_rows(&page.table, keyword)) {
            Some(Ok(rows)) => rows,
            Some(Err(notice)) => {
                println!("{}", notice);
                Vec::new()
            }
            None => Vec::new(),
        };

        let header: Vec<String> = page
            .table
            .columns
            .iter()
            .map(|c| translate_column_name(c).to_string())
            .collect();
        let rows: Vec<Vec<String>> = page
            .table
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        let text = cell.to_text().unwrap_or_default();
                        truncate_chars(&text, GRID_MAX_CELL_CHARS).into_owned()
                    })
                    .collect()
            })
            .collect();

        let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        let render = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join(" | ")
        };

        println!("  {}", render(&header));
        for (index, row) in rows.iter().enumerate() {
            let marker = if matches.contains(&index) { '*' } else { ' ' };
            println!("{} {}", marker, render(row));
        }
        let state = &page.state;
        let mut footer = format!(
            "Page {} of {} ({} rows)",
            state.current_page, state.total_pages, state.total_rows
        );
        if state.has_previous() {
            footer.push_str("  [p]rev");
        }
        if state.has_next() {
            footer.push_str("  [n]ext");
        }
        println!("{}", footer);
    }

    async fn count(&self, filters: &FilterArgs) -> Result<()> {
        let criteria = Self::criteria(filters)?;
        let report = self.service.count(&criteria).await?;
        println!("Fast count: {}", report.fast);
        println!("Rows: {}", report.exact);
        Ok(())
    }

    async fn export(&self, filters: &FilterArgs) -> Result<()> {
        let criteria = Self::criteria(filters)?;
        let (observer, mut rx) = ChannelObserver::channel();

        let cancel = CancellationToken::new();
        let ctrl_c = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("\nCancelling export...");
                    cancel.cancel();
                }
            })
        };
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    ExportEvent::Started { strategy, estimate } => match estimate {
                        Some(rows) => eprintln!("Exporting ~{} rows as {}", rows, strategy),
                        None => eprintln!("Exporting as {} (size unknown)", strategy),
                    },
                    ExportEvent::Progress {
                        rows_written,
                        total: Some(total),
                    } if total > 0 => {
                        let percent = (rows_written.min(total) * 100) / total;
                        eprintln!("  {} / {} rows ({}%)", rows_written, total, percent);
                    }
                    ExportEvent::Progress { rows_written, .. } => {
                        eprintln!("  {} rows", rows_written);
                    }
                    ExportEvent::FileFinished { path, rows } => {
                        eprintln!("  wrote {} ({} rows)", path.display(), rows);
                    }
                }
            }
        });

        let result = self
            .service
            .export(&criteria, Arc::new(observer), cancel)
            .await;
        ctrl_c.abort();
        if let Err(e) = printer.await {
            tracing::debug!(error = %e, "Progress printer stopped");
        }

        match result {
            Ok(summary) => {
                Self::print_summary(&summary);
                Ok(())
            }
            Err(ServiceError::Export(e)) => {
                let kind = if e.is_source_failure() {
                    "Database error"
                } else if e.is_sink_failure() {
                    "File write error"
                } else {
                    "Stopped"
                };
                if e.rows_written() > 0 {
                    println!(
                        "Partial export kept in {}",
                        self.config.export.dir.display()
                    );
                }
                anyhow::bail!("{}: {}", kind, e)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn print_summary(summary: &ExportSummary) {
        println!(
            "{} export complete: {} rows in {} file(s)",
            APP_NAME,
            summary.rows_written,
            summary.files.len()
        );
        for file in &summary.files {
            println!("  {} ({} rows)", file.path.display(), file.rows);
        }
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }
}
