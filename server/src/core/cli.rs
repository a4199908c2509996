use clap::{Args, Parser, Subcommand};

use std::path::PathBuf;

use crate::domain::query::{FilterCriteria, Side};
use crate::utils::time::parse_date_input;

use super::constants::{
    ENV_COMMAND_TIMEOUT, ENV_CONFIG, ENV_DB_PATH, ENV_EXPORT_DIR, ENV_QUERY_LOG_DIR,
};

#[derive(Parser)]
#[command(name = "tracequery")]
#[command(version, about = "SMT trace log search and export", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// DuckDB database file
    #[arg(long, global = true, env = ENV_DB_PATH)]
    pub db: Option<PathBuf>,

    /// Directory for exported files
    #[arg(long, global = true, env = ENV_EXPORT_DIR)]
    pub export_dir: Option<PathBuf>,

    /// Command timeout in seconds
    #[arg(long, global = true, env = ENV_COMMAND_TIMEOUT)]
    pub timeout: Option<u64>,

    /// Directory for the daily executed-statement log
    #[arg(long, global = true, env = ENV_QUERY_LOG_DIR)]
    pub query_log_dir: Option<PathBuf>,
}

/// Parse a side flag from CLI input
fn parse_side(s: &str) -> Result<Side, String> {
    match s.to_lowercase().as_str() {
        "a" => Ok(Side::A),
        "b" => Ok(Side::B),
        "any" | "" => Ok(Side::Any),
        _ => Err(format!("Invalid side '{}'. Valid options: a, b, any", s)),
    }
}

/// Search filters shared by every query command
#[derive(Args, Clone, Debug, Default)]
pub struct FilterArgs {
    /// First production day (YYYYMMDD or YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,

    /// Last production day, inclusive (YYYYMMDD or YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,

    /// Engineering serial, matched anywhere in the program name
    #[arg(long)]
    pub eng: Option<String>,

    /// Board side from the program name
    #[arg(long, value_parser = parse_side)]
    pub side: Option<Side>,

    /// Comma-separated work orders
    #[arg(long)]
    pub wono: Option<String>,

    /// Part number
    #[arg(long)]
    pub pn: Option<String>,

    #[arg(long)]
    pub lot: Option<String>,

    #[arg(long)]
    pub date_code: Option<String>,

    #[arg(long)]
    pub supplier: Option<String>,

    /// PCBA serial
    #[arg(long)]
    pub pcb_id: Option<String>,

    /// Reel id prefix
    #[arg(long)]
    pub reel_id: Option<String>,

    #[arg(long)]
    pub station: Option<String>,

    /// Program name, matched exactly
    #[arg(long)]
    pub program: Option<String>,

    #[arg(long)]
    pub slot: Option<String>,

    #[arg(long)]
    pub feeder_id: Option<String>,

    /// Qualified columns to show, e.g. TRACE_LOG.KITID,PN.PN
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,
}

impl FilterArgs {
    /// Build search criteria. Only malformed dates are rejected here.
    pub fn to_criteria(&self) -> Result<FilterCriteria, String> {
        let date = |input: &Option<String>| match input {
            Some(s) => parse_date_input(s),
            None => Ok(None),
        };
        let text = |input: &Option<String>| input.clone().unwrap_or_default();

        Ok(FilterCriteria {
            start: date(&self.start)?,
            end: date(&self.end)?,
            eng_sr: text(&self.eng),
            work_orders: text(&self.wono),
            side: self.side.unwrap_or_default(),
            part_number: text(&self.pn),
            lot: text(&self.lot),
            date_code: text(&self.date_code),
            supplier: text(&self.supplier),
            pcb_id: text(&self.pcb_id),
            reel_id: text(&self.reel_id),
            station: text(&self.station),
            program: text(&self.program),
            slot: text(&self.slot),
            feeder_id: text(&self.feeder_id),
            columns: self.columns.clone(),
        })
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Search and show one page of results
    Search {
        #[command(flatten)]
        filters: FilterArgs,

        /// Page to show
        #[arg(long, default_value = "1")]
        page: String,

        /// Highlight rows on the page containing this keyword
        #[arg(long)]
        find: Option<String>,

        /// Keep the result open and navigate pages from stdin
        #[arg(long, short)]
        interactive: bool,
    },
    /// Count matching rows
    Count {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Export every matching row to the export directory
    Export {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Print the compiled statement and its parameters
    Sql {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// System maintenance commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum SystemCommands {
    /// Create the database file and its tables if missing
    Init,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub db: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub query_log_dir: Option<PathBuf>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig {
        config: cli.config,
        db: cli.db,
        export_dir: cli.export_dir,
        timeout: cli.timeout,
        query_log_dir: cli.query_log_dir,
    };
    (config, cli.command)
}
