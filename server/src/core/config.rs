use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::executor::{CommandTimeout, Timeouts};
use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_DATABASE_PATH,
    DEFAULT_DELIMITED_MAX_ROWS_PER_FILE, DEFAULT_EXPORT_DIR, DEFAULT_FLUSH_INTERVAL_ROWS,
    DEFAULT_LONG_COMMAND_TIMEOUT_SECS, DEFAULT_SPREADSHEET_THRESHOLD, SPREADSHEET_MAX_DATA_ROWS,
};

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Database configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    pub path: Option<String>,
    pub command_timeout_secs: Option<u64>,
    pub long_command_timeout_secs: Option<u64>,
}

/// Export configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ExportFileConfig {
    pub dir: Option<String>,
    pub spreadsheet_threshold: Option<u64>,
    pub delimited_max_rows_per_file: Option<u64>,
    pub flush_interval_rows: Option<u64>,
}

/// Statement log configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct LogFileConfig {
    pub query_log_dir: Option<String>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub database: Option<DatabaseFileConfig>,
    pub export: Option<ExportFileConfig>,
    pub log: Option<LogFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(database) = other.database {
            let current = self
                .database
                .get_or_insert_with(DatabaseFileConfig::default);
            if database.path.is_some() {
                tracing::trace!(path = ?database.path, "Merging database.path");
                current.path = database.path;
            }
            if database.command_timeout_secs.is_some() {
                current.command_timeout_secs = database.command_timeout_secs;
            }
            if database.long_command_timeout_secs.is_some() {
                current.long_command_timeout_secs = database.long_command_timeout_secs;
            }
        }

        if let Some(export) = other.export {
            let current = self.export.get_or_insert_with(ExportFileConfig::default);
            if export.dir.is_some() {
                tracing::trace!(dir = ?export.dir, "Merging export.dir");
                current.dir = export.dir;
            }
            if export.spreadsheet_threshold.is_some() {
                current.spreadsheet_threshold = export.spreadsheet_threshold;
            }
            if export.delimited_max_rows_per_file.is_some() {
                current.delimited_max_rows_per_file = export.delimited_max_rows_per_file;
            }
            if export.flush_interval_rows.is_some() {
                current.flush_interval_rows = export.flush_interval_rows;
            }
        }

        if let Some(log) = other.log {
            let current = self.log.get_or_insert_with(LogFileConfig::default);
            if log.query_log_dir.is_some() {
                current.query_log_dir = log.query_log_dir;
            }
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub command_timeout_secs: u64,
    pub long_command_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            command: CommandTimeout::from_secs(self.command_timeout_secs),
            long_command: CommandTimeout::from_secs(self.long_command_timeout_secs),
        }
    }
}

/// Export configuration
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub dir: PathBuf,
    /// Estimated rows at which the delimited-text sink replaces the spreadsheet sink
    pub spreadsheet_threshold: u64,
    pub spreadsheet_max_rows_per_file: u64,
    pub delimited_max_rows_per_file: u64,
    pub flush_interval_rows: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            spreadsheet_threshold: DEFAULT_SPREADSHEET_THRESHOLD,
            spreadsheet_max_rows_per_file: SPREADSHEET_MAX_DATA_ROWS,
            delimited_max_rows_per_file: DEFAULT_DELIMITED_MAX_ROWS_PER_FILE,
            flush_interval_rows: DEFAULT_FLUSH_INTERVAL_ROWS,
        }
    }
}

/// Statement log configuration
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Directory for the daily statement log; `None` logs through tracing only
    pub query_log_dir: Option<PathBuf>,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub export: ExportConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.tracequery/tracequery.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::from_layers(cli, file_config);
        config.validate()?;

        tracing::debug!(
            db = %config.database.path.display(),
            export_dir = %config.export.dir.display(),
            timeout_secs = config.database.command_timeout_secs,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Layer defaults -> file config -> CLI/env overrides
    fn from_layers(cli: &CliConfig, file_config: FileConfig) -> Self {
        let file_database = file_config.database.unwrap_or_default();
        let file_export = file_config.export.unwrap_or_default();
        let file_log = file_config.log.unwrap_or_default();
        let export_defaults = ExportConfig::default();

        let db_path = cli
            .db
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .or(file_database.path)
            .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());

        let export_dir = cli
            .export_dir
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .or(file_export.dir)
            .unwrap_or_else(|| DEFAULT_EXPORT_DIR.to_string());

        let query_log_dir = cli
            .query_log_dir
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .or(file_log.query_log_dir)
            .filter(|dir| !dir.trim().is_empty())
            .map(|dir| expand_path(&dir));

        Self {
            database: DatabaseConfig {
                path: expand_path(&db_path),
                command_timeout_secs: cli
                    .timeout
                    .or(file_database.command_timeout_secs)
                    .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
                long_command_timeout_secs: file_database
                    .long_command_timeout_secs
                    .unwrap_or(DEFAULT_LONG_COMMAND_TIMEOUT_SECS),
            },
            export: ExportConfig {
                dir: expand_path(&export_dir),
                spreadsheet_threshold: file_export
                    .spreadsheet_threshold
                    .unwrap_or(export_defaults.spreadsheet_threshold),
                spreadsheet_max_rows_per_file: export_defaults.spreadsheet_max_rows_per_file,
                delimited_max_rows_per_file: file_export
                    .delimited_max_rows_per_file
                    .unwrap_or(export_defaults.delimited_max_rows_per_file),
                flush_interval_rows: file_export
                    .flush_interval_rows
                    .unwrap_or(export_defaults.flush_interval_rows),
            },
            log: LogConfig { query_log_dir },
        }
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.database.path.as_os_str().is_empty() {
            anyhow::bail!("Configuration error: database.path must not be empty");
        }
        if self.database.command_timeout_secs == 0 {
            anyhow::bail!("Configuration error: database.command_timeout_secs must be greater than 0");
        }
        if self.database.long_command_timeout_secs == 0 {
            anyhow::bail!(
                "Configuration error: database.long_command_timeout_secs must be greater than 0"
            );
        }
        if self.export.spreadsheet_threshold == 0 {
            anyhow::bail!("Configuration error: export.spreadsheet_threshold must be greater than 0");
        }
        if self.export.delimited_max_rows_per_file == 0 {
            anyhow::bail!(
                "Configuration error: export.delimited_max_rows_per_file must be greater than 0"
            );
        }
        if self.export.flush_interval_rows == 0 {
            anyhow::bail!("Configuration error: export.flush_interval_rows must be greater than 0");
        }
        Ok(())
    }
}

/// Get the profile config path (~/.tracequery/tracequery.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}
