//! File utility functions

use std::path::{Path, PathBuf};

/// Expand a user-supplied path to an absolute path.
///
/// Handles `~` / `~/path` (home directory) and makes relative paths absolute
/// against the current directory. Absolute paths pass through unchanged.
///
/// ```text
/// expand_path("~/.tracequery")  // -> /home/user/.tracequery
/// expand_path("Export")         // -> /current/dir/Export
/// expand_path("/data/trace.db") // -> /data/trace.db
/// ```
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();

    if path.is_empty() {
        return std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    }

    let expanded = if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
    } else if let Some(rest) = path.strip_prefix("~/") {
        match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        }
    } else {
        PathBuf::from(path)
    };

    if expanded.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    } else {
        expanded
    }
}

/// Create `dir` and its parents if missing
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.is_dir() {
        std::fs::create_dir_all(dir)?;
        tracing::debug!(path = %dir.display(), "Created directory");
    }
    Ok(())
}
