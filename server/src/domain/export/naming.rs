//! Export file naming
//!
//! Files share a timestamp base name. The first file carries no suffix;
//! spreadsheets continue `{base}_2.xlsx`, delimited text `{base}_part2.csv`.

use std::path::{Path, PathBuf};

use super::sink::SinkStrategy;

pub fn export_file_name(base: &str, strategy: SinkStrategy, index: u32) -> String {
    let ext = strategy.extension();
    match (index, strategy) {
        (0 | 1, _) => format!("{}.{}", base, ext),
        (n, SinkStrategy::Spreadsheet) => format!("{}_{}.{}", base, n, ext),
        (n, SinkStrategy::Delimited) => format!("{}_part{}.{}", base, n, ext),
    }
}

pub fn export_file_path(dir: &Path, base: &str, strategy: SinkStrategy, index: u32) -> PathBuf {
    dir.join(export_file_name(base, strategy, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spreadsheet_names() {
        let base = "20240102030405";
        assert_eq!(
            export_file_name(base, SinkStrategy::Spreadsheet, 1),
            "20240102030405.xlsx"
        );
        assert_eq!(
            export_file_name(base, SinkStrategy::Spreadsheet, 2),
            "20240102030405_2.xlsx"
        );
    }

    #[test]
    fn test_delimited_names() {
        let base = "20240102030405";
        assert_eq!(
            export_file_name(base, SinkStrategy::Delimited, 1),
            "20240102030405.csv"
        );
        assert_eq!(
            export_file_name(base, SinkStrategy::Delimited, 3),
            "20240102030405_part3.csv"
        );
        assert_eq!(
            export_file_path(Path::new("Export"), base, SinkStrategy::Delimited, 2),
            Path::new("Export").join("20240102030405_part2.csv")
        );
    }
}
