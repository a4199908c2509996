//! Keyword search within a fetched page

use std::fmt;

use crate::data::types::Table;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchNotice {
    EmptyKeyword,
    NoMatch(String),
}

impl fmt::Display for SearchNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchNotice::EmptyKeyword => write!(f, "Enter a search keyword"),
            SearchNotice::NoMatch(keyword) => write!(f, "No rows match '{}'", keyword),
        }
    }
}

/// Indices of rows where any non-null cell contains `keyword`, ignoring case
pub fn find_rows(table: &Table, keyword: &str) -> Result<Vec<usize>, SearchNotice> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(SearchNotice::EmptyKeyword);
    }
    let needle = keyword.to_lowercase();

    let matches: Vec<usize> = table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            row.iter()
                .filter_map(|cell| cell.to_text())
                .any(|text| text.to_lowercase().contains(&needle))
        })
        .map(|(index, _)| index)
        .collect();

    if matches.is_empty() {
        return Err(SearchNotice::NoMatch(keyword.to_string()));
    }
    Ok(matches)
}
