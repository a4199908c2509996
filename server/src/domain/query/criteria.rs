//! Search criteria
//!
//! One search action's worth of optional predicates. Text fields that are
//! empty or whitespace are "not applied", never "equals empty string".

use std::fmt;

use chrono::NaiveDate;

use crate::core::constants::{DEFAULT_COLUMNS, EXTRA_COLUMNS};

use super::error::CompileError;

/// Board side, derived from the `_A_` / `_B_` marker in the program name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Side {
    #[default]
    Any,
    A,
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Any => write!(f, "any"),
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// First day included
    pub start: Option<NaiveDate>,
    /// Last day included; the compiled bound is the following midnight
    pub end: Option<NaiveDate>,
    /// Engineering serial, matched as a substring of the program name
    pub eng_sr: String,
    /// Comma-separated work orders
    pub work_orders: String,
    pub side: Side,
    pub part_number: String,
    pub lot: String,
    pub date_code: String,
    pub supplier: String,
    pub pcb_id: String,
    /// Matched as a prefix
    pub reel_id: String,
    pub station: String,
    /// Matched exactly
    pub program: String,
    pub slot: String,
    pub feeder_id: String,
    /// Qualified projection columns in display order; empty selects the defaults
    pub columns: Vec<String>,
}

impl FilterCriteria {
    /// Trimmed, non-empty work order tokens in input order
    pub fn work_order_tokens(&self) -> Vec<&str> {
        self.work_orders
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Resolve the projection against the known columns.
    ///
    /// Matching is case-insensitive and returns the canonical spelling.
    /// Duplicates keep their first position.
    pub fn projection(&self) -> Result<Vec<&'static str>, CompileError> {
        if self.columns.iter().all(|c| c.trim().is_empty()) {
            return Ok(DEFAULT_COLUMNS.to_vec());
        }

        let mut projection: Vec<&'static str> = Vec::with_capacity(self.columns.len());
        for raw in self.columns.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
            let column = DEFAULT_COLUMNS
                .iter()
                .chain(EXTRA_COLUMNS)
                .find(|known| known.eq_ignore_ascii_case(raw))
                .copied()
                .ok_or_else(|| CompileError::UnknownColumn(raw.to_string()))?;
            if !projection.contains(&column) {
                projection.push(column);
            }
        }
        Ok(projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_order_tokens_drop_blanks() {
        let criteria = FilterCriteria {
            work_orders: "A,B, ,C,".to_string(),
            ..Default::default()
        };
        assert_eq!(criteria.work_order_tokens(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_work_order_tokens_whitespace_only() {
        let criteria = FilterCriteria {
            work_orders: "  ,  ".to_string(),
            ..Default::default()
        };
        assert!(criteria.work_order_tokens().is_empty());
    }

    #[test]
    fn test_projection_defaults() {
        let criteria = FilterCriteria::default();
        assert_eq!(criteria.projection().unwrap(), DEFAULT_COLUMNS.to_vec());
        assert_eq!(criteria.projection().unwrap().len(), 12);
    }

    #[test]
    fn test_projection_canonical_and_deduplicated() {
        let criteria = FilterCriteria {
            columns: vec![
                "pn.pn".to_string(),
                "TRACE_LOG.KITID".to_string(),
                "PN.PN".to_string(),
                "reel.spn".to_string(),
            ],
            ..Default::default()
        };
        assert_eq!(
            criteria.projection().unwrap(),
            vec!["PN.PN", "TRACE_LOG.KITID", "REEL.SPN"]
        );
    }

    #[test]
    fn test_projection_rejects_unknown_column() {
        let criteria = FilterCriteria {
            columns: vec!["TRACE_LOG.KITID; DROP TABLE PN".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            criteria.projection(),
            Err(CompileError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_side_display() {
        assert_eq!(Side::Any.to_string(), "any");
        assert_eq!(Side::B.to_string(), "B");
    }
}
