//! Shared value types for the data layer
//!
//! Parameters flow from the query compiler into the executor; cells flow back
//! out of a cursor into the pager, the terminal table and the export sinks.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

/// Declared SQL type of a bound parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Calendar date with no time component
    Date,
    /// Character data, optionally with the column's declared width
    VarChar { max_len: Option<u32> },
    BigInt,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Date => write!(f, "Date"),
            ParamType::VarChar { max_len: Some(n) } => write!(f, "VarChar({})", n),
            ParamType::VarChar { max_len: None } => write!(f, "VarChar"),
            ParamType::BigInt => write!(f, "BigInt"),
        }
    }
}

/// Value of a bound parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Date(NaiveDate),
    Text(String),
    Int(i64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            ParamValue::Text(s) => write!(f, "{}", s),
            ParamValue::Int(n) => write!(f, "{}", n),
        }
    }
}

/// A named parameter, e.g. `@pn = 'R0402' (VarChar)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    /// Placeholder name including the `@` sigil
    pub name: String,
    pub value: ParamValue,
    pub param_type: ParamType,
}

impl QueryParam {
    pub fn date(name: &str, value: NaiveDate) -> Self {
        Self {
            name: name.to_string(),
            value: ParamValue::Date(value),
            param_type: ParamType::Date,
        }
    }

    pub fn text(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: ParamValue::Text(value.into()),
            param_type: ParamType::VarChar { max_len: None },
        }
    }

    pub fn varchar(name: &str, value: impl Into<String>, max_len: u32) -> Self {
        Self {
            name: name.to_string(),
            value: ParamValue::Text(value.into()),
            param_type: ParamType::VarChar {
                max_len: Some(max_len),
            },
        }
    }

    pub fn bigint(name: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            value: ParamValue::Int(value),
            param_type: ParamType::BigInt,
        }
    }
}

/// A single cell read from a cursor
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Interpret the cell as a non-negative count
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            CellValue::Int(n) => u64::try_from(*n).ok(),
            CellValue::Float(f) if *f >= 0.0 => Some(*f as u64),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text form used by the grid and the export sinks. NULL renders as `None`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(n) => write!(f, "{}", n),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::Timestamp(ts) => write!(f, "{}", crate::utils::time::format_timestamp(ts)),
        }
    }
}

/// A fully materialized result page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
