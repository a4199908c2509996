//! Row-count estimation
//!
//! Sizes a query as cheaply as its shape allows:
//!
//! - no effective filter: table metadata (exact, no scan)
//! - simple conjunctive filter: the planner's estimate (advisory)
//! - anything else: unavailable, and the caller runs an exact `COUNT(*)`
//!
//! The shape checks are conservative text heuristics over statements produced
//! by the compiler. Text inside string literals never triggers a rule.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::constants::{BASE_PREDICATE, FACT_TABLE};
use crate::data::error::DataError;
use crate::data::executor::{CommandTimeout, Executor, Timeouts};
use crate::data::types::{ParamValue, QueryParam};
use crate::utils::sql::{mask_literals, quoted_literals, strip_order_by};

use super::compiler::CompiledQuery;

static SHAPE_DISQUALIFIERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(GROUP\s+BY|DISTINCT|UNION|INTERSECT|EXCEPT|HAVING|QUALIFY)\b")
        .expect("Invalid regex")
});

static FROM_FACT_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?i)\bFROM\s+(?:"?\w+"?\.)?"?{}"?(?:\s|$)"#,
        FACT_TABLE
    ))
    .expect("Invalid regex")
});

static WHERE_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bWHERE\b").expect("Invalid regex"));

static AND_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAND\b").expect("Invalid regex"));

static FILTER_DISQUALIFIERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\bOR\b|\bNOT\b|<>|!=|\b(CONTAINS|CHARINDEX|PATINDEX|REGEXP\w*|SIMILAR|GLOB|ILIKE|STRPOS|INSTR|POSITION)\b)",
    )
    .expect("Invalid regex")
});

/// Outcome of the fast path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastCount {
    /// From table metadata; safe for pagination math
    Exact(u64),
    /// From the query plan; advisory only
    Estimated(u64),
    /// Not safe to shortcut; run the exact count
    Unavailable(&'static str),
}

impl FastCount {
    /// Value usable for exact pagination
    pub fn exact(&self) -> Option<u64> {
        match self {
            FastCount::Exact(n) => Some(*n),
            _ => None,
        }
    }

    /// Value usable as an advisory size
    pub fn approximate(&self) -> Option<u64> {
        match self {
            FastCount::Exact(n) | FastCount::Estimated(n) => Some(*n),
            FastCount::Unavailable(_) => None,
        }
    }
}

impl fmt::Display for FastCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FastCount::Exact(n) => write!(f, "{} (exact, table metadata)", n),
            FastCount::Estimated(n) => write!(f, "~{} (planner estimate)", n),
            FastCount::Unavailable(reason) => write!(f, "unavailable ({})", reason),
        }
    }
}

/// Collapse whitespace and case for predicate comparison
fn normalize(predicate: &str) -> String {
    predicate
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

fn is_base_conjunct(conjunct: &str) -> bool {
    let normalized = normalize(conjunct);
    BASE_PREDICATE.iter().any(|base| normalize(base) == normalized)
}

/// WHERE conjuncts beyond the base predicate, as `(original, masked)` pairs.
///
/// Callers must already have rejected parenthesized text, so every `AND`
/// is top-level.
fn effective_filters<'a>(sql: &'a str, masked: &'a str) -> Vec<(&'a str, &'a str)> {
    let Some(found) = WHERE_KEYWORD.find(masked) else {
        return Vec::new();
    };
    let start = found.end();
    let mut bounds = vec![start];
    for m in AND_KEYWORD.find_iter(&masked[start..]) {
        bounds.push(start + m.start());
        bounds.push(start + m.end());
    }
    bounds.push(sql.len());

    bounds
        .chunks(2)
        .map(|pair| (sql[pair[0]..pair[1]].trim(), masked[pair[0]..pair[1]].trim()))
        .filter(|(original, _)| !original.is_empty() && !is_base_conjunct(original))
        .collect()
}

/// `%` somewhere other than the final position, ignoring escaped `\%`
fn has_inner_wildcard(pattern: &str) -> bool {
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '%' if chars.peek().is_some() => return true,
            _ => {}
        }
    }
    false
}

/// Try to size `sql` without scanning its result.
///
/// Never fails: every problem, including database errors, becomes
/// `Unavailable`.
pub fn try_fast_count(
    executor: &dyn Executor,
    sql: &str,
    params: &[QueryParam],
    timeout: CommandTimeout,
) -> FastCount {
    let sql = strip_order_by(sql);
    let masked = mask_literals(sql);

    if masked.contains('(') || SHAPE_DISQUALIFIERS.is_match(&masked) {
        return FastCount::Unavailable("query shape");
    }
    if !FROM_FACT_TABLE.is_match(&masked) {
        return FastCount::Unavailable("not the fact table");
    }

    let filters = effective_filters(sql, &masked);
    if filters.is_empty() {
        return match executor.table_row_count(FACT_TABLE, timeout) {
            Ok(Some(rows)) => FastCount::Exact(rows),
            Ok(None) => FastCount::Unavailable("no table metadata"),
            Err(e) => {
                tracing::debug!(error = %e, "Table metadata lookup failed");
                FastCount::Unavailable("metadata lookup failed")
            }
        };
    }

    for (original, masked) in &filters {
        if FILTER_DISQUALIFIERS.is_match(masked) {
            return FastCount::Unavailable("complex filter");
        }
        if quoted_literals(original).iter().any(|l| has_inner_wildcard(l)) {
            return FastCount::Unavailable("wildcard pattern");
        }
    }
    let wildcard_param = params.iter().any(|p| match &p.value {
        ParamValue::Text(value) => has_inner_wildcard(value),
        _ => false,
    });
    if wildcard_param {
        return FastCount::Unavailable("wildcard pattern");
    }

    match executor.plan_row_estimate(sql, params, timeout) {
        Ok(Some(rows)) => FastCount::Estimated(rows),
        Ok(None) => FastCount::Unavailable("no plan estimate"),
        Err(e) => {
            tracing::debug!(error = %e, "Plan estimate failed");
            FastCount::Unavailable("plan unavailable")
        }
    }
}

/// `COUNT(*)` over the unordered query
pub fn exact_count(
    executor: &dyn Executor,
    query: &CompiledQuery,
    timeout: CommandTimeout,
) -> Result<u64, DataError> {
    let count = query.count_query();
    let value = executor.execute_scalar(count.text(), count.params(), timeout)?;
    value
        .as_u64()
        .ok_or_else(|| DataError::UnexpectedValue(format!("row count: {}", value)))
}

/// Row count trustworthy enough for pagination.
///
/// Only a metadata count is accepted from the fast path; otherwise the exact
/// count runs with the long timeout.
pub fn row_count_for_paging(
    executor: &dyn Executor,
    query: &CompiledQuery,
    timeouts: Timeouts,
) -> Result<u64, DataError> {
    let fast = try_fast_count(
        executor,
        query.without_order_by(),
        query.params(),
        timeouts.command,
    );
    if let Some(rows) = fast.exact() {
        return Ok(rows);
    }
    tracing::debug!(fast = %fast, "Falling back to exact count");
    exact_count(executor, query, timeouts.long())
}

/// Best-effort size for choosing an export strategy and sizing progress.
///
/// `None` means indeterminate; failures here never abort the caller.
pub fn advisory_estimate(
    executor: &dyn Executor,
    query: &CompiledQuery,
    timeouts: Timeouts,
) -> Option<u64> {
    let fast = try_fast_count(
        executor,
        query.without_order_by(),
        query.params(),
        timeouts.command,
    );
    if let Some(rows) = fast.approximate() {
        return Some(rows);
    }
    match exact_count(executor, query, timeouts.long()) {
        Ok(rows) => Some(rows),
        Err(e) => {
            tracing::warn!(error = %e, "Row estimate unavailable; progress is indeterminate");
            None
        }
    }
}
