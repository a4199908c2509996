//! Filter-to-SQL compiler
//!
//! Turns `FilterCriteria` into one parameterized statement over the fixed
//! three-table join:
//!
//! ```text
//! SELECT <projection> FROM <join> WHERE <base predicate> [AND <filter>]* ORDER BY <timestamp>
//! ```
//!
//! Every user-supplied value becomes a named parameter. Clause order and
//! parameter order are fixed, so identical criteria always compile to
//! identical output.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::core::constants::{
    BASE_PREDICATE, FROM_CLAUSE, KITID_MAX_LEN, ORDER_COLUMN, PARAM_OFFSET, PARAM_PAGE_SIZE,
};
use crate::data::types::QueryParam;
use crate::utils::sql::{escape_like_pattern, has_order_by, placeholders, strip_order_by};

use super::criteria::{FilterCriteria, Side};
use super::error::CompileError;

/// Statement text plus its parameters in binding order.
///
/// Immutable: pagination and counting derive new values from a copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    text: String,
    params: Vec<QueryParam>,
}

impl CompiledQuery {
    pub fn new(text: impl Into<String>, params: Vec<QueryParam>) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }

    pub fn has_order_by(&self) -> bool {
        has_order_by(&self.text)
    }

    /// Statement text without its top-level `ORDER BY`
    pub fn without_order_by(&self) -> &str {
        strip_order_by(&self.text)
    }

    /// Every placeholder has exactly one parameter and every parameter is used
    pub fn is_consistent(&self) -> bool {
        let used: HashSet<String> = placeholders(&self.text)
            .into_iter()
            .map(|p| p.to_ascii_lowercase())
            .collect();
        let declared: Vec<String> = self
            .params
            .iter()
            .map(|p| p.name.to_ascii_lowercase())
            .collect();
        let unique: HashSet<&String> = declared.iter().collect();
        unique.len() == declared.len()
            && used.len() == declared.len()
            && declared.iter().all(|name| used.contains(name))
    }

    /// Copy with a deterministic `ORDER BY` appended when none is present
    pub fn ordered(&self) -> CompiledQuery {
        if self.has_order_by() {
            return self.clone();
        }
        tracing::warn!("Statement has no ORDER BY; ordering by {}", ORDER_COLUMN);
        CompiledQuery {
            text: format!("{} ORDER BY {}", self.text.trim_end(), ORDER_COLUMN),
            params: self.params.clone(),
        }
    }

    /// Exact-count statement: the unordered query wrapped in `COUNT(*)`
    pub fn count_query(&self) -> CompiledQuery {
        CompiledQuery {
            text: format!(
                "SELECT COUNT(*) FROM ({}) AS counted",
                self.without_order_by()
            ),
            params: self.params.clone(),
        }
    }

    /// One page of this query.
    ///
    /// Pagination parameters left over from earlier navigation are replaced,
    /// never accumulated.
    pub fn paginated(&self, offset: u64, limit: u64) -> CompiledQuery {
        let ordered = self.ordered();
        let mut params: Vec<QueryParam> = ordered
            .params
            .into_iter()
            .filter(|p| {
                !p.name.eq_ignore_ascii_case(PARAM_OFFSET)
                    && !p.name.eq_ignore_ascii_case(PARAM_PAGE_SIZE)
            })
            .collect();
        params.push(QueryParam::bigint(
            PARAM_PAGE_SIZE,
            i64::try_from(limit).unwrap_or(i64::MAX),
        ));
        params.push(QueryParam::bigint(
            PARAM_OFFSET,
            i64::try_from(offset).unwrap_or(i64::MAX),
        ));
        CompiledQuery {
            text: format!(
                "{} LIMIT {} OFFSET {}",
                ordered.text.trim_end(),
                PARAM_PAGE_SIZE,
                PARAM_OFFSET
            ),
            params,
        }
    }
}

/// Collects `WHERE` conjuncts and their parameters in insertion order
struct WhereBuilder {
    conditions: Vec<String>,
    params: Vec<QueryParam>,
}

impl WhereBuilder {
    fn new() -> Self {
        Self {
            conditions: BASE_PREDICATE.iter().map(|c| c.to_string()).collect(),
            params: Vec::new(),
        }
    }

    fn push(&mut self, condition: impl Into<String>, params: impl IntoIterator<Item = QueryParam>) {
        self.conditions.push(condition.into());
        self.params.extend(params);
    }

    /// `column = @name` when `value` is non-blank
    fn equals(&mut self, column: &str, name: &str, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        self.push(
            format!("{} = {}", column, name),
            [QueryParam::text(name, value)],
        );
    }

    /// `column LIKE @name` with the wildcards carried in the parameter value
    fn like(&mut self, column: &str, name: &str, pattern: String) {
        self.push(
            format!(r"{} LIKE {} ESCAPE '\'", column, name),
            [QueryParam::text(name, pattern)],
        );
    }

    fn into_parts(self) -> (String, Vec<QueryParam>) {
        (self.conditions.join(" AND "), self.params)
    }
}

fn next_day(date: NaiveDate) -> Result<NaiveDate, CompileError> {
    date.succ_opt().ok_or(CompileError::DateOutOfRange(date))
}

/// Compile criteria into a single parameterized statement
pub fn compile(criteria: &FilterCriteria) -> Result<CompiledQuery, CompileError> {
    let projection = criteria.projection()?;
    let mut builder = WhereBuilder::new();

    // Half-open day range; the indexed column is never wrapped in a function
    match (criteria.start, criteria.end) {
        (Some(start), None) => builder.push(
            format!("{0} >= @startDate AND {0} < @startDateNext", ORDER_COLUMN),
            [
                QueryParam::date("@startDate", start),
                QueryParam::date("@startDateNext", next_day(start)?),
            ],
        ),
        (None, Some(end)) => builder.push(
            format!("{} < @endDateExclusive", ORDER_COLUMN),
            [QueryParam::date("@endDateExclusive", next_day(end)?)],
        ),
        (Some(start), Some(end)) => builder.push(
            format!("{0} >= @startDate AND {0} < @endDateExclusive", ORDER_COLUMN),
            [
                QueryParam::date("@startDate", start),
                QueryParam::date("@endDateExclusive", next_day(end)?),
            ],
        ),
        (None, None) => {}
    }

    let eng_sr = criteria.eng_sr.trim();
    if !eng_sr.is_empty() {
        builder.like(
            "TRACE_LOG.MPROG",
            "@engsr",
            format!("%{}%", escape_like_pattern(eng_sr)),
        );
    }

    match criteria.side {
        Side::A => builder.push(r"TRACE_LOG.MPROG LIKE '%\_A\_%' ESCAPE '\'", []),
        Side::B => builder.push(r"TRACE_LOG.MPROG LIKE '%\_B\_%' ESCAPE '\'", []),
        Side::Any => {}
    }

    let tokens = criteria.work_order_tokens();
    if !tokens.is_empty() {
        let params: Vec<QueryParam> = tokens
            .iter()
            .enumerate()
            .map(|(i, token)| QueryParam::varchar(&format!("@wip{}", i), *token, KITID_MAX_LEN))
            .collect();
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        let condition = format!("TRACE_LOG.KITID IN ({})", names.join(", "));
        builder.push(condition, params);
    }

    builder.equals("PN.PN", "@pn", &criteria.part_number);
    builder.equals("REEL.LOT", "@lotcode", &criteria.lot);
    builder.equals("REEL.DATECODE", "@dc", &criteria.date_code);
    builder.equals("REEL.SUPPLIER", "@supplier", &criteria.supplier);
    builder.equals("TRACE_LOG.PCBID", "@pcba", &criteria.pcb_id);

    let reel_id = criteria.reel_id.trim();
    if !reel_id.is_empty() {
        builder.like(
            "REEL.RID",
            "@rid",
            format!("{}%", escape_like_pattern(reel_id)),
        );
    }

    builder.equals("TRACE_LOG.TRACE_STATION", "@station", &criteria.station);
    builder.equals("TRACE_LOG.FCODE", "@feeder", &criteria.feeder_id);
    builder.equals("TRACE_LOG.MPROG", "@program", &criteria.program);
    builder.equals("TRACE_LOG.LOC", "@slot", &criteria.slot);

    let (conditions, params) = builder.into_parts();
    let text = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}",
        projection.join(", "),
        FROM_CLAUSE,
        conditions,
        ORDER_COLUMN
    );

    tracing::debug!(
        params = params.len(),
        columns = projection.len(),
        side = %criteria.side,
        "Compiled search"
    );

    let query = CompiledQuery::new(text, params);
    debug_assert!(query.is_consistent());
    Ok(query)
}
