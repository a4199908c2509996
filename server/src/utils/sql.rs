//! SQL text utilities
//!
//! Bounded text heuristics over statements this crate produces. These are not a
//! SQL parser: they understand single-quoted literals, parentheses depth and
//! `@name` placeholders, and nothing else.

use std::sync::LazyLock;

use regex::Regex;

use crate::data::error::DataError;
use crate::data::types::QueryParam;

static ORDER_BY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bORDER\s+BY\b").expect("Invalid regex"));

/// Escape SQL LIKE metacharacters (%, _, \) in user input
///
/// Use this when building LIKE patterns from user input to prevent
/// unintended pattern matching. Pair with `ESCAPE '\'`.
///
/// # Example
///
/// ```
/// use tracequery_server::utils::sql::escape_like_pattern;
///
/// let user_input = "100% match_test";
/// let pattern = format!("%{}%", escape_like_pattern(user_input));
/// assert_eq!(pattern, "%100\\% match\\_test%");
/// ```
pub fn escape_like_pattern(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Replace the contents of every single-quoted literal with spaces.
///
/// Byte offsets are preserved, so positions found in the masked text are valid
/// in the original. `''` inside a literal is an escaped quote.
pub fn mask_literals(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut in_literal = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if in_literal {
            if b == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                }
                in_literal = false;
                out.push(b'\'');
            } else {
                out.push(b' ');
            }
        } else {
            if b == b'\'' {
                in_literal = true;
            }
            out.push(b);
        }
        i += 1;
    }
    // Literal bytes became spaces and quotes are ASCII, so this is still UTF-8
    String::from_utf8(out).unwrap_or_default()
}

/// Contents of every single-quoted literal, with `''` unescaped
pub fn quoted_literals(sql: &str) -> Vec<String> {
    let mut literals = Vec::new();
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }
        let mut literal = String::new();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    literal.push('\'');
                    continue;
                }
                break;
            }
            literal.push(c);
        }
        literals.push(literal);
    }
    literals
}

/// Parenthesis depth at byte offset `pos` of masked text
fn depth_at(masked: &str, pos: usize) -> i32 {
    masked[..pos].bytes().fold(0, |depth, b| match b {
        b'(' => depth + 1,
        b')' => depth - 1,
        _ => depth,
    })
}

/// Byte offset of the last top-level `ORDER BY`, if any
pub fn find_top_level_order_by(sql: &str) -> Option<usize> {
    let masked = mask_literals(sql);
    ORDER_BY
        .find_iter(&masked)
        .filter(|m| depth_at(&masked, m.start()) == 0)
        .map(|m| m.start())
        .last()
}

pub fn has_order_by(sql: &str) -> bool {
    find_top_level_order_by(sql).is_some()
}

/// Statement text with its top-level `ORDER BY` clause removed
pub fn strip_order_by(sql: &str) -> &str {
    match find_top_level_order_by(sql) {
        Some(pos) => sql[..pos].trim_end(),
        None => sql.trim_end(),
    }
}

/// Named `@placeholders` outside literals, in order of appearance (with repeats)
pub fn placeholders(sql: &str) -> Vec<&str> {
    let masked = mask_literals(sql);
    let bytes = masked.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'@'
            && bytes
                .get(i + 1)
                .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_')
        {
            let start = i;
            i += 1;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            found.push(&sql[start..i]);
            continue;
        }
        i += 1;
    }
    found
}

/// Rewrite `@name` placeholders to positional `?` markers.
///
/// Returns the rewritten text and the parameters in binding order. A parameter
/// used twice is bound twice.
pub fn bind_positional<'a>(
    sql: &str,
    params: &'a [QueryParam],
) -> Result<(String, Vec<&'a QueryParam>), DataError> {
    let names = placeholders(sql);
    let mut text = String::with_capacity(sql.len());
    let mut bound = Vec::with_capacity(names.len());
    let mut rest = sql;
    let mut consumed = 0;

    for name in names {
        let param = params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| DataError::UnboundParameter(name.to_string()))?;
        bound.push(param);

        // Placeholders are subslices of `sql`, so offsets come straight from the pointers
        let offset = name.as_ptr() as usize - sql.as_ptr() as usize;
        let (before, after) = rest.split_at(offset - consumed);
        text.push_str(before);
        text.push('?');
        rest = &after[name.len()..];
        consumed = offset + name.len();
    }
    text.push_str(rest);
    Ok((text, bound))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_pattern_no_special_chars() {
        assert_eq!(escape_like_pattern("hello"), "hello");
    }

    #[test]
    fn test_escape_like_pattern_multiple() {
        assert_eq!(escape_like_pattern("100%_\\test"), "100\\%\\_\\\\test");
    }

    #[test]
    fn test_mask_literals_preserves_offsets() {
        let sql = "SELECT a FROM t WHERE b = 'x OR y' AND c = 'it''s'";
        let masked = mask_literals(sql);
        assert_eq!(masked.len(), sql.len());
        assert!(!masked.contains("OR y"));
        assert!(masked.contains("AND c ="));
    }

    #[test]
    fn test_mask_literals_multibyte() {
        let sql = "SELECT '生產日期' AS x";
        let masked = mask_literals(sql);
        assert_eq!(masked.len(), sql.len());
        assert!(masked.ends_with("' AS x"));
    }

    #[test]
    fn test_quoted_literals() {
        let lits = quoted_literals("a LIKE '%\\_A\\_%' AND b = 'it''s'");
        assert_eq!(lits, vec!["%\\_A\\_%".to_string(), "it's".to_string()]);
    }

    #[test]
    fn test_strip_order_by() {
        assert_eq!(
            strip_order_by("SELECT a FROM t WHERE x = 1 ORDER BY a "),
            "SELECT a FROM t WHERE x = 1"
        );
        assert_eq!(strip_order_by("SELECT a FROM t"), "SELECT a FROM t");
    }

    #[test]
    fn test_strip_order_by_ignores_nested_and_literals() {
        let sql = "SELECT a FROM (SELECT a FROM t ORDER BY a) q WHERE b = 'ORDER BY'";
        assert!(!has_order_by(sql));
        assert_eq!(strip_order_by(sql), sql);
    }

    #[test]
    fn test_placeholders_in_order() {
        let sql = "x >= @startDate AND y IN (@wip0, @wip1) AND z = '@notme'";
        assert_eq!(placeholders(sql), vec!["@startDate", "@wip0", "@wip1"]);
    }

    #[test]
    fn test_bind_positional() {
        let params = vec![
            QueryParam::text("@b", "2"),
            QueryParam::text("@a", "1"),
        ];
        let (text, bound) =
            bind_positional("SELECT * FROM t WHERE a = @a AND b = @b AND c = '@a'", &params)
                .unwrap();
        assert_eq!(text, "SELECT * FROM t WHERE a = ? AND b = ? AND c = '@a'");
        let names: Vec<&str> = bound.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["@a", "@b"]);
    }

    #[test]
    fn test_bind_positional_unbound() {
        let err = bind_positional("SELECT @missing", &[]).unwrap_err();
        assert!(matches!(err, DataError::UnboundParameter(ref n) if n == "@missing"));
    }
}
