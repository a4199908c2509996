//! String helpers for export sinks and the result grid

use std::borrow::Cow;

/// Display labels for raw result column names.
///
/// Keys are bare column names as the engine reports them (no table prefix).
pub const COLUMN_LABELS: &[(&str, &str)] = &[
    ("TIMESTAMP", "生產日期"),
    ("KITID", "工單號碼"),
    ("PN", "零件料號"),
    ("LOT", "零件LOT"),
    ("DATECODE", "零件DC"),
    ("SUPPLIER", "供應商"),
    ("PCBID", "PCBA序號"),
    ("RID", "ReelID"),
    ("TRACE_STATION", "SMT站別"),
    ("FCODE", "料槍"),
    ("MPROG", "製件程式"),
    ("LOC", "機台料站"),
];

/// Translate a raw column name to its display label.
///
/// Lookup is case-insensitive and ignores a `TABLE.` prefix. Unknown names pass
/// through unchanged.
pub fn translate_column_name(raw: &str) -> &str {
    let bare = raw.rsplit('.').next().unwrap_or(raw);
    COLUMN_LABELS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(bare))
        .map(|(_, label)| *label)
        .unwrap_or(raw)
}

/// Escape one field of comma-delimited text.
///
/// The field is quoted, with embedded quotes doubled, when it contains a comma,
/// a quote or a line break. NULL becomes the empty string.
pub fn escape_delimited(field: Option<&str>) -> Cow<'_, str> {
    let Some(field) = field else {
        return Cow::Borrowed("");
    };
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Truncate to at most `max_chars` characters, appending `…` when cut
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(format!("{}…", &s[..idx])),
        None => Cow::Borrowed(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_delimited_quotes_and_commas() {
        assert_eq!(escape_delimited(Some("a,b\"c")), "\"a,b\"\"c\"");
    }

    #[test]
    fn test_escape_delimited_plain_unchanged() {
        assert!(matches!(escape_delimited(Some("plain")), Cow::Borrowed("plain")));
    }

    #[test]
    fn test_escape_delimited_null_is_empty() {
        assert_eq!(escape_delimited(None), "");
    }

    #[test]
    fn test_escape_delimited_line_breaks() {
        assert_eq!(escape_delimited(Some("a\nb")), "\"a\nb\"");
        assert_eq!(escape_delimited(Some("a\r\nb")), "\"a\r\nb\"");
    }

    #[test]
    fn test_translate_known_column() {
        assert_eq!(translate_column_name("TIMESTAMP"), "生產日期");
        assert_eq!(translate_column_name("trace_station"), "SMT站別");
        assert_eq!(translate_column_name("REEL.LOT"), "零件LOT");
    }

    #[test]
    fn test_translate_unknown_passes_through() {
        assert_eq!(translate_column_name("SPN"), "SPN");
        assert_eq!(translate_column_name("count_star()"), "count_star()");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("零件料號XYZ", 4), "零件料號…");
    }
}
