//! `KEY=value` line codec shared by the object files and the config files.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, VrmrError};

/// Keys are a letter followed by letters, digits or underscores
static KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("KEY: hardcoded regex is invalid")
});

/// Split a line into key and value.
///
/// Blank lines, comments and lines starting with whitespace yield `None`,
/// as do lines without `=`. A value wrapped in double quotes is unquoted.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\n', '\r']);
    let first = line.chars().next()?;
    if first == '#' || first.is_whitespace() {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    Some((key, unquote(value)))
}

/// Strip one pair of surrounding double quotes.
pub fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Render a `KEY="value"` line without the trailing newline.
pub fn format_line(key: &str, value: &str) -> String {
    format!("{}=\"{}\"", key.to_ascii_uppercase(), value)
}

/// Check that `key` and `value` fit on one `KEY="value"` line and read
/// back unchanged.
pub fn check_entry(key: &str, value: &str) -> Result<()> {
    if !KEY.is_match(key) {
        return Err(VrmrError::InvalidName(format!("'{}' is not a valid key", key)));
    }
    if value.contains(['\n', '\r']) {
        return Err(VrmrError::Parse(format!(
            "value of '{}' contains a line break",
            key
        )));
    }
    Ok(())
}

/// Does `line` hold `key`? Keys compare case-insensitively.
pub fn line_has_key(line: &str, key: &str) -> bool {
    parse_line(line).is_some_and(|(k, _)| k.eq_ignore_ascii_case(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quoted_and_bare() {
        assert_eq!(parse_line("NAME=\"alice\"\n"), Some(("NAME", "alice")));
        assert_eq!(parse_line("ACTIVE=yes"), Some(("ACTIVE", "yes")));
        assert_eq!(parse_line("COMMENT=\"a=b\""), Some(("COMMENT", "a=b")));
        assert_eq!(parse_line("EMPTY=\"\""), Some(("EMPTY", "")));
        assert_eq!(parse_line("EMPTY="), Some(("EMPTY", "")));
    }

    #[test]
    fn test_skip_lines() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("\n"), None);
        assert_eq!(parse_line("# comment=1"), None);
        assert_eq!(parse_line("  INDENTED=1"), None);
        assert_eq!(parse_line("\tTAB=1"), None);
        assert_eq!(parse_line("NOEQUALS"), None);
    }

    #[test]
    fn test_lone_quote_is_kept() {
        assert_eq!(parse_line("X=\""), Some(("X", "\"")));
    }

    #[test]
    fn test_format_line() {
        assert_eq!(format_line("active", "yes"), "ACTIVE=\"yes\"");
    }

    #[test]
    fn test_check_entry() {
        assert!(check_entry("ACTIVE", "yes").is_ok());
        assert!(check_entry("port_range", "a \"quoted\" = value").is_ok());
        for key in ["", "A=B", "MY KEY", "#ACTIVE", " ACTIVE", "1ST"] {
            assert!(
                matches!(check_entry(key, "x"), Err(VrmrError::InvalidName(_))),
                "accepted key {:?}",
                key
            );
        }
        for value in ["x\nACTIVE=\"yes\"", "x\r", "\n"] {
            assert!(
                matches!(check_entry("COMMENT", value), Err(VrmrError::Parse(_))),
                "accepted value {:?}",
                value
            );
        }
    }

    #[test]
    fn test_line_has_key() {
        assert!(line_has_key("MEMBER=\"a\"", "member"));
        assert!(!line_has_key("MEMBERS=\"a\"", "MEMBER"));
        assert!(!line_has_key("#MEMBER=\"a\"", "MEMBER"));
    }
}
