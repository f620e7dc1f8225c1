//! Sanitizers for scraped strings.
//!
//! Scraped input is noisy and sometimes hostile. Every function here is
//! total: malformed input degrades to an empty string or `None`.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());
static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static ZERO_WIDTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[\u{200B}-\u{200D}\u{FEFF}]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Currency symbols, thousands separators and whitespace.
static NUMBER_NOISE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[£$€¥₹,\s]").unwrap());
static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d{1,2})?").unwrap());

static URL_UNSAFE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[<>"']"#).unwrap());

/// Date formats tried in order after RFC 3339.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Strip markup, zero-width characters and redundant whitespace.
///
/// `<script>` and `<style>` blocks are removed together with their content.
pub fn sanitize_text(input: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(input, " ");
    let text = STYLE_BLOCK.replace_all(&text, " ");
    let text = TAG.replace_all(&text, " ");
    let text = ZERO_WIDTH.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((idx, _)) => input[..idx].to_string(),
        None => input.to_string(),
    }
}

/// Clean a URL and accept it only if it is http or https.
pub fn sanitize_url(input: &str) -> Option<String> {
    let cleaned = URL_UNSAFE.replace_all(input, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    let url = url::Url::parse(cleaned).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}

/// Pull the first number out of a noisy string like `" $12,345.67 "`.
///
/// At most two decimal digits are kept. Returns `default` when no digits
/// are present.
pub fn extract_number(input: &str, default: Option<f64>) -> Option<f64> {
    let cleaned = NUMBER_NOISE.replace_all(input, "");
    NUMBER
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .or(default)
}

/// Parse a calendar date, rejecting anything outside ten years of today.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    parse_date_relative_to(input, Utc::now().date_naive())
}

/// Like [`parse_date`], with an explicit reference day for the window.
///
/// The window runs from January 1st ten years before `today` through
/// December 31st ten years after it.
pub fn parse_date_relative_to(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let date = parse_any_date(input.trim())?;

    let earliest = NaiveDate::from_ymd_opt(today.year() - 10, 1, 1)?;
    let latest = NaiveDate::from_ymd_opt(today.year() + 10, 12, 31)?;
    if date < earliest || date > latest {
        return None;
    }
    Some(date)
}

fn parse_any_date(input: &str) -> Option<NaiveDate> {
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Some(dt.date());
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(input, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_text_strips_markup() {
        assert_eq!(
            sanitize_text("<p>Intro to   <b>Rust</b></p>\n\n"),
            "Intro to Rust"
        );
        assert_eq!(
            sanitize_text("Safe<script>alert('x')</script> text"),
            "Safe text"
        );
        assert_eq!(
            sanitize_text("<style>.a { color: red }</style>Body"),
            "Body"
        );
    }

    #[test]
    fn test_sanitize_text_removes_zero_width() {
        assert_eq!(sanitize_text("Com\u{200B}puter\u{FEFF} Science"), "Computer Science");
    }

    #[test]
    fn test_sanitize_text_degenerate_input() {
        assert_eq!(sanitize_text(""), "");
        assert_eq!(sanitize_text("   \t\n"), "");
        assert_eq!(sanitize_text("<<<>>>"), ">>");
        assert_eq!(sanitize_text("<script>never closed"), "never closed");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_sanitize_url() {
        assert_eq!(
            sanitize_url("https://example.edu/courses"),
            Some("https://example.edu/courses".to_string())
        );
        assert_eq!(
            sanitize_url("  http://example.edu/\"a<b>'  "),
            Some("http://example.edu/ab".to_string())
        );
        assert_eq!(sanitize_url("javascript:alert(1)"), None);
        assert_eq!(sanitize_url("ftp://example.edu/file"), None);
        assert_eq!(sanitize_url("not a url"), None);
        assert_eq!(sanitize_url(""), None);
    }

    #[test]
    fn test_extract_number() {
        assert_eq!(extract_number("  $12,345.67 ", None), Some(12345.67));
        assert_eq!(extract_number("no digits", Some(0.0)), Some(0.0));
        assert_eq!(extract_number("no digits", None), None);
        assert_eq!(extract_number("£9 500 per year", None), Some(9500.0));
        assert_eq!(extract_number("1234.5678", None), Some(1234.56));
        assert_eq!(extract_number("", Some(3.0)), Some(3.0));
    }

    #[test]
    fn test_parse_date_formats() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let expected = NaiveDate::from_ymd_opt(2027, 9, 1);
        assert_eq!(parse_date_relative_to("2027-09-01", today), expected);
        assert_eq!(parse_date_relative_to("09/01/2027", today), expected);
        assert_eq!(parse_date_relative_to("September 1, 2027", today), expected);
        assert_eq!(parse_date_relative_to("1 Sep 2027", today), expected);
        assert_eq!(
            parse_date_relative_to("2027-09-01T08:30:00Z", today),
            expected
        );
        assert_eq!(parse_date_relative_to("soon", today), None);
        assert_eq!(parse_date_relative_to("", today), None);
    }

    #[test]
    fn test_parse_date_window() {
        let today = Utc::now().date_naive();
        let in_five = format!("{}-03-15", today.year() + 5);
        let in_twenty = format!("{}-03-15", today.year() + 20);
        let long_ago = format!("{}-03-15", today.year() - 20);

        assert!(parse_date(&in_five).is_some());
        assert_eq!(parse_date(&in_twenty), None);
        assert_eq!(parse_date(&long_ago), None);
    }
}
