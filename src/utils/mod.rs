//! Shared utility functions.
//!
//! - `sanitize`: cleaning of untrusted scraped strings (text, numbers, dates, URLs)

pub mod sanitize;

pub use sanitize::{extract_number, parse_date, sanitize_text, sanitize_url, truncate_chars};
