//! Helper utilities for CLI output.

use chrono::{DateTime, Utc};
use console::{style, StyledObject};

use crate::services::monitoring::HealthStatus;

/// Truncate a string to a maximum number of characters, adding "..." if truncated.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format bytes as human-readable size.
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.2} GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.2} MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.2} KB", bytes as f64 / 1_000.0)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Local timestamp, or "Never".
pub fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|dt| {
        dt.with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    })
    .unwrap_or_else(|| "Never".to_string())
}

pub fn styled_health(status: HealthStatus) -> StyledObject<&'static str> {
    match status {
        HealthStatus::Healthy => style(status.as_str()).green(),
        HealthStatus::Warning => style(status.as_str()).yellow(),
        HealthStatus::Critical => style(status.as_str()).red(),
    }
}
