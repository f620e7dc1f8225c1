//! Rolling-window statistics over operation records.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{OperationRecord, OperationStatus};

static ERROR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]+Error|Error)").unwrap());
static CAPITALIZED_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z][a-z]+)\s").unwrap());

/// Number of error types reported in [`OperationStats::top_errors`].
pub const TOP_ERRORS: usize = 10;

/// Bucket an error message into a coarse type.
///
/// A leading `...Error` token wins, then a leading capitalized word,
/// otherwise `UnknownError`.
pub fn classify_error(message: &str) -> String {
    let message = message.trim_start();
    if let Some(caps) = ERROR_TOKEN.captures(message) {
        return caps[1].to_string();
    }
    if let Some(caps) = CAPITALIZED_WORD.captures(message) {
        return caps[1].to_string();
    }
    "UnknownError".to_string()
}

/// Supported aggregation windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "1h",
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Month => "30d",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1h" => Some(Self::Hour),
            "24h" => Some(Self::Day),
            "7d" => Some(Self::Week),
            "30d" => Some(Self::Month),
            _ => None,
        }
    }

    pub fn window(&self) -> Duration {
        match self {
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::hours(24),
            Self::Week => Duration::days(7),
            Self::Month => Duration::days(30),
        }
    }

    /// Width of one timeline bucket.
    pub fn bucket(&self) -> Duration {
        match self {
            Self::Hour => Duration::minutes(10),
            Self::Day => Duration::hours(1),
            Self::Week | Self::Month => Duration::days(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCount {
    pub error_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineBucket {
    pub start: DateTime<Utc>,
    pub operations: u64,
}

/// Aggregate statistics for one window.
#[derive(Debug, Clone, Serialize)]
pub struct OperationStats {
    pub time_range: TimeRange,
    pub total_operations: u64,
    pub completed_operations: u64,
    pub failed_operations: u64,
    pub running_operations: u64,
    /// Mean duration of finished operations, rounded to whole milliseconds.
    pub average_duration_ms: i64,
    pub total_processed: u64,
    pub total_successful: u64,
    /// Percent of operations completed, two decimals.
    pub success_rate: f64,
    /// Percent of operations failed, two decimals.
    pub error_rate: f64,
    pub top_errors: Vec<ErrorCount>,
    pub timeline: Vec<TimelineBucket>,
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(part as f64 / total as f64 * 100.0)
}

/// Compute statistics over operations started within `range` of `now`.
pub fn compute_stats<'a>(
    operations: impl IntoIterator<Item = &'a OperationRecord>,
    range: TimeRange,
    now: DateTime<Utc>,
) -> OperationStats {
    let since = now - range.window();
    let bucket_secs = range.bucket().num_seconds();

    let mut stats = OperationStats {
        time_range: range,
        total_operations: 0,
        completed_operations: 0,
        failed_operations: 0,
        running_operations: 0,
        average_duration_ms: 0,
        total_processed: 0,
        total_successful: 0,
        success_rate: 0.0,
        error_rate: 0.0,
        top_errors: Vec::new(),
        timeline: Vec::new(),
    };

    let mut durations = Vec::new();
    let mut error_counts: HashMap<String, u64> = HashMap::new();
    let mut buckets: HashMap<i64, u64> = HashMap::new();

    for op in operations.into_iter().filter(|op| op.started_at >= since) {
        stats.total_operations += 1;
        match op.status {
            OperationStatus::Completed => stats.completed_operations += 1,
            OperationStatus::Failed => stats.failed_operations += 1,
            OperationStatus::Running => stats.running_operations += 1,
        }
        stats.total_processed += op.processed;
        stats.total_successful += op.successful;
        if let Some(ms) = op.duration_ms {
            durations.push(ms);
        }
        for error in &op.errors {
            *error_counts.entry(classify_error(error)).or_default() += 1;
        }

        let ts = op.started_at.timestamp();
        *buckets.entry(ts - ts.rem_euclid(bucket_secs)).or_default() += 1;
    }

    if !durations.is_empty() {
        let sum: i64 = durations.iter().sum();
        stats.average_duration_ms = (sum as f64 / durations.len() as f64).round() as i64;
    }
    stats.success_rate = percent(stats.completed_operations, stats.total_operations);
    stats.error_rate = percent(stats.failed_operations, stats.total_operations);

    let mut top: Vec<ErrorCount> = error_counts
        .into_iter()
        .map(|(error_type, count)| ErrorCount { error_type, count })
        .collect();
    top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.error_type.cmp(&b.error_type)));
    top.truncate(TOP_ERRORS);
    stats.top_errors = top;

    let mut timeline: Vec<TimelineBucket> = buckets
        .into_iter()
        .filter_map(|(start, operations)| {
            Utc.timestamp_opt(start, 0)
                .single()
                .map(|start| TimelineBucket { start, operations })
        })
        .collect();
    timeline.sort_by_key(|b| b.start);
    stats.timeline = timeline;

    stats
}
