//! Health evaluation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::stats::percent;
use crate::models::{MemoryUsage, OperationRecord, OperationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub issues: Vec<String>,
    pub memory_percent: Option<f64>,
    pub hourly_error_rate: f64,
    pub active_operations: usize,
    pub stuck_operations: usize,
    pub checked_at: DateTime<Utc>,
}

/// Thresholds for [`evaluate_health`], all in percent except `stuck_after`.
#[derive(Debug, Clone)]
pub struct HealthThresholds {
    pub memory_warning: f64,
    pub memory_critical: f64,
    pub error_rate_warning: f64,
    pub error_rate_critical: f64,
    pub stuck_after: Duration,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            memory_warning: 75.0,
            memory_critical: 90.0,
            error_rate_warning: 25.0,
            error_rate_critical: 50.0,
            stuck_after: Duration::hours(1),
        }
    }
}

/// Failed share (percent) of operations started in the hour before `now`.
pub fn hourly_error_rate<'a>(
    operations: impl IntoIterator<Item = &'a OperationRecord>,
    now: DateTime<Utc>,
) -> f64 {
    let since = now - Duration::hours(1);
    let (total, failed) = operations
        .into_iter()
        .filter(|op| op.started_at >= since)
        .fold((0u64, 0u64), |(total, failed), op| {
            (total + 1, failed + (op.status == OperationStatus::Failed) as u64)
        });
    percent(failed, total)
}

/// Derive overall health from memory, recent failures and stuck operations.
pub fn evaluate_health(
    memory: Option<MemoryUsage>,
    operations: &[&OperationRecord],
    thresholds: &HealthThresholds,
    now: DateTime<Utc>,
) -> HealthReport {
    let mut status = HealthStatus::Healthy;
    let mut issues = Vec::new();
    let mut raise = |level: HealthStatus, issue: String| {
        status = status.max(level);
        issues.push(issue);
    };

    let memory_percent = memory.map(|m| m.percent());
    if let Some(pct) = memory_percent {
        if pct > thresholds.memory_critical {
            raise(
                HealthStatus::Critical,
                format!("High memory usage (>{}%)", thresholds.memory_critical),
            );
        } else if pct > thresholds.memory_warning {
            raise(
                HealthStatus::Warning,
                format!("Elevated memory usage (>{}%)", thresholds.memory_warning),
            );
        }
    }

    let error_rate = hourly_error_rate(operations.iter().copied(), now);
    if error_rate > thresholds.error_rate_critical {
        raise(
            HealthStatus::Critical,
            format!("High error rate (>{}%)", thresholds.error_rate_critical),
        );
    } else if error_rate > thresholds.error_rate_warning {
        raise(
            HealthStatus::Warning,
            format!("Elevated error rate (>{}%)", thresholds.error_rate_warning),
        );
    }

    let active: Vec<_> = operations.iter().filter(|op| op.is_running()).collect();
    let stuck = active
        .iter()
        .filter(|op| now - op.started_at > thresholds.stuck_after)
        .count();
    if stuck > 0 {
        raise(
            HealthStatus::Warning,
            format!(
                "{} operations running for over {} minutes",
                stuck,
                thresholds.stuck_after.num_minutes()
            ),
        );
    }

    HealthReport {
        status,
        issues,
        memory_percent,
        hourly_error_rate: error_rate,
        active_operations: active.len(),
        stuck_operations: stuck,
        checked_at: now,
    }
}
