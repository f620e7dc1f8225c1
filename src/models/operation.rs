//! Operation metric records kept by the monitoring sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Running,
    Completed,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// What an operation is about, supplied when it starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationDetails {
    /// Kind of work, e.g. `"ingest_target"`.
    pub operation: String,
    /// Target (institution) name, if the operation is scoped to one.
    pub target: Option<String>,
}

impl OperationDetails {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            target: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Counter increments applied to a running operation.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub errors: Vec<String>,
}

impl ProgressUpdate {
    pub fn success() -> Self {
        Self {
            processed: 1,
            successful: 1,
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            processed: 1,
            failed: 1,
            errors: vec![error.into()],
            ..Default::default()
        }
    }
}

/// Process memory reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl MemoryUsage {
    /// Fraction of `total_bytes` in use, 0.0 when the total is unknown.
    pub fn ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.total_bytes as f64
    }

    pub fn percent(&self) -> f64 {
        self.ratio() * 100.0
    }
}

/// One tracked unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Unique key returned by `start_operation`.
    pub key: String,
    pub operation: String,
    pub target: Option<String>,
    pub status: OperationStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Set when the operation completes.
    pub duration_ms: Option<i64>,
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub errors: Vec<String>,
    pub memory: Option<MemoryUsage>,
}

impl OperationRecord {
    pub fn new(key: String, details: OperationDetails, memory: Option<MemoryUsage>) -> Self {
        Self {
            key,
            operation: details.operation,
            target: details.target,
            status: OperationStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            processed: 0,
            successful: 0,
            failed: 0,
            errors: Vec::new(),
            memory,
        }
    }

    pub fn apply(&mut self, update: &ProgressUpdate) {
        self.processed += update.processed;
        self.successful += update.successful;
        self.failed += update.failed;
        self.errors.extend(update.errors.iter().cloned());
    }

    /// Freeze the record. Completing twice keeps the first end time.
    pub fn finish(&mut self, status: OperationStatus, at: DateTime<Utc>) {
        if self.ended_at.is_some() {
            return;
        }
        self.status = status;
        self.ended_at = Some(at);
        self.duration_ms = Some((at - self.started_at).num_milliseconds());
    }

    pub fn is_running(&self) -> bool {
        self.status == OperationStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_accumulates() {
        let mut rec = OperationRecord::new("op_1".into(), OperationDetails::new("ingest"), None);
        rec.apply(&ProgressUpdate::success());
        rec.apply(&ProgressUpdate::success());
        rec.apply(&ProgressUpdate::failure("ValidationError: title"));

        assert_eq!(rec.processed, 3);
        assert_eq!(rec.successful, 2);
        assert_eq!(rec.failed, 1);
        assert_eq!(rec.errors, vec!["ValidationError: title".to_string()]);
    }

    #[test]
    fn test_finish_is_sticky() {
        let mut rec = OperationRecord::new("op_1".into(), OperationDetails::new("ingest"), None);
        let end = rec.started_at + chrono::Duration::milliseconds(1500);
        rec.finish(OperationStatus::Completed, end);
        rec.finish(OperationStatus::Failed, end + chrono::Duration::seconds(10));

        assert_eq!(rec.status, OperationStatus::Completed);
        assert_eq!(rec.duration_ms, Some(1500));
        assert!(!rec.is_running());
    }

    #[test]
    fn test_memory_ratio() {
        let mem = MemoryUsage {
            used_bytes: 95,
            total_bytes: 100,
        };
        assert!((mem.ratio() - 0.95).abs() < f64::EPSILON);
        let unknown = MemoryUsage {
            used_bytes: 10,
            total_bytes: 0,
        };
        assert_eq!(unknown.ratio(), 0.0);
    }
}
