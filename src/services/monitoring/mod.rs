//! Monitoring and metrics sink.
//!
//! Tracks operation lifecycles (start, progress, completion), aggregates
//! them over rolling windows, evaluates health and takes periodic system
//! snapshots. Both the operation log and the snapshot history are bounded:
//! once a cap is reached the oldest entry is evicted.

mod health;
mod memory;
mod stats;

pub use health::{evaluate_health, hourly_error_rate, HealthReport, HealthStatus, HealthThresholds};
pub use memory::{FixedMemoryProbe, MemoryProbe, ProcessMemoryProbe};
pub use stats::{
    classify_error, compute_stats, ErrorCount, OperationStats, TimeRange, TimelineBucket,
};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::models::{
    MemoryUsage, OperationDetails, OperationRecord, OperationStatus, ProgressUpdate,
};

/// Monitoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSettings {
    /// Most recent operation records kept.
    #[serde(default = "default_max_operations")]
    pub max_operations: usize,
    /// Most recent system snapshots kept.
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: usize,
    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
    /// Finished operations older than this are pruned by the cleanup job.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_max_operations() -> usize {
    1000
}

fn default_max_snapshots() -> usize {
    500
}

fn default_snapshot_interval_secs() -> u64 {
    300
}

fn default_retention_days() -> i64 {
    30
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            max_snapshots: default_max_snapshots(),
            snapshot_interval_secs: default_snapshot_interval_secs(),
            retention_days: default_retention_days(),
        }
    }
}

/// Severity of a custom event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

impl EventLevel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Periodic process snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    pub taken_at: DateTime<Utc>,
    pub host: Option<String>,
    pub memory: Option<MemoryUsage>,
    pub active_operations: usize,
    pub tracked_operations: usize,
}

/// Point-in-time metrics for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentMetrics {
    pub memory: Option<MemoryUsage>,
    pub active_operations: usize,
    pub hourly_error_rate: f64,
    pub tracked_operations: usize,
    pub last_snapshot_at: Option<DateTime<Utc>>,
}

/// Filter for [`MonitoringService::operations`].
#[derive(Debug, Clone, Default)]
pub struct OperationFilter {
    pub limit: Option<usize>,
    pub status: Option<OperationStatus>,
    pub since: Option<DateTime<Utc>>,
    /// Case-insensitive substring of the target name.
    pub target: Option<String>,
}

#[derive(Default)]
struct MonitorState {
    operations: VecDeque<OperationRecord>,
    snapshots: VecDeque<SystemSnapshot>,
    error_counts: HashMap<String, u64>,
}

impl MonitorState {
    fn operation_mut(&mut self, key: &str) -> Option<&mut OperationRecord> {
        self.operations.iter_mut().rev().find(|op| op.key == key)
    }

    fn count_error(&mut self, message: &str) {
        *self.error_counts.entry(classify_error(message)).or_default() += 1;
    }
}

/// In-process metrics sink shared through `Arc`.
pub struct MonitoringService {
    settings: MonitoringSettings,
    thresholds: HealthThresholds,
    probe: Arc<dyn MemoryProbe>,
    state: RwLock<MonitorState>,
}

impl MonitoringService {
    pub fn new(settings: MonitoringSettings) -> Self {
        Self::with_probe(settings, Arc::new(ProcessMemoryProbe))
    }

    pub fn with_probe(settings: MonitoringSettings, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            settings,
            thresholds: HealthThresholds::default(),
            probe,
            state: RwLock::new(MonitorState::default()),
        }
    }

    pub fn settings(&self) -> &MonitoringSettings {
        &self.settings
    }

    /// Open a running operation record and return its key.
    pub async fn start_operation(&self, id: &str, details: OperationDetails) -> String {
        let key = format!("{}_{}", id, details.operation);
        debug!(operation = %key, target = ?details.target, "Operation started");
        let record = OperationRecord::new(key.clone(), details, self.probe.sample());

        let mut state = self.state.write().await;
        state.operations.push_back(record);
        while state.operations.len() > self.settings.max_operations {
            state.operations.pop_front();
        }
        key
    }

    /// Apply counter increments and errors. Returns false for unknown keys.
    pub async fn update_progress(&self, key: &str, update: ProgressUpdate) -> bool {
        let mut state = self.state.write().await;
        for error in &update.errors {
            state.count_error(error);
        }
        match state.operation_mut(key) {
            Some(op) => {
                op.apply(&update);
                true
            }
            None => {
                debug!(operation = %key, "Progress for unknown operation");
                false
            }
        }
    }

    /// Stamp end time and final status. Returns false for unknown keys.
    pub async fn complete_operation(&self, key: &str, status: OperationStatus) -> bool {
        let mut state = self.state.write().await;
        let Some(op) = state.operation_mut(key) else {
            return false;
        };
        op.finish(status, Utc::now());
        info!(
            operation = %key,
            status = op.status.as_str(),
            duration_ms = op.duration_ms.unwrap_or_default(),
            "Operation {}/{} records succeeded",
            op.successful,
            op.processed
        );
        true
    }

    /// Aggregate statistics for `range`.
    pub async fn stats(&self, range: TimeRange) -> OperationStats {
        let state = self.state.read().await;
        compute_stats(&state.operations, range, Utc::now())
    }

    pub async fn health(&self) -> HealthReport {
        let state = self.state.read().await;
        let ops: Vec<&OperationRecord> = state.operations.iter().collect();
        evaluate_health(self.probe.sample(), &ops, &self.thresholds, Utc::now())
    }

    /// Operation records matching `filter`, newest first.
    pub async fn operations(&self, filter: &OperationFilter) -> Vec<OperationRecord> {
        let target = filter.target.as_ref().map(|t| t.to_lowercase());
        let state = self.state.read().await;

        let mut matched: Vec<OperationRecord> = state
            .operations
            .iter()
            .filter(|op| filter.status.is_none_or(|s| op.status == s))
            .filter(|op| filter.since.is_none_or(|since| op.started_at >= since))
            .filter(|op| match (&target, &op.target) {
                (None, _) => true,
                (Some(needle), Some(name)) => name.to_lowercase().contains(needle.as_str()),
                (Some(_), None) => false,
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        matched
    }

    /// Record a custom event. Errors are classified and counted.
    pub async fn log_event(
        &self,
        level: EventLevel,
        message: &str,
        context: Option<&serde_json::Value>,
    ) {
        let context = context.map(|c| c.to_string()).unwrap_or_default();
        match level {
            EventLevel::Info => info!(context = %context, "{}", message),
            EventLevel::Warning => warn!(context = %context, "{}", message),
            EventLevel::Error => {
                error!(context = %context, "{}", message);
                self.state.write().await.count_error(message);
            }
        }
    }

    /// Error-type counts across every progress update and error event.
    pub async fn error_counts(&self) -> HashMap<String, u64> {
        self.state.read().await.error_counts.clone()
    }

    /// Take a snapshot and add it to the bounded history.
    pub async fn record_snapshot(&self) -> SystemSnapshot {
        let memory = self.probe.sample();
        let mut state = self.state.write().await;
        let snapshot = SystemSnapshot {
            taken_at: Utc::now(),
            host: hostname::get().ok().and_then(|h| h.into_string().ok()),
            memory,
            active_operations: state.operations.iter().filter(|op| op.is_running()).count(),
            tracked_operations: state.operations.len(),
        };

        state.snapshots.push_back(snapshot.clone());
        while state.snapshots.len() > self.settings.max_snapshots {
            state.snapshots.pop_front();
        }
        snapshot
    }

    pub async fn snapshots(&self) -> Vec<SystemSnapshot> {
        self.state.read().await.snapshots.iter().cloned().collect()
    }

    pub async fn current_metrics(&self) -> CurrentMetrics {
        let memory = self.probe.sample();
        let state = self.state.read().await;
        CurrentMetrics {
            memory,
            active_operations: state.operations.iter().filter(|op| op.is_running()).count(),
            hourly_error_rate: hourly_error_rate(&state.operations, Utc::now()),
            tracked_operations: state.operations.len(),
            last_snapshot_at: state.snapshots.back().map(|s| s.taken_at),
        }
    }

    /// Drop finished operations that ended before `cutoff`. Returns how many.
    pub async fn prune_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut state = self.state.write().await;
        let before = state.operations.len();
        state
            .operations
            .retain(|op| op.is_running() || op.ended_at.is_none_or(|end| end >= cutoff));
        before - state.operations.len()
    }

    /// Take a snapshot every `snapshot_interval_secs` until `shutdown` fires.
    pub fn spawn_snapshot_loop(self: Arc<Self>, mut shutdown: oneshot::Receiver<()>) -> JoinHandle<()> {
        let period = Duration::from_secs(self.settings.snapshot_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snapshot = self.record_snapshot().await;
                        debug!(
                            active = snapshot.active_operations,
                            tracked = snapshot.tracked_operations,
                            "System snapshot"
                        );
                    }
                    _ = &mut shutdown => {
                        info!("System monitoring stopped");
                        break;
                    }
                }
            }
        })
    }
}
