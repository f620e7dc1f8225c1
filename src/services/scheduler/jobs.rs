//! Default recurring jobs.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{JobScheduler, JobTask};
use crate::services::ingestion::IngestionService;
use crate::services::monitoring::{HealthStatus, MonitoringService};

pub const DAILY_INGESTION: &str = "daily-ingestion";
pub const WEEKLY_INGESTION: &str = "weekly-comprehensive-ingestion";
pub const DAILY_CLEANUP: &str = "daily-cleanup";
pub const HEALTH_CHECK: &str = "health-check";

/// Per-job overrides from the `[scheduler.jobs.<name>]` config tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOverride {
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// The daily job only ingests while fewer courses than this are stored.
    #[serde(default = "default_low_data_threshold")]
    pub low_data_threshold: u64,
    #[serde(default)]
    pub jobs: HashMap<String, JobOverride>,
}

fn default_low_data_threshold() -> u64 {
    100
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            low_data_threshold: default_low_data_threshold(),
            jobs: HashMap::new(),
        }
    }
}

async fn daily_ingestion(ingestion: &IngestionService, threshold: u64) -> anyhow::Result<()> {
    let stats = ingestion
        .stats()
        .await
        .context("failed to read catalog stats")?;
    info!(
        "Catalog holds {} institutions and {} courses",
        stats.total_institutions, stats.total_courses
    );

    if stats.total_courses >= threshold {
        info!("Skipping full ingestion: sufficient data available");
        return Ok(());
    }
    ingestion.run_full_ingestion().await;
    Ok(())
}

async fn weekly_ingestion(ingestion: &IngestionService) -> anyhow::Result<()> {
    let report = ingestion.run_full_ingestion().await;
    let stats = ingestion
        .stats()
        .await
        .context("failed to read catalog stats")?;
    info!(
        saved = report.total_saved(),
        "Weekly ingestion completed: {} institutions, {} courses",
        stats.total_institutions,
        stats.total_courses
    );
    Ok(())
}

async fn cleanup(monitor: &MonitoringService) -> anyhow::Result<()> {
    let cutoff = Utc::now() - chrono::Duration::days(monitor.settings().retention_days);
    let pruned = monitor.prune_finished_before(cutoff).await;
    info!("Pruned {} finished operation records", pruned);
    Ok(())
}

async fn health_check(
    ingestion: &IngestionService,
    monitor: &MonitoringService,
) -> anyhow::Result<()> {
    let stats = ingestion
        .stats()
        .await
        .context("failed to read catalog stats")?;
    if stats.total_institutions == 0 {
        warn!("Health check: no institutions in the catalog");
    }
    if stats.total_courses == 0 {
        warn!("Health check: no courses in the catalog");
    }

    let report = monitor.health().await;
    match report.status {
        HealthStatus::Healthy => info!("Health check passed"),
        HealthStatus::Warning => warn!("Health check: {}", report.issues.join(", ")),
        HealthStatus::Critical => error!("Health check: {}", report.issues.join(", ")),
    }
    Ok(())
}

/// Register the four standard jobs, applying config overrides.
///
/// Returns how many were registered; a job whose override schedule does
/// not parse is skipped.
pub async fn register_default_jobs(
    scheduler: &JobScheduler,
    ingestion: Arc<IngestionService>,
    monitor: Arc<MonitoringService>,
    settings: &SchedulerSettings,
) -> usize {
    let threshold = settings.low_data_threshold;

    let daily: Arc<dyn JobTask> = {
        let ingestion = ingestion.clone();
        Arc::new(move || {
            let ingestion = ingestion.clone();
            async move { daily_ingestion(&ingestion, threshold).await }
        })
    };
    let weekly: Arc<dyn JobTask> = {
        let ingestion = ingestion.clone();
        Arc::new(move || {
            let ingestion = ingestion.clone();
            async move { weekly_ingestion(&ingestion).await }
        })
    };
    let clean: Arc<dyn JobTask> = {
        let monitor = monitor.clone();
        Arc::new(move || {
            let monitor = monitor.clone();
            async move { cleanup(&monitor).await }
        })
    };
    let health: Arc<dyn JobTask> = Arc::new(move || {
        let (ingestion, monitor) = (ingestion.clone(), monitor.clone());
        async move { health_check(&ingestion, &monitor).await }
    });

    let defaults = [
        (DAILY_INGESTION, "0 2 * * *", daily),
        (WEEKLY_INGESTION, "0 3 * * 0", weekly),
        (DAILY_CLEANUP, "0 1 * * *", clean),
        (HEALTH_CHECK, "0 * * * *", health),
    ];

    let mut registered = 0;
    for (name, schedule, task) in defaults {
        let overrides = settings.jobs.get(name).cloned().unwrap_or_default();
        let schedule = overrides.schedule.as_deref().unwrap_or(schedule);
        let enabled = overrides.enabled.unwrap_or(true);
        if scheduler.add_job(name, schedule, task, enabled).await {
            registered += 1;
        }
    }
    registered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SelectorMap, TargetConfig};
    use crate::repository::InMemoryCatalog;
    use crate::scrapers::{FetchError, PageFetcher};
    use crate::services::ingestion::IngestionSettings;
    use crate::services::monitoring::{FixedMemoryProbe, MonitoringSettings};
    use crate::validation::Validator;
    use async_trait::async_trait;

    struct OneCourse;

    #[async_trait]
    impl PageFetcher for OneCourse {
        async fn fetch(&self, _target: &TargetConfig) -> Result<String, FetchError> {
            Ok(r#"<div class="c"><h3>Philosophy</h3></div>"#.to_string())
        }
    }

    fn setup() -> (Arc<IngestionService>, Arc<MonitoringService>) {
        let monitor = Arc::new(MonitoringService::with_probe(
            MonitoringSettings::default(),
            Arc::new(FixedMemoryProbe::percent(10.0)),
        ));
        let target = TargetConfig {
            name: "Brown University".to_string(),
            base_url: "https://www.brown.example".to_string(),
            country: "United States".to_string(),
            city: "Providence".to_string(),
            selectors: SelectorMap {
                course_list: Some(".c".to_string()),
                title: Some("h3".to_string()),
                ..Default::default()
            },
            render_mode: Default::default(),
        };
        let ingestion = Arc::new(IngestionService::new(
            vec![target],
            Arc::new(OneCourse),
            Arc::new(InMemoryCatalog::new()),
            monitor.clone(),
            Validator::default(),
            IngestionSettings {
                record_delay_ms: 0,
                target_delay_ms: 0,
            },
        ));
        (ingestion, monitor)
    }

    #[tokio::test]
    async fn test_registers_defaults_with_overrides() {
        let (ingestion, monitor) = setup();
        let scheduler = JobScheduler::new();
        let mut settings = SchedulerSettings::default();
        settings.jobs.insert(
            HEALTH_CHECK.to_string(),
            JobOverride {
                schedule: Some("*/15 * * * *".to_string()),
                enabled: Some(false),
            },
        );
        settings.jobs.insert(
            DAILY_CLEANUP.to_string(),
            JobOverride {
                schedule: Some("whenever".to_string()),
                enabled: None,
            },
        );

        let count = register_default_jobs(&scheduler, ingestion, monitor, &settings).await;
        assert_eq!(count, 3);

        let health = scheduler.job_status(HEALTH_CHECK).await.unwrap();
        assert_eq!(health.schedule, "*/15 * * * *");
        assert!(!health.enabled);
        assert!(scheduler.job_status(DAILY_CLEANUP).await.is_none());
        assert!(scheduler.job_status(DAILY_INGESTION).await.unwrap().enabled);
        scheduler.stop_all_jobs().await;
    }

    #[tokio::test]
    async fn test_daily_ingestion_respects_threshold() {
        let (ingestion, monitor) = setup();
        let scheduler = JobScheduler::new();
        let settings = SchedulerSettings {
            low_data_threshold: 0,
            ..Default::default()
        };
        register_default_jobs(&scheduler, ingestion.clone(), monitor.clone(), &settings).await;
        scheduler.stop_all_jobs().await;

        assert!(scheduler.run_job(DAILY_INGESTION).await);
        assert!(ingestion.stats().await.unwrap().last_run_at.is_none());

        assert!(scheduler.run_job(WEEKLY_INGESTION).await);
        let stats = ingestion.stats().await.unwrap();
        assert_eq!(stats.total_courses, 1);
        assert!(stats.last_run_at.is_some());

        assert!(scheduler.run_job(HEALTH_CHECK).await);
        assert!(scheduler.run_job(DAILY_CLEANUP).await);
    }

    #[tokio::test]
    async fn test_daily_ingestion_runs_below_threshold() {
        let (ingestion, monitor) = setup();
        let scheduler = JobScheduler::new();
        register_default_jobs(
            &scheduler,
            ingestion.clone(),
            monitor,
            &SchedulerSettings::default(),
        )
        .await;
        scheduler.stop_all_jobs().await;

        assert!(scheduler.run_job(DAILY_INGESTION).await);
        assert_eq!(ingestion.stats().await.unwrap().total_courses, 1);
    }
}
