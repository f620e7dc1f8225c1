//! Ingestion orchestrator.
//!
//! Walks the configured targets one at a time: register the institution,
//! fetch and extract candidate courses, validate each one and store the
//! accepted records. A failing target is logged and recorded in the
//! monitoring sink; the run always continues with the next target.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::models::{
    Institution, OperationDetails, OperationStatus, ProgressUpdate, RawCourse, RawInstitution,
    TargetConfig,
};
use crate::repository::{CatalogRepository, RepositoryError};
use crate::scrapers::{fetch_and_extract, FetchError, PageFetcher};
use crate::services::monitoring::MonitoringService;
use crate::validation::{ValidationErrors, Validator};

/// Pacing between requests to the same and to successive sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionSettings {
    /// Pause between successive course saves.
    #[serde(default = "default_record_delay_ms")]
    pub record_delay_ms: u64,
    /// Pause between targets.
    #[serde(default = "default_target_delay_ms")]
    pub target_delay_ms: u64,
}

fn default_record_delay_ms() -> u64 {
    100
}

fn default_target_delay_ms() -> u64 {
    5000
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            record_delay_ms: default_record_delay_ms(),
            target_delay_ms: default_target_delay_ms(),
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("invalid institution {name}: {source}")]
    InvalidInstitution {
        name: String,
        #[source]
        source: ValidationErrors,
    },

    #[error("invalid course {title}: {source}")]
    InvalidCourse {
        title: String,
        #[source]
        source: ValidationErrors,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl IngestionError {
    /// Error-type label used by the monitoring sink.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInstitution { .. } | Self::InvalidCourse { .. } => "ValidationError",
            Self::Repository(_) => "DatabaseError",
            Self::Fetch(e) => e.kind(),
        }
    }
}

/// What happened to one candidate course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseOutcome {
    Saved,
    Duplicate,
}

/// Per-target counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TargetReport {
    pub target: String,
    pub institution_id: Option<i64>,
    pub extracted: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub failed: usize,
    /// Set when the target as a whole failed.
    pub error: Option<String>,
}

impl TargetReport {
    fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            ..Default::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of one full pass over every target.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub targets: Vec<TargetReport>,
}

impl IngestionReport {
    pub fn total_saved(&self) -> usize {
        self.targets.iter().map(|t| t.saved).sum()
    }

    pub fn failed_targets(&self) -> usize {
        self.targets.iter().filter(|t| !t.succeeded()).count()
    }
}

/// Aggregate catalog numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub total_institutions: u64,
    pub total_courses: u64,
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Runs ingestion passes over a fixed target list.
pub struct IngestionService {
    targets: Vec<TargetConfig>,
    fetcher: Arc<dyn PageFetcher>,
    catalog: Arc<dyn CatalogRepository>,
    monitor: Arc<MonitoringService>,
    validator: Validator,
    settings: IngestionSettings,
    last_run: RwLock<Option<DateTime<Utc>>>,
}

impl IngestionService {
    pub fn new(
        targets: Vec<TargetConfig>,
        fetcher: Arc<dyn PageFetcher>,
        catalog: Arc<dyn CatalogRepository>,
        monitor: Arc<MonitoringService>,
        validator: Validator,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            targets,
            fetcher,
            catalog,
            monitor,
            validator,
            settings,
            last_run: RwLock::new(None),
        }
    }

    pub fn targets(&self) -> &[TargetConfig] {
        &self.targets
    }

    /// Ingest every target in order. Target failures are reported, not returned.
    pub async fn run_full_ingestion(&self) -> IngestionReport {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        info!(run = %run_id, "Starting ingestion of {} targets", self.targets.len());

        let mut reports = Vec::with_capacity(self.targets.len());
        for (index, target) in self.targets.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(Duration::from_millis(self.settings.target_delay_ms)).await;
            }
            reports.push(self.ingest_target(&format!("{}-{}", run_id, index), target).await);
        }

        let finished_at = Utc::now();
        *self.last_run.write().await = Some(finished_at);

        let report = IngestionReport {
            started_at,
            finished_at,
            targets: reports,
        };
        info!(
            run = %run_id,
            saved = report.total_saved(),
            failed_targets = report.failed_targets(),
            "Ingestion finished"
        );
        report
    }

    /// Ingest one target, recording it as a monitored operation.
    pub async fn ingest_target(&self, id: &str, target: &TargetConfig) -> TargetReport {
        let key = self
            .monitor
            .start_operation(id, OperationDetails::new("ingest_target").with_target(&target.name))
            .await;
        let mut report = TargetReport::new(&target.name);

        match self.ingest_target_inner(target, &key, &mut report).await {
            Ok(()) => {
                info!(
                    target = %target.name,
                    "Saved {} of {} courses ({} duplicate, {} invalid, {} failed)",
                    report.saved,
                    report.extracted,
                    report.duplicates,
                    report.invalid,
                    report.failed
                );
                self.monitor
                    .complete_operation(&key, OperationStatus::Completed)
                    .await;
            }
            Err(e) => {
                error!(target = %target.name, "Target failed: {}", e);
                self.monitor
                    .update_progress(&key, ProgressUpdate::failure(format!("{}: {}", e.kind(), e)))
                    .await;
                self.monitor
                    .complete_operation(&key, OperationStatus::Failed)
                    .await;
                report.error = Some(e.to_string());
            }
        }
        report
    }

    async fn ingest_target_inner(
        &self,
        target: &TargetConfig,
        key: &str,
        report: &mut TargetReport,
    ) -> Result<(), IngestionError> {
        let institution = self.save_institution(&institution_for(target)).await?;
        report.institution_id = Some(institution.id);

        let candidates = fetch_and_extract(self.fetcher.as_ref(), target).await?;
        report.extracted = candidates.len();
        debug!(target = %target.name, "Extracted {} candidates", candidates.len());

        for (index, raw) in candidates.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(Duration::from_millis(self.settings.record_delay_ms)).await;
            }

            let update = match self.save_course(institution.id, raw).await {
                Ok(CourseOutcome::Saved) => {
                    report.saved += 1;
                    ProgressUpdate::success()
                }
                Ok(CourseOutcome::Duplicate) => {
                    report.duplicates += 1;
                    ProgressUpdate {
                        processed: 1,
                        ..Default::default()
                    }
                }
                Err(e @ IngestionError::InvalidCourse { .. }) => {
                    warn!(target = %target.name, "{}", e);
                    report.invalid += 1;
                    ProgressUpdate::failure(format!("{}: {}", e.kind(), e))
                }
                Err(e) => {
                    error!(target = %target.name, "Failed to save course: {}", e);
                    report.failed += 1;
                    ProgressUpdate::failure(format!("{}: {}", e.kind(), e))
                }
            };
            self.monitor.update_progress(key, update).await;
        }
        Ok(())
    }

    /// Validate an institution and return the stored record, reusing an
    /// existing one with the same name (ignoring case) and country.
    pub async fn save_institution(&self, raw: &RawInstitution) -> Result<Institution, IngestionError> {
        let data = self.validator.validate_institution(raw).map_err(|source| {
            IngestionError::InvalidInstitution {
                name: raw.name.clone().unwrap_or_default(),
                source,
            }
        })?;

        if let Some(existing) = self.catalog.find_institution(&data.name, &data.country).await? {
            debug!("Institution {} already exists with ID {}", data.name, existing.id);
            return Ok(existing);
        }

        let institution = self.catalog.insert_institution(&data).await?;
        info!("Created institution {} with ID {}", data.name, institution.id);
        Ok(institution)
    }

    /// Validate and store one candidate course.
    pub async fn save_course(
        &self,
        institution_id: i64,
        raw: &RawCourse,
    ) -> Result<CourseOutcome, IngestionError> {
        let data = self
            .validator
            .validate_course(raw)
            .map_err(|source| IngestionError::InvalidCourse {
                title: raw.title.clone().unwrap_or_default(),
                source,
            })?;

        if self.catalog.course_exists(institution_id, &data.title).await? {
            debug!("Skipping duplicate course {}", data.title);
            return Ok(CourseOutcome::Duplicate);
        }

        self.catalog.insert_course(institution_id, &data).await?;
        debug!("Saved course {}", data.title);
        Ok(CourseOutcome::Saved)
    }

    pub async fn stats(&self) -> Result<CatalogStats, RepositoryError> {
        Ok(CatalogStats {
            total_institutions: self.catalog.count_institutions().await?,
            total_courses: self.catalog.count_courses().await?,
            last_run_at: *self.last_run.read().await,
        })
    }
}

/// Institution descriptor generated from a target.
pub fn institution_for(target: &TargetConfig) -> RawInstitution {
    RawInstitution {
        name: Some(target.name.clone()),
        country: Some(target.country.clone()),
        city: Some(target.city.clone()),
        description: Some(target.institution_description()),
        website: Some(target.base_url.clone()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RenderMode, SelectorMap};
    use crate::repository::InMemoryCatalog;
    use crate::services::monitoring::{
        FixedMemoryProbe, MonitoringSettings, OperationFilter, TimeRange,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Serves canned HTML keyed by target name; unknown targets time out.
    struct StubFetcher(HashMap<String, String>);

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, target: &TargetConfig) -> Result<String, FetchError> {
            self.0.get(&target.name).cloned().ok_or_else(|| FetchError::Timeout {
                url: target.base_url.clone(),
                seconds: 10,
            })
        }
    }

    fn target(name: &str) -> TargetConfig {
        TargetConfig {
            name: name.to_string(),
            base_url: format!("https://{}.example.edu", name.to_lowercase()),
            country: "United States".to_string(),
            city: "Boston".to_string(),
            selectors: SelectorMap {
                course_list: Some(".course".to_string()),
                title: Some("h3".to_string()),
                level: Some(".level".to_string()),
                ..Default::default()
            },
            render_mode: RenderMode::Static,
        }
    }

    const PAGE: &str = r#"
        <div class="course"><h3>Biology</h3><span class="level">BSc</span></div>
        <div class="course"><h3>biology</h3></div>
        <div class="course"><h3>Ok</h3></div>
        <div class="course"><h3>Chemistry</h3><span class="level">Master of Science</span></div>
    "#;

    fn service(
        targets: Vec<TargetConfig>,
        pages: &[(&str, &str)],
    ) -> (IngestionService, Arc<InMemoryCatalog>, Arc<MonitoringService>) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let monitor = Arc::new(MonitoringService::with_probe(
            MonitoringSettings::default(),
            Arc::new(FixedMemoryProbe::percent(10.0)),
        ));
        let fetcher = StubFetcher(
            pages
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        let service = IngestionService::new(
            targets,
            Arc::new(fetcher),
            catalog.clone(),
            monitor.clone(),
            Validator::default(),
            IngestionSettings {
                record_delay_ms: 0,
                target_delay_ms: 0,
            },
        );
        (service, catalog, monitor)
    }

    #[tokio::test]
    async fn test_target_failure_does_not_abort_run() {
        let (service, catalog, monitor) = service(
            vec![target("Broken"), target("Works")],
            &[("Works", PAGE)],
        );

        let report = service.run_full_ingestion().await;
        assert_eq!(report.targets.len(), 2);
        assert!(!report.targets[0].succeeded());
        assert!(report.targets[1].succeeded());

        let works = &report.targets[1];
        assert_eq!(works.extracted, 4);
        assert_eq!(works.saved, 2);
        assert_eq!(works.duplicates, 1);
        assert_eq!(works.invalid, 1);

        // Both institutions were registered before fetching.
        assert_eq!(catalog.institutions().await.len(), 2);
        assert_eq!(catalog.courses().await.len(), 2);

        let stats = monitor.stats(TimeRange::Hour).await;
        assert_eq!(stats.total_operations, 2);
        assert_eq!(stats.failed_operations, 1);
        assert!(stats.top_errors.iter().any(|e| e.error_type == "TimeoutError"));

        let failed = monitor
            .operations(&OperationFilter {
                status: Some(OperationStatus::Failed),
                ..Default::default()
            })
            .await;
        assert_eq!(failed[0].target.as_deref(), Some("Broken"));
    }

    #[tokio::test]
    async fn test_stats_track_last_run() {
        let (service, _, _) = service(vec![target("Works")], &[("Works", PAGE)]);
        let before = service.stats().await.unwrap();
        assert_eq!(before.total_courses, 0);
        assert!(before.last_run_at.is_none());

        service.run_full_ingestion().await;
        let after = service.stats().await.unwrap();
        assert_eq!(after.total_institutions, 1);
        assert_eq!(after.total_courses, 2);
        assert!(after.last_run_at.is_some());
    }

    #[tokio::test]
    async fn test_save_institution_reuses_existing() {
        let (service, catalog, _) = service(vec![], &[]);
        let first = service
            .save_institution(&institution_for(&target("Tufts")))
            .await
            .unwrap();

        let mut shouted = institution_for(&target("Tufts"));
        shouted.name = Some("TUFTS".to_string());
        let second = service.save_institution(&shouted).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(catalog.institutions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_institution_rejected() {
        let (service, _, _) = service(vec![], &[]);
        let mut raw = institution_for(&target("Tufts"));
        raw.website = Some("ftp://tufts.example.edu".to_string());
        let err = service.save_institution(&raw).await.unwrap_err();
        assert!(matches!(err, IngestionError::InvalidInstitution { .. }));
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn test_institution_descriptor() {
        let raw = institution_for(&target("Tufts"));
        assert_eq!(raw.website.as_deref(), Some("https://tufts.example.edu"));
        assert_eq!(
            raw.description.as_deref(),
            Some("Tufts is an institution located in Boston, United States.")
        );
    }
}
