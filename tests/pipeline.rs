//! End-to-end ingestion through the public API with canned pages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use courseharvest::config::Config;
use courseharvest::context::AppContext;
use courseharvest::models::{RenderMode, SelectorMap, TargetConfig};
use courseharvest::repository::{CatalogRepository, InMemoryCatalog, SqliteCatalog};
use courseharvest::scrapers::{FetchError, PageFetcher};
use courseharvest::services::monitoring::{FixedMemoryProbe, HealthStatus, TimeRange};
use courseharvest::services::scheduler::{DAILY_INGESTION, WEEKLY_INGESTION};

const STATE_PAGE: &str = r#"
<html><body>
  <section class="program">
    <h2>Computer Science</h2>
    <p class="summary">Algorithms, systems and <b>theory</b></p>
    <span class="award">Bachelor of Science</span>
    <span class="length">4 years full-time</span>
    <span class="cost">$12,500.00 per year</span>
    <span class="dept">Computer Science</span>
  </section>
  <section class="program">
    <h2>Data Analytics</h2>
    <span class="award">Professional Certificate</span>
    <span class="length">9 months</span>
    <span class="mode">Fully online</span>
  </section>
  <section class="program">
    <span class="award">MSc</span>
  </section>
</body></html>
"#;

/// Serves pages by target name and counts fetches.
struct CannedFetcher {
    pages: HashMap<String, String>,
    fetches: AtomicUsize,
}

#[async_trait]
impl PageFetcher for CannedFetcher {
    async fn fetch(&self, target: &TargetConfig) -> Result<String, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(&target.name)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: target.base_url.clone(),
                status: 503,
            })
    }
}

fn target(name: &str) -> TargetConfig {
    TargetConfig {
        name: name.to_string(),
        base_url: format!("https://www.{}.example.edu", name.to_lowercase().replace(' ', "")),
        country: "United States".to_string(),
        city: "Springfield".to_string(),
        selectors: SelectorMap {
            course_list: Some(".program".to_string()),
            title: Some("h2".to_string()),
            description: Some(".summary".to_string()),
            level: Some(".award".to_string()),
            duration: Some(".length".to_string()),
            fees: Some(".cost".to_string()),
            subject: Some(".dept".to_string()),
            format: Some(".mode".to_string()),
            ..Default::default()
        },
        render_mode: RenderMode::Static,
    }
}

fn context(catalog: Arc<dyn CatalogRepository>) -> (AppContext, Arc<CannedFetcher>) {
    let mut config = Config::default();
    config.ingestion.record_delay_ms = 0;
    config.ingestion.target_delay_ms = 0;
    config.targets = vec![target("State University"), target("Offline College")];

    let fetcher = Arc::new(CannedFetcher {
        pages: HashMap::from([("State University".to_string(), STATE_PAGE.to_string())]),
        fetches: AtomicUsize::new(0),
    });
    let ctx = AppContext::with_components(
        config,
        fetcher.clone(),
        catalog,
        Arc::new(FixedMemoryProbe::percent(30.0)),
    );
    (ctx, fetcher)
}

#[tokio::test]
async fn full_ingestion_is_idempotent() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let (ctx, fetcher) = context(catalog.clone());

    let first = ctx.ingestion.run_full_ingestion().await;
    assert_eq!(first.targets.len(), 2);
    assert_eq!(first.targets[0].extracted, 2);
    assert_eq!(first.targets[0].saved, 2);
    assert!(first.targets[1].error.is_some());
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 2);

    let second = ctx.ingestion.run_full_ingestion().await;
    assert_eq!(second.targets[0].saved, 0);
    assert_eq!(second.targets[0].duplicates, 2);

    let stats = ctx.ingestion.stats().await.unwrap();
    assert_eq!(stats.total_institutions, 2);
    assert_eq!(stats.total_courses, 2);

    let courses = catalog.courses().await;
    let cs = courses
        .iter()
        .find(|c| c.data.title == "Computer Science")
        .unwrap();
    assert_eq!(cs.data.fees, Some(12500.0));
    assert_eq!(cs.data.duration, "4 years");
    assert_eq!(cs.data.description.as_deref(), Some("Algorithms, systems and theory"));

    let analytics = courses
        .iter()
        .find(|c| c.data.title == "Data Analytics")
        .unwrap();
    assert_eq!(analytics.data.level.as_str(), "Certificate");
    assert_eq!(analytics.data.format.as_str(), "Online");
    assert_eq!(analytics.data.duration, "9 months");

    let ops = ctx.monitor.stats(TimeRange::Hour).await;
    assert_eq!(ops.total_operations, 4);
    assert_eq!(ops.failed_operations, 2);
    assert_eq!(ops.success_rate, 50.0);
}

#[tokio::test]
async fn scheduler_drives_ingestion() {
    let (ctx, _) = context(Arc::new(InMemoryCatalog::new()));
    assert_eq!(ctx.register_default_jobs().await, 4);
    ctx.scheduler.stop_all_jobs().await;

    assert!(ctx.scheduler.run_job(DAILY_INGESTION).await);
    assert_eq!(ctx.ingestion.stats().await.unwrap().total_courses, 2);

    let weekly = ctx.scheduler.job_status(WEEKLY_INGESTION).await.unwrap();
    assert!(weekly.last_run.is_none());
    assert!(!weekly.enabled);
    assert!(weekly.next_run.is_none());

    let daily = ctx.scheduler.job_status(DAILY_INGESTION).await.unwrap();
    assert!(daily.last_run.is_some());
    assert!(!daily.is_running);
}

#[tokio::test]
async fn health_reflects_failed_targets() {
    let (ctx, _) = context(Arc::new(InMemoryCatalog::new()));
    ctx.ingestion.run_full_ingestion().await;

    // One of two targets failed: 50% is above the warning threshold.
    let report = ctx.monitor.health().await;
    assert_eq!(report.status, HealthStatus::Warning);
    assert_eq!(report.hourly_error_rate, 50.0);
}

#[tokio::test]
async fn sqlite_catalog_persists_across_contexts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");

    {
        let catalog = Arc::new(SqliteCatalog::open(&path).unwrap());
        let (ctx, _) = context(catalog);
        ctx.ingestion.run_full_ingestion().await;
    }

    let catalog = Arc::new(SqliteCatalog::open(&path).unwrap());
    assert_eq!(catalog.count_institutions().await.unwrap(), 2);
    assert_eq!(catalog.count_courses().await.unwrap(), 2);

    let (ctx, _) = context(catalog);
    let report = ctx.ingestion.run_full_ingestion().await;
    assert_eq!(report.targets[0].duplicates, 2);
    assert_eq!(ctx.ingestion.stats().await.unwrap().total_courses, 2);
}
