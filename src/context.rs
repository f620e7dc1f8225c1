//! Process-wide application context.
//!
//! Holds exactly one catalog, monitoring sink, ingestion service and
//! scheduler per process. Components get handles from here instead of
//! reaching for globals.

use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

use crate::config::Config;
use crate::repository::{CatalogRepository, InMemoryCatalog, SqliteCatalog};
use crate::scrapers::{PageFetcher, SiteFetcher};
use crate::services::monitoring::{MemoryProbe, ProcessMemoryProbe};
use crate::services::scheduler::register_default_jobs;
use crate::services::{IngestionService, JobScheduler, MonitoringService};
use crate::validation::Validator;

pub struct AppContext {
    pub config: Config,
    pub catalog: Arc<dyn CatalogRepository>,
    pub monitor: Arc<MonitoringService>,
    pub ingestion: Arc<IngestionService>,
    pub scheduler: Arc<JobScheduler>,
}

impl AppContext {
    /// Build the production context: real fetchers, the configured catalog
    /// and a `/proc`-backed memory probe.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let fetcher = SiteFetcher::new(&config.fetch, config.browser.clone())
            .context("failed to build HTTP client")?;

        let catalog: Arc<dyn CatalogRepository> = match config.database_path() {
            Some(path) => {
                debug!("Using SQLite catalog at {}", path.display());
                Arc::new(
                    SqliteCatalog::open(&path)
                        .with_context(|| format!("failed to open catalog {}", path.display()))?,
                )
            }
            None => {
                debug!("No database configured, using in-memory catalog");
                Arc::new(InMemoryCatalog::new())
            }
        };

        Ok(Self::with_components(
            config,
            Arc::new(fetcher),
            catalog,
            Arc::new(ProcessMemoryProbe),
        ))
    }

    /// Assemble a context from explicit collaborators.
    pub fn with_components(
        config: Config,
        fetcher: Arc<dyn PageFetcher>,
        catalog: Arc<dyn CatalogRepository>,
        probe: Arc<dyn MemoryProbe>,
    ) -> Self {
        let monitor = Arc::new(MonitoringService::with_probe(
            config.monitoring.clone(),
            probe,
        ));
        let ingestion = Arc::new(IngestionService::new(
            config.effective_targets(),
            fetcher,
            catalog.clone(),
            monitor.clone(),
            Validator::new(config.validation.clone()),
            config.ingestion.clone(),
        ));

        Self {
            config,
            catalog,
            monitor,
            ingestion,
            scheduler: Arc::new(JobScheduler::new()),
        }
    }

    /// Register the default jobs on this context's scheduler.
    pub async fn register_default_jobs(&self) -> usize {
        register_default_jobs(
            &self.scheduler,
            self.ingestion.clone(),
            self.monitor.clone(),
            &self.config.scheduler,
        )
        .await
    }
}
