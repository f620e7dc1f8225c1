//! Service layer: ingestion, scheduling and monitoring.
//!
//! These hold the business logic and are driven by the CLI; they never
//! print to the terminal themselves.

pub mod ingestion;
pub mod monitoring;
pub mod scheduler;

pub use ingestion::{CatalogStats, IngestionReport, IngestionService, IngestionSettings};
pub use monitoring::{MonitoringService, MonitoringSettings};
pub use scheduler::{JobScheduler, SchedulerSettings};
