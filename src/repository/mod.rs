//! Catalog persistence.
//!
//! The ingestion core only talks to [`CatalogRepository`]. Two backends are
//! provided: an in-memory catalog (tests, dry runs) and SQLite.

mod memory;
mod sqlite;

pub use memory::InMemoryCatalog;
pub use sqlite::SqliteCatalog;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Course, Institution, ValidatedCourse, ValidatedInstitution};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to prepare database location {path}: {source}")]
    Location {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Storage operations needed by ingestion.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Institution with the same country and case-insensitively equal name.
    async fn find_institution(&self, name: &str, country: &str) -> Result<Option<Institution>>;

    async fn insert_institution(&self, data: &ValidatedInstitution) -> Result<Institution>;

    /// Whether the institution already lists a course with this title (ignoring case).
    async fn course_exists(&self, institution_id: i64, title: &str) -> Result<bool>;

    async fn insert_course(&self, institution_id: i64, data: &ValidatedCourse) -> Result<Course>;

    async fn count_institutions(&self) -> Result<u64>;

    async fn count_courses(&self) -> Result<u64>;
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Key used for case-insensitive comparisons.
pub(crate) fn fold_key(s: &str) -> String {
    s.trim().to_lowercase()
}
