//! SQLite-backed catalog.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{fold_key, parse_datetime, CatalogRepository, RepositoryError, Result};
use crate::models::{
    Course, CourseFormat, CourseLevel, FeesType, Institution, ValidatedCourse,
    ValidatedInstitution,
};

const SCHEMA: &str = r#"
    PRAGMA journal_mode = WAL;

    CREATE TABLE IF NOT EXISTS institutions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        name_key TEXT NOT NULL,
        country TEXT NOT NULL,
        city TEXT NOT NULL,
        description TEXT,
        website TEXT NOT NULL,
        image_url TEXT,
        ranking INTEGER,
        established INTEGER,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_institutions_identity
        ON institutions(name_key, country);

    CREATE TABLE IF NOT EXISTS courses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        institution_id INTEGER NOT NULL REFERENCES institutions(id),
        title TEXT NOT NULL,
        title_key TEXT NOT NULL,
        description TEXT,
        level TEXT NOT NULL,
        subject TEXT NOT NULL,
        duration TEXT NOT NULL,
        format TEXT NOT NULL,
        fees REAL,
        fees_type TEXT,
        requirements TEXT,
        credits INTEGER,
        image_url TEXT,
        application_deadline TEXT,
        start_date TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_courses_title
        ON courses(institution_id, title_key);
"#;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Catalog stored in a SQLite file.
///
/// Every call opens its own connection on the blocking pool, so slow disks
/// or lock waits never stall the async workers.
pub struct SqliteCatalog {
    db_path: Arc<PathBuf>,
}

impl SqliteCatalog {
    /// Open (creating if needed) the catalog at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| RepositoryError::Location {
                path: parent.display().to_string(),
                source,
            })?;
        }

        connect(db_path)?.execute_batch(SCHEMA)?;
        Ok(Self {
            db_path: Arc::new(db_path.to_path_buf()),
        })
    }

    /// Run `f` against a fresh connection without blocking the runtime.
    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db_path = Arc::clone(&self.db_path);
        tokio::task::spawn_blocking(move || f(&connect(&db_path)?)).await?
    }

    fn row_to_institution(row: &Row<'_>) -> rusqlite::Result<Institution> {
        Ok(Institution {
            id: row.get("id")?,
            data: ValidatedInstitution::new(
                row.get("name")?,
                row.get("country")?,
                row.get("city")?,
                row.get("description")?,
                row.get("website")?,
                row.get("image_url")?,
                row.get("ranking")?,
                row.get("established")?,
            ),
            created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        })
    }

    fn row_to_course(row: &Row<'_>) -> rusqlite::Result<Course> {
        let level: String = row.get("level")?;
        let format: String = row.get("format")?;
        let fees_type: Option<String> = row.get("fees_type")?;
        let date = |col: &str| -> rusqlite::Result<Option<NaiveDate>> {
            Ok(row
                .get::<_, Option<String>>(col)?
                .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()))
        };

        Ok(Course {
            id: row.get("id")?,
            institution_id: row.get("institution_id")?,
            data: ValidatedCourse::new(
                row.get("title")?,
                row.get("description")?,
                CourseLevel::from_str(&level).unwrap_or(CourseLevel::Bachelors),
                row.get("subject")?,
                row.get("duration")?,
                CourseFormat::from_str(&format).unwrap_or(CourseFormat::OnCampus),
                row.get("fees")?,
                fees_type.as_deref().and_then(FeesType::from_str),
                row.get("requirements")?,
                row.get("credits")?,
                row.get("image_url")?,
                date("application_deadline")?,
                date("start_date")?,
            ),
            created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        })
    }

    /// All courses of one institution, oldest first.
    pub async fn courses_for(&self, institution_id: i64) -> Result<Vec<Course>> {
        self.with_connection(move |conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM courses WHERE institution_id = ?1 ORDER BY id")?;
            let courses = stmt
                .query_map(params![institution_id], Self::row_to_course)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(courses)
        })
        .await
    }
}

fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

#[async_trait]
impl CatalogRepository for SqliteCatalog {
    async fn find_institution(&self, name: &str, country: &str) -> Result<Option<Institution>> {
        let (name_key, country) = (fold_key(name), country.to_string());
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM institutions WHERE name_key = ?1 AND country = ?2 ORDER BY id LIMIT 1",
            )?;
            Ok(stmt
                .query_row(params![name_key, country], Self::row_to_institution)
                .optional()?)
        })
        .await
    }

    async fn insert_institution(&self, data: &ValidatedInstitution) -> Result<Institution> {
        let data = data.clone();
        self.with_connection(move |conn| {
            let created_at = Utc::now();
            conn.execute(
                r#"
                INSERT INTO institutions
                    (name, name_key, country, city, description, website, image_url,
                     ranking, established, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    data.name,
                    fold_key(&data.name),
                    data.country,
                    data.city,
                    data.description,
                    data.website,
                    data.image_url,
                    data.ranking,
                    data.established,
                    created_at.to_rfc3339(),
                ],
            )?;

            Ok(Institution {
                id: conn.last_insert_rowid(),
                data,
                created_at,
            })
        })
        .await
    }

    async fn course_exists(&self, institution_id: i64, title: &str) -> Result<bool> {
        let title_key = fold_key(title);
        self.with_connection(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM courses WHERE institution_id = ?1 AND title_key = ?2",
                params![institution_id, title_key],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    async fn insert_course(&self, institution_id: i64, data: &ValidatedCourse) -> Result<Course> {
        let data = data.clone();
        self.with_connection(move |conn| {
            let created_at = Utc::now();
            let date = |d: Option<NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string());
            conn.execute(
                r#"
                INSERT INTO courses
                    (institution_id, title, title_key, description, level, subject, duration,
                     format, fees, fees_type, requirements, credits, image_url,
                     application_deadline, start_date, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                "#,
                params![
                    institution_id,
                    data.title,
                    fold_key(&data.title),
                    data.description,
                    data.level.as_str(),
                    data.subject,
                    data.duration,
                    data.format.as_str(),
                    data.fees,
                    data.fees_type.map(|t| t.as_str()),
                    data.requirements,
                    data.credits,
                    data.image_url,
                    date(data.application_deadline),
                    date(data.start_date),
                    created_at.to_rfc3339(),
                ],
            )?;

            Ok(Course {
                id: conn.last_insert_rowid(),
                institution_id,
                data,
                created_at,
            })
        })
        .await
    }

    async fn count_institutions(&self) -> Result<u64> {
        self.with_connection(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM institutions", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    async fn count_courses(&self) -> Result<u64> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawCourse, RawInstitution};
    use crate::validation::Validator;

    fn institution() -> ValidatedInstitution {
        Validator::default()
            .validate_institution(&RawInstitution {
                name: Some("University of Oxford".to_string()),
                country: Some("United Kingdom".to_string()),
                city: Some("Oxford".to_string()),
                website: Some("https://www.ox.ac.uk".to_string()),
                ranking: Some("3".to_string()),
                ..Default::default()
            })
            .unwrap()
    }

    fn course(title: &str) -> ValidatedCourse {
        Validator::default()
            .validate_course(&RawCourse {
                title: Some(title.to_string()),
                level: Some("Master's".to_string()),
                subject: Some("History".to_string()),
                duration: Some("1 years".to_string()),
                format: Some("Hybrid".to_string()),
                fees: Some("31500".to_string()),
                fees_type: Some("total".to_string()),
                start_date: Some(format!("{}-10-01", Utc::now().format("%Y"))),
                ..Default::default()
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_institution_lookup_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteCatalog::open(&dir.path().join("catalog.db")).unwrap();

        let saved = repo.insert_institution(&institution()).await.unwrap();
        let found = repo
            .find_institution("UNIVERSITY OF OXFORD", "United Kingdom")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, saved.id);
        assert_eq!(found.data, institution());

        assert!(repo
            .find_institution("University of Oxford", "United States")
            .await
            .unwrap()
            .is_none());
        assert_eq!(repo.count_institutions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_courses_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteCatalog::open(&dir.path().join("nested/catalog.db")).unwrap();
        let inst = repo.insert_institution(&institution()).await.unwrap();

        repo.insert_course(inst.id, &course("Modern History")).await.unwrap();
        repo.insert_course(inst.id, &course("Ancient History")).await.unwrap();

        assert!(repo.course_exists(inst.id, "modern history").await.unwrap());
        assert!(!repo.course_exists(inst.id, "Medieval History").await.unwrap());
        assert_eq!(repo.count_courses().await.unwrap(), 2);

        let courses = repo.courses_for(inst.id).await.unwrap();
        assert_eq!(courses[0].data, course("Modern History"));
        assert_eq!(courses[1].data.fees_type, Some(FeesType::Total));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_lock_wait_does_not_stall_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        let repo = Arc::new(SqliteCatalog::open(&path).unwrap());

        // Another writer holds the database lock.
        let holder = Connection::open(&path).unwrap();
        holder.execute_batch("BEGIN IMMEDIATE").unwrap();

        let insert = tokio::spawn({
            let repo = Arc::clone(&repo);
            async move { repo.insert_institution(&institution()).await }
        });

        // Only completes if the insert waits off the single runtime thread.
        tokio::time::sleep(Duration::from_millis(100)).await;
        holder.execute_batch("COMMIT").unwrap();

        let saved = tokio::time::timeout(Duration::from_secs(5), insert)
            .await
            .expect("insert stalled the runtime")
            .unwrap()
            .unwrap();
        assert_eq!(repo.count_institutions().await.unwrap(), 1);
        assert_eq!(saved.data, institution());
    }
}
