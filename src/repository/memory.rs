//! In-process catalog.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{fold_key, CatalogRepository, Result};
use crate::models::{Course, Institution, ValidatedCourse, ValidatedInstitution};

#[derive(Default)]
struct Tables {
    institutions: Vec<Institution>,
    courses: Vec<Course>,
}

/// Catalog kept in memory for the life of the process.
#[derive(Default)]
pub struct InMemoryCatalog {
    tables: RwLock<Tables>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn institutions(&self) -> Vec<Institution> {
        self.tables.read().await.institutions.clone()
    }

    pub async fn courses(&self) -> Vec<Course> {
        self.tables.read().await.courses.clone()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn find_institution(&self, name: &str, country: &str) -> Result<Option<Institution>> {
        let tables = self.tables.read().await;
        Ok(tables
            .institutions
            .iter()
            .find(|i| i.data.same_entity(name, country))
            .cloned())
    }

    async fn insert_institution(&self, data: &ValidatedInstitution) -> Result<Institution> {
        let mut tables = self.tables.write().await;
        let institution = Institution {
            id: tables.institutions.len() as i64 + 1,
            data: data.clone(),
            created_at: Utc::now(),
        };
        tables.institutions.push(institution.clone());
        Ok(institution)
    }

    async fn course_exists(&self, institution_id: i64, title: &str) -> Result<bool> {
        let key = fold_key(title);
        let tables = self.tables.read().await;
        Ok(tables
            .courses
            .iter()
            .any(|c| c.institution_id == institution_id && fold_key(&c.data.title) == key))
    }

    async fn insert_course(&self, institution_id: i64, data: &ValidatedCourse) -> Result<Course> {
        let mut tables = self.tables.write().await;
        let course = Course {
            id: tables.courses.len() as i64 + 1,
            institution_id,
            data: data.clone(),
            created_at: Utc::now(),
        };
        tables.courses.push(course.clone());
        Ok(course)
    }

    async fn count_institutions(&self) -> Result<u64> {
        Ok(self.tables.read().await.institutions.len() as u64)
    }

    async fn count_courses(&self) -> Result<u64> {
        Ok(self.tables.read().await.courses.len() as u64)
    }
}
