//! Institution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Untrusted institution descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInstitution {
    pub name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub image_url: Option<String>,
    pub ranking: Option<String>,
    pub established: Option<String>,
}

/// Institution descriptor that passed validation.
///
/// ```compile_fail
/// let _: courseharvest::models::ValidatedInstitution = serde_json::from_str("{}").unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct ValidatedInstitution {
    pub name: String,
    pub country: String,
    pub city: String,
    pub description: Option<String>,
    pub website: String,
    pub image_url: Option<String>,
    pub ranking: Option<u32>,
    pub established: Option<i32>,
}

impl ValidatedInstitution {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        country: String,
        city: String,
        description: Option<String>,
        website: String,
        image_url: Option<String>,
        ranking: Option<u32>,
        established: Option<i32>,
    ) -> Self {
        Self {
            name,
            country,
            city,
            description,
            website,
            image_url,
            ranking,
            established,
        }
    }

    /// Equivalence used for de-duplication: same country and the same
    /// name ignoring case.
    pub fn same_entity(&self, name: &str, country: &str) -> bool {
        self.country == country && self.name.to_lowercase() == name.to_lowercase()
    }
}

impl From<&ValidatedInstitution> for RawInstitution {
    fn from(inst: &ValidatedInstitution) -> Self {
        Self {
            name: Some(inst.name.clone()),
            country: Some(inst.country.clone()),
            city: Some(inst.city.clone()),
            description: inst.description.clone(),
            website: Some(inst.website.clone()),
            image_url: inst.image_url.clone(),
            ranking: inst.ranking.map(|r| r.to_string()),
            established: inst.established.map(|e| e.to_string()),
        }
    }
}

/// A persisted institution.
#[derive(Debug, Clone, Serialize)]
pub struct Institution {
    pub id: i64,
    #[serde(flatten)]
    pub data: ValidatedInstitution,
    pub created_at: DateTime<Utc>,
}
