//! Course records at each stage of ingestion.
//!
//! A [`RawCourse`] is whatever the extractor pulled off the page: every
//! field optional, every field an untrusted string. Only the validator
//! produces a [`ValidatedCourse`], which is safe to persist as-is.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Degree level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CourseLevel {
    #[serde(rename = "Bachelor's")]
    Bachelors,
    #[serde(rename = "Master's")]
    Masters,
    #[serde(rename = "PhD")]
    Phd,
    #[serde(rename = "Certificate")]
    Certificate,
}

impl CourseLevel {
    pub const ALL: [CourseLevel; 4] = [
        Self::Bachelors,
        Self::Masters,
        Self::Phd,
        Self::Certificate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bachelors => "Bachelor's",
            Self::Masters => "Master's",
            Self::Phd => "PhD",
            Self::Certificate => "Certificate",
        }
    }

    /// Parse a canonical level name (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
    }
}

/// Delivery format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CourseFormat {
    #[serde(rename = "On-campus")]
    OnCampus,
    #[serde(rename = "Online")]
    Online,
    #[serde(rename = "Hybrid")]
    Hybrid,
}

impl CourseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnCampus => "On-campus",
            Self::Online => "Online",
            Self::Hybrid => "Hybrid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on-campus" => Some(Self::OnCampus),
            "online" => Some(Self::Online),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// What period a fee amount covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeesType {
    Total,
    Yearly,
    Monthly,
    PerCredit,
}

impl FeesType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::Yearly => "yearly",
            Self::Monthly => "monthly",
            Self::PerCredit => "per_credit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "total" => Some(Self::Total),
            "yearly" => Some(Self::Yearly),
            "monthly" => Some(Self::Monthly),
            "per_credit" => Some(Self::PerCredit),
            _ => None,
        }
    }
}

/// Candidate course record as extracted from a page fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCourse {
    pub title: Option<String>,
    pub description: Option<String>,
    pub level: Option<String>,
    pub subject: Option<String>,
    pub duration: Option<String>,
    pub format: Option<String>,
    pub fees: Option<String>,
    pub fees_type: Option<String>,
    pub requirements: Option<String>,
    pub credits: Option<String>,
    pub image_url: Option<String>,
    pub application_deadline: Option<String>,
    pub start_date: Option<String>,
}

/// Course record that passed every validation rule.
///
/// Only `validation::Validator` constructs this type. It is serialize-only:
/// untrusted input has to come in as a [`RawCourse`].
///
/// ```compile_fail
/// let _: courseharvest::models::ValidatedCourse = serde_json::from_str("{}").unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct ValidatedCourse {
    pub title: String,
    pub description: Option<String>,
    pub level: CourseLevel,
    pub subject: String,
    /// Always `"<N> years|months|weeks"` style text.
    pub duration: String,
    pub format: CourseFormat,
    pub fees: Option<f64>,
    pub fees_type: Option<FeesType>,
    pub requirements: Option<String>,
    pub credits: Option<u32>,
    pub image_url: Option<String>,
    pub application_deadline: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
}

impl ValidatedCourse {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        title: String,
        description: Option<String>,
        level: CourseLevel,
        subject: String,
        duration: String,
        format: CourseFormat,
        fees: Option<f64>,
        fees_type: Option<FeesType>,
        requirements: Option<String>,
        credits: Option<u32>,
        image_url: Option<String>,
        application_deadline: Option<NaiveDate>,
        start_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            title,
            description,
            level,
            subject,
            duration,
            format,
            fees,
            fees_type,
            requirements,
            credits,
            image_url,
            application_deadline,
            start_date,
        }
    }
}

impl From<&ValidatedCourse> for RawCourse {
    fn from(course: &ValidatedCourse) -> Self {
        Self {
            title: Some(course.title.clone()),
            description: course.description.clone(),
            level: Some(course.level.as_str().to_string()),
            subject: Some(course.subject.clone()),
            duration: Some(course.duration.clone()),
            format: Some(course.format.as_str().to_string()),
            fees: course.fees.map(|f| f.to_string()),
            fees_type: course.fees_type.map(|t| t.as_str().to_string()),
            requirements: course.requirements.clone(),
            credits: course.credits.map(|c| c.to_string()),
            image_url: course.image_url.clone(),
            application_deadline: course
                .application_deadline
                .map(|d| d.format("%Y-%m-%d").to_string()),
            start_date: course.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }
}

/// A persisted course.
#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: i64,
    pub institution_id: i64,
    #[serde(flatten)]
    pub data: ValidatedCourse,
    pub created_at: DateTime<Utc>,
}
