//! Record validation.
//!
//! Raw candidate records go in, strict validated records come out. Every
//! raw field is passed through the sanitizers first, then checked against
//! [`ValidationLimits`]. Failures carry one [`FieldError`] per violated
//! rule so rejected records can be diagnosed.

mod course;
mod institution;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{RawCourse, ValidatedCourse};

/// A single violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All rule violations for one record. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Messages formatted as `field: message`.
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(|e| e.to_string()).collect()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

/// Thresholds applied by the validator.
///
/// These are product limits rather than invariants; deployments can tune
/// them through the `[validation]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    pub title_min: usize,
    pub title_max: usize,
    pub course_description_max: usize,
    pub subject_min: usize,
    pub subject_max: usize,
    pub duration_max: usize,
    pub fees_max: f64,
    pub requirements_max: usize,
    pub credits_max: u32,
    pub institution_name_min: usize,
    pub institution_name_max: usize,
    pub country_min: usize,
    pub country_max: usize,
    pub city_max: usize,
    pub institution_description_max: usize,
    pub ranking_max: u32,
    pub established_min: i32,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            title_min: 3,
            title_max: 200,
            course_description_max: 5000,
            subject_min: 2,
            subject_max: 100,
            duration_max: 50,
            fees_max: 1_000_000.0,
            requirements_max: 2000,
            credits_max: 1000,
            institution_name_min: 2,
            institution_name_max: 200,
            country_min: 2,
            country_max: 100,
            city_max: 100,
            institution_description_max: 2000,
            ranking_max: 10_000,
            established_min: 800,
        }
    }
}

/// A rejected record and why.
#[derive(Debug, Clone, Serialize)]
pub struct InvalidRecord<T> {
    pub data: T,
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
}

/// Result of validating a batch of candidates.
#[derive(Debug, Clone, Serialize)]
pub struct BatchValidation {
    pub valid: Vec<ValidatedCourse>,
    pub invalid: Vec<InvalidRecord<RawCourse>>,
    pub stats: BatchStats,
}

/// Validates raw records against a set of limits.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    limits: ValidationLimits,
}

impl Validator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Partition candidates into valid and invalid records.
    ///
    /// Invalid records are returned with their errors for diagnostics only.
    pub fn validate_courses(&self, raws: &[RawCourse]) -> BatchValidation {
        let mut valid = Vec::new();
        let mut invalid = Vec::new();

        for raw in raws {
            match self.validate_course(raw) {
                Ok(course) => valid.push(course),
                Err(e) => invalid.push(InvalidRecord {
                    data: raw.clone(),
                    errors: e.0,
                }),
            }
        }

        let stats = BatchStats {
            total: raws.len(),
            valid: valid.len(),
            invalid: invalid.len(),
        };
        BatchValidation {
            valid,
            invalid,
            stats,
        }
    }
}

/// Collects errors while a record is checked.
#[derive(Default)]
pub(crate) struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    pub(crate) fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Sanitize an optional field, treating blank text as absent.
    pub(crate) fn text(raw: &Option<String>) -> Option<String> {
        raw.as_deref()
            .map(crate::utils::sanitize_text)
            .filter(|s| !s.is_empty())
    }

    /// Check a required text field's presence and length.
    pub(crate) fn required(
        &mut self,
        field: &str,
        label: &str,
        raw: &Option<String>,
        min: usize,
        max: usize,
    ) -> Option<String> {
        let Some(value) = Self::text(raw) else {
            self.fail(field, format!("{} is required", label));
            return None;
        };
        self.length(field, label, &value, min, max);
        Some(value)
    }

    /// Check an optional text field's length.
    pub(crate) fn optional(
        &mut self,
        field: &str,
        label: &str,
        raw: &Option<String>,
        max: usize,
    ) -> Option<String> {
        let value = Self::text(raw)?;
        self.length(field, label, &value, 0, max);
        Some(value)
    }

    pub(crate) fn length(&mut self, field: &str, label: &str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if len < min {
            self.fail(
                field,
                format!("{} must be at least {} characters", label, min),
            );
        } else if len > max {
            self.fail(
                field,
                format!("{} must be at most {} characters", label, max),
            );
        }
    }

    /// Parse an optional whole number within `min..=max`.
    pub(crate) fn whole_number(
        &mut self,
        field: &str,
        label: &str,
        raw: &Option<String>,
        min: i64,
        max: i64,
    ) -> Option<i64> {
        let value = crate::utils::extract_number(raw.as_deref()?, None)?;
        if value.fract() != 0.0 {
            self.fail(field, format!("{} must be a whole number", label));
            return None;
        }
        let value = value as i64;
        if value < min {
            self.fail(field, format!("{} must be at least {}", label, min));
            None
        } else if value > max {
            self.fail(field, format!("{} must be at most {}", label, max));
            None
        } else {
            Some(value)
        }
    }

    pub(crate) fn finish<T>(self, value: Option<T>) -> Result<T, ValidationErrors> {
        match value {
            Some(v) if self.errors.is_empty() => Ok(v),
            _ if !self.errors.is_empty() => Err(ValidationErrors(self.errors)),
            _ => Err(ValidationErrors(vec![FieldError::new(
                "record",
                "Record could not be validated",
            )])),
        }
    }
}
