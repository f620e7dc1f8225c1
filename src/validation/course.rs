//! Course record rules.

use std::sync::LazyLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;

use super::{Checker, ValidationErrors, Validator};
use crate::models::{CourseFormat, CourseLevel, FeesType, RawCourse, ValidatedCourse};
use crate::utils::{extract_number, parse_date, sanitize_url};

static SUBJECT_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z\s\-&]+$").unwrap());
static DURATION_PERIOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d+\s*(year|month|week)s?").unwrap());

impl Validator {
    /// Validate one course candidate.
    ///
    /// Missing `level` or `format` is an error; defaults for those are only
    /// applied during extraction.
    pub fn validate_course(&self, raw: &RawCourse) -> Result<ValidatedCourse, ValidationErrors> {
        self.validate_course_on(raw, Utc::now().date_naive())
    }

    pub(crate) fn validate_course_on(
        &self,
        raw: &RawCourse,
        today: NaiveDate,
    ) -> Result<ValidatedCourse, ValidationErrors> {
        let limits = &self.limits;
        let mut check = Checker::default();

        let title = check.required("title", "Title", &raw.title, limits.title_min, limits.title_max);
        let description = check.optional(
            "description",
            "Description",
            &raw.description,
            limits.course_description_max,
        );

        let level = match Checker::text(&raw.level) {
            None => {
                check.fail("level", "Level is required");
                None
            }
            Some(value) => {
                let level = CourseLevel::from_str(&value);
                if level.is_none() {
                    check.fail(
                        "level",
                        "Level must be one of: Bachelor's, Master's, PhD, Certificate",
                    );
                }
                level
            }
        };

        let subject = check.required(
            "subject",
            "Subject",
            &raw.subject,
            limits.subject_min,
            limits.subject_max,
        );
        if let Some(ref s) = subject {
            if !SUBJECT_CHARS.is_match(s) {
                check.fail(
                    "subject",
                    "Subject may only contain letters, spaces, hyphens and ampersands",
                );
            }
        }

        let duration = check.required("duration", "Duration", &raw.duration, 1, limits.duration_max);
        if let Some(ref d) = duration {
            if !DURATION_PERIOD.is_match(d) {
                check.fail(
                    "duration",
                    "Duration must include a period in years, months or weeks",
                );
            }
        }

        let format = match Checker::text(&raw.format) {
            None => {
                check.fail("format", "Format is required");
                None
            }
            Some(value) => {
                let format = CourseFormat::from_str(&value);
                if format.is_none() {
                    check.fail("format", "Format must be one of: On-campus, Online, Hybrid");
                }
                format
            }
        };

        let fees = raw
            .fees
            .as_deref()
            .and_then(|f| extract_number(f, None));
        if let Some(f) = fees {
            if f < 0.0 {
                check.fail("fees", "Fees cannot be negative");
            } else if f > limits.fees_max {
                check.fail("fees", format!("Fees must not exceed {}", limits.fees_max));
            }
        }

        let fees_type = match Checker::text(&raw.fees_type) {
            None => None,
            Some(value) => {
                let fees_type = FeesType::from_str(&value);
                if fees_type.is_none() {
                    check.fail(
                        "fees_type",
                        "Fee type must be one of: total, yearly, monthly, per_credit",
                    );
                }
                fees_type
            }
        };

        let requirements = check.optional(
            "requirements",
            "Requirements",
            &raw.requirements,
            limits.requirements_max,
        );
        let credits = check
            .whole_number("credits", "Credits", &raw.credits, 1, limits.credits_max as i64)
            .map(|c| c as u32);

        let image_url = raw.image_url.as_deref().and_then(sanitize_url);

        let application_deadline = raw.application_deadline.as_deref().and_then(parse_date);
        // Dates have no time of day, so a deadline of today is still open.
        if let Some(deadline) = application_deadline {
            if deadline < today {
                check.fail(
                    "application_deadline",
                    "Application deadline cannot be in the past",
                );
            }
        }
        let start_date = raw.start_date.as_deref().and_then(parse_date);

        let record = match (title, level, subject, duration, format) {
            (Some(title), Some(level), Some(subject), Some(duration), Some(format)) => {
                Some(ValidatedCourse::new(
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
                ))
            }
            _ => None,
        };
        check.finish(record)
    }
}
