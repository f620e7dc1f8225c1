//! Institution descriptor rules.

use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;

use super::{Checker, ValidationErrors, Validator};
use crate::models::{RawInstitution, ValidatedInstitution};
use crate::utils::sanitize_url;

static LONG_DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4,}").unwrap());
static PLACE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z\s\-\.]+$").unwrap());

impl Validator {
    /// Validate an institution descriptor.
    pub fn validate_institution(
        &self,
        raw: &RawInstitution,
    ) -> Result<ValidatedInstitution, ValidationErrors> {
        let limits = &self.limits;
        let mut check = Checker::default();

        let name = check.required(
            "name",
            "Name",
            &raw.name,
            limits.institution_name_min,
            limits.institution_name_max,
        );
        if let Some(ref n) = name {
            if LONG_DIGIT_RUN.is_match(n) {
                check.fail("name", "Name must not contain long number sequences");
            }
        }

        let country = check.required(
            "country",
            "Country",
            &raw.country,
            limits.country_min,
            limits.country_max,
        );
        if let Some(ref c) = country {
            if !PLACE_CHARS.is_match(c) {
                check.fail(
                    "country",
                    "Country may only contain letters, spaces, hyphens and periods",
                );
            }
        }

        let city = check.required("city", "City", &raw.city, 1, limits.city_max);
        if let Some(ref c) = city {
            if !PLACE_CHARS.is_match(c) {
                check.fail(
                    "city",
                    "City may only contain letters, spaces, hyphens and periods",
                );
            }
        }

        let description = check.optional(
            "description",
            "Description",
            &raw.description,
            limits.institution_description_max,
        );

        let website = raw.website.as_deref().and_then(sanitize_url);
        if website.is_none() {
            check.fail("website", "Website must be a valid http or https URL");
        }
        let image_url = raw.image_url.as_deref().and_then(sanitize_url);

        let ranking = check
            .whole_number("ranking", "Ranking", &raw.ranking, 1, limits.ranking_max as i64)
            .map(|r| r as u32);
        let established = check
            .whole_number(
                "established",
                "Establishment year",
                &raw.established,
                limits.established_min as i64,
                Utc::now().year() as i64,
            )
            .map(|y| y as i32);

        let record = match (name, country, city, website) {
            (Some(name), Some(country), Some(city), Some(website)) => {
                Some(ValidatedInstitution::new(
                    name,
                    country,
                    city,
                    description,
                    website,
                    image_url,
                    ranking,
                    established,
                ))
            }
            _ => None,
        };
        check.finish(record)
    }
}
