//! Ingestion target configuration.
//!
//! A target is one external site: where to fetch, which institution owns
//! the listing, and a selector map telling the extractor where each field
//! lives on the page.

use serde::{Deserialize, Serialize};

/// How a target's pages must be fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Plain HTTP GET; the HTML already contains the listing.
    #[default]
    Static,
    /// The listing is built client-side and needs a headless browser.
    Javascript,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Javascript => "javascript",
        }
    }
}

/// CSS selectors for each logical field.
///
/// `course_list` selects the repeated item element; every other selector is
/// evaluated relative to one item. Any selector may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_list: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fees: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fees_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<String>,
    /// Element whose `src` (or `href`) attribute is the image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_deadline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
}

impl SelectorMap {
    /// Every configured `(field, selector)` pair, list selector included.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("course_list", &self.course_list),
            ("title", &self.title),
            ("description", &self.description),
            ("fees", &self.fees),
            ("duration", &self.duration),
            ("level", &self.level),
            ("subject", &self.subject),
            ("format", &self.format),
            ("fees_type", &self.fees_type),
            ("requirements", &self.requirements),
            ("credits", &self.credits),
            ("image", &self.image),
            ("application_deadline", &self.application_deadline),
            ("start_date", &self.start_date),
        ]
        .into_iter()
        .filter_map(|(field, sel)| sel.as_deref().map(|s| (field, s)))
        .collect()
    }
}

/// One configured ingestion source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Institution name; also the target's identifier in logs and metrics.
    pub name: String,
    pub base_url: String,
    pub country: String,
    pub city: String,
    #[serde(default)]
    pub selectors: SelectorMap,
    #[serde(default)]
    pub render_mode: RenderMode,
}

impl TargetConfig {
    pub fn requires_js(&self) -> bool {
        self.render_mode == RenderMode::Javascript
    }

    /// Generated description used when registering the institution.
    pub fn institution_description(&self) -> String {
        format!(
            "{} is an institution located in {}, {}.",
            self.name, self.city, self.country
        )
    }
}

fn selectors(pairs: &[(&str, &str)]) -> SelectorMap {
    let mut map = SelectorMap::default();
    for (field, sel) in pairs {
        let value = Some(sel.to_string());
        match *field {
            "course_list" => map.course_list = value,
            "title" => map.title = value,
            "description" => map.description = value,
            "fees" => map.fees = value,
            "duration" => map.duration = value,
            "level" => map.level = value,
            "subject" => map.subject = value,
            _ => {}
        }
    }
    map
}

/// Targets used when the configuration lists none.
pub fn builtin_targets() -> Vec<TargetConfig> {
    vec![
        TargetConfig {
            name: "Harvard University".to_string(),
            base_url: "https://www.harvard.edu".to_string(),
            country: "United States".to_string(),
            city: "Cambridge".to_string(),
            selectors: selectors(&[
                ("course_list", ".course-listing"),
                ("title", ".course-title"),
                ("description", ".course-description"),
                ("fees", ".tuition-fee"),
                ("duration", ".duration"),
                ("level", ".degree-level"),
                ("subject", ".subject-area"),
            ]),
            render_mode: RenderMode::Javascript,
        },
        TargetConfig {
            name: "MIT".to_string(),
            base_url: "https://web.mit.edu".to_string(),
            country: "United States".to_string(),
            city: "Cambridge".to_string(),
            selectors: selectors(&[
                ("course_list", ".course-item"),
                ("title", "h3"),
                ("description", ".description"),
                ("fees", ".fee-info"),
                ("duration", ".duration-info"),
                ("level", ".level"),
                ("subject", ".department"),
            ]),
            render_mode: RenderMode::Static,
        },
        TargetConfig {
            name: "University of Oxford".to_string(),
            base_url: "https://www.ox.ac.uk".to_string(),
            country: "United Kingdom".to_string(),
            city: "Oxford".to_string(),
            selectors: selectors(&[
                ("course_list", ".course-card"),
                ("title", ".course-name"),
                ("description", ".course-overview"),
                ("fees", ".fee-amount"),
                ("duration", ".course-length"),
                ("level", ".qualification-type"),
                ("subject", ".subject-area"),
            ]),
            render_mode: RenderMode::Static,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_targets() {
        let targets = builtin_targets();
        assert_eq!(targets.len(), 3);
        assert!(targets[0].requires_js());
        assert!(!targets[1].requires_js());
        assert_eq!(targets[1].selectors.title.as_deref(), Some("h3"));
        assert_eq!(targets[2].selectors.entries().len(), 7);
    }

    #[test]
    fn test_target_from_toml() {
        let target: TargetConfig = toml::from_str(
            r#"
            name = "Example College"
            base_url = "https://example.edu/programs"
            country = "Canada"
            city = "Toronto"
            render_mode = "javascript"

            [selectors]
            course_list = "li.program"
            title = "h2"
            "#,
        )
        .unwrap();

        assert!(target.requires_js());
        assert_eq!(target.selectors.course_list.as_deref(), Some("li.program"));
        assert_eq!(target.selectors.fees, None);
    }

    #[test]
    fn test_render_mode_defaults_to_static() {
        let target: TargetConfig = serde_json::from_str(
            r#"{"name":"A","base_url":"https://a.edu","country":"Chile","city":"Santiago"}"#,
        )
        .unwrap();
        assert_eq!(target.render_mode, RenderMode::Static);
        assert!(target.selectors.entries().is_empty());
    }
}
