//! Selector-map interpreter.
//!
//! A target's [`SelectorMap`] is data, not code: each logical field maps to
//! a CSS selector evaluated against one list item. The interpreter only
//! needs "text of the first match" (and an attribute variant for images),
//! expressed by the [`FirstMatch`] trait.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::ExtractError;
use crate::models::{CourseFormat, CourseLevel, FeesType, RawCourse, SelectorMap, TargetConfig};
use crate::utils::{extract_number, sanitize_text, truncate_chars};

/// Extracted text is capped at this many characters.
pub const MAX_TEXT_LEN: usize = 500;

pub const DEFAULT_LEVEL: CourseLevel = CourseLevel::Bachelors;
pub const DEFAULT_SUBJECT: &str = "General Studies";
pub const DEFAULT_DURATION: &str = "4 years";
pub const DEFAULT_FORMAT: CourseFormat = CourseFormat::OnCampus;
pub const DEFAULT_FEES_TYPE: FeesType = FeesType::Yearly;

static BACHELOR_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"bachelor|undergraduate|\b(bs|ba|bsc|beng|bfa)\b").unwrap()
});
static MASTER_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"master|graduate|\b(ms|ma|msc|mba|meng|mfa)\b").unwrap());
static DOCTORAL_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"phd|ph\.d|doctorate|doctoral|\bdphil\b").unwrap());
static CERTIFICATE_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"certificate|\bcert\b|diploma").unwrap());

static YEARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*years?").unwrap());
static MONTHS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*months?").unwrap());
static WEEKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*weeks?").unwrap());

/// Minimal document capability the interpreter needs.
pub trait FirstMatch {
    /// Cleaned text of the first element matching `selector`.
    fn first_text(&self, selector: &Selector) -> Option<String>;

    /// Value of `attr` on the first element matching `selector`.
    fn first_attr(&self, selector: &Selector, attr: &str) -> Option<String>;
}

impl FirstMatch for ElementRef<'_> {
    fn first_text(&self, selector: &Selector) -> Option<String> {
        let el = first_match(*self, selector)?;
        let text = el.text().collect::<Vec<_>>().join(" ");
        let text = truncate_chars(&sanitize_text(&text), MAX_TEXT_LEN);
        (!text.is_empty()).then_some(text)
    }

    fn first_attr(&self, selector: &Selector, attr: &str) -> Option<String> {
        let el = first_match(*self, selector)?;
        el.value()
            .attr(attr)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// First descendant matching `selector`, else the element itself if it matches.
fn first_match<'a>(el: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    el.select(selector)
        .next()
        .or_else(|| selector.matches(&el).then_some(el))
}

/// A [`SelectorMap`] with every selector parsed.
#[derive(Debug)]
pub struct CompiledSelectors {
    pub course_list: Option<Selector>,
    pub title: Option<Selector>,
    pub description: Option<Selector>,
    pub fees: Option<Selector>,
    pub duration: Option<Selector>,
    pub level: Option<Selector>,
    pub subject: Option<Selector>,
    pub format: Option<Selector>,
    pub fees_type: Option<Selector>,
    pub requirements: Option<Selector>,
    pub credits: Option<Selector>,
    pub image: Option<Selector>,
    pub application_deadline: Option<Selector>,
    pub start_date: Option<Selector>,
}

impl CompiledSelectors {
    /// Parse every configured selector. The first invalid one is an error.
    pub fn compile(map: &SelectorMap) -> Result<Self, ExtractError> {
        let parse = |field: &str, sel: &Option<String>| -> Result<Option<Selector>, ExtractError> {
            sel.as_deref()
                .map(|s| {
                    Selector::parse(s).map_err(|e| ExtractError::InvalidSelector {
                        field: field.to_string(),
                        selector: s.to_string(),
                        message: format!("{e:?}"),
                    })
                })
                .transpose()
        };

        Ok(Self {
            course_list: parse("course_list", &map.course_list)?,
            title: parse("title", &map.title)?,
            description: parse("description", &map.description)?,
            fees: parse("fees", &map.fees)?,
            duration: parse("duration", &map.duration)?,
            level: parse("level", &map.level)?,
            subject: parse("subject", &map.subject)?,
            format: parse("format", &map.format)?,
            fees_type: parse("fees_type", &map.fees_type)?,
            requirements: parse("requirements", &map.requirements)?,
            credits: parse("credits", &map.credits)?,
            image: parse("image", &map.image)?,
            application_deadline: parse("application_deadline", &map.application_deadline)?,
            start_date: parse("start_date", &map.start_date)?,
        })
    }

    /// Build a candidate from one list item, or `None` when it has no title.
    pub fn extract_item(&self, item: &impl FirstMatch, base_url: &str) -> Option<RawCourse> {
        let text = |sel: &Option<Selector>| sel.as_ref().and_then(|s| item.first_text(s));

        let title = text(&self.title)?;

        let image_url = self.image.as_ref().and_then(|s| {
            item.first_attr(s, "src")
                .or_else(|| item.first_attr(s, "href"))
                .map(|path| resolve_url(base_url, &path))
        });

        Some(RawCourse {
            title: Some(title),
            description: text(&self.description),
            level: Some(normalize_level(text(&self.level).as_deref()).as_str().to_string()),
            subject: Some(text(&self.subject).unwrap_or_else(|| DEFAULT_SUBJECT.to_string())),
            duration: Some(normalize_duration(text(&self.duration).as_deref())),
            format: Some(normalize_format(text(&self.format).as_deref()).as_str().to_string()),
            fees: text(&self.fees)
                .and_then(|f| extract_number(&f, None))
                .map(|f| f.to_string()),
            fees_type: Some(
                normalize_fees_type(text(&self.fees_type).as_deref())
                    .as_str()
                    .to_string(),
            ),
            requirements: text(&self.requirements),
            credits: text(&self.credits),
            image_url,
            application_deadline: text(&self.application_deadline),
            start_date: text(&self.start_date),
        })
    }
}

/// Extract candidate courses from a page using the target's selectors.
///
/// Without a `course_list` selector there is nothing to iterate and the
/// result is empty. Items lacking a title are skipped.
pub fn extract_courses(html: &str, target: &TargetConfig) -> Result<Vec<RawCourse>, ExtractError> {
    let selectors = CompiledSelectors::compile(&target.selectors)?;
    let Some(ref list) = selectors.course_list else {
        debug!(target = %target.name, "No course list selector configured");
        return Ok(Vec::new());
    };

    let document = Html::parse_document(html);
    let mut courses = Vec::new();
    for (index, item) in document.select(list).enumerate() {
        match selectors.extract_item(&item, &target.base_url) {
            Some(course) => courses.push(course),
            None => debug!(target = %target.name, "Skipping item {} without a title", index),
        }
    }

    debug!(
        target = %target.name,
        "Extracted {} candidate courses",
        courses.len()
    );
    Ok(courses)
}

/// Map free-form level text onto a canonical level.
pub fn normalize_level(text: Option<&str>) -> CourseLevel {
    let Some(text) = text else {
        return DEFAULT_LEVEL;
    };
    let lowered = text.to_lowercase();

    if BACHELOR_WORDS.is_match(&lowered) {
        CourseLevel::Bachelors
    } else if MASTER_WORDS.is_match(&lowered) {
        CourseLevel::Masters
    } else if DOCTORAL_WORDS.is_match(&lowered) {
        CourseLevel::Phd
    } else if CERTIFICATE_WORDS.is_match(&lowered) {
        CourseLevel::Certificate
    } else {
        DEFAULT_LEVEL
    }
}

/// Reduce duration text to `"<N> years|months|weeks"`.
pub fn normalize_duration(text: Option<&str>) -> String {
    let Some(text) = text else {
        return DEFAULT_DURATION.to_string();
    };
    let lowered = text.to_lowercase();

    for (pattern, unit) in [(&YEARS, "years"), (&MONTHS, "months"), (&WEEKS, "weeks")] {
        if let Some(caps) = pattern.captures(&lowered) {
            return format!("{} {}", &caps[1], unit);
        }
    }
    DEFAULT_DURATION.to_string()
}

pub fn normalize_format(text: Option<&str>) -> CourseFormat {
    let Some(text) = text else {
        return DEFAULT_FORMAT;
    };
    let lowered = text.to_lowercase();

    if lowered.contains("hybrid") || lowered.contains("blended") {
        CourseFormat::Hybrid
    } else if lowered.contains("online") || lowered.contains("distance") {
        CourseFormat::Online
    } else {
        DEFAULT_FORMAT
    }
}

pub fn normalize_fees_type(text: Option<&str>) -> FeesType {
    let Some(text) = text else {
        return DEFAULT_FEES_TYPE;
    };
    let lowered = text.to_lowercase();

    if lowered.contains("credit") {
        FeesType::PerCredit
    } else if lowered.contains("month") {
        FeesType::Monthly
    } else if lowered.contains("total") || lowered.contains("full programme") || lowered.contains("full program") {
        FeesType::Total
    } else {
        DEFAULT_FEES_TYPE
    }
}

/// Resolve a possibly relative link against the target's base URL.
pub fn resolve_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    url::Url::parse(base_url)
        .and_then(|base| base.join(path))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{}{}", base_url, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::builtin_targets;

    fn target(selectors: SelectorMap) -> TargetConfig {
        TargetConfig {
            name: "Test University".to_string(),
            base_url: "https://test.edu/programs/".to_string(),
            country: "Canada".to_string(),
            city: "Ottawa".to_string(),
            selectors,
            render_mode: Default::default(),
        }
    }

    fn mit_target() -> TargetConfig {
        builtin_targets().remove(1)
    }

    const MIT_PAGE: &str = r#"
        <html><body>
          <div class="course-item">
            <h3>Electrical Engineering</h3>
            <p class="description">Circuits and <em>signals</em>.</p>
            <span class="fee-info">$57,986 per year</span>
            <span class="duration-info">4 yrs / 4 years</span>
            <span class="level">Undergraduate (SB)</span>
            <span class="department">Engineering</span>
          </div>
          <div class="course-item">
            <p class="description">Orphaned description with no heading.</p>
          </div>
          <div class="course-item">
            <h3>Management</h3>
            <span class="level">MBA</span>
            <span class="duration-info">18 Months</span>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_untitled_items_skipped() {
        let courses = extract_courses(MIT_PAGE, &mit_target()).unwrap();
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].title.as_deref(), Some("Electrical Engineering"));
        assert_eq!(courses[1].title.as_deref(), Some("Management"));
    }

    #[test]
    fn test_fields_normalized() {
        let courses = extract_courses(MIT_PAGE, &mit_target()).unwrap();
        let ee = &courses[0];
        assert_eq!(ee.description.as_deref(), Some("Circuits and signals ."));
        assert_eq!(ee.fees.as_deref(), Some("57986"));
        assert_eq!(ee.duration.as_deref(), Some("4 years"));
        assert_eq!(ee.level.as_deref(), Some("Bachelor's"));
        assert_eq!(ee.subject.as_deref(), Some("Engineering"));
        assert_eq!(ee.format.as_deref(), Some("On-campus"));
        assert_eq!(ee.fees_type.as_deref(), Some("yearly"));

        let mgmt = &courses[1];
        assert_eq!(mgmt.level.as_deref(), Some("Master's"));
        assert_eq!(mgmt.duration.as_deref(), Some("18 months"));
        assert_eq!(mgmt.subject.as_deref(), Some(DEFAULT_SUBJECT));
        assert_eq!(mgmt.fees, None);
    }

    #[test]
    fn test_no_list_selector_yields_nothing() {
        let t = target(SelectorMap {
            title: Some("h3".to_string()),
            ..Default::default()
        });
        assert!(extract_courses(MIT_PAGE, &t).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_selector_is_an_error() {
        let t = target(SelectorMap {
            course_list: Some("div[".to_string()),
            ..Default::default()
        });
        match extract_courses(MIT_PAGE, &t) {
            Err(ExtractError::InvalidSelector { field, .. }) => assert_eq!(field, "course_list"),
            other => panic!("expected invalid selector, got {:?}", other),
        }
    }

    #[test]
    fn test_item_matching_title_selector_itself() {
        let html = r#"<ul><li class="prog">Chemistry</li><li class="prog">Biology</li></ul>"#;
        let t = target(SelectorMap {
            course_list: Some("li.prog".to_string()),
            title: Some(".prog".to_string()),
            ..Default::default()
        });
        let courses = extract_courses(html, &t).unwrap();
        let titles: Vec<_> = courses.iter().filter_map(|c| c.title.as_deref()).collect();
        assert_eq!(titles, vec!["Chemistry", "Biology"]);
    }

    #[test]
    fn test_image_resolved_and_text_capped() {
        let long = "x".repeat(800);
        let html = format!(
            r#"<div class="c"><h2>Art</h2><img src="img/art.png"><p>{}</p></div>"#,
            long
        );
        let t = target(SelectorMap {
            course_list: Some(".c".to_string()),
            title: Some("h2".to_string()),
            description: Some("p".to_string()),
            image: Some("img".to_string()),
            ..Default::default()
        });
        let courses = extract_courses(&html, &t).unwrap();
        assert_eq!(
            courses[0].image_url.as_deref(),
            Some("https://test.edu/programs/img/art.png")
        );
        assert_eq!(
            courses[0].description.as_ref().map(|d| d.chars().count()),
            Some(MAX_TEXT_LEN)
        );
    }

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level(Some("BA (Hons)")), CourseLevel::Bachelors);
        assert_eq!(normalize_level(Some("Graduate programme")), CourseLevel::Masters);
        assert_eq!(normalize_level(Some("DPhil / PhD")), CourseLevel::Phd);
        assert_eq!(normalize_level(Some("Postgraduate certificate")), CourseLevel::Masters);
        assert_eq!(normalize_level(Some("Cert in Welding")), CourseLevel::Certificate);
        assert_eq!(normalize_level(Some("Mathematics")), CourseLevel::Bachelors);
        assert_eq!(normalize_level(None), CourseLevel::Bachelors);
    }

    #[test]
    fn test_normalize_duration() {
        assert_eq!(normalize_duration(Some("3 Years full-time")), "3 years");
        assert_eq!(normalize_duration(Some("12 month course")), "12 months");
        assert_eq!(normalize_duration(Some("10weeks")), "10 weeks");
        assert_eq!(normalize_duration(Some("varies")), DEFAULT_DURATION);
        assert_eq!(normalize_duration(None), DEFAULT_DURATION);
    }

    #[test]
    fn test_normalize_format_and_fees_type() {
        assert_eq!(normalize_format(Some("100% Online")), CourseFormat::Online);
        assert_eq!(normalize_format(Some("Blended learning")), CourseFormat::Hybrid);
        assert_eq!(normalize_format(Some("Full-time")), CourseFormat::OnCampus);
        assert_eq!(normalize_fees_type(Some("per credit hour")), FeesType::PerCredit);
        assert_eq!(normalize_fees_type(Some("Total programme cost")), FeesType::Total);
        assert_eq!(normalize_fees_type(None), FeesType::Yearly);
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://a.edu/x/", "https://cdn.a.edu/i.png"),
            "https://cdn.a.edu/i.png"
        );
        assert_eq!(resolve_url("https://a.edu/x/", "/i.png"), "https://a.edu/i.png");
    }
}
