//! Page fetching and course extraction.
//!
//! - `http_client`: static HTML fetch with a realistic user agent
//! - `browser`: headless Chrome rendering for JavaScript-built listings
//! - `fetcher`: picks one of the two per target
//! - `extract`: selector-map interpreter producing raw course records

pub mod browser;
mod error;
pub mod extract;
pub mod fetcher;
pub mod http_client;

pub use browser::{BrowserFetcher, BrowserSettings};
pub use error::{ExtractError, FetchError};
pub use extract::{extract_courses, CompiledSelectors};
pub use fetcher::{PageFetcher, SiteFetcher};
pub use http_client::{FetchSettings, HttpClient};

use crate::models::{RawCourse, TargetConfig};

/// Fetch a target's listing page and extract its candidate courses.
pub async fn fetch_and_extract(
    fetcher: &dyn PageFetcher,
    target: &TargetConfig,
) -> Result<Vec<RawCourse>, FetchError> {
    let html = fetcher.fetch(target).await?;
    Ok(extract_courses(&html, target)?)
}
