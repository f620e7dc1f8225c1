//! Fetch strategy selection.

use async_trait::async_trait;
use tracing::debug;

use super::{BrowserFetcher, BrowserSettings, FetchError, FetchSettings, HttpClient};
use crate::models::{RenderMode, TargetConfig};

/// Anything that can turn a target into page HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, target: &TargetConfig) -> Result<String, FetchError>;
}

/// Fetches static targets over HTTP and JavaScript targets in a browser.
pub struct SiteFetcher {
    http: HttpClient,
    browser: BrowserFetcher,
}

impl SiteFetcher {
    pub fn new(fetch: &FetchSettings, browser: BrowserSettings) -> Result<Self, FetchError> {
        let http = HttpClient::new(fetch)?;
        let user_agent = super::http_client::resolve_user_agent(fetch.user_agent.as_deref());
        Ok(Self {
            http,
            browser: BrowserFetcher::new(browser, user_agent),
        })
    }
}

#[async_trait]
impl PageFetcher for SiteFetcher {
    async fn fetch(&self, target: &TargetConfig) -> Result<String, FetchError> {
        debug!(
            target = %target.name,
            mode = target.render_mode.as_str(),
            "Fetching {}",
            target.base_url
        );
        match target.render_mode {
            RenderMode::Static => self.http.get_text(&target.base_url).await,
            RenderMode::Javascript => self.browser.render(&target.base_url).await,
        }
    }
}
