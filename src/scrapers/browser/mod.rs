//! Headless Chrome fetcher for JavaScript-rendered listings.
//!
//! Every render launches its own browser so no cookies, cache or storage
//! leak between targets. The browser is closed on every exit path.

mod config;

pub use config::BrowserSettings;

use super::FetchError;

#[cfg(feature = "browser")]
use std::path::PathBuf;
#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use anyhow::{Context, Result};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

/// Resolves once the document reached `complete`, or after ten seconds.
#[cfg(feature = "browser")]
const WAIT_FOR_COMPLETE_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete') {
            resolve(document.readyState);
        } else {
            window.addEventListener('load', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// Browser-based page renderer.
pub struct BrowserFetcher {
    #[cfg_attr(not(feature = "browser"), allow(dead_code))]
    settings: BrowserSettings,
    #[cfg_attr(not(feature = "browser"), allow(dead_code))]
    user_agent: String,
}

impl BrowserFetcher {
    pub fn new(settings: BrowserSettings, user_agent: String) -> Self {
        Self {
            settings,
            user_agent,
        }
    }

    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }
}

#[cfg(feature = "browser")]
impl BrowserFetcher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    fn find_chrome(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.settings.chrome_path {
            return Ok(path.clone());
        }

        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in [
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(path) = which::which(cmd) {
                debug!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found; install it or set browser.chrome_path"
        ))
    }

    async fn launch(&self) -> Result<(Browser, JoinHandle<()>)> {
        let chrome_path = self.find_chrome()?;
        info!("Launching browser (headless={})", self.settings.headless);

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(self.settings.viewport_width, self.settings.viewport_height);

        // with_head means NOT headless
        if !self.settings.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-background-networking")
            .arg("--no-sandbox") // Often needed for headless in containers
            .arg("--disable-gpu");

        for arg in &self.settings.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok((browser, handler_task))
    }

    /// Render `url` and return the final HTML.
    pub async fn render(&self, url: &str) -> Result<String, FetchError> {
        let (mut browser, handler_task) = self
            .launch()
            .await
            .map_err(|e| FetchError::browser(url, format!("{:#}", e)))?;

        let result = self.render_with(&browser, url).await;

        if let Err(e) = browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = browser.wait().await {
            debug!("Browser process wait failed: {}", e);
        }
        handler_task.abort();

        result.map_err(|e| FetchError::browser(url, format!("{:#}", e)))
    }

    async fn render_with(&self, browser: &Browser, url: &str) -> Result<String> {
        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open page")?;

        let result = self.load(&page, url).await;
        let _ = page.close().await;
        result
    }

    async fn load(&self, page: &Page, url: &str) -> Result<String> {
        page.execute(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await
            .context("Failed to set user agent")?;
        page.execute(SetDeviceMetricsOverrideParams::new(
            self.settings.viewport_width as i64,
            self.settings.viewport_height as i64,
            1.0,
            false,
        ))
        .await
        .context("Failed to set viewport")?;

        info!("Navigating to {}", url);
        let nav_timeout = Duration::from_secs(self.settings.navigation_timeout_secs);
        tokio::time::timeout(nav_timeout, async {
            page.goto(url).await?;
            page.evaluate(WAIT_FOR_COMPLETE_SCRIPT.to_string()).await
        })
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "Navigation timed out after {}s",
                self.settings.navigation_timeout_secs
            )
        })?
        .context("Navigation failed")?;

        tokio::time::sleep(Duration::from_millis(self.settings.settle_delay_ms)).await;

        page.content().await.context("Failed to read page content")
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
impl BrowserFetcher {
    pub async fn render(&self, url: &str) -> Result<String, FetchError> {
        Err(FetchError::browser(
            url,
            "browser support not compiled; rebuild with --features browser",
        ))
    }
}
