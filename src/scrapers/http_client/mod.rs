//! HTTP client for static target pages.

mod user_agent;

pub use user_agent::{random_user_agent, resolve_user_agent, IMPERSONATE_USER_AGENTS, USER_AGENT};

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::FetchError;

/// Settings for static page fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSettings {
    /// User agent configuration.
    /// - None: desktop Chrome user agent
    /// - "impersonate": randomly select from real browser user agents
    /// - Any other string: use as custom user agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Hard timeout for one request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Pause before every request, in milliseconds.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_request_delay_ms() -> u64 {
    1000
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: None,
            request_timeout_secs: default_request_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

/// HTTP client with a fixed timeout and a pre-request delay.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
    request_delay: Duration,
}

impl HttpClient {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let user_agent = resolve_user_agent(settings.user_agent.as_deref());
        let timeout = Duration::from_secs(settings.request_timeout_secs);

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .user_agent(&user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            timeout,
            request_delay: Duration::from_millis(settings.request_delay_ms),
        })
    }

    /// GET a page body as text. Non-2xx responses are errors.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| self.classify(url, e))
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                seconds: self.timeout.as_secs(),
            }
        } else {
            FetchError::Http {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response on a local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let mut read = 0;
            loop {
                let n = socket.read(&mut buf[read..]).await.unwrap();
                read += n;
                if n == 0 || buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let response = format!(
                "{}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{}/courses", addr)
    }

    fn quick_settings() -> FetchSettings {
        FetchSettings {
            request_delay_ms: 0,
            request_timeout_secs: 5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_text_ok() {
        let url = serve_once("HTTP/1.1 200 OK", "<ul><li>Physics</li></ul>").await;
        let client = HttpClient::new(&quick_settings()).unwrap();
        let body = client.get_text(&url).await.unwrap();
        assert_eq!(body, "<ul><li>Physics</li></ul>");
    }

    #[tokio::test]
    async fn test_get_text_non_success_status() {
        let url = serve_once("HTTP/1.1 503 Service Unavailable", "busy").await;
        let client = HttpClient::new(&quick_settings()).unwrap();
        match client.get_text(&url).await {
            Err(FetchError::Status { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected status error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_default_settings() {
        let settings = FetchSettings::default();
        assert_eq!(settings.request_timeout_secs, 10);
        assert_eq!(settings.request_delay_ms, 1000);
    }
}
