//! Fetch and extraction errors.

use thiserror::Error;

/// A selector map could not be applied.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid selector for {field}: '{selector}': {message}")]
    InvalidSelector {
        field: String,
        selector: String,
        message: String,
    },
}

/// Failure to retrieve or parse a target page.
///
/// All variants are target-level failures: the target contributes no
/// records to the current pass.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("browser fetch of {url} failed: {message}")]
    Browser { url: String, message: String },

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl FetchError {
    pub fn browser(url: &str, err: impl std::fmt::Display) -> Self {
        Self::Browser {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    /// Short type name used for error classification in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Client(_) => "ClientError",
            Self::Http { .. } => "NetworkError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Status { .. } => "HttpStatusError",
            Self::Browser { .. } => "BrowserError",
            Self::Extract(_) => "SelectorError",
        }
    }
}
