//! Configuration loading using the prefer crate for discovery.
//!
//! A config file is optional. Every section falls back to its defaults,
//! so an empty file (or none at all) yields a working setup that ingests
//! the built-in targets into an in-memory catalog.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{builtin_targets, TargetConfig};
use crate::scrapers::{BrowserSettings, FetchSettings};
use crate::services::{IngestionSettings, MonitoringSettings, SchedulerSettings};
use crate::validation::ValidationLimits;

/// Name used for config discovery (`courseharvest.toml`, `.yaml`, `.json`).
pub const CONFIG_NAME: &str = "courseharvest";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {format} config {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),
}

/// Catalog storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; `~` is expanded and relative paths resolve against the
    /// config file's directory. Without a path the catalog lives in memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub ingestion: IngestionSettings,
    #[serde(default)]
    pub validation: ValidationLimits,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub monitoring: MonitoringSettings,
    /// Ingestion targets. Empty means the built-in list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetConfig>,
    /// File this config was read from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover and load `courseharvest.*` from the standard locations.
    ///
    /// Returns the defaults when no file is found; a file that exists but
    /// does not parse is an error.
    pub async fn load() -> Result<Self, ConfigError> {
        match prefer::load(CONFIG_NAME).await {
            Ok(discovered) => match discovered.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default()),
            },
            Err(e) => {
                debug!("No config file found ({}), using defaults", e);
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific file. The format follows the extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let mut config = Self::parse(&contents, ext).map_err(|(format, message)| match format {
            Some(format) => ConfigError::Parse {
                path: path.to_path_buf(),
                format,
                message,
            },
            None => ConfigError::UnsupportedFormat(path.to_path_buf()),
        })?;

        debug!("Loaded config from {}", path.display());
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, ext: &str) -> Result<Self, (Option<&'static str>, String)> {
        match ext {
            "toml" => toml::from_str(contents).map_err(|e| (Some("TOML"), e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| (Some("YAML"), e.to_string()))
            }
            "json" => serde_json::from_str(contents).map_err(|e| (Some("JSON"), e.to_string())),
            _ => Err((None, String::new())),
        }
    }

    /// Directory relative paths resolve against: the config file's parent,
    /// or the working directory.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a path that may start with `~` or be relative.
    pub fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    /// SQLite location, if one is configured.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.path.as_deref().map(|p| self.resolve_path(p))
    }

    /// Targets to ingest: the configured list, or the built-ins.
    pub fn effective_targets(&self) -> Vec<TargetConfig> {
        if self.targets.is_empty() {
            builtin_targets()
        } else {
            self.targets.clone()
        }
    }
}
