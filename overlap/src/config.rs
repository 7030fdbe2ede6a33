//! Scan configuration.
//!
//! One JSON file, one section per stage. Every field has a default, so an
//! empty object is a valid configuration for an offline scan.

use crate::dispatch::DispatchConfig;
use crate::document::IndexOptions;
use crate::http::HttpProviderConfig;
use crate::scorer::ScoringConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShingleConfig {
    pub width: usize,
    pub strip_citations: bool,
}

impl Default for ShingleConfig {
    fn default() -> Self {
        Self {
            width: 3,
            strip_citations: false,
        }
    }
}

impl ShingleConfig {
    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            strip_citations: self.strip_citations,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub shingle: ShingleConfig,
    pub scoring: ScoringConfig,
    pub dispatch: DispatchConfig,
    /// Remote provider; absent for offline scans.
    pub provider: Option<HttpProviderConfig>,
}

impl ScanConfig {
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.shingle.width == 0 {
            return invalid("shingle.width must be at least 1".into());
        }
        if !self.scoring.min_score.is_finite() {
            return invalid("scoring.min_score must be finite".into());
        }
        let factor = self.scoring.weighting.factor;
        if !factor.is_finite() || factor < 0.0 {
            return invalid(format!(
                "scoring.weighting.factor must be a non-negative number, got {factor}"
            ));
        }
        if self.dispatch.max_concurrency == 0 {
            return invalid("dispatch.max_concurrency must be at least 1".into());
        }
        if self.dispatch.max_concurrency > Semaphore::MAX_PERMITS {
            return invalid(format!(
                "dispatch.max_concurrency must be at most {}, got {}",
                Semaphore::MAX_PERMITS,
                self.dispatch.max_concurrency
            ));
        }
        if let Some(rps) = self.dispatch.requests_per_second {
            if !rps.is_finite() || rps <= 0.0 {
                return invalid(format!(
                    "dispatch.requests_per_second must be positive, got {rps}"
                ));
            }
        }
        if let Some(provider) = &self.provider {
            if provider.name.trim().is_empty() {
                return invalid("provider.name must not be empty".into());
            }
            if !provider.url_template.contains("{query}") {
                return invalid("provider.url_template must contain {query}".into());
            }
        }
        Ok(())
    }
}
