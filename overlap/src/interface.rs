//! Public scan interface.
//!
//! Report records returned by a scan, the top-level error type, and the
//! service trait implemented by [`crate::Scanner`].

use crate::dispatch::DispatchReport;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS
// ═══════════════════════════════════════════════════════════════════════════════

/// One reported fragment: a scored sequence, or a raw candidate source when
/// scoring is disabled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FragmentReport {
    pub label: String,
    /// Sequence score; absent for unscored candidates.
    pub score: Option<f64>,
    pub positions: usize,
    pub first_position: usize,
    pub last_position: usize,
    /// Character span from the first position's start to the last position's end.
    pub start: usize,
    pub end: usize,
    pub sources: Vec<String>,
    /// Owns at least one character after coverage resolution.
    pub visible: bool,
}

/// Per-source view over the candidate set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub id: String,
    pub host: String,
    pub matched_positions: usize,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    /// Document identity used for cache keys.
    pub document: String,
    pub width: usize,
    pub positions: usize,
    /// Share of positions covered by the reported fragments.
    pub similarity: f64,
    pub scored: bool,
    pub fragments: Vec<FragmentReport>,
    pub sources: Vec<SourceSummary>,
    /// Claimed text, `...` between claimed stretches.
    pub overlap_text: String,
    pub dispatch: DispatchReport,
}

impl ScanReport {
    pub fn visible_fragments(&self) -> impl Iterator<Item = &FragmentReport> {
        self.fragments.iter().filter(|f| f.visible)
    }
}

/// Error type for scan operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Document error: {0}")]
    DocumentError(String),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Dispatch error: {0}")]
    DispatchError(String),
    /// Import policy found nothing cached; the caller decides if that is fatal.
    #[error("No cached results: {0}")]
    CacheMiss(String),
    #[error("Index error: {0}")]
    IndexError(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type ScanResult<T> = Result<T, ScanError>;

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
pub trait ScanApi: Send + Sync {
    /// Scan one document's text against the configured backend.
    async fn scan(&self, text: String) -> ScanResult<ScanReport>;

    /// Synchronous scan for callers outside any async runtime.
    fn scan_blocking(&self, text: String) -> ScanResult<ScanReport>;

    /// Index size used for rarity weighting.
    fn index_size(&self) -> u64;
}

impl From<crate::document::DocumentError> for ScanError {
    fn from(e: crate::document::DocumentError) -> Self {
        ScanError::DocumentError(e.to_string())
    }
}

impl From<crate::config::ConfigError> for ScanError {
    fn from(e: crate::config::ConfigError) -> Self {
        ScanError::ConfigError(e.to_string())
    }
}

impl From<crate::provider::ProviderError> for ScanError {
    fn from(e: crate::provider::ProviderError) -> Self {
        ScanError::ProviderError(e.to_string())
    }
}

impl From<crate::dispatch::DispatchError> for ScanError {
    fn from(e: crate::dispatch::DispatchError) -> Self {
        match e {
            crate::dispatch::DispatchError::CacheMiss(key) => ScanError::CacheMiss(key),
            other => ScanError::DispatchError(other.to_string()),
        }
    }
}

impl From<crate::offline::IndexError> for ScanError {
    fn from(e: crate::offline::IndexError) -> Self {
        ScanError::IndexError(e.to_string())
    }
}
