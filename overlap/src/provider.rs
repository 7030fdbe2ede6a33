//! Search provider contract and the per-term result record.
//!
//! A provider resolves one shingle term to a raw payload and knows how to
//! parse that payload into a [`ProviderResult`]. Transport and parsing are
//! separate steps so that payloads can be cached verbatim and re-parsed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// The request failed or the provider answered with a non-success status.
    /// The message is the provider's parsed error description when available.
    #[error("Transport failure{}: {message}", status_suffix(.status))]
    Transport { status: Option<u16>, message: String },
    #[error("Malformed provider payload: {0}")]
    Parse(String),
    #[error("Provider misconfigured: {0}")]
    Configuration(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl ProviderError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Sources matching one term, with their snippets and the provider's reported
/// total hit count.
///
/// The total never drops below the number of distinct sources recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    snippets: BTreeMap<String, String>,
    total_results: u64,
}

impl ProviderResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `source` with `snippet`. A repeated source replaces its snippet.
    /// Returns whether the source was new.
    pub fn put(&mut self, source: impl Into<String>, snippet: impl Into<String>) -> bool {
        let is_new = self.snippets.insert(source.into(), snippet.into()).is_none();
        if is_new {
            self.total_results = self.total_results.max(self.snippets.len() as u64);
        }
        is_new
    }

    /// Accept a reported total only if it exceeds both the known source count
    /// and the current total.
    pub fn set_total(&mut self, total: u64) {
        if total > self.snippets.len() as u64 && total > self.total_results {
            self.total_results = total;
        }
    }

    /// Union sources (the other side's snippets win) and keep the larger total.
    pub fn merge(&mut self, other: ProviderResult) {
        let total = other.total_results;
        for (source, snippet) in other.snippets {
            self.put(source, snippet);
        }
        self.total_results = self.total_results.max(total);
    }

    pub fn total_results(&self) -> u64 {
        self.total_results
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.snippets.keys().map(String::as_str)
    }

    pub fn snippets(&self) -> &BTreeMap<String, String> {
        &self.snippets
    }

    pub fn snippet(&self, source: &str) -> Option<&str> {
        self.snippets.get(source).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Short identifier, used in cache keys and log lines.
    fn name(&self) -> &str;

    /// Estimated number of documents the provider indexes, used by rarity
    /// weighting.
    fn index_size(&self) -> u64;

    /// Issue one exact-phrase query and return the raw payload.
    async fn query(&self, term: &str) -> Result<String, ProviderError>;

    fn parse(&self, payload: &str) -> Result<ProviderResult, ProviderError>;

    /// Human-readable error description from an error payload.
    fn parse_error(&self, payload: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_raises_total_to_source_count() {
        let mut result = ProviderResult::new();
        assert!(result.put("http://a", "one"));
        assert!(result.put("http://b", "two"));
        assert_eq!(result.total_results(), 2);
        assert!(!result.put("http://a", "replaced"));
        assert_eq!(result.snippet("http://a"), Some("replaced"));
        assert_eq!(result.total_results(), 2);
    }

    #[test]
    fn test_set_total_only_increases() {
        let mut result = ProviderResult::new();
        result.put("x", "");
        result.set_total(500);
        assert_eq!(result.total_results(), 500);
        result.set_total(20);
        assert_eq!(result.total_results(), 500);
        let mut small = ProviderResult::new();
        small.put("x", "");
        small.put("y", "");
        small.set_total(1);
        assert_eq!(small.total_results(), 2);
    }

    #[test]
    fn test_merge_unions_and_keeps_max_total() {
        let mut a = ProviderResult::new();
        a.put("x", "old");
        a.set_total(10);
        let mut b = ProviderResult::new();
        b.put("x", "new");
        b.put("y", "");
        b.set_total(7);
        a.merge(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.snippet("x"), Some("new"));
        assert_eq!(a.total_results(), 10);
    }

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(ProviderError::transport("reset").is_retryable());
        assert!(!ProviderError::Parse("bad".into()).is_retryable());
        assert!(!ProviderError::Configuration("key".into()).is_retryable());
    }

    #[test]
    fn test_transport_display_includes_status() {
        let err = ProviderError::Transport {
            status: Some(403),
            message: "quota exceeded".into(),
        };
        assert_eq!(err.to_string(), "Transport failure (HTTP 403): quota exceeded");
    }
}
