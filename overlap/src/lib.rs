//! Overlap - text reuse detection against web search and local corpora
//!
//! This library shingles a suspect document into positioned n-grams, resolves
//! each n-gram against a search provider or an offline corpus index, and turns
//! the raw hits into a few scored "this passage came from that source"
//! sequences with an overall similarity figure.
//!
//! The pipeline, leaves first: [`document`] → [`dispatch`] → [`aggregate`] →
//! [`scorer`] → [`coverage`], tied together by [`Scanner`].

pub mod aggregate;
pub mod cache;
pub mod citations;
pub mod config;
pub mod coverage;
pub mod dispatch;
pub mod document;
pub mod fragment;
pub mod http;
pub mod interface;
pub mod offline;
pub mod provider;
pub mod scorer;
pub mod serp;
mod scanner;
pub mod tokenizer;
pub mod weighting;

pub use cache::{CachePolicy, CacheStore, FileCacheStore, MemoryCacheStore};
pub use config::{ConfigError, ScanConfig};
pub use dispatch::{Backend, DispatchConfig, DispatchEvent, DispatchReport, Dispatcher};
pub use document::{Document, DocumentError, IndexOptions};
pub use fragment::{CandidateSource, MatchFragment, Sequence};
pub use interface::*;
pub use offline::OfflineIndex;
pub use provider::{ProviderError, ProviderResult, SearchProvider};
pub use scanner::{analyze, Analysis, Scanner};
pub use scorer::ScoringConfig;
pub use weighting::{WeightMethod, Weighting};
