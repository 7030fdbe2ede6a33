//! Scan pipeline.
//!
//! `Scanner` owns a configured dispatcher and runs the whole flow for one
//! document: dispatch, aggregation, scoring, coverage. Everything after
//! dispatch is synchronous and lives in [`analyze`], so it can be driven
//! directly with precomputed results.

use crate::aggregate::aggregate;
use crate::cache::{CacheStore, FileCacheStore};
use crate::config::ScanConfig;
use crate::coverage::{resolve_by_character, similarity, Coverage};
use crate::dispatch::{Backend, DispatchReport, Dispatcher, ProgressFn};
use crate::document::Document;
use crate::fragment::{CandidateSource, MatchFragment, Sequence};
use crate::http::HttpProvider;
use crate::interface::{
    FragmentReport, ScanApi, ScanError, ScanReport, ScanResult, SourceSummary,
};
use crate::offline::OfflineIndex;
use crate::provider::ProviderResult;
use crate::scorer::{Scorer, ScoringConfig};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Global fallback Tokio runtime for blocking scans made outside any runtime.
/// Shared across all Scanner instances and never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

/// Result of the synchronous stages for one document.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub candidates: Vec<CandidateSource>,
    /// Empty when scoring is disabled.
    pub sequences: Vec<Sequence>,
    pub scored: bool,
    /// Resolved over `sequences`, or over `candidates` when unscored.
    pub coverage: Coverage,
    pub similarity: f64,
}

/// Aggregate, score and resolve coverage for already-dispatched results.
pub fn analyze(
    document: &Document,
    results: &HashMap<String, ProviderResult>,
    index_size: u64,
    scoring: &ScoringConfig,
) -> Analysis {
    let candidates = aggregate(results, document);
    if !scoring.enabled {
        return Analysis {
            coverage: resolve_by_character(&candidates, document),
            similarity: similarity(&candidates, document),
            candidates,
            sequences: Vec::new(),
            scored: false,
        };
    }

    let sequences = Scorer::new(*scoring, document, results, index_size).score(&candidates);
    Analysis {
        coverage: resolve_by_character(&sequences, document),
        similarity: similarity(&sequences, document),
        candidates,
        sequences,
        scored: true,
    }
}

impl Analysis {
    pub fn report(&self, document: &Document, dispatch: DispatchReport) -> ScanReport {
        let visible = self.coverage.visible();
        let mut fragments: Vec<FragmentReport> = if self.scored {
            self.sequences
                .iter()
                .enumerate()
                .map(|(idx, s)| {
                    fragment_report(
                        s,
                        document,
                        Some(s.score()),
                        s.sources().iter().cloned().collect(),
                        visible.contains(&idx),
                    )
                })
                .collect()
        } else {
            self.candidates
                .iter()
                .enumerate()
                .map(|(idx, c)| {
                    fragment_report(
                        c,
                        document,
                        None,
                        vec![c.id().to_string()],
                        visible.contains(&idx),
                    )
                })
                .collect()
        };
        fragments.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .total_cmp(&a.score.unwrap_or(0.0))
                .then(b.positions.cmp(&a.positions))
                .then(a.first_position.cmp(&b.first_position))
        });

        let mut sources: Vec<SourceSummary> = self
            .candidates
            .iter()
            .map(|c| SourceSummary {
                id: c.id().to_string(),
                host: c.host().to_string(),
                matched_positions: c.size(),
                similarity: document.similarity(c.positions()),
            })
            .collect();
        sources.sort_by(|a, b| {
            b.matched_positions
                .cmp(&a.matched_positions)
                .then_with(|| a.id.cmp(&b.id))
        });

        ScanReport {
            document: document.identity().to_string(),
            width: document.width(),
            positions: document.len(),
            similarity: self.similarity,
            scored: self.scored,
            fragments,
            sources,
            overlap_text: self.coverage.overlap_as_text(document),
            dispatch,
        }
    }

    /// Sources behind the sequences that survive coverage resolution.
    pub fn visible_sources(&self) -> BTreeSet<String> {
        if self.scored {
            crate::coverage::sources_of_visible(&self.sequences, &self.coverage)
        } else {
            self.coverage
                .visible()
                .into_iter()
                .filter_map(|idx| self.candidates.get(idx))
                .map(|c| c.id().to_string())
                .collect()
        }
    }
}

fn fragment_report<F: MatchFragment>(
    fragment: &F,
    document: &Document,
    score: Option<f64>,
    sources: Vec<String>,
    visible: bool,
) -> FragmentReport {
    let positions = fragment.positions();
    let first = positions.first().copied().unwrap_or(0);
    let last = positions.last().copied().unwrap_or(0);
    let start = document.span(first).map(|(s, _)| s).unwrap_or(0);
    let end = document.span(last).map(|(_, e)| e).unwrap_or(start);
    FragmentReport {
        label: fragment.label(),
        score,
        positions: positions.len(),
        first_position: first,
        last_position: last,
        start,
        end,
        sources,
        visible,
    }
}

pub struct Scanner {
    config: ScanConfig,
    dispatcher: Dispatcher,
}

impl Scanner {
    /// Validate `config` and wire a dispatcher for `backend`. A configured
    /// `cache_dir` becomes a file-backed cache store.
    pub fn new(config: ScanConfig, backend: Backend) -> ScanResult<Self> {
        config.validate()?;
        let mut dispatcher = Dispatcher::new(backend, config.dispatch.clone());
        if let Some(dir) = &config.dispatch.cache_dir {
            dispatcher = dispatcher.with_cache(Arc::new(FileCacheStore::new(dir.clone())));
        }
        Ok(Self { config, dispatcher })
    }

    /// Scanner over the HTTP provider described in `config.provider`.
    pub fn remote(config: ScanConfig) -> ScanResult<Self> {
        let provider_config = config
            .provider
            .as_ref()
            .ok_or_else(|| ScanError::ConfigError("no provider section configured".into()))?;
        let provider = HttpProvider::new(provider_config)?;
        Self::new(config, Backend::Remote(Arc::new(provider)))
    }

    /// Scanner over the offline index stored in `corpus` for the configured width.
    pub fn offline(config: ScanConfig, corpus: &Path) -> ScanResult<Self> {
        let index = OfflineIndex::load_for_width(corpus, config.shingle.width)?;
        Self::new(config, Backend::Offline(Arc::new(index)))
    }

    pub fn with_cache(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.dispatcher = self.dispatcher.with_cache(store);
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.dispatcher = self.dispatcher.with_progress(progress);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn document(&self, text: &str) -> ScanResult<Document> {
        Ok(Document::index_with(
            text,
            self.config.shingle.width,
            self.config.shingle.index_options(),
        )?)
    }

    pub async fn scan_document(&self, document: &Document) -> ScanResult<ScanReport> {
        #[cfg(feature = "perf-log")]
        let t0 = std::time::Instant::now();
        let outcome = self.dispatcher.search(document).await?;
        #[cfg(feature = "perf-log")]
        let t1 = std::time::Instant::now();
        let analysis = analyze(
            document,
            &outcome.results,
            self.dispatcher.backend().index_size(),
            &self.config.scoring,
        );
        #[cfg(feature = "perf-log")]
        {
            let t2 = std::time::Instant::now();
            eprintln!(
                "[perf] dispatch={:.1}ms analyze={:.1}ms terms={} candidates={}",
                (t1 - t0).as_secs_f64() * 1000.0,
                (t2 - t1).as_secs_f64() * 1000.0,
                outcome.report.requested,
                analysis.candidates.len()
            );
        }
        log::info!(
            "Scanned {} positions: {} candidates, {} sequences, similarity {:.3}",
            document.len(),
            analysis.candidates.len(),
            analysis.sequences.len(),
            analysis.similarity
        );
        Ok(analysis.report(document, outcome.report))
    }
}

#[async_trait]
impl ScanApi for Scanner {
    async fn scan(&self, text: String) -> ScanResult<ScanReport> {
        let document = self.document(&text)?;
        self.scan_document(&document).await
    }

    fn scan_blocking(&self, text: String) -> ScanResult<ScanReport> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ScanError::InvalidInput(
                "scan_blocking called inside an async runtime; use scan".into(),
            ));
        }
        FALLBACK_RUNTIME.block_on(self.scan(text))
    }

    fn index_size(&self) -> u64 {
        self.dispatcher.backend().index_size()
    }
}
