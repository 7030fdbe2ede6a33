//! Search dispatcher.
//!
//! Resolves every distinct term of a document against a backend. Remote
//! providers are queried by a bounded pool of tokio tasks, each retrying its
//! own transport failures; the round owner waits once, up to a shared
//! ceiling, then folds the per-task outcomes together. Terms still failing
//! after parsing are re-queried in repair rounds, at most `max_retries` times.
//! Raw payloads go through the cache according to the [`CachePolicy`].
//!
//! The offline backend answers from a local index synchronously and skips
//! retry and cache handling entirely.

use crate::cache::{
    decode_payloads, encode_payloads, CacheError, CacheKey, CachePolicy, CacheStore,
    CachedPayloads,
};
use crate::document::Document;
use crate::offline::OfflineIndex;
use crate::provider::{ProviderError, ProviderResult, SearchProvider};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;

#[derive(Error, Debug)]
pub enum DispatchError {
    /// Import policy and no cached blob for this document.
    #[error("No cached results for {0}")]
    CacheMiss(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("Dispatcher misconfigured: {0}")]
    Configuration(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Where terms are resolved.
#[derive(Clone)]
pub enum Backend {
    Remote(Arc<dyn SearchProvider>),
    Offline(Arc<OfflineIndex>),
}

impl Backend {
    pub fn name(&self) -> &str {
        match self {
            Self::Remote(provider) => provider.name(),
            Self::Offline(index) => index.name(),
        }
    }

    /// Documents behind the backend, for rarity weighting.
    pub fn index_size(&self) -> u64 {
        match self {
            Self::Remote(provider) => provider.index_size(),
            Self::Offline(index) => index.corpus_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub max_concurrency: usize,
    /// Per-query transport retries, and the number of repair rounds.
    pub max_retries: u32,
    /// Fixed submission rate; unset means no throttling.
    pub requests_per_second: Option<f64>,
    /// Base of the exponential retry backoff. 0 retries immediately.
    pub retry_backoff_ms: u64,
    /// Floor of the round ceiling, so small documents are not abandoned at once.
    pub min_wait_ms: u64,
    /// Re-shingle returned snippets to pick up hits for other terms.
    pub snippet_rescan: bool,
    pub cache_policy: CachePolicy,
    pub cache_dir: Option<PathBuf>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 100,
            max_retries: 4,
            requests_per_second: None,
            retry_backoff_ms: 250,
            min_wait_ms: 10_000,
            snippet_rescan: true,
            cache_policy: CachePolicy::Off,
            cache_dir: None,
        }
    }
}

impl DispatchConfig {
    /// Delay between task submissions.
    pub fn submit_delay(&self) -> Duration {
        match self.requests_per_second {
            Some(rps) if rps.is_finite() && rps > 0.0 => Duration::from_secs_f64(1.0 / rps),
            _ => Duration::ZERO,
        }
    }

    /// How long a round waits after its last submission: one second per ten
    /// terms, never less than `min_wait_ms`.
    pub fn ceiling(&self, terms: usize) -> Duration {
        Duration::from_secs((terms / 10) as u64).max(Duration::from_millis(self.min_wait_ms))
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: u32,
    backoff_ms: u64,
}

impl RetryPolicy {
    /// `backoff_ms * 2^(attempt - 1)` plus up to half of that again.
    fn delay(&self, attempt: u32) -> Duration {
        if self.backoff_ms == 0 {
            return Duration::ZERO;
        }
        let base = self
            .backoff_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
        let jitter = rand::thread_rng().gen_range(0..=base / 2);
        Duration::from_millis(base.saturating_add(jitter))
    }
}

/// Progress notifications for one dispatch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    RoundStarted { round: u32, terms: usize },
    Retried { term: String, attempt: u32 },
    Finished { term: String, ok: bool },
}

pub type ProgressFn = Arc<dyn Fn(&DispatchEvent) + Send + Sync>;

fn emit(progress: Option<&ProgressFn>, event: DispatchEvent) {
    if let Some(progress) = progress {
        progress(&event);
    }
}

/// Batch summary of one dispatch call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Distinct terms resolved.
    pub requested: usize,
    /// Terms that ended with a parsed result.
    pub with_data: usize,
    /// Terms still failing transport after every repair round.
    pub errors: BTreeSet<String>,
    /// Terms whose payload could not be parsed; never re-queried.
    pub parse_errors: BTreeSet<String>,
    /// Transport retries across all tasks and rounds.
    pub retries: u64,
    /// Tasks still running at a round's ceiling.
    pub abandoned: usize,
    pub repair_rounds: u32,
    pub from_cache: bool,
}

impl DispatchReport {
    pub fn failed(&self) -> usize {
        self.errors.len() + self.parse_errors.len()
    }

    fn absorb(&mut self, round: &RoundOutcome) {
        self.retries += round.retries;
        self.abandoned += round.abandoned;
        self.parse_errors.extend(round.rejected.iter().cloned());
    }
}

#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    pub results: HashMap<String, ProviderResult>,
    pub report: DispatchReport,
}

/// What one query task hands back to the round owner.
struct TaskOutcome {
    term: String,
    payload: Option<String>,
    retries: u32,
    error: Option<ProviderError>,
}

#[derive(Default)]
struct RoundOutcome {
    payloads: CachedPayloads,
    failed: BTreeSet<String>,
    rejected: BTreeSet<String>,
    retries: u64,
    abandoned: usize,
}

impl RoundOutcome {
    fn record(&mut self, task: TaskOutcome) {
        self.retries += u64::from(task.retries);
        match (task.payload, task.error) {
            (Some(payload), _) => {
                self.payloads.insert(task.term, payload);
            }
            (None, Some(ProviderError::Parse(_))) => {
                self.rejected.insert(task.term);
            }
            (None, _) => {
                self.failed.insert(task.term);
            }
        }
    }
}

async fn run_query(
    provider: Arc<dyn SearchProvider>,
    term: String,
    retry: RetryPolicy,
    progress: Option<ProgressFn>,
) -> TaskOutcome {
    let mut retries = 0u32;
    loop {
        match provider.query(&term).await {
            Ok(payload) => {
                emit(
                    progress.as_ref(),
                    DispatchEvent::Finished {
                        term: term.clone(),
                        ok: true,
                    },
                );
                return TaskOutcome {
                    term,
                    payload: Some(payload),
                    retries,
                    error: None,
                };
            }
            Err(err) if err.is_retryable() && retries < retry.max_retries => {
                retries += 1;
                log::debug!("Retrying {:?} ({}/{}): {}", term, retries, retry.max_retries, err);
                emit(
                    progress.as_ref(),
                    DispatchEvent::Retried {
                        term: term.clone(),
                        attempt: retries,
                    },
                );
                tokio::time::sleep(retry.delay(retries)).await;
            }
            Err(err) => {
                log::warn!("Query for {:?} failed after {} retries: {}", term, retries, err);
                emit(
                    progress.as_ref(),
                    DispatchEvent::Finished {
                        term: term.clone(),
                        ok: false,
                    },
                );
                return TaskOutcome {
                    term,
                    payload: None,
                    retries,
                    error: Some(err),
                };
            }
        }
    }
}

pub struct Dispatcher {
    backend: Backend,
    config: DispatchConfig,
    cache: Option<Arc<dyn CacheStore>>,
    progress: Option<ProgressFn>,
}

impl Dispatcher {
    pub fn new(backend: Backend, config: DispatchConfig) -> Self {
        Self {
            backend,
            config,
            cache: None,
            progress: None,
        }
    }

    pub fn with_cache(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(store);
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Resolve every distinct term of `document`. Per-term failures are
    /// recorded in the report; only cache and configuration problems fail
    /// the call.
    pub async fn search(&self, document: &Document) -> DispatchResult<DispatchOutcome> {
        match &self.backend {
            Backend::Offline(index) => self.search_offline(index, document),
            Backend::Remote(provider) => self.search_remote(provider, document).await,
        }
    }

    fn search_offline(
        &self,
        index: &OfflineIndex,
        document: &Document,
    ) -> DispatchResult<DispatchOutcome> {
        if index.width() != document.width() {
            return Err(DispatchError::Configuration(format!(
                "offline index {:?} has width {}, document has width {}",
                index.name(),
                index.width(),
                document.width()
            )));
        }

        let mut results = HashMap::new();
        for term in document.sorted_terms() {
            let sources = index.lookup(term);
            if sources.is_empty() {
                continue;
            }
            let mut result = ProviderResult::new();
            for source in sources {
                result.put(source.as_str(), "");
            }
            results.insert(term.to_string(), result);
        }

        let report = DispatchReport {
            requested: document.unique_terms(),
            with_data: results.len(),
            ..Default::default()
        };
        log::info!(
            "Found {} of {} terms in offline index {:?}",
            report.with_data,
            report.requested,
            index.name()
        );
        Ok(DispatchOutcome { results, report })
    }

    async fn search_remote(
        &self,
        provider: &Arc<dyn SearchProvider>,
        document: &Document,
    ) -> DispatchResult<DispatchOutcome> {
        let terms: Vec<String> = document
            .sorted_terms()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let policy = self.config.cache_policy;
        let key = CacheKey::new(document.identity(), document.width(), provider.name());
        let store = match (policy, &self.cache) {
            (CachePolicy::Off, _) => None,
            (_, Some(store)) => Some(store.as_ref()),
            (_, None) => {
                return Err(DispatchError::Configuration(format!(
                    "cache policy {policy} needs a cache store"
                )));
            }
        };

        let mut report = DispatchReport {
            requested: terms.len(),
            ..Default::default()
        };

        let cached = match store {
            Some(store) if policy.reads() => self.load_cached(store, &key)?,
            _ => None,
        };
        let mut fetched = false;
        let mut payloads = match cached {
            Some(payloads) => {
                log::debug!("Cache hit for {}: {} payloads", key, payloads.len());
                report.from_cache = true;
                payloads
            }
            None if policy == CachePolicy::Import => {
                return Err(DispatchError::CacheMiss(key.file_name()));
            }
            None => {
                let round = self.fetch_round(provider, terms.clone(), 0).await;
                report.absorb(&round);
                fetched = true;
                round.payloads
            }
        };

        let mut results: HashMap<String, ProviderResult> = HashMap::new();
        let mut pending = terms;
        let mut depth = 0u32;
        let errors = loop {
            let errors = self.parse_terms(
                provider.as_ref(),
                document,
                &payloads,
                &pending,
                &mut results,
                &mut report,
            );
            if errors.is_empty()
                || policy == CachePolicy::Import
                || depth >= self.config.max_retries
            {
                break errors;
            }

            depth += 1;
            log::debug!(
                "Repair round {}: re-querying {} failed terms",
                depth,
                errors.len()
            );
            let round = self
                .fetch_round(provider, errors.iter().cloned().collect(), depth)
                .await;
            report.absorb(&round);
            payloads.extend(round.payloads);
            fetched = true;
            pending = errors.into_iter().collect();
        };
        report.repair_rounds = depth;
        report.errors = errors;

        if fetched && policy.writes() {
            if let Some(store) = store {
                store.store(&key, &encode_payloads(&payloads)?)?;
                log::debug!("Stored {} payloads as {}", payloads.len(), key);
            }
        }

        report.with_data = report.requested.saturating_sub(report.failed());
        log::info!(
            "Found {} results with data ({} errors)",
            report.with_data,
            report.failed()
        );
        Ok(DispatchOutcome { results, report })
    }

    /// A corrupt blob is logged and treated as absent.
    fn load_cached(
        &self,
        store: &dyn CacheStore,
        key: &CacheKey,
    ) -> DispatchResult<Option<CachedPayloads>> {
        let Some(blob) = store.load(key)? else {
            log::debug!("Cache miss for {}", key);
            return Ok(None);
        };
        match decode_payloads(&blob) {
            Ok(payloads) => Ok(Some(payloads)),
            Err(err) => {
                log::warn!("Ignoring corrupt cache blob {}: {}", key, err);
                Ok(None)
            }
        }
    }

    /// Parse the payloads of `terms` into `results`. Returns the terms that
    /// have no usable payload and should be repaired.
    fn parse_terms(
        &self,
        provider: &dyn SearchProvider,
        document: &Document,
        payloads: &CachedPayloads,
        terms: &[String],
        results: &mut HashMap<String, ProviderResult>,
        report: &mut DispatchReport,
    ) -> BTreeSet<String> {
        let mut errors = BTreeSet::new();
        for term in terms {
            if report.parse_errors.contains(term) {
                continue;
            }
            let payload = match payloads.get(term) {
                Some(payload) if !payload.trim().is_empty() => payload,
                _ => {
                    errors.insert(term.clone());
                    continue;
                }
            };
            match provider.parse(payload) {
                Ok(parsed) => {
                    if self.config.snippet_rescan {
                        rescan_snippets(document, &parsed, results);
                    }
                    results.entry(term.clone()).or_default().merge(parsed);
                }
                Err(err) => {
                    log::warn!("Discarding unparseable payload for {:?}: {}", term, err);
                    report.parse_errors.insert(term.clone());
                }
            }
        }
        errors
    }

    async fn fetch_round(
        &self,
        provider: &Arc<dyn SearchProvider>,
        terms: Vec<String>,
        round: u32,
    ) -> RoundOutcome {
        emit(
            self.progress.as_ref(),
            DispatchEvent::RoundStarted {
                round,
                terms: terms.len(),
            },
        );
        let permits = self.config.max_concurrency.clamp(1, Semaphore::MAX_PERMITS);
        let semaphore = Arc::new(Semaphore::new(permits));
        let delay = self.config.submit_delay();
        let retry = RetryPolicy {
            max_retries: self.config.max_retries,
            backoff_ms: self.config.retry_backoff_ms,
        };

        let mut handles = Vec::with_capacity(terms.len());
        for term in terms {
            let (sem, provider, progress, task_term) = (
                semaphore.clone(),
                provider.clone(),
                self.progress.clone(),
                term.clone(),
            );
            let handle = tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                run_query(provider, task_term, retry, progress).await
            });
            handles.push((term, handle));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let ceiling = self.config.ceiling(handles.len());
        let deadline = Instant::now() + ceiling;
        let waits = handles.into_iter().map(|(term, mut handle)| {
            let progress = self.progress.clone();
            async move {
                let abandoned = match tokio::time::timeout_at(deadline, &mut handle).await {
                    Ok(Ok(task)) => return Ok(task),
                    Ok(Err(join_error)) => {
                        log::warn!("Query task for {:?} died: {}", term, join_error);
                        false
                    }
                    Err(_) => {
                        handle.abort();
                        true
                    }
                };
                emit(
                    progress.as_ref(),
                    DispatchEvent::Finished {
                        term: term.clone(),
                        ok: false,
                    },
                );
                Err((term, abandoned))
            }
        });

        let mut outcome = RoundOutcome::default();
        for finished in futures::future::join_all(waits).await {
            match finished {
                Ok(task) => outcome.record(task),
                Err((term, abandoned)) => {
                    if abandoned {
                        outcome.abandoned += 1;
                    }
                    outcome.failed.insert(term);
                }
            }
        }
        if outcome.abandoned > 0 {
            log::warn!(
                "Abandoned {} unfinished queries after {:?}",
                outcome.abandoned,
                ceiling
            );
        }
        outcome
    }
}

/// Credit every snippet's shingles that also occur in the document to the
/// snippet's source.
fn rescan_snippets(
    document: &Document,
    parsed: &ProviderResult,
    results: &mut HashMap<String, ProviderResult>,
) {
    let mut found: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
    for (source, snippet) in parsed.snippets() {
        for term in document.snippet_terms(snippet) {
            found
                .entry(term)
                .or_default()
                .push((source.as_str(), snippet.as_str()));
        }
    }
    for (term, hits) in found {
        let entry = results.entry(term.to_string()).or_default();
        for (source, snippet) in hits {
            entry.put(source, snippet);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::document::IndexOptions;
    use async_trait::async_trait;

    /// Answers every term with one hit whose snippet is the term itself.
    struct EchoProvider;

    #[async_trait]
    impl SearchProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        fn index_size(&self) -> u64 {
            1000
        }

        async fn query(&self, term: &str) -> Result<String, ProviderError> {
            Ok(term.to_string())
        }

        fn parse(&self, payload: &str) -> Result<ProviderResult, ProviderError> {
            if payload.contains("poison") {
                return Err(ProviderError::Parse("poisoned".into()));
            }
            let mut result = ProviderResult::new();
            result.put(format!("http://echo.example/{}", payload.replace(' ', "-")), payload);
            Ok(result)
        }

        fn parse_error(&self, payload: &str) -> String {
            payload.to_string()
        }
    }

    fn fast_config() -> DispatchConfig {
        DispatchConfig {
            retry_backoff_ms: 0,
            snippet_rescan: false,
            ..Default::default()
        }
    }

    // ── config ───────────────────────────────────────────────────

    #[test]
    fn test_submit_delay_from_rate() {
        let mut config = DispatchConfig::default();
        assert_eq!(config.submit_delay(), Duration::ZERO);
        config.requests_per_second = Some(4.0);
        assert_eq!(config.submit_delay(), Duration::from_millis(250));
        config.requests_per_second = Some(0.0);
        assert_eq!(config.submit_delay(), Duration::ZERO);
    }

    #[test]
    fn test_ceiling_has_floor() {
        let config = DispatchConfig {
            min_wait_ms: 2_000,
            ..Default::default()
        };
        assert_eq!(config.ceiling(5), Duration::from_secs(2));
        assert_eq!(config.ceiling(1_000), Duration::from_secs(100));
    }

    #[test]
    fn test_ceiling_without_floor_is_one_second_per_ten_terms() {
        let config = DispatchConfig {
            min_wait_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.ceiling(250), Duration::from_secs(25));
        assert_eq!(config.ceiling(30), Duration::from_secs(3));
        assert_eq!(config.ceiling(9), Duration::ZERO);
    }

    #[test]
    fn test_backoff_zero_disables() {
        let retry = RetryPolicy {
            max_retries: 3,
            backoff_ms: 0,
        };
        assert_eq!(retry.delay(3), Duration::ZERO);
    }

    #[test]
    fn test_backoff_grows_with_jitter_bound() {
        let retry = RetryPolicy {
            max_retries: 3,
            backoff_ms: 100,
        };
        let third = retry.delay(3);
        assert!(third >= Duration::from_millis(400));
        assert!(third <= Duration::from_millis(600));
    }

    // ── remote ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_remote_resolves_every_term() {
        let doc = Document::index("one two three four", 2).unwrap();
        let dispatcher = Dispatcher::new(Backend::Remote(Arc::new(EchoProvider)), fast_config());
        let outcome = dispatcher.search(&doc).await.unwrap();
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.report.requested, 3);
        assert_eq!(outcome.report.with_data, 3);
        assert!(outcome.report.errors.is_empty());
        assert!(!outcome.report.from_cache);
    }

    #[tokio::test]
    async fn test_parse_errors_are_isolated() {
        let doc = Document::index("fine words poison pill", 1).unwrap();
        let dispatcher = Dispatcher::new(Backend::Remote(Arc::new(EchoProvider)), fast_config());
        let outcome = dispatcher.search(&doc).await.unwrap();
        assert_eq!(outcome.report.parse_errors, BTreeSet::from(["poison".to_string()]));
        assert_eq!(outcome.report.with_data, 3);
        assert_eq!(outcome.report.repair_rounds, 0);
        assert!(!outcome.results.contains_key("poison"));
    }

    #[tokio::test]
    async fn test_snippet_rescan_credits_other_terms() {
        struct WideSnippet;

        #[async_trait]
        impl SearchProvider for WideSnippet {
            fn name(&self) -> &str {
                "wide"
            }
            fn index_size(&self) -> u64 {
                10
            }
            async fn query(&self, term: &str) -> Result<String, ProviderError> {
                Ok(term.to_string())
            }
            fn parse(&self, payload: &str) -> Result<ProviderResult, ProviderError> {
                let mut result = ProviderResult::new();
                if payload == "a b" {
                    result.put("src", "x a b c d y");
                }
                Ok(result)
            }
            fn parse_error(&self, payload: &str) -> String {
                payload.to_string()
            }
        }

        let doc = Document::index("a b c d", 2).unwrap();
        let config = DispatchConfig {
            snippet_rescan: true,
            ..fast_config()
        };
        let dispatcher = Dispatcher::new(Backend::Remote(Arc::new(WideSnippet)), config);
        let outcome = dispatcher.search(&doc).await.unwrap();
        for term in ["a b", "b c", "c d"] {
            assert!(
                outcome.results[term].sources().any(|s| s == "src"),
                "{term} should be credited to src"
            );
        }
    }

    // ── cache ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_cache_policy_without_store() {
        let doc = Document::index("a b c", 1).unwrap();
        let config = DispatchConfig {
            cache_policy: CachePolicy::Use,
            ..fast_config()
        };
        let dispatcher = Dispatcher::new(Backend::Remote(Arc::new(EchoProvider)), config);
        assert!(matches!(
            dispatcher.search(&doc).await,
            Err(DispatchError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_import_miss() {
        let doc = Document::index("a b c", 1).unwrap();
        let config = DispatchConfig {
            cache_policy: CachePolicy::Import,
            ..fast_config()
        };
        let dispatcher = Dispatcher::new(Backend::Remote(Arc::new(EchoProvider)), config)
            .with_cache(Arc::new(MemoryCacheStore::new()));
        assert!(matches!(
            dispatcher.search(&doc).await,
            Err(DispatchError::CacheMiss(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_refetched() {
        let doc = Document::index("a b c", 1).unwrap();
        let store = Arc::new(MemoryCacheStore::new());
        let key = CacheKey::new(doc.identity(), 1, "echo");
        store.store(&key, b"not json").unwrap();

        let config = DispatchConfig {
            cache_policy: CachePolicy::Use,
            ..fast_config()
        };
        let dispatcher = Dispatcher::new(Backend::Remote(Arc::new(EchoProvider)), config)
            .with_cache(store.clone());
        let outcome = dispatcher.search(&doc).await.unwrap();
        assert!(!outcome.report.from_cache);
        assert_eq!(outcome.report.with_data, 3);
        let blob = store.load(&key).unwrap().unwrap();
        assert_eq!(decode_payloads(&blob).unwrap().len(), 3);
    }

    // ── offline ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_offline_backend() {
        let corpus = vec![("src.txt".to_string(), "the quick brown fox".to_string())];
        let index = OfflineIndex::build("corpus", &corpus, 2, IndexOptions::default()).unwrap();
        let doc = Document::index("a quick brown cat", 2).unwrap();
        let dispatcher = Dispatcher::new(Backend::Offline(Arc::new(index)), fast_config());
        let outcome = dispatcher.search(&doc).await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results["quick brown"].sources().eq(["src.txt"]));
        assert_eq!(outcome.report.requested, 3);
        assert_eq!(outcome.report.with_data, 1);
        assert_eq!(dispatcher.backend().index_size(), 1);
    }

    #[tokio::test]
    async fn test_offline_width_mismatch() {
        let index = OfflineIndex::build("corpus", &[], 3, IndexOptions::default()).unwrap();
        let doc = Document::index("a b c d", 2).unwrap();
        let dispatcher = Dispatcher::new(Backend::Offline(Arc::new(index)), fast_config());
        assert!(matches!(
            dispatcher.search(&doc).await,
            Err(DispatchError::Configuration(_))
        ));
    }
}
