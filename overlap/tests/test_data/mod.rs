//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use overlap::serp::JsonSerpParser;
use overlap::{ProviderError, ProviderResult, SearchProvider};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const SUSPECT: &str = "The industrial revolution transformed rural economies into \
    urban manufacturing centers within a few short decades. Historians still debate \
    whether living standards rose or fell for the average worker during this period.";

pub const SOURCE_COPIED: &str = "Many agree that the industrial revolution transformed rural \
    economies into urban manufacturing centers within a few short decades, reshaping society.";

pub const SOURCE_UNRELATED: &str = "Bread dough should rest for an hour before shaping so the \
    gluten relaxes and the loaf rises evenly in the oven.";

/// Scripted provider: each term fails `failures[term]` times with a transport
/// error before succeeding, optionally after a delay. Answers with one hit per
/// term in the default serp layout.
pub struct ScriptedProvider {
    failures: HashMap<String, u32>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    calls: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    parser: JsonSerpParser,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            failures: HashMap::new(),
            delays: HashMap::new(),
            default_delay: Duration::ZERO,
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            parser: JsonSerpParser::default(),
        }
    }

    pub fn failing(mut self, term: &str, times: u32) -> Self {
        self.failures.insert(term.to_string(), times);
        self
    }

    pub fn slow(mut self, term: &str, delay: Duration) -> Self {
        self.delays.insert(term.to_string(), delay);
        self
    }

    pub fn every_call_takes(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn calls(&self, term: &str) -> u32 {
        self.calls.lock().get(term).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn payload_for(term: &str) -> String {
        serde_json::json!({
            "total": 40,
            "results": [
                {"url": format!("http://src.example/{}", term.replace(' ', "-")), "snippet": term}
            ]
        })
        .to_string()
    }
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn index_size(&self) -> u64 {
        10_000
    }

    async fn query(&self, term: &str) -> Result<String, ProviderError> {
        let attempt = {
            let mut calls = self.calls.lock();
            let count = calls.entry(term.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self.delays.get(term).copied().unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if attempt <= self.failures.get(term).copied().unwrap_or(0) {
            return Err(ProviderError::Transport {
                status: Some(503),
                message: "simulated outage".into(),
            });
        }
        Ok(Self::payload_for(term))
    }

    fn parse(&self, payload: &str) -> Result<ProviderResult, ProviderError> {
        self.parser.parse(payload)
    }

    fn parse_error(&self, payload: &str) -> String {
        self.parser.parse_error(payload)
    }
}

/// Provider that must never be reached.
pub struct UnreachableProvider;

#[async_trait]
impl SearchProvider for UnreachableProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn index_size(&self) -> u64 {
        10_000
    }

    async fn query(&self, term: &str) -> Result<String, ProviderError> {
        Err(ProviderError::transport(format!("unexpected query for {term:?}")))
    }

    fn parse(&self, payload: &str) -> Result<ProviderResult, ProviderError> {
        JsonSerpParser::default().parse(payload)
    }

    fn parse_error(&self, payload: &str) -> String {
        payload.to_string()
    }
}
