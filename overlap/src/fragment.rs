//! Match fragments: candidate sources and scored sequences.
//!
//! Both kinds expose the positions they cover and a [`FragmentRank`], which is
//! all coverage resolution needs to decide who owns a character.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Ordering key for fragments, compared lexicographically:
///
/// 1. score: higher wins (candidate sources all rank 0 here)
/// 2. size: number of positions covered, larger wins
#[derive(Debug, Clone, Copy)]
pub struct FragmentRank {
    pub score: f64,
    pub size: usize,
}

impl Ord for FragmentRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.size.cmp(&other.size))
    }
}

impl PartialOrd for FragmentRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FragmentRank {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FragmentRank {}

pub trait MatchFragment {
    fn label(&self) -> String;
    fn positions(&self) -> &BTreeSet<usize>;
    fn rank(&self) -> FragmentRank;

    fn size(&self) -> usize {
        self.positions().len()
    }
}

/// One external source and every document position whose term it matched.
/// Identity is the source id alone.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSource {
    id: String,
    host: String,
    positions: BTreeSet<usize>,
}

impl CandidateSource {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            host: parse_host(&id),
            id,
            positions: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns whether any of the positions were new.
    pub fn add_positions(&mut self, positions: impl IntoIterator<Item = usize>) -> bool {
        let before = self.positions.len();
        self.positions.extend(positions);
        self.positions.len() > before
    }
}

impl PartialEq for CandidateSource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CandidateSource {}

impl MatchFragment for CandidateSource {
    fn label(&self) -> String {
        self.id.clone()
    }

    fn positions(&self) -> &BTreeSet<usize> {
        &self.positions
    }

    fn rank(&self) -> FragmentRank {
        FragmentRank {
            score: 0.0,
            size: self.positions.len(),
        }
    }
}

/// Host part of a URL, or the id itself for non-URL ids such as corpus file
/// names.
pub fn parse_host(id: &str) -> String {
    if let Ok(url) = url::Url::parse(id) {
        if let Some(host) = url.host_str() {
            return host.to_string();
        }
    }
    match id.find("//") {
        Some(idx) => {
            let rest = &id[idx + 2..];
            rest.split('/').next().unwrap_or(rest).to_string()
        }
        None => id.to_string(),
    }
}

/// A scored run of positions. Identity is the exact position set; sources
/// that produced the same set are merged into one sequence.
#[derive(Debug, Clone, Serialize)]
pub struct Sequence {
    positions: BTreeSet<usize>,
    score: f64,
    sources: BTreeSet<String>,
}

impl Sequence {
    pub fn new(positions: BTreeSet<usize>, score: f64) -> Self {
        Self {
            positions,
            score,
            sources: BTreeSet::new(),
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn sources(&self) -> &BTreeSet<String> {
        &self.sources
    }

    pub fn first(&self) -> Option<usize> {
        self.positions.first().copied()
    }

    pub fn last(&self) -> Option<usize> {
        self.positions.last().copied()
    }

    pub fn key(&self) -> Vec<usize> {
        self.positions.iter().copied().collect()
    }

    pub fn add_source(&mut self, source: impl Into<String>) {
        self.sources.insert(source.into());
    }

    /// Fold another sequence with the same positions into this one.
    pub fn absorb(&mut self, other: Sequence) {
        debug_assert_eq!(self.positions, other.positions);
        self.sources.extend(other.sources);
        if other.score > self.score {
            self.score = other.score;
        }
    }
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.positions == other.positions
    }
}

impl Eq for Sequence {}

impl MatchFragment for Sequence {
    fn label(&self) -> String {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => format!("[{first}..={last}] x{}", self.positions.len()),
            _ => "[]".to_string(),
        }
    }

    fn positions(&self) -> &BTreeSet<usize> {
        &self.positions
    }

    fn rank(&self) -> FragmentRank {
        FragmentRank {
            score: self.score,
            size: self.positions.len(),
        }
    }
}

/// Union of the sources behind `sequences`.
pub fn sources_of<'a>(sequences: impl IntoIterator<Item = &'a Sequence>) -> BTreeSet<String> {
    sequences
        .into_iter()
        .flat_map(|s| s.sources.iter().cloned())
        .collect()
}
