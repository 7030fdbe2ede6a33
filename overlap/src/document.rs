//! Indexed suspect document.
//!
//! A `Document` is the text split into overlapping shingles. Positions are
//! 0-based shingle indices; each distinct term maps to the ordered set of
//! positions where it occurs. Built once, read-only afterwards.

use crate::citations::strip_citations;
use crate::tokenizer::{shingles, Shingle};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Shingle width must be at least 1, got {0}")]
    InvalidWidth(usize),
    #[error("Document is not valid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),
    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Options applied while building the shingle stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Blank out quotations, bracketed spans and a trailing references
    /// section before shingling.
    pub strip_citations: bool,
}

#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    width: usize,
    shingles: Vec<Shingle>,
    terms: HashMap<String, BTreeSet<usize>>,
    char_len: usize,
    identity: String,
}

impl Document {
    /// Index `text` into shingles of `width` tokens.
    pub fn index(text: impl Into<String>, width: usize) -> DocumentResult<Self> {
        Self::index_with(text, width, IndexOptions::default())
    }

    pub fn index_with(
        text: impl Into<String>,
        width: usize,
        options: IndexOptions,
    ) -> DocumentResult<Self> {
        if width == 0 {
            return Err(DocumentError::InvalidWidth(width));
        }
        let text = text.into();
        let stream = if options.strip_citations {
            shingles(&strip_citations(&text), width)
        } else {
            shingles(&text, width)
        };

        let mut terms: HashMap<String, BTreeSet<usize>> = HashMap::new();
        for (position, shingle) in stream.iter().enumerate() {
            terms
                .entry(shingle.term.clone())
                .or_default()
                .insert(position);
        }

        Ok(Self {
            char_len: text.chars().count(),
            identity: content_identity(&text),
            text,
            width,
            shingles: stream,
            terms,
        })
    }

    /// Index raw bytes. Invalid UTF-8 is a fatal decode error.
    pub fn from_bytes(bytes: &[u8], width: usize, options: IndexOptions) -> DocumentResult<Self> {
        let text = std::str::from_utf8(bytes)?;
        Self::index_with(text, width, options)
    }

    pub fn from_path(path: &Path, width: usize, options: IndexOptions) -> DocumentResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes, width, options)
    }

    /// Replace the content hash with a caller-chosen identity, e.g. a
    /// submission id, for cache keys.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of shingle positions.
    pub fn len(&self) -> usize {
        self.shingles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shingles.is_empty()
    }

    /// Length of the raw text in characters.
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    /// Hex SHA-256 of the raw text; stable across runs, used as the cache key.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn unique_terms(&self) -> usize {
        self.terms.len()
    }

    /// Distinct terms in lexicographic order.
    pub fn sorted_terms(&self) -> Vec<&str> {
        let mut terms: Vec<&str> = self.terms.keys().map(String::as_str).collect();
        terms.sort_unstable();
        terms
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    /// Positions at which `term` occurs, in ascending order.
    pub fn locate(&self, term: &str) -> Option<&BTreeSet<usize>> {
        self.terms.get(term)
    }

    pub fn term_at(&self, position: usize) -> Option<&str> {
        self.shingles.get(position).map(|s| s.term.as_str())
    }

    /// Character span `[start, end)` covered by the shingle at `position`.
    pub fn span(&self, position: usize) -> Option<(usize, usize)> {
        self.shingles.get(position).map(|s| (s.start, s.end))
    }

    pub fn shingles(&self) -> &[Shingle] {
        &self.shingles
    }

    /// Terms of a provider snippet, shingled with this document's width and
    /// tokenizer, that also occur in this document.
    pub fn snippet_terms(&self, snippet: &str) -> BTreeSet<&str> {
        shingles(snippet, self.width)
            .into_iter()
            .filter_map(|s| self.terms.get_key_value(&s.term).map(|(k, _)| k.as_str()))
            .collect()
    }

    /// `|positions ∩ [0, len)| / len`, rounded half-up to three decimals.
    /// An empty document has similarity 0.
    pub fn similarity<'a>(&self, positions: impl IntoIterator<Item = &'a usize>) -> f64 {
        let len = self.len();
        let covered: BTreeSet<usize> = positions.into_iter().copied().filter(|&p| p < len).collect();
        round_ratio(covered.len(), len)
    }
}

/// `count / total` rounded half-up to three decimal places.
pub fn round_ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let (count, total) = (count as u128, total as u128);
    let thousandths = (count * 2000 + total) / (2 * total);
    thousandths as f64 / 1000.0
}

fn content_identity(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
