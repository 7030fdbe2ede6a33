//! Offline corpus index.
//!
//! Inverts a local corpus into term → source-document ids for one shingle
//! width, so that documents can be scanned without any network access. The
//! index is persisted as `index.<width>.json` next to the corpus.

use crate::document::{Document, DocumentError, IndexOptions};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory under a corpus root holding the source documents.
pub const SOURCES_DIR: &str = "Sources";

static NO_SOURCES: BTreeSet<String> = BTreeSet::new();

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to index {id}: {source}")]
    Document {
        id: String,
        #[source]
        source: DocumentError,
    },
    #[error("Index I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Index file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Index width {found} does not match requested width {expected}")]
    WidthMismatch { expected: usize, found: usize },
}

pub type IndexResult<T> = Result<T, IndexError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfflineIndex {
    name: String,
    width: usize,
    corpus_size: u64,
    terms: HashMap<String, BTreeSet<String>>,
}

impl OfflineIndex {
    /// Index `(id, text)` pairs at one width. Documents are shingled in
    /// parallel; the first malformed document aborts the build.
    pub fn build(
        name: impl Into<String>,
        documents: &[(String, String)],
        width: usize,
        options: IndexOptions,
    ) -> IndexResult<Self> {
        let per_document: Vec<(&str, Vec<String>)> = documents
            .par_iter()
            .map(|(id, text)| {
                let doc = Document::index_with(text.as_str(), width, options).map_err(|source| {
                    IndexError::Document {
                        id: id.clone(),
                        source,
                    }
                })?;
                let terms = doc.sorted_terms().into_iter().map(str::to_owned).collect();
                Ok((id.as_str(), terms))
            })
            .collect::<IndexResult<_>>()?;

        let mut terms: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (id, doc_terms) in per_document {
            for term in doc_terms {
                terms.entry(term).or_default().insert(id.to_string());
            }
        }

        log::info!(
            "Indexed {} documents at width {} ({} distinct terms)",
            documents.len(),
            width,
            terms.len()
        );

        Ok(Self {
            name: name.into(),
            width,
            corpus_size: documents.len() as u64,
            terms,
        })
    }

    /// One index per width over the same corpus.
    pub fn build_all(
        name: &str,
        documents: &[(String, String)],
        widths: &[usize],
        options: IndexOptions,
    ) -> IndexResult<Vec<Self>> {
        widths
            .iter()
            .map(|&width| Self::build(name, documents, width, options))
            .collect()
    }

    /// Source ids containing `term`; empty when the term is unknown.
    pub fn lookup(&self, term: &str) -> &BTreeSet<String> {
        self.terms.get(term).unwrap_or(&NO_SOURCES)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn corpus_size(&self) -> u64 {
        self.corpus_size
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn file_name(width: usize) -> String {
        format!("index.{width}.json")
    }

    pub fn save(&self, path: &Path) -> IndexResult<()> {
        let bytes = serde_json::to_vec(self)?;
        std::fs::write(path, bytes).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> IndexResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Load `<corpus>/index.<width>.json`. A missing file is fatal.
    pub fn load_for_width(corpus: &Path, width: usize) -> IndexResult<Self> {
        let index = Self::load(&corpus.join(Self::file_name(width)))?;
        if index.width != width {
            return Err(IndexError::WidthMismatch {
                expected: width,
                found: index.width,
            });
        }
        Ok(index)
    }
}

/// Read every file under `<corpus>/Sources` as `(id, text)`, where the id is
/// the file name. Files are returned in name order.
pub fn read_corpus(corpus: &Path) -> IndexResult<Vec<(String, String)>> {
    let dir = corpus.join(SOURCES_DIR);
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| IndexError::Io { path, source }
    };

    let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)
        .map_err(io_err(&dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let id = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let bytes = std::fs::read(&path).map_err(io_err(&path))?;
            let text = String::from_utf8(bytes).map_err(|e| IndexError::Document {
                id: id.clone(),
                source: DocumentError::Decode(e.utf8_error()),
            })?;
            Ok((id, text))
        })
        .collect()
}
