//! Raw-payload cache.
//!
//! One blob per (document, shingle width, provider): a JSON object mapping each
//! term to the provider's raw payload. Blobs are parsed again on every load,
//! so a cached run produces the same results as the one that wrote it.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cache blob is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// How the dispatcher uses the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// No cache reads or writes.
    #[default]
    Off,
    /// Load when present; otherwise query and store.
    Use,
    /// Load only; a missing blob is an error and nothing is re-queried.
    Import,
    /// Always query, then store.
    Export,
}

impl CachePolicy {
    pub fn reads(self) -> bool {
        matches!(self, Self::Use | Self::Import)
    }

    pub fn writes(self) -> bool {
        matches!(self, Self::Use | Self::Export)
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::Use => "use",
            Self::Import => "import",
            Self::Export => "export",
        };
        f.write_str(name)
    }
}

impl FromStr for CachePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "use" => Ok(Self::Use),
            "import" => Ok(Self::Import),
            "export" => Ok(Self::Export),
            other => Err(format!("unknown cache policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub document: String,
    pub width: usize,
    pub provider: String,
}

impl CacheKey {
    pub fn new(document: impl Into<String>, width: usize, provider: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            width,
            provider: provider.into(),
        }
    }

    /// `<document>.<width>.<provider>.json`, with the provider name reduced to
    /// filename-safe characters.
    pub fn file_name(&self) -> String {
        let provider: String = self
            .provider
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{}.{}.{}.json", self.document, self.width, provider)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Term → raw payload.
pub type CachedPayloads = BTreeMap<String, String>;

pub fn encode_payloads(payloads: &CachedPayloads) -> CacheResult<Vec<u8>> {
    Ok(serde_json::to_vec(payloads)?)
}

pub fn decode_payloads(blob: &[u8]) -> CacheResult<CachedPayloads> {
    Ok(serde_json::from_slice(blob)?)
}

pub trait CacheStore: Send + Sync {
    fn load(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>>;
    fn store(&self, key: &CacheKey, blob: &[u8]) -> CacheResult<()>;
}

/// Blobs as files in one directory.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, key: &CacheKey, blob: &[u8]) -> CacheResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, blob)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-process store, mostly for tests and one-shot embedding.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<CacheKey, Vec<u8>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn store(&self, key: &CacheKey, blob: &[u8]) -> CacheResult<()> {
        self.entries.lock().insert(key.clone(), blob.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CacheKey {
        CacheKey::new("abc123", 3, "web search")
    }

    #[test]
    fn test_file_name_layout() {
        assert_eq!(key().file_name(), "abc123.3.web_search.json");
    }

    #[test]
    fn test_policy_reads_writes() {
        assert!(!CachePolicy::Off.reads() && !CachePolicy::Off.writes());
        assert!(CachePolicy::Use.reads() && CachePolicy::Use.writes());
        assert!(CachePolicy::Import.reads() && !CachePolicy::Import.writes());
        assert!(!CachePolicy::Export.reads() && CachePolicy::Export.writes());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("USE".parse::<CachePolicy>().unwrap(), CachePolicy::Use);
        assert!("sometimes".parse::<CachePolicy>().is_err());
    }

    #[test]
    fn test_file_store_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());
        assert!(store.load(&key()).unwrap().is_none());
    }

    #[test]
    fn test_file_store_writes_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path().join("nested"));
        let mut payloads = CachedPayloads::new();
        payloads.insert("a b c".into(), "{\"results\":[]}".into());
        store.store(&key(), &encode_payloads(&payloads).unwrap()).unwrap();

        assert!(store.path_for(&key()).exists());
        let loaded = store.load(&key()).unwrap().unwrap();
        assert_eq!(decode_payloads(&loaded).unwrap(), payloads);
    }

    #[test]
    fn test_decode_corrupt_blob() {
        assert!(matches!(decode_payloads(b"{not json"), Err(CacheError::Serde(_))));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCacheStore::new();
        assert!(store.is_empty());
        store.store(&key(), b"{}").unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load(&key()).unwrap().as_deref(), Some(&b"{}"[..]));
    }
}
