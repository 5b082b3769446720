//! Cache manifest that indexes stored entries by key.
//!
//! The manifest is stored as `manifest.json` in the cache directory. It maps
//! each caller-supplied entry key (typically the requested task set) to the
//! artifact holding the encoded graph, along with a few statistics about the
//! pass that produced it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Name of the manifest file within the cache directory.
const MANIFEST_FILE: &str = "manifest.json";

/// Top-level index of stored configuration cache entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Keel version that produced this cache. A different version starts fresh.
    pub keel_version: String,

    /// Stored entries, keyed by entry key.
    pub entries: BTreeMap<String, EntryRecord>,
}

/// What the manifest knows about one stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Key of the artifact holding the payload.
    pub artifact_key: String,

    /// Number of class names in the entry's environment.
    pub classes: usize,

    /// Number of service names in the entry's environment.
    pub services: usize,

    /// Distinct beans written.
    pub beans: usize,

    /// Non-fatal problems reported while storing.
    pub problems: usize,
}

impl CacheManifest {
    /// Creates an empty manifest for the given Keel version.
    pub fn new(keel_version: &str) -> Self {
        Self {
            keel_version: keel_version.to_string(),
            entries: BTreeMap::new(),
        }
    }

    /// Loads the manifest from the cache directory, returning `None` if the
    /// file doesn't exist or can't be parsed.
    pub fn load(cache_dir: &Path) -> Option<Self> {
        let path = cache_dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring unreadable cache manifest: {e}");
                None
            }
        }
    }

    /// Saves the manifest, creating the cache directory if needed.
    pub fn save(&self, cache_dir: &Path) -> Result<(), CacheError> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::Io {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;
        let path = cache_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Returns `true` if this manifest was produced by a compatible Keel version.
    pub fn is_compatible(&self, current_version: &str) -> bool {
        self.keel_version == current_version
    }

    /// Artifact keys referenced by some entry.
    pub fn live_artifacts(&self) -> Vec<&str> {
        self.entries
            .values()
            .map(|record| record.artifact_key.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(artifact_key: &str) -> EntryRecord {
        EntryRecord {
            artifact_key: artifact_key.to_string(),
            classes: 3,
            services: 1,
            beans: 7,
            problems: 0,
        }
    }

    #[test]
    fn new_manifest_is_empty() {
        let m = CacheManifest::new("0.1.0");
        assert_eq!(m.keel_version, "0.1.0");
        assert!(m.entries.is_empty());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = CacheManifest::new("0.1.0");
        m.entries.insert(":app:assemble".to_string(), record("abc123"));
        m.save(dir.path()).unwrap();

        let loaded = CacheManifest::load(dir.path()).unwrap();
        assert_eq!(loaded.keel_version, "0.1.0");
        assert_eq!(loaded.entries[":app:assemble"], record("abc123"));
    }

    #[test]
    fn load_nonexistent_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CacheManifest::load(dir.path()).is_none());
    }

    #[test]
    fn load_corrupt_json_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("manifest.json"), "not valid json {{{").unwrap();
        assert!(CacheManifest::load(dir.path()).is_none());
    }

    #[test]
    fn compatibility_is_exact_version_match() {
        let m = CacheManifest::new("0.1.0");
        assert!(m.is_compatible("0.1.0"));
        assert!(!m.is_compatible("0.2.0"));
    }

    #[test]
    fn live_artifacts_lists_every_entry() {
        let mut m = CacheManifest::new("0.1.0");
        m.entries.insert("b".to_string(), record("k2"));
        m.entries.insert("a".to_string(), record("k1"));
        assert_eq!(m.live_artifacts(), vec!["k1", "k2"]);
    }

    #[test]
    fn save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deeply").join("nested").join("cache");
        CacheManifest::new("0.1.0").save(&nested).unwrap();
        assert!(nested.join("manifest.json").exists());
    }
}
