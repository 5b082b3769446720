//! Content-addressed binary artifact storage.
//!
//! Each cache entry is one file `<cache_dir>/entries/<checksum>.bin`: a
//! length-prefixed bincode header followed by the payload. The header
//! identifies the format and carries the payload checksum, so truncated or
//! tampered files are rejected before anything is decoded.

use std::path::{Path, PathBuf};

use keel_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Magic bytes identifying a Keel cache artifact.
const ARTIFACT_MAGIC: [u8; 4] = *b"KEEL";

/// Current artifact format version. Bumped whenever the header, the
/// payload layout or the graph wire format changes incompatibly.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Subdirectory holding entry artifacts.
const ENTRY_SUBDIR: &str = "entries";

/// File extension of entry artifacts.
const ENTRY_EXT: &str = "bin";

/// Header prepended to every artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Magic bytes: must be `b"KEEL"`.
    pub magic: [u8; 4],

    /// Artifact format version.
    pub format_version: u32,

    /// Keel version that produced this artifact.
    pub keel_version: String,

    /// Content hash of the payload.
    pub checksum: ContentHash,
}

/// Reads and writes checksummed artifacts under a cache directory.
pub struct ArtifactStore {
    cache_dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at the given cache directory.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    fn entry_dir(&self) -> PathBuf {
        self.cache_dir.join(ENTRY_SUBDIR)
    }

    /// Returns the file path of the artifact with the given key.
    pub fn artifact_path(&self, key: &str) -> PathBuf {
        self.entry_dir().join(format!("{key}.{ENTRY_EXT}"))
    }

    /// Writes `data` as an artifact and returns its key.
    ///
    /// The key is the hex checksum of the payload, so storing identical
    /// payloads twice yields the same file.
    pub fn write_artifact(&self, data: &[u8], keel_version: &str) -> Result<String, CacheError> {
        let dir = self.entry_dir();
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::Io {
            path: dir,
            source: e,
        })?;

        let checksum = ContentHash::from_bytes(data);
        let key = checksum.to_string();
        let path = self.artifact_path(&key);

        let header = ArtifactHeader {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
            keel_version: keel_version.to_string(),
            checksum,
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        // 4-byte little-endian header length, header, payload
        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + data.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(data);

        std::fs::write(&path, &output).map_err(|e| CacheError::Io { path, source: e })?;
        Ok(key)
    }

    /// Reads an artifact, validating magic, format version and checksum.
    pub fn read_artifact(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        let path = self.artifact_path(key);
        let raw = std::fs::read(&path).map_err(|e| CacheError::Io {
            path: path.clone(),
            source: e,
        })?;

        let invalid = |reason: &str| CacheError::InvalidHeader {
            path: path.clone(),
            reason: reason.to_string(),
        };

        let Some(len_bytes) = raw.get(..4) else {
            return Err(invalid("file shorter than the header length prefix"));
        };
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(len_bytes);
        let header_len = u32::from_le_bytes(prefix) as usize;
        let Some(header_bytes) = raw.get(4..4 + header_len) else {
            return Err(invalid("truncated header"));
        };

        let (header, _): (ArtifactHeader, usize) =
            bincode::serde::decode_from_slice(header_bytes, bincode::config::standard())
                .map_err(|e| invalid(&e.to_string()))?;

        if header.magic != ARTIFACT_MAGIC {
            return Err(invalid("bad magic bytes"));
        }
        if header.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                path,
                expected: ARTIFACT_FORMAT_VERSION,
                actual: header.format_version,
            });
        }

        let payload = &raw[4 + header_len..];
        let actual = ContentHash::from_bytes(payload);
        if actual != header.checksum {
            return Err(CacheError::ChecksumMismatch {
                path,
                expected: header.checksum.to_string(),
                actual: actual.to_string(),
            });
        }

        Ok(payload.to_vec())
    }

    /// Deletes the artifact with the given key if it exists.
    pub fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let path = self.artifact_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }

    /// Removes artifacts whose key is not in `live_keys`.
    ///
    /// Returns the number of files removed.
    pub fn gc(&self, live_keys: &[&str]) -> Result<usize, CacheError> {
        let dir = self.entry_dir();
        if !dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let entries = std::fs::read_dir(&dir).map_err(|e| CacheError::Io {
            path: dir.clone(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Io {
                path: dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !live_keys.contains(&stem) {
                    std::fs::remove_file(&path).map_err(|e| CacheError::Io {
                        path: path.clone(),
                        source: e,
                    })?;
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}
