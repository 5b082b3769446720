//! High-level configuration cache.
//!
//! [`ConfigurationCache`] ties the graph codec, the artifact store and the
//! manifest together. Storing encodes a graph and records it under a key;
//! loading looks the key up and rebuilds the graph against the live types of
//! the current process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use keel_codec::{
    CodecBindings, CodecOptions, Environment, GraphCodec, IsolateOwner, TypeRegistry, Value,
};
use keel_config::{resolve_cache_dir, CacheConfig, ReportFormat};
use keel_diagnostics::DiagnosticSink;
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactStore;
use crate::error::CacheError;
use crate::manifest::{CacheManifest, EntryRecord};
use crate::report::ProblemsReport;

/// Version recorded in manifests and artifact headers.
pub const KEEL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Artifact payload: the encoded graph and the tables its tokens index into.
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    environment: Environment,
    graph: Vec<u8>,
}

/// Stores and loads configuration cache entries under one directory.
pub struct ConfigurationCache {
    cache_dir: PathBuf,
    manifest: CacheManifest,
    store: ArtifactStore,
    codec: GraphCodec,
    registry: TypeRegistry,
    enabled: bool,
    report_format: ReportFormat,
}

impl ConfigurationCache {
    /// Opens the cache configured for `project_dir`.
    ///
    /// An existing manifest written by the same `keel_version` is reused;
    /// anything else starts from an empty manifest. `registry` must contain
    /// every bean type that stored graphs may reference.
    pub fn open(
        config: &CacheConfig,
        project_dir: &Path,
        registry: TypeRegistry,
        keel_version: &str,
    ) -> Self {
        let cache_dir = resolve_cache_dir(config, project_dir);
        let manifest = CacheManifest::load(&cache_dir)
            .filter(|m| m.is_compatible(keel_version))
            .unwrap_or_else(|| CacheManifest::new(keel_version));
        let codec = GraphCodec::new(CodecOptions {
            max_problems: config.max_problems,
            trace_frames: config.trace_frames,
        });

        tracing::debug!(
            dir = %cache_dir.display(),
            entries = manifest.entries.len(),
            enabled = config.enabled,
            "opened configuration cache"
        );

        Self {
            store: ArtifactStore::new(&cache_dir),
            cache_dir,
            manifest,
            codec,
            registry,
            enabled: config.enabled,
            report_format: config.report,
        }
    }

    /// Uses `bindings` for every later store and load.
    pub fn with_bindings(mut self, bindings: CodecBindings) -> Self {
        self.codec = self.codec.with_bindings(bindings);
        self
    }

    /// Encodes the graph reachable from `root` and records it under `key`,
    /// replacing any previous entry with that key.
    ///
    /// Returns the problems reported while encoding. A fatal codec error
    /// leaves the manifest untouched. When the cache is disabled nothing is
    /// written and the report is empty.
    pub fn store(
        &mut self,
        key: &str,
        root: &Value,
        owner: Arc<dyn IsolateOwner>,
    ) -> Result<ProblemsReport, CacheError> {
        if !self.enabled {
            return Ok(ProblemsReport::default());
        }

        let sink = Arc::new(DiagnosticSink::new());
        let encoded = self
            .codec
            .encode(root, owner, &sink)
            .map_err(|source| CacheError::Codec {
                key: key.to_string(),
                source,
            })?;

        let record = EntryRecord {
            artifact_key: String::new(),
            classes: encoded.environment.classes.len(),
            services: encoded.environment.services.len(),
            beans: encoded.beans,
            problems: encoded.problems,
        };
        let entry = StoredEntry {
            environment: encoded.environment,
            graph: encoded.bytes,
        };
        let payload = bincode::serde::encode_to_vec(&entry, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;
        let artifact_key = self
            .store
            .write_artifact(&payload, &self.manifest.keel_version)?;

        tracing::debug!(
            key,
            artifact = %artifact_key,
            bytes = payload.len(),
            problems = record.problems,
            "stored configuration cache entry"
        );
        self.manifest.entries.insert(
            key.to_string(),
            EntryRecord {
                artifact_key,
                ..record
            },
        );
        self.manifest.save(&self.cache_dir)?;

        Ok(ProblemsReport::new(sink.take_all()))
    }

    /// Loads the entry stored under `key`.
    ///
    /// Returns `None` if there is no such entry or it cannot be used: a
    /// missing or corrupt artifact, a format version mismatch, an unknown
    /// type, or any fatal decode error. The reason is logged.
    pub fn load(&self, key: &str, owner: Arc<dyn IsolateOwner>) -> Option<Value> {
        self.load_with_report(key, owner).0
    }

    /// Like [`load`](Self::load), also returning the problems reported while
    /// decoding.
    pub fn load_with_report(
        &self,
        key: &str,
        owner: Arc<dyn IsolateOwner>,
    ) -> (Option<Value>, ProblemsReport) {
        if !self.enabled {
            return (None, ProblemsReport::default());
        }
        let Some(record) = self.manifest.entries.get(key) else {
            tracing::debug!(key, "no configuration cache entry");
            return (None, ProblemsReport::default());
        };

        let sink = Arc::new(DiagnosticSink::new());
        let value = match self.read_entry(key, record, owner, &sink) {
            Ok(value) => {
                tracing::debug!(
                    key,
                    artifact = %record.artifact_key,
                    "reusing configuration cache entry"
                );
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key, "discarding configuration cache entry: {e}");
                None
            }
        };
        (value, ProblemsReport::new(sink.take_all()))
    }

    fn read_entry(
        &self,
        key: &str,
        record: &EntryRecord,
        owner: Arc<dyn IsolateOwner>,
        sink: &Arc<DiagnosticSink>,
    ) -> Result<Value, CacheError> {
        let codec_error = |source| CacheError::Codec {
            key: key.to_string(),
            source,
        };

        let payload = self.store.read_artifact(&record.artifact_key)?;
        let (entry, _): (StoredEntry, usize) =
            bincode::serde::decode_from_slice(&payload, bincode::config::standard()).map_err(
                |e| CacheError::Serialization {
                    reason: e.to_string(),
                },
            )?;
        let env = entry.environment.resolve(&self.registry).map_err(codec_error)?;
        self.codec
            .decode(&entry.graph, &env, owner, sink)
            .map_err(codec_error)
    }

    /// Drops the entry stored under `key`, deleting its artifact unless
    /// another entry shares it. Returns `false` if there was no such entry.
    pub fn invalidate(&mut self, key: &str) -> Result<bool, CacheError> {
        let Some(record) = self.manifest.entries.remove(key) else {
            return Ok(false);
        };
        if !self.manifest.live_artifacts().contains(&record.artifact_key.as_str()) {
            self.store.remove(&record.artifact_key)?;
        }
        self.manifest.save(&self.cache_dir)?;
        tracing::debug!(key, "invalidated configuration cache entry");
        Ok(true)
    }

    /// Removes artifacts no entry references. Returns the number removed.
    pub fn gc(&self) -> Result<usize, CacheError> {
        let removed = self.store.gc(&self.manifest.live_artifacts())?;
        if removed > 0 {
            tracing::debug!(removed, "collected unreferenced cache artifacts");
        }
        Ok(removed)
    }

    /// Renders a report in the configured format.
    pub fn render_report(&self, report: &ProblemsReport) -> String {
        report.render(self.report_format)
    }

    /// The current manifest.
    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    /// The resolved cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The codec used for every pass.
    pub fn codec(&self) -> &GraphCodec {
        &self.codec
    }
}
