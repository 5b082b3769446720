//! On-disk storage of configuration cache entries.
//!
//! A [`ConfigurationCache`] encodes a captured object graph with the
//! [`keel_codec`] graph codec, writes the payload and its environment as one
//! checksummed artifact, and indexes entries by key in `manifest.json`.
//! Every read is fail-safe: corruption, version skew or a fatal decode
//! error is a cache miss, never a hard failure.

#![warn(missing_docs)]

pub mod artifact;
pub mod cache;
pub mod error;
pub mod manifest;
pub mod report;

pub use artifact::{ArtifactHeader, ArtifactStore, ARTIFACT_FORMAT_VERSION};
pub use cache::{ConfigurationCache, KEEL_VERSION};
pub use error::CacheError;
pub use manifest::{CacheManifest, EntryRecord};
pub use report::ProblemsReport;
