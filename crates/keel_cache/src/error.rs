//! Error types for cache operations.

use std::path::PathBuf;

use keel_codec::CodecError;

/// Errors that can occur while storing or loading cache entries.
///
/// Loading never surfaces these to the caller: [`ConfigurationCache::load`]
/// logs the error and reports a miss. Storing returns them so the build can
/// tell the user why no entry was written.
///
/// [`ConfigurationCache::load`]: crate::ConfigurationCache::load
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An artifact file has an invalid or missing header.
    #[error("invalid artifact header in {path}: {reason}")]
    InvalidHeader {
        /// The artifact file path.
        path: PathBuf,
        /// Description of the header problem.
        reason: String,
    },

    /// The stored checksum does not match the computed checksum of the payload.
    #[error("checksum mismatch in {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The artifact file path.
        path: PathBuf,
        /// The expected checksum from the header.
        expected: String,
        /// The actual checksum computed from the payload.
        actual: String,
    },

    /// The artifact format version does not match the current version.
    #[error("version mismatch in {path}: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The artifact file path.
        path: PathBuf,
        /// The expected format version.
        expected: u32,
        /// The actual format version found in the file.
        actual: u32,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// The graph codec failed fatally.
    #[error("configuration cache entry `{key}` could not be processed: {source}")]
    Codec {
        /// The entry key being stored or loaded.
        key: String,
        /// The codec error.
        source: CodecError,
    },
}
