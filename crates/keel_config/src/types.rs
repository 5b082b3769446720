//! Configuration types deserialized from `keel.toml`.

use serde::Deserialize;
use std::path::PathBuf;

/// Default location of cache entries, relative to the project directory.
pub const DEFAULT_CACHE_DIR: &str = ".keel/configuration-cache";

pub use keel_common::DEFAULT_MAX_PROBLEMS;

/// The top-level configuration parsed from `keel.toml`.
///
/// Only the `[configuration-cache]` table is read; other tables belong to the
/// build tool and are ignored here.
#[derive(Debug, Default, Deserialize)]
pub struct KeelConfig {
    /// Settings for storing and loading configuration cache entries.
    #[serde(default, rename = "configuration-cache")]
    pub configuration_cache: CacheConfig,
}

/// Settings controlling the configuration cache codec and store.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConfig {
    /// Whether entries are stored and loaded at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Directory holding the manifest and entry artifacts.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    /// Number of non-fatal problems after which a pass is aborted.
    #[serde(default = "default_max_problems")]
    pub max_problems: usize,
    /// Emit a `trace` log event for every bean and field frame.
    #[serde(default)]
    pub trace_frames: bool,
    /// Format of the problems report printed after a pass.
    #[serde(default)]
    pub report: ReportFormat,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            dir: default_dir(),
            max_problems: default_max_problems(),
            trace_frames: false,
            report: ReportFormat::default(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_max_problems() -> usize {
    DEFAULT_MAX_PROBLEMS
}

/// Output format of the problems report.
#[derive(Debug, Default, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Human-readable, rustc-style (default).
    #[default]
    Terminal,
    /// One JSON object per line.
    Json,
}
