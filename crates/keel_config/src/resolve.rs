//! Resolution of configured paths against the project directory.

use crate::types::CacheConfig;
use std::path::{Path, PathBuf};

/// Returns the absolute cache directory for a project.
///
/// Relative `dir` settings are resolved against `project_dir`; absolute ones
/// are used as-is.
pub fn resolve_cache_dir(config: &CacheConfig, project_dir: &Path) -> PathBuf {
    if config.dir.is_absolute() {
        config.dir.clone()
    } else {
        project_dir.join(&config.dir)
    }
}
