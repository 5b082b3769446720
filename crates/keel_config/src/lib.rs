//! Parsing and validation of `keel.toml` configuration files.
//!
//! This crate reads the `[configuration-cache]` table and produces a
//! strongly-typed [`CacheConfig`] with defaults for every setting.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, load_config_or_default, CONFIG_FILE};
pub use resolve::resolve_cache_dir;
pub use types::*;
