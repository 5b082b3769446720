//! Shared foundational types used across the Keel configuration cache.
//!
//! This crate provides content hashing for cache artifacts, a string interner
//! for per-pass string deduplication, and the internal error type.

#![warn(missing_docs)]

pub mod hash;
pub mod ident;
pub mod result;

/// Default number of non-fatal problems a store or load may report before the
/// entry is discarded.
pub const DEFAULT_MAX_PROBLEMS: usize = 512;

pub use hash::ContentHash;
pub use ident::{Interner, StringId};
pub use result::InternalError;
