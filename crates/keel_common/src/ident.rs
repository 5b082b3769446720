//! Interned strings for per-pass string deduplication.

use lasso::Rodeo;
use serde::{Deserialize, Serialize};

/// Index of a string inside an [`Interner`].
///
/// Indices are dense and assigned in first-seen order, so the index of a
/// string also tells a decoder which position of its string table to read.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct StringId(u32);

impl StringId {
    /// Creates a `StringId` from a raw `u32` index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index of this identifier.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

// SAFETY: `StringId` wraps a `u32` which is always a valid `usize` on 32-bit and
// 64-bit platforms. `try_from_usize` rejects values that don't fit in `u32`.
unsafe impl lasso::Key for StringId {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(StringId)
    }
}

/// String interner backed by [`lasso::Rodeo`].
///
/// One interner lives for one encode pass; it is not shared across threads.
pub struct Interner {
    rodeo: Rodeo<StringId>,
}

impl Interner {
    /// Creates a new empty interner.
    pub fn new() -> Self {
        Self {
            rodeo: Rodeo::new(),
        }
    }

    /// Interns a string, returning its id and whether this call inserted it.
    pub fn intern(&mut self, s: &str) -> (StringId, bool) {
        match self.rodeo.get(s) {
            Some(id) => (id, false),
            None => (self.rodeo.get_or_intern(s), true),
        }
    }

    /// Returns the id of an already interned string.
    pub fn get(&self, s: &str) -> Option<StringId> {
        self.rodeo.get(s)
    }

    /// Resolves a [`StringId`] back to its string value.
    ///
    /// # Panics
    ///
    /// Panics if the id was not created by this interner.
    pub fn resolve(&self, id: StringId) -> &str {
        self.rodeo.resolve(&id)
    }

    /// Number of distinct strings interned so far.
    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    /// Returns `true` if nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}
