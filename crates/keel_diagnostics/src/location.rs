//! Trace-path locations attributing a diagnostic to a spot in the object graph.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The chain of trace frames active when a diagnostic was reported.
///
/// Frames are stored outermost first, e.g. `["bean JavaCompile",
/// "field AbstractCompile.options", "bean CompileOptions"]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Frame descriptions, outermost first.
    pub frames: Vec<String>,
}

impl Location {
    /// A location with no frames, used for diagnostics outside any bean.
    pub const UNKNOWN: Location = Location { frames: Vec::new() };

    /// Creates a location from a list of frames.
    pub fn new(frames: Vec<String>) -> Self {
        Self { frames }
    }

    /// Returns `true` if no frame information is available.
    pub fn is_unknown(&self) -> bool {
        self.frames.is_empty()
    }

    /// The innermost frame, if any.
    pub fn innermost(&self) -> Option<&str> {
        self.frames.last().map(String::as_str)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return write!(f, "<unknown>");
        }
        // Innermost first reads naturally: "field Foo.bar of bean Foo of ..."
        for (i, frame) in self.frames.iter().rev().enumerate() {
            if i > 0 {
                write!(f, " of ")?;
            }
            write!(f, "{frame}")?;
        }
        Ok(())
    }
}
