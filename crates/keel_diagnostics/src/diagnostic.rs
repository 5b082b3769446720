//! Structured diagnostic messages with severity, codes, locations, and notes.

use crate::code::DiagnosticCode;
use crate::location::Location;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};

/// A structured diagnostic message attributed to a location in the object graph.
///
/// Diagnostics are the mechanism for reporting problems found while storing
/// or loading a cache entry without failing the pass. Each diagnostic includes:
/// - A severity level and unique code
/// - A primary message and the trace location it was reported at
/// - Optional notes and help text
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The unique code identifying the kind of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// Where in the graph the problem was found.
    pub location: Location,
    /// Explanatory footnotes (e.g., "note: ...").
    pub notes: Vec<String>,
    /// Actionable suggestions (e.g., "help: ...").
    pub help: Vec<String>,
}

impl Diagnostic {
    /// Creates a new error diagnostic with the given code, message, and location.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, location: Location) -> Self {
        Self::with_severity(Severity::Error, code, message, location)
    }

    /// Creates a new warning diagnostic with the given code, message, and location.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, location: Location) -> Self {
        Self::with_severity(Severity::Warning, code, message, location)
    }

    fn with_severity(
        severity: Severity,
        code: DiagnosticCode,
        message: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            location,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help message to this diagnostic.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }
}
