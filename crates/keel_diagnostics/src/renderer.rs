//! Diagnostic rendering backends for human-readable and machine-readable output.

use crate::diagnostic::Diagnostic;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;

    /// Renders a batch of diagnostics.
    fn render_all(&self, diags: &[Diagnostic]) -> String {
        diags.iter().map(|d| self.render(d)).collect()
    }
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// warning[W301]: cannot serialize field of type `Thread`
///   --> field Worker.thread of bean Worker
///    = note: ...
///    = help: ...
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint_header(&self, diag: &Diagnostic) -> String {
        let header = format!("{}[{}]", diag.severity, diag.code);
        if !self.color {
            return header;
        }
        let ansi = if diag.severity.is_error() { "31" } else { "33" };
        format!("\x1b[1;{ansi}m{header}\x1b[0m")
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = format!("{}: {}\n", self.paint_header(diag), diag.message);

        if !diag.location.is_unknown() {
            out.push_str(&format!("  --> {}\n", diag.location));
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }

        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }

        out
    }
}

/// Renders each diagnostic as one line of JSON.
pub struct JsonRenderer;

impl DiagnosticRenderer for JsonRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        // Diagnostic contains only strings, enums and vectors, so this cannot fail.
        let mut line = serde_json::to_string(diag).unwrap_or_default();
        line.push('\n');
        line
    }
}
