//! Summary of the problems reported during one store or load pass.

use std::collections::BTreeMap;

use keel_config::ReportFormat;
use keel_diagnostics::{
    Diagnostic, DiagnosticCode, DiagnosticRenderer, JsonRenderer, TerminalRenderer,
};

/// Diagnostics collected from a pass, with per-code counts.
#[derive(Debug, Clone, Default)]
pub struct ProblemsReport {
    diagnostics: Vec<Diagnostic>,
    counts: BTreeMap<DiagnosticCode, usize>,
}

impl ProblemsReport {
    /// Builds a report from the diagnostics drained out of a sink.
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        let mut counts = BTreeMap::new();
        for diag in &diagnostics {
            *counts.entry(diag.code).or_insert(0) += 1;
        }
        Self {
            diagnostics,
            counts,
        }
    }

    /// The collected diagnostics, in report order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of problems of each code.
    pub fn counts(&self) -> &BTreeMap<DiagnosticCode, usize> {
        &self.counts
    }

    /// Number of problems with the given code.
    pub fn count_of(&self, code: DiagnosticCode) -> usize {
        self.counts.get(&code).copied().unwrap_or(0)
    }

    /// Total number of problems.
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Returns `true` if the pass reported nothing.
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Renders the report in the configured format.
    ///
    /// Terminal output ends with a one-line summary; JSON output is one
    /// object per line with no summary.
    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Json => JsonRenderer.render_all(&self.diagnostics),
            ReportFormat::Terminal => {
                if self.is_empty() {
                    return String::new();
                }
                let mut out = TerminalRenderer::new(false).render_all(&self.diagnostics);
                out.push_str(&self.summary());
                out.push('\n');
                out
            }
        }
    }

    fn summary(&self) -> String {
        let noun = if self.len() == 1 { "problem" } else { "problems" };
        let breakdown = self
            .counts
            .iter()
            .map(|(code, n)| format!("{code} x{n}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{} configuration cache {noun} found ({breakdown})",
            self.len()
        )
    }
}
