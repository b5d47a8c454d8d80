//! Accumulator for diagnostics produced across a parsing pass.

use crate::error::Diagnostic;

/// Collects diagnostics across lexing, parsing, and elaboration.
///
/// Parsing is best-effort: instead of aborting on the first problem, each
/// phase records what it found and continues. The collector is drained into
/// the final parse outcome.
#[derive(Debug, Default)]
pub(crate) struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub(crate) fn new() -> Self {
        DiagnosticCollector::default()
    }

    /// Record one diagnostic.
    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Record a batch of diagnostics, preserving order.
    pub(crate) fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Whether any collected diagnostic has error severity.
    pub(crate) fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity().is_error())
    }

    /// Drain the collector into a plain list.
    pub(crate) fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_tracks_error_presence() {
        let mut collector = DiagnosticCollector::new();
        assert!(!collector.has_errors());

        collector.push(Diagnostic::warning("odd but legal"));
        assert!(!collector.has_errors());

        collector.push(Diagnostic::error("broken"));
        assert!(collector.has_errors());
        assert_eq!(collector.into_vec().len(), 2);
    }
}
