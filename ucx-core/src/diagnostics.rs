use crate::lint::{LintResult, Severity};
use lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};

/// Converts lint results to LSP diagnostics
pub fn lint_results_to_diagnostics(results: &[LintResult]) -> Vec<Diagnostic> {
    results.iter().map(lint_result_to_diagnostic).collect()
}

pub fn lint_result_to_diagnostic(result: &LintResult) -> Diagnostic {
    let range = Range::new(
        Position::new(result.line, result.position),
        Position::new(result.line, result.position + result.length),
    );

    Diagnostic::new(
        range,
        Some(severity_to_lsp(result.severity)),
        None,
        Some(result.source.clone()),
        result.message.clone(),
        None,
        None,
    )
}

fn severity_to_lsp(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Information => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lint_result_to_diagnostic() {
        let result = LintResult::new(
            "Undefined function 'DoThing'",
            2,
            21,
            7,
            Severity::Error,
            "DoThing",
        );

        let diagnostics = lint_results_to_diagnostics(&[result]);

        assert_eq!(diagnostics.len(), 1);
        let diagnostic = &diagnostics[0];

        assert_eq!(diagnostic.range.start.line, 2);
        assert_eq!(diagnostic.range.start.character, 21);
        assert_eq!(diagnostic.range.end.line, 2);
        assert_eq!(diagnostic.range.end.character, 28);
        assert_eq!(diagnostic.severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(diagnostic.source, Some("ucx".to_string()));
        assert!(diagnostic.message.starts_with("Undefined function"));
    }

    #[test]
    fn test_warning_severity() {
        let result = LintResult::new("Expected ';'", 1, 10, 1, Severity::Warning, "}");
        let diagnostic = lint_result_to_diagnostic(&result);
        assert_eq!(diagnostic.severity, Some(DiagnosticSeverity::WARNING));
        assert_eq!(diagnostic.range.end.character, 11);
    }
}
