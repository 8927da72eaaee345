use crate::diagnostics::lint_results_to_diagnostics;
use crate::lint::{LintConfig, LintContext, LintEngine, LintResult};
use crate::symbol::SymbolDatabase;
use lsp_types::*;
use tracing::debug;

/// Runs the lint rules for a document against the current database state.
pub struct AnalysisEngine {
    lint: LintEngine,
}

impl AnalysisEngine {
    pub fn new(config: &LintConfig) -> Self {
        Self {
            lint: LintEngine::new(config),
        }
    }

    pub fn with_engine(lint: LintEngine) -> Self {
        Self { lint }
    }

    /// Lint results for `uri`, or `None` if the document is not open.
    pub fn analyze(&self, db: &mut SymbolDatabase, uri: &Url) -> Option<Vec<LintResult>> {
        db.refresh();
        let ast = db.get_ast(uri)?;
        let ctx = LintContext { db: &*db, uri };
        let results = self.lint.lint(&ast, &ctx);
        debug!(
            "Analyzed {}: {} results (library loaded: {})",
            uri,
            results.len(),
            db.library().is_loaded()
        );
        Some(results)
    }

    pub fn analyze_document(&self, db: &mut SymbolDatabase, uri: &Url) -> Option<Vec<Diagnostic>> {
        self.analyze(db, uri)
            .map(|results| lint_results_to_diagnostics(&results))
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new(&LintConfig::default())
    }
}
