use super::{LintContext, LintResult, LintRule, Severity};
use crate::ast::Class;
use std::sync::Arc;

/// Reports the recoverable errors the parser skipped past.
pub struct SyntaxErrorRule;

impl LintRule for SyntaxErrorRule {
    fn name(&self) -> &'static str {
        "syntax-error"
    }

    fn lint(&self, ast: &Arc<Class>, _ctx: &LintContext<'_>) -> Vec<LintResult> {
        ast.errors
            .iter()
            .map(|error| {
                let text = ast
                    .token_at(error.line, error.position)
                    .map(|token| token.text.clone())
                    .unwrap_or_default();
                LintResult::new(
                    error.message.clone(),
                    error.line,
                    error.position,
                    error.length,
                    Severity::Warning,
                    text,
                )
            })
            .collect()
    }
}
