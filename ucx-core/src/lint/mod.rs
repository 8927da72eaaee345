mod syntax_error;
mod undefined_function;

pub use syntax_error::SyntaxErrorRule;
pub use undefined_function::{UndefinedFunctionRule, UNDEFINED_FUNCTION_PREFIX};

use crate::ast::Class;
use crate::symbol::SymbolDatabase;
use lsp_types::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// `source` attached to every result this engine produces.
pub const LINT_SOURCE: &str = "ucx";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintResult {
    pub message: String,
    pub line: u32,
    pub position: u32,
    pub length: u32,
    pub severity: Severity,
    pub source: String,
    /// Source text the result points at.
    pub original_text: String,
}

impl LintResult {
    pub fn new(
        message: impl Into<String>,
        line: u32,
        position: u32,
        length: u32,
        severity: Severity,
        original_text: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            line,
            position,
            length,
            severity,
            source: LINT_SOURCE.to_string(),
            original_text: original_text.into(),
        }
    }
}

/// What a rule can see besides the AST.
pub struct LintContext<'a> {
    pub db: &'a SymbolDatabase,
    pub uri: &'a Url,
}

pub trait LintRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn lint(&self, ast: &Arc<Class>, ctx: &LintContext<'_>) -> Vec<LintResult>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LintConfig {
    pub undefined_function: bool,
    pub syntax_errors: bool,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            undefined_function: true,
            syntax_errors: true,
        }
    }
}

/// Runs an ordered list of rules and concatenates their results.
pub struct LintEngine {
    rules: Vec<Box<dyn LintRule>>,
}

impl LintEngine {
    pub fn new(config: &LintConfig) -> Self {
        let mut rules: Vec<Box<dyn LintRule>> = Vec::new();
        if config.syntax_errors {
            rules.push(Box::new(SyntaxErrorRule));
        }
        if config.undefined_function {
            rules.push(Box::new(UndefinedFunctionRule));
        }
        Self::with_rules(rules)
    }

    pub fn with_rules(rules: Vec<Box<dyn LintRule>>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn lint(&self, ast: &Arc<Class>, ctx: &LintContext<'_>) -> Vec<LintResult> {
        let mut results = Vec::new();
        for rule in &self.rules {
            let found = rule.lint(ast, ctx);
            debug!("Rule {} produced {} results for {}", rule.name(), found.len(), ctx.uri);
            results.extend(found);
        }
        results
    }
}

impl Default for LintEngine {
    fn default() -> Self {
        Self::new(&LintConfig::default())
    }
}
