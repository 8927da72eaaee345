use super::{LintContext, LintResult, LintRule, Severity};
use crate::ast::{statements_recursively, Class, Expression};
use crate::symbol::{Definition, TokenInfo};
use crate::token::{SemanticClass, Token};
use std::sync::Arc;

pub const UNDEFINED_FUNCTION_PREFIX: &str = "Undefined function";

/// Flags calls that resolve to nothing once the library is fully loaded.
///
/// Only bare calls (`Foo(...)`) inside function bodies are checked. Member
/// calls such as `Owner.Foo()` are skipped because receivers are untyped, and
/// bare identifiers, operators and state code are never examined.
///
/// While the library is still loading every unmatched call is inconclusive
/// and produces no result.
pub struct UndefinedFunctionRule;

impl UndefinedFunctionRule {
    fn is_candidate(token: &Token) -> bool {
        matches!(
            token.class,
            SemanticClass::FunctionReference | SemanticClass::Identifier | SemanticClass::None
        ) && !token.is_keyword()
            && token.text.chars().count() > 1
    }
}

impl LintRule for UndefinedFunctionRule {
    fn name(&self) -> &'static str {
        "undefined-function"
    }

    fn lint(&self, ast: &Arc<Class>, ctx: &LintContext<'_>) -> Vec<LintResult> {
        let mut results = Vec::new();

        for (function_index, function) in ast.functions.iter().enumerate() {
            let mut callees = Vec::new();
            for statement in statements_recursively(&function.body) {
                for expression in statement.expressions() {
                    expression.walk(&mut |e| {
                        if let Expression::Call { callee, .. } = e {
                            callees.push(callee);
                        }
                    });
                }
            }

            for callee in callees {
                if !Self::is_candidate(callee) {
                    continue;
                }
                let info = TokenInfo {
                    uri: ctx.uri.clone(),
                    token: callee.clone(),
                    class: Arc::clone(ast),
                    function_index: Some(function_index),
                };
                if let Definition::NotFound = ctx.db.find_definition(&info) {
                    if !ctx.db.library().is_loaded() {
                        continue;
                    }
                    results.push(LintResult::new(
                        format!("{UNDEFINED_FUNCTION_PREFIX} '{}'", callee.text),
                        callee.line,
                        callee.position,
                        callee.len_utf16(),
                        Severity::Error,
                        callee.text.clone(),
                    ));
                }
            }
        }

        results
    }
}
