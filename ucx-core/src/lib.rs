pub mod analysis;
pub mod ast;
pub mod code_actions;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod lexer;
pub mod library;
pub mod lint;
pub mod parser;
pub mod symbol;
pub mod token;
pub mod workspace;

pub use analysis::AnalysisEngine;
pub use ast::{Class, Expression, Function, ParseError, Statement};
pub use code_actions::{CreateFunctionAction, FunctionStub, MOVE_CURSOR_COMMAND};
pub use config::EngineConfig;
pub use diagnostics::lint_results_to_diagnostics;
pub use document::Document;
pub use error::{ConfigError, DocumentError, LibraryError};
pub use lexer::tokenize;
pub use library::{LibraryIndex, LibraryLoader, LoadHandle, LoadState, LoadSummary};
pub use lint::{LintConfig, LintContext, LintEngine, LintResult, LintRule, Severity, LINT_SOURCE};
pub use parser::parse;
pub use symbol::{Definition, DefinitionKind, DefinitionSite, SymbolDatabase, SymbolOrigin, TokenInfo};
pub use token::{SemanticClass, Token};
pub use workspace::{Workspace, WorkspaceStats};
