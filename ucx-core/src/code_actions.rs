use crate::ast::{statements_recursively, Class, Expression};
use crate::lint::{UNDEFINED_FUNCTION_PREFIX, LINT_SOURCE};
use crate::token::{SemanticClass, Token};
use lsp_types::*;
use regex::Regex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

/// Command the client runs after applying the edit to place the caret.
pub const MOVE_CURSOR_COMMAND: &str = "ucx.moveCursor";

static INTEGER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[0-9]+$").ok());
static FLOAT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[0-9]+\.[0-9]+$").ok());
static IDENTIFIER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

fn is_match(regex: &LazyLock<Option<Regex>>, text: &str) -> bool {
    regex.as_ref().is_some_and(|r| r.is_match(text))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubParameter {
    pub type_name: String,
    pub name: String,
}

/// A function stub ready to insert into a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionStub {
    pub uri: Url,
    pub name: String,
    pub params: Vec<StubParameter>,
    /// Line the text is inserted at, column 0.
    pub insert_line: u32,
    pub text: String,
    pub cursor_line: u32,
    pub cursor_column: u32,
}

impl FunctionStub {
    /// `int arg1, string Name`
    pub fn signature(&self) -> String {
        format_signature(&self.params)
    }

    pub fn title(&self) -> String {
        format!("Create function '{}'", self.name)
    }

    pub fn move_cursor_command(&self) -> Command {
        Command {
            title: "Move Cursor".to_string(),
            command: MOVE_CURSOR_COMMAND.to_string(),
            arguments: Some(vec![
                json!(self.uri.to_string()),
                json!(self.cursor_line),
                json!(self.cursor_column),
            ]),
        }
    }

    pub fn into_code_action(self, diagnostic: &Diagnostic) -> CodeAction {
        let position = Position::new(self.insert_line, 0);
        let mut changes = HashMap::new();
        changes.insert(
            self.uri.clone(),
            vec![TextEdit {
                range: Range::new(position, position),
                new_text: self.text.clone(),
            }],
        );

        CodeAction {
            title: self.title(),
            kind: Some(CodeActionKind::QUICKFIX),
            diagnostics: Some(vec![diagnostic.clone()]),
            is_preferred: Some(true),
            disabled: None,
            edit: Some(WorkspaceEdit {
                changes: Some(changes),
                document_changes: None,
                change_annotations: None,
            }),
            command: Some(self.move_cursor_command()),
            data: None,
        }
    }
}

/// Quick fix that declares a missing function.
pub struct CreateFunctionAction;

impl CreateFunctionAction {
    /// True for diagnostics produced by the undefined-function rule.
    pub fn applies_to(diagnostic: &Diagnostic) -> bool {
        diagnostic.source.as_deref() == Some(LINT_SOURCE)
            && diagnostic.message.starts_with(UNDEFINED_FUNCTION_PREFIX)
    }

    /// Build a stub for the call the diagnostic points at.
    ///
    /// `ast` must be parsed from the document's current text. Returns `None`
    /// when the diagnostic is not an undefined-function diagnostic or no call
    /// starts at its position any more.
    pub fn synthesize(
        uri: &Url,
        ast: &Class,
        diagnostic: &Diagnostic,
        line_count: u32,
    ) -> Option<FunctionStub> {
        if !Self::applies_to(diagnostic) {
            return None;
        }

        let start = diagnostic.range.start;
        let Some((callee, args)) = find_call(ast, start.line, start.character) else {
            debug!(
                "No call at {}:{} in {}, diagnostic is stale",
                start.line, start.character, uri
            );
            return None;
        };

        let params = infer_params(ast, args);
        let signature = format_signature(&params);

        let (insert_line, before_function) = insertion_line(ast, line_count);
        let (text, cursor_offset) = if before_function {
            (format!("function {}({})\n{{\n\t\n}}\n\n", callee.text, signature), 2)
        } else {
            (format!("\n\nfunction {}({})\n{{\n\t\n}}", callee.text, signature), 4)
        };

        Some(FunctionStub {
            uri: uri.clone(),
            name: callee.text.clone(),
            params,
            insert_line,
            text,
            cursor_line: insert_line + cursor_offset,
            cursor_column: 1,
        })
    }
}

fn format_signature(params: &[StubParameter]) -> String {
    params
        .iter()
        .map(|p| format!("{} {}", p.type_name, p.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Find the call whose callee starts exactly at `line`/`character` in any
/// function body.
fn find_call(ast: &Class, line: u32, character: u32) -> Option<(&Token, &[Expression])> {
    for function in ast.functions.iter().filter(|f| f.contains_line(line)) {
        for statement in statements_recursively(&function.body) {
            for expression in statement.expressions() {
                let mut found = None;
                expression.walk(&mut |e| {
                    if found.is_some() {
                        return;
                    }
                    if let Expression::Call { callee, args } = e {
                        if callee.starts_at(line, character) {
                            found = Some((callee, args.as_slice()));
                        }
                    }
                });
                if found.is_some() {
                    return found;
                }
            }
        }
    }
    None
}

fn infer_params(ast: &Class, args: &[Expression]) -> Vec<StubParameter> {
    let mut params: Vec<StubParameter> = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        let (type_name, name) = infer_arg(ast, arg);
        let name = match name.filter(|n| !is_taken(&params, n)) {
            Some(name) => name,
            None => {
                // Positional names skip past identifiers already in use.
                let mut index = i + 1;
                let mut positional = format!("arg{index}");
                while is_taken(&params, &positional) {
                    index += 1;
                    positional = format!("arg{index}");
                }
                positional
            }
        };
        params.push(StubParameter { type_name, name });
    }
    params
}

fn is_taken(params: &[StubParameter], name: &str) -> bool {
    params.iter().any(|p| p.name.eq_ignore_ascii_case(name))
}

/// Type of an argument and, for bare identifiers, the name to reuse.
fn infer_arg(ast: &Class, arg: &Expression) -> (String, Option<String>) {
    let Some(token) = arg.as_token() else {
        return ("int".to_string(), None);
    };
    let text = token.text.as_str();
    let lower = token.text_lower.as_str();

    match token.class {
        SemanticClass::LiteralString | SemanticClass::LiteralName => {
            return ("string".to_string(), None)
        }
        SemanticClass::LiteralNumber => {
            let type_name = if is_match(&INTEGER, text) {
                "int"
            } else if is_match(&FLOAT, text) {
                "float"
            } else {
                "int"
            };
            return (type_name.to_string(), None);
        }
        _ => {}
    }

    if lower == "true" || lower == "false" {
        return ("bool".to_string(), None);
    }
    if !matches!(arg, Expression::Identifier(_))
        || token.is_keyword()
        || !is_match(&IDENTIFIER, text)
    {
        return ("int".to_string(), None);
    }

    if let Some(variable) = ast.variables.iter().find(|v| v.name.text_lower == lower) {
        return (variable.type_text.clone(), Some(text.to_string()));
    }

    if lower.contains("id") {
        return ("int".to_string(), Some(text.to_string()));
    }
    if lower.contains("str") || lower.contains("name") || lower.contains("param") {
        return ("string".to_string(), Some(text.to_string()));
    }
    if has_bool_prefix(text) {
        return ("bool".to_string(), None);
    }
    ("int".to_string(), Some(text.to_string()))
}

/// `bFlag`, `bIsReady`: lowercase `b` then an uppercase letter.
fn has_bool_prefix(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next() == Some('b') && chars.next().is_some_and(|c| c.is_uppercase())
}

/// Line to insert at, and whether the stub goes before an existing function.
fn insertion_line(ast: &Class, line_count: u32) -> (u32, bool) {
    if let Some(function) = ast.functions.iter().find(|f| !f.is_event) {
        let line = function
            .name
            .as_ref()
            .or(function.body_first_token.as_ref())
            .map(|t| t.line);
        if let Some(line) = line {
            return (line, true);
        }
    }

    if let Some(last) = ast.functions.last() {
        let end = last
            .body_last_token
            .as_ref()
            .or(last.name.as_ref())
            .map(|t| t.line);
        if let Some(end) = end {
            return ((end + 1).min(line_count), false);
        }
    }

    let declaration = ast
        .class_declaration_last_token
        .as_ref()
        .or(ast.class_declaration_first_token.as_ref());
    match declaration {
        Some(token) => ((token.line + 1).min(line_count), false),
        None => (line_count, false),
    }
}
