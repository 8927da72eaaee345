use anyhow::{anyhow, Context};
use lsp_types::*;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::{Error, Result};
use tracing::{debug, warn};
use ucx_core::{
    AnalysisEngine, CreateFunctionAction, Definition, DefinitionSite, SymbolDatabase,
    SymbolOrigin,
};

/// Drops every cached AST and reloads the library.
pub const RESTART_COMMAND: &str = "ucx.restartServer";

/// Request handlers shared by the language server.
///
/// Every handler takes the database write lock: even read-style queries may
/// parse a document on first use.
pub struct Handlers {
    db: Arc<RwLock<SymbolDatabase>>,
    analysis: Arc<AnalysisEngine>,
}

impl Handlers {
    pub fn new(db: Arc<RwLock<SymbolDatabase>>, analysis: Arc<AnalysisEngine>) -> Self {
        Self { db, analysis }
    }

    /// Lint one open document. `None` when the document is not open.
    pub async fn diagnostics(&self, uri: &Url) -> Option<Vec<Diagnostic>> {
        let mut db = self.db.write().await;
        self.analysis.analyze_document(&mut db, uri)
    }

    /// Lint every open document, returning each with its current version.
    pub async fn open_document_diagnostics(&self) -> Vec<(Url, i32, Vec<Diagnostic>)> {
        let mut db = self.db.write().await;
        let uris: Vec<Url> = db.workspace().open_documents().into_iter().cloned().collect();

        let mut published = Vec::with_capacity(uris.len());
        for uri in uris {
            let Some(diagnostics) = self.analysis.analyze_document(&mut db, &uri) else {
                continue;
            };
            let version = db
                .workspace()
                .get_document_readonly(&uri)
                .map(|document| document.version())
                .unwrap_or_default();
            published.push((uri, version, diagnostics));
        }
        published
    }

    /// Offer a "create function" quick fix for each undefined-function
    /// diagnostic in the request.
    pub async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        if !wants_quick_fixes(&params.context) {
            return Ok(None);
        }

        let uri = &params.text_document.uri;
        let mut db = self.db.write().await;
        let Some(ast) = db.get_ast(uri) else {
            debug!("Document not found for code action: {}", uri);
            return Ok(None);
        };
        let line_count = match db.workspace().get_document_readonly(uri) {
            Some(document) => document.line_count(),
            None => return Ok(None),
        };

        let mut titles = HashSet::new();
        let mut actions = Vec::new();
        for diagnostic in params.context.diagnostics.iter() {
            if !CreateFunctionAction::applies_to(diagnostic) {
                continue;
            }
            let Some(stub) = CreateFunctionAction::synthesize(uri, &ast, diagnostic, line_count)
            else {
                debug!("No call at {:?}, skipping stale diagnostic", diagnostic.range.start);
                continue;
            };
            if titles.insert(stub.title()) {
                actions.push(CodeActionOrCommand::CodeAction(stub.into_code_action(diagnostic)));
            }
        }

        debug!("Code actions returned {} items", actions.len());
        if actions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(actions))
        }
    }

    pub async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let mut db = self.db.write().await;
        db.refresh();
        let Some(info) = db.find_token(uri, position.line, position.character) else {
            debug!("No token at {:?} in {}", position, uri);
            return Ok(None);
        };

        match db.find_definition(&info) {
            Definition::Found(site) => match site_location(&site) {
                Ok(location) => Ok(Some(GotoDefinitionResponse::Scalar(location))),
                Err(e) => {
                    warn!("Cannot produce a location for '{}': {:#}", site.name.text, e);
                    Ok(None)
                }
            },
            Definition::NotFound | Definition::Inconclusive => Ok(None),
        }
    }
}

fn wants_quick_fixes(context: &CodeActionContext) -> bool {
    match &context.only {
        Some(kinds) => kinds
            .iter()
            .any(|kind| CodeActionKind::QUICKFIX.as_str().starts_with(kind.as_str())),
        None => true,
    }
}

fn site_location(site: &DefinitionSite) -> anyhow::Result<Location> {
    let uri = match &site.origin {
        SymbolOrigin::Document(uri) => uri.clone(),
        SymbolOrigin::Library(path) => Url::from_file_path(path)
            .map_err(|_| anyhow!("library path {} is not absolute", path.display()))?,
    };
    let name = &site.name;
    Ok(Location::new(
        uri,
        Range::new(
            Position::new(name.line, name.position),
            Position::new(name.line, name.end_position()),
        ),
    ))
}

/// Decode `ucx.moveCursor` arguments (`[uri, line, column]`) into a
/// `window/showDocument` request with an empty selection at the caret.
pub fn move_cursor_params(arguments: &[Value]) -> Result<ShowDocumentParams> {
    let (uri, line, column) =
        parse_move_cursor(arguments).map_err(|e| Error::invalid_params(format!("{e:#}")))?;
    let caret = Position::new(line, column);

    Ok(ShowDocumentParams {
        uri,
        external: Some(false),
        take_focus: Some(true),
        selection: Some(Range::new(caret, caret)),
    })
}

fn parse_move_cursor(arguments: &[Value]) -> anyhow::Result<(Url, u32, u32)> {
    let [uri, line, column] = arguments else {
        return Err(anyhow!("expected [uri, line, column], got {} arguments", arguments.len()));
    };
    let uri = uri.as_str().context("uri must be a string")?;
    let uri = Url::parse(uri).with_context(|| format!("invalid uri {uri}"))?;
    let line = as_u32(line).context("line must be a non-negative integer")?;
    let column = as_u32(column).context("column must be a non-negative integer")?;
    Ok((uri, line, column))
}

fn as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}
