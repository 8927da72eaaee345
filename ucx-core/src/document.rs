use crate::ast::Class;
use crate::error::DocumentError;
use crate::parser::parse;
use lsp_textdocument::FullTextDocument;
use lsp_types::*;
use std::sync::Arc;
use tracing::debug;

/// An open source document and its cached AST.
pub struct Document {
    text_document: FullTextDocument,
    uri: Url,
    ast: Option<Arc<Class>>,
}

impl Document {
    pub fn new(text_document_item: TextDocumentItem) -> Self {
        let uri = text_document_item.uri.clone();
        let text_document = FullTextDocument::new(
            text_document_item.language_id,
            text_document_item.version,
            text_document_item.text,
        );

        Self {
            text_document,
            uri,
            ast: None,
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn version(&self) -> i32 {
        self.text_document.version()
    }

    pub fn text(&self) -> &str {
        self.text_document.get_content(None)
    }

    pub fn line_count(&self) -> u32 {
        self.text_document.line_count()
    }

    /// Apply incremental or full-text changes and drop the cached AST.
    pub fn apply_changes(
        &mut self,
        changes: Vec<TextDocumentContentChangeEvent>,
        version: i32,
    ) -> Result<(), DocumentError> {
        let line_count = self.line_count();
        for change in &changes {
            if let Some(range) = change.range {
                if range.start.line > line_count {
                    return Err(DocumentError::InvalidChange {
                        uri: self.uri.clone(),
                        line: range.start.line,
                        line_count,
                    });
                }
            }
        }

        self.text_document.update(&changes, version);
        self.invalidate();
        Ok(())
    }

    /// The AST for the current text, parsing on a cache miss.
    pub fn ast(&mut self) -> Arc<Class> {
        if let Some(ast) = &self.ast {
            return Arc::clone(ast);
        }

        debug!("Parsing {} (version {})", self.uri, self.version());
        let ast = Arc::new(parse(self.text()));
        self.ast = Some(Arc::clone(&ast));
        ast
    }

    /// The cached AST, if the document has been parsed since its last change.
    pub fn cached_ast(&self) -> Option<&Arc<Class>> {
        self.ast.as_ref()
    }

    pub fn is_parsed(&self) -> bool {
        self.ast.is_some()
    }

    pub fn invalidate(&mut self) {
        self.ast = None;
    }

    pub fn language_id(&self) -> &str {
        self.text_document.language_id()
    }
}
