use crate::ast::Class;
use crate::error::DocumentError;
use crate::Document;
use anyhow::Result;
use lru::LruCache;
use lsp_types::*;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_CACHE_SIZE: usize = 100;

/// Index of open documents, keyed by URI.
///
/// Every open document is kept until it is closed. At most `capacity` of
/// them retain a parsed AST; touching a document past that drops the AST of
/// the least recently used one, which is reparsed on its next access.
pub struct Workspace {
    root_uri: Option<Url>,
    documents: HashMap<Url, Document>,
    recently_accessed: LruCache<Url, ()>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            root_uri: None,
            documents: HashMap::new(),
            recently_accessed: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    pub fn set_root(&mut self, root_uri: Url) {
        info!("Setting workspace root: {}", root_uri);
        self.root_uri = Some(root_uri);
    }

    pub fn root(&self) -> Option<&Url> {
        self.root_uri.as_ref()
    }

    pub fn open_document(&mut self, text_document: TextDocumentItem) {
        let uri = text_document.uri.clone();
        info!("Opening document: {}", uri);

        self.documents.insert(uri.clone(), Document::new(text_document));
        self.touch(&uri);
    }

    pub fn update_document(&mut self, params: DidChangeTextDocumentParams) -> Result<()> {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        let Some(document) = self.documents.get_mut(&uri) else {
            warn!("Attempted to update non-existent document: {}", uri);
            return Err(DocumentError::NotOpen(uri).into());
        };

        if version < document.version() {
            warn!(
                "Received older version for document {}: {} < {}",
                uri,
                version,
                document.version()
            );
            return Err(DocumentError::StaleVersion {
                current: document.version(),
                received: version,
                uri,
            }
            .into());
        }

        document.apply_changes(params.content_changes, version)?;
        info!("Updated document: {} (version {})", uri, version);
        self.touch(&uri);

        Ok(())
    }

    pub fn close_document(&mut self, uri: &Url) {
        info!("Closing document: {}", uri);
        self.documents.remove(uri);
        self.recently_accessed.pop(uri);
    }

    pub fn get_document(&mut self, uri: &Url) -> Option<&mut Document> {
        if self.documents.contains_key(uri) {
            self.touch(uri);
            self.documents.get_mut(uri)
        } else {
            None
        }
    }

    pub fn get_document_readonly(&self, uri: &Url) -> Option<&Document> {
        self.documents.get(uri)
    }

    /// The AST for `uri`, parsing on a cache miss.
    pub fn get_ast(&mut self, uri: &Url) -> Option<Arc<Class>> {
        self.get_document(uri).map(Document::ast)
    }

    /// Reparse every invalidated document still within the cache capacity.
    pub fn refresh(&mut self) {
        let mut parsed = 0;
        for (uri, document) in self.documents.iter_mut() {
            if !document.is_parsed() && self.recently_accessed.contains(uri) {
                document.ast();
                parsed += 1;
            }
        }
        if parsed > 0 {
            debug!("Refreshed {} documents", parsed);
        }
    }

    /// Drop every cached AST.
    pub fn invalidate_all(&mut self) {
        for document in self.documents.values_mut() {
            document.invalidate();
        }
    }

    /// Find an open document whose parsed class has the given lowercase name.
    ///
    /// Only cached ASTs are searched; call [`Workspace::refresh`] first to
    /// see current text. When several documents declare the class, the one
    /// with the lowest URI wins.
    pub fn find_class(&self, name_lower: &str) -> Option<(Url, Arc<Class>)> {
        self.documents
            .iter()
            .filter_map(|(uri, document)| {
                let ast = document.cached_ast()?;
                (ast.name_lower() == Some(name_lower)).then_some((uri, ast))
            })
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(uri, ast)| (uri.clone(), Arc::clone(ast)))
    }

    /// Mark `uri` most recently used, dropping the AST of the document that
    /// falls out of the cache.
    fn touch(&mut self, uri: &Url) {
        let Some((evicted, ())) = self.recently_accessed.push(uri.clone(), ()) else {
            return;
        };
        if &evicted == uri {
            return;
        }
        if let Some(document) = self.documents.get_mut(&evicted) {
            debug!("Evicting cached AST: {}", evicted);
            document.invalidate();
        }
    }

    pub fn stats(&self) -> WorkspaceStats {
        WorkspaceStats {
            document_count: self.documents.len(),
            parsed_count: self.documents.values().filter(|d| d.is_parsed()).count(),
            cache_capacity: self.recently_accessed.cap().get(),
            root_uri: self.root_uri.clone(),
        }
    }

    pub fn open_documents(&self) -> Vec<&Url> {
        self.documents.keys().collect()
    }

    pub fn is_document_open(&self, uri: &Url) -> bool {
        self.documents.contains_key(uri)
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceStats {
    pub document_count: usize,
    pub parsed_count: usize,
    pub cache_capacity: usize,
    pub root_uri: Option<Url>,
}
