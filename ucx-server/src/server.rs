use lsp_types::*;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::{Client, LanguageServer};
use tracing::{debug, error, info, warn};
use ucx_core::{
    AnalysisEngine, DocumentError, EngineConfig, LibraryError, LibraryIndex, LibraryLoader,
    SymbolDatabase, Workspace, MOVE_CURSOR_COMMAND,
};
use ucx_protocol::{move_cursor_params, Handlers, RESTART_COMMAND};

/// Settings given on the command line. They take priority over the
/// client's initialization options and the environment.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub library_path: Option<PathBuf>,
    pub cache_size: Option<usize>,
}

impl ServerOptions {
    fn apply(&self, config: &mut EngineConfig) {
        if let Some(path) = &self.library_path {
            config.library_path = Some(path.clone());
        }
        if let Some(size) = self.cache_size {
            config.document_cache_size = size;
        }
    }
}

struct LibraryTask {
    cancel: CancellationToken,
    watcher: JoinHandle<()>,
}

pub struct UcxLanguageServer {
    client: Client,
    options: ServerOptions,
    config: RwLock<EngineConfig>,
    library: Arc<LibraryIndex>,
    db: Arc<RwLock<SymbolDatabase>>,
    analysis: RwLock<Arc<AnalysisEngine>>,
    library_task: Mutex<Option<LibraryTask>>,
}

impl UcxLanguageServer {
    pub fn new(client: Client, options: ServerOptions) -> Self {
        info!("Initializing language server");
        let library = Arc::new(LibraryIndex::new());
        let db = SymbolDatabase::new(Arc::clone(&library));

        Self {
            client,
            options,
            config: RwLock::new(EngineConfig::default()),
            library,
            db: Arc::new(RwLock::new(db)),
            analysis: RwLock::new(Arc::new(AnalysisEngine::default())),
            library_task: Mutex::new(None),
        }
    }

    /// The configuration resolved during `initialize`.
    pub async fn config(&self) -> EngineConfig {
        self.config.read().await.clone()
    }

    pub fn library(&self) -> &Arc<LibraryIndex> {
        &self.library
    }

    pub async fn handlers(&self) -> Handlers {
        Handlers::new(Arc::clone(&self.db), Arc::clone(&*self.analysis.read().await))
    }

    fn resolve_config(&self, initialization_options: Option<&Value>) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(options) = initialization_options {
            if let Err(e) = config.merge_initialization_options(options) {
                warn!("Ignoring invalid initializationOptions: {}", e);
                config = EngineConfig::default();
            }
        }
        config.apply_env();
        self.options.apply(&mut config);

        if let Err(e) = config.validate() {
            warn!("{}; using the default document cache size", e);
            config.document_cache_size = EngineConfig::default().document_cache_size;
        }
        config
    }

    async fn start_library_load(&self) {
        let Some(root) = self.config.read().await.library_path.clone() else {
            info!("No library path configured, undefined-function checks stay suspended");
            return;
        };
        // Definitions in the library are reported as file URLs, which must be absolute.
        let root = std::fs::canonicalize(&root).unwrap_or(root);

        let handle = LibraryLoader::spawn(Arc::clone(&self.library), root);
        let cancel = handle.cancellation_token();
        let client = self.client.clone();
        let handlers = self.handlers().await;

        let watcher = tokio::spawn(async move {
            match handle.finished().await {
                Ok(summary) => {
                    client
                        .log_message(
                            MessageType::INFO,
                            format!("Loaded {} library classes", summary.classes_loaded),
                        )
                        .await;
                    publish_open_documents(&client, &handlers).await;
                }
                Err(LibraryError::Cancelled) => debug!("Library load cancelled"),
                Err(e) => {
                    client
                        .show_message(MessageType::WARNING, format!("Library load failed: {e}"))
                        .await;
                }
            }
        });

        *self.library_task.lock().await = Some(LibraryTask { cancel, watcher });
    }

    async fn stop_library_load(&self) {
        let Some(task) = self.library_task.lock().await.take() else {
            return;
        };
        task.cancel.cancel();
        if let Err(e) = task.watcher.await {
            error!("Library load task failed: {}", e);
        }
    }

    async fn restart(&self) {
        info!("Restarting analysis");
        self.stop_library_load().await;
        self.library.reset();
        self.db.write().await.workspace_mut().invalidate_all();

        self.start_library_load().await;
        publish_open_documents(&self.client, &self.handlers().await).await;
    }

    async fn publish_diagnostics(&self, uri: Url) {
        let Some(diagnostics) = self.handlers().await.diagnostics(&uri).await else {
            return;
        };
        let version = self
            .db
            .read()
            .await
            .workspace()
            .get_document_readonly(&uri)
            .map(|document| document.version());

        debug!("Publishing {} diagnostics for {}", diagnostics.len(), uri);
        self.client.publish_diagnostics(uri, diagnostics, version).await;
    }
}

async fn publish_open_documents(client: &Client, handlers: &Handlers) {
    for (uri, version, diagnostics) in handlers.open_document_diagnostics().await {
        client.publish_diagnostics(uri, diagnostics, Some(version)).await;
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for UcxLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        info!("Initialize request received");

        let config = self.resolve_config(params.initialization_options.as_ref());
        info!(
            "Library path: {:?}, document cache size: {}",
            config.library_path, config.document_cache_size
        );

        {
            let mut db = self.db.write().await;
            let mut workspace = Workspace::with_capacity(config.document_cache_size);
            if let Some(root_uri) = params.root_uri {
                workspace.set_root(root_uri);
            }
            *db.workspace_mut() = workspace;
        }
        *self.analysis.write().await = Arc::new(AnalysisEngine::new(&config.lint));
        *self.config.write().await = config;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::INCREMENTAL,
                )),
                definition_provider: Some(OneOf::Left(true)),
                code_action_provider: Some(CodeActionProviderCapability::Options(
                    CodeActionOptions {
                        code_action_kinds: Some(vec![CodeActionKind::QUICKFIX]),
                        work_done_progress_options: Default::default(),
                        resolve_provider: Some(false),
                    },
                )),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![MOVE_CURSOR_COMMAND.to_string(), RESTART_COMMAND.to_string()],
                    work_done_progress_options: Default::default(),
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "ucx-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("Server initialized");
        self.client
            .log_message(MessageType::INFO, "UCX language server initialized")
            .await;

        self.start_library_load().await;
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Shutdown request received");
        if let Some(task) = self.library_task.lock().await.take() {
            task.cancel.cancel();
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri.clone();
        info!("Document opened: {} (version {})", uri, params.text_document.version);

        {
            let mut db = self.db.write().await;
            db.workspace_mut().open_document(params.text_document);
            let stats = db.workspace().stats();
            debug!("Workspace stats: {} documents open", stats.document_count);
        }

        self.publish_diagnostics(uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri.clone();
        debug!("Document changed: {} (version {})", uri, params.text_document.version);

        let result = self.db.write().await.workspace_mut().update_document(params);
        if let Err(e) = result {
            match e.downcast_ref::<DocumentError>() {
                Some(DocumentError::StaleVersion { .. }) => warn!("{}", e),
                _ => error!("Failed to update document {}: {}", uri, e),
            }
            return;
        }

        self.publish_diagnostics(uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        info!("Document closed: {}", uri);

        self.db.write().await.workspace_mut().close_document(&uri);
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        debug!("Code action request at range {:?}", params.range);
        self.handlers().await.code_action(params).await
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        debug!(
            "Go to definition request at {:?}",
            params.text_document_position_params.position
        );
        self.handlers().await.goto_definition(params).await
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        info!("Execute command: {}", params.command);

        match params.command.as_str() {
            MOVE_CURSOR_COMMAND => {
                let show = move_cursor_params(&params.arguments)?;
                if !self.client.show_document(show).await? {
                    debug!("Client did not move the cursor");
                }
                Ok(None)
            }
            RESTART_COMMAND => {
                self.restart().await;
                Ok(None)
            }
            other => Err(Error::invalid_params(format!("Unknown command '{other}'"))),
        }
    }
}
