use lsp_types::*;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::RwLock;
use ucx_core::{AnalysisEngine, LibraryIndex, LibraryLoader, SymbolDatabase};
use ucx_protocol::Handlers;

const ROUND_TRIP: &str = "class Foo extends Bar;\n\nfunction Existing() { DoThing(5, \"x\", bFlag); }";

/// Create a test database over an already loaded, empty library
fn create_test_database() -> Arc<RwLock<SymbolDatabase>> {
    let library = Arc::new(LibraryIndex::new());
    library.finish_loading();
    Arc::new(RwLock::new(SymbolDatabase::new(library)))
}

fn create_handlers(db: &Arc<RwLock<SymbolDatabase>>) -> Handlers {
    Handlers::new(Arc::clone(db), Arc::new(AnalysisEngine::default()))
}

/// Open a document with UnrealScript content for testing
async fn add_test_document(db: &Arc<RwLock<SymbolDatabase>>, uri: &str, content: &str) -> Url {
    let uri = Url::parse(uri).unwrap();
    db.write().await.workspace_mut().open_document(TextDocumentItem {
        uri: uri.clone(),
        language_id: "unrealscript".to_string(),
        version: 1,
        text: content.to_string(),
    });
    uri
}

fn code_action_request(uri: &Url, diagnostics: Vec<Diagnostic>) -> CodeActionParams {
    let range = diagnostics.first().map(|d| d.range).unwrap_or_default();
    CodeActionParams {
        text_document: TextDocumentIdentifier { uri: uri.clone() },
        range,
        context: CodeActionContext {
            diagnostics,
            only: None,
            trigger_kind: None,
        },
        work_done_progress_params: WorkDoneProgressParams::default(),
        partial_result_params: PartialResultParams::default(),
    }
}

fn goto_definition_request(uri: &Url, line: u32, character: u32) -> GotoDefinitionParams {
    GotoDefinitionParams {
        text_document_position_params: TextDocumentPositionParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            position: Position { line, character },
        },
        work_done_progress_params: WorkDoneProgressParams::default(),
        partial_result_params: PartialResultParams::default(),
    }
}

fn only_action(response: Option<CodeActionResponse>) -> CodeAction {
    let mut actions = response.expect("expected code actions");
    assert_eq!(actions.len(), 1, "actions: {:?}", actions);
    match actions.remove(0) {
        CodeActionOrCommand::CodeAction(action) => action,
        CodeActionOrCommand::Command(command) => panic!("unexpected bare command {:?}", command),
    }
}

/// Test: textDocument/codeAction
/// Purpose: An undefined-function diagnostic yields a create-function quick fix
#[tokio::test]
async fn test_code_action_creates_function_stub() {
    let db = create_test_database();
    let uri = add_test_document(&db, "file:///src/Foo.uc", ROUND_TRIP).await;
    let handlers = create_handlers(&db);

    let diagnostics = handlers.diagnostics(&uri).await.unwrap();
    assert_eq!(diagnostics.len(), 1);

    let response = handlers
        .code_action(code_action_request(&uri, diagnostics))
        .await
        .unwrap();
    let action = only_action(response);

    assert_eq!(action.title, "Create function 'DoThing'");
    assert_eq!(action.kind, Some(CodeActionKind::QUICKFIX));
    let edits = &action.edit.unwrap().changes.unwrap()[&uri];
    assert_eq!(edits[0].range.start, Position::new(2, 0));
    assert_eq!(
        edits[0].new_text,
        "function DoThing(int arg1, string arg2, bool arg3)\n{\n\t\n}\n\n"
    );
    assert_eq!(action.command.unwrap().command, "ucx.moveCursor");
}

/// Test: textDocument/codeAction with duplicate diagnostics
/// Purpose: Two calls to the same missing function produce one stub
#[tokio::test]
async fn test_code_action_deduplicates_by_name() {
    let db = create_test_database();
    let text = "class Foo;\nfunction Test()\n{\n    Missing(1);\n    Missing(2);\n}\n";
    let uri = add_test_document(&db, "file:///src/Foo.uc", text).await;
    let handlers = create_handlers(&db);

    let diagnostics = handlers.diagnostics(&uri).await.unwrap();
    assert_eq!(diagnostics.len(), 2);

    let response = handlers
        .code_action(code_action_request(&uri, diagnostics))
        .await
        .unwrap();
    assert_eq!(only_action(response).title, "Create function 'Missing'");
}

/// Test: textDocument/codeAction after an edit moved the call
/// Purpose: A stale diagnostic produces no action
#[tokio::test]
async fn test_code_action_stale_diagnostic() {
    let db = create_test_database();
    let uri = add_test_document(&db, "file:///src/Foo.uc", ROUND_TRIP).await;
    let handlers = create_handlers(&db);
    let diagnostics = handlers.diagnostics(&uri).await.unwrap();

    db.write()
        .await
        .workspace_mut()
        .update_document(DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: uri.clone(),
                version: 2,
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: "class Foo extends Bar;\n\nfunction Existing() {}".to_string(),
            }],
        })
        .unwrap();

    let response = handlers
        .code_action(code_action_request(&uri, diagnostics))
        .await
        .unwrap();
    assert!(response.is_none());
}

/// Test: textDocument/codeAction restricted to refactorings
/// Purpose: Quick fixes are not offered when the client asks for other kinds
#[tokio::test]
async fn test_code_action_respects_only_filter() {
    let db = create_test_database();
    let uri = add_test_document(&db, "file:///src/Foo.uc", ROUND_TRIP).await;
    let handlers = create_handlers(&db);
    let diagnostics = handlers.diagnostics(&uri).await.unwrap();

    let mut request = code_action_request(&uri, diagnostics);
    request.context.only = Some(vec![CodeActionKind::REFACTOR]);

    assert!(handlers.code_action(request).await.unwrap().is_none());
}

/// Test: textDocument/codeAction on a closed document
#[tokio::test]
async fn test_code_action_unknown_document() {
    let db = create_test_database();
    let handlers = create_handlers(&db);
    let uri = Url::parse("file:///src/Nope.uc").unwrap();

    let response = handlers
        .code_action(code_action_request(&uri, Vec::new()))
        .await
        .unwrap();
    assert!(response.is_none());
}

/// Test: textDocument/definition inside one document
/// Purpose: A local declaration is found ahead of the class variable
#[tokio::test]
async fn test_goto_definition_local() {
    let db = create_test_database();
    let text = "class Foo;\nvar int Count;\nfunction Test()\n{\n    local int Count;\n    Count = 1;\n}\n";
    let uri = add_test_document(&db, "file:///src/Foo.uc", text).await;
    let handlers = create_handlers(&db);

    let response = handlers
        .goto_definition(goto_definition_request(&uri, 5, 5))
        .await
        .unwrap();

    let Some(GotoDefinitionResponse::Scalar(location)) = response else {
        panic!("expected a single location, got {:?}", response);
    };
    assert_eq!(location.uri, uri);
    assert_eq!(
        location.range,
        Range::new(Position::new(4, 14), Position::new(4, 19))
    );
}

/// Test: textDocument/definition across documents
#[tokio::test]
async fn test_goto_definition_in_parent_document() {
    let db = create_test_database();
    let parent = add_test_document(
        &db,
        "file:///src/Base.uc",
        "class Base;\nfunction Helper() {}\n",
    )
    .await;
    let child = add_test_document(
        &db,
        "file:///src/Child.uc",
        "class Child extends Base;\nfunction Test() { Helper(); }\n",
    )
    .await;
    let handlers = create_handlers(&db);

    let response = handlers
        .goto_definition(goto_definition_request(&child, 1, 19))
        .await
        .unwrap();

    let Some(GotoDefinitionResponse::Scalar(location)) = response else {
        panic!("expected a single location, got {:?}", response);
    };
    assert_eq!(location.uri, parent);
    assert_eq!(location.range.start, Position::new(1, 9));
}

/// Test: textDocument/definition into the library corpus
/// Purpose: Library definitions map to file URLs
#[tokio::test]
async fn test_goto_definition_into_library() {
    let corpus = TempDir::new().unwrap();
    let classes = corpus.path().join("Engine").join("Classes");
    fs::create_dir_all(&classes).unwrap();
    fs::write(
        classes.join("Actor.uc"),
        "class Actor extends Object;\n\nnative function Destroy();\n",
    )
    .unwrap();

    let library = Arc::new(LibraryIndex::new());
    LibraryLoader::spawn(Arc::clone(&library), corpus.path().to_path_buf())
        .finished()
        .await
        .unwrap();
    let expected = Url::from_file_path(&library.get("actor").unwrap().path).unwrap();

    let db = Arc::new(RwLock::new(SymbolDatabase::new(library)));
    let uri = add_test_document(
        &db,
        "file:///src/MyActor.uc",
        "class MyActor extends Actor;\nfunction Test() { Destroy(); }\n",
    )
    .await;
    let handlers = create_handlers(&db);

    let response = handlers
        .goto_definition(goto_definition_request(&uri, 1, 20))
        .await
        .unwrap();

    let Some(GotoDefinitionResponse::Scalar(location)) = response else {
        panic!("expected a single location, got {:?}", response);
    };
    assert_eq!(location.uri, expected);
    assert_eq!(
        location.range,
        Range::new(Position::new(2, 16), Position::new(2, 23))
    );
}

/// Test: textDocument/definition on an unresolved name
#[tokio::test]
async fn test_goto_definition_not_found() {
    let db = create_test_database();
    let uri = add_test_document(&db, "file:///src/Foo.uc", ROUND_TRIP).await;
    let handlers = create_handlers(&db);

    let unresolved = handlers
        .goto_definition(goto_definition_request(&uri, 2, 24))
        .await
        .unwrap();
    assert!(unresolved.is_none());

    let whitespace = handlers
        .goto_definition(goto_definition_request(&uri, 1, 0))
        .await
        .unwrap();
    assert!(whitespace.is_none());
}

/// Test: diagnostics republished after the library finishes loading
/// Purpose: Deferred findings appear for every open document
#[tokio::test]
async fn test_open_document_diagnostics_after_load() {
    let library = Arc::new(LibraryIndex::new());
    let db = Arc::new(RwLock::new(SymbolDatabase::new(Arc::clone(&library))));
    let a = add_test_document(&db, "file:///src/A.uc", ROUND_TRIP).await;
    let b = add_test_document(&db, "file:///src/B.uc", "class B;\nfunction T() { Gone(); }\n").await;
    let handlers = create_handlers(&db);

    let before = handlers.open_document_diagnostics().await;
    assert_eq!(before.len(), 2);
    assert!(before.iter().all(|(_, _, diagnostics)| diagnostics.is_empty()));

    library.finish_loading();
    let mut after = handlers.open_document_diagnostics().await;
    after.sort_by(|x, y| x.0.as_str().cmp(y.0.as_str()));

    assert_eq!(after[0].0, a);
    assert_eq!(after[0].1, 1);
    assert_eq!(after[0].2.len(), 1);
    assert_eq!(after[1].0, b);
    assert_eq!(after[1].2[0].message, "Undefined function 'Gone'");
}
