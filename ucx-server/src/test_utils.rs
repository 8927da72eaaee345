use lsp_types::*;
use serde_json::Value;

/// Builders for the LSP requests exercised in server tests
pub struct LspTestClient {}

impl LspTestClient {
    /// Create an initialize request from a client that supports quick fixes
    /// and `window/showDocument`
    pub fn create_initialize_request(initialization_options: Option<Value>) -> InitializeParams {
        InitializeParams {
            process_id: Some(1234),
            root_uri: Some(Url::parse("file:///test/workspace").unwrap()),
            initialization_options,
            capabilities: ClientCapabilities {
                text_document: Some(TextDocumentClientCapabilities {
                    synchronization: Some(TextDocumentSyncClientCapabilities {
                        dynamic_registration: Some(false),
                        will_save: Some(false),
                        will_save_wait_until: Some(false),
                        did_save: Some(false),
                    }),
                    code_action: Some(CodeActionClientCapabilities {
                        code_action_literal_support: Some(CodeActionLiteralSupport {
                            code_action_kind: CodeActionKindLiteralSupport {
                                value_set: vec![CodeActionKind::QUICKFIX.as_str().to_string()],
                            },
                        }),
                        ..Default::default()
                    }),
                    definition: Some(GotoCapability {
                        dynamic_registration: Some(false),
                        link_support: Some(false),
                    }),
                    publish_diagnostics: Some(PublishDiagnosticsClientCapabilities {
                        version_support: Some(true),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                window: Some(WindowClientCapabilities {
                    show_document: Some(ShowDocumentClientCapabilities { support: true }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            client_info: Some(ClientInfo {
                name: "test-client".to_string(),
                version: Some("1.0.0".to_string()),
            }),
            ..Default::default()
        }
    }

    /// Create a test document open notification
    pub fn create_did_open_notification(uri: &str, content: &str) -> DidOpenTextDocumentParams {
        DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: Url::parse(uri).unwrap(),
                language_id: "unrealscript".to_string(),
                version: 1,
                text: content.to_string(),
            },
        }
    }

    /// Create a full-text document change notification
    pub fn create_did_change_notification(
        uri: &str,
        version: i32,
        content: &str,
    ) -> DidChangeTextDocumentParams {
        DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: Url::parse(uri).unwrap(),
                version,
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: content.to_string(),
            }],
        }
    }

    /// Create a code action request carrying the given diagnostics
    pub fn create_code_action_request(uri: &str, diagnostics: Vec<Diagnostic>) -> CodeActionParams {
        CodeActionParams {
            text_document: TextDocumentIdentifier {
                uri: Url::parse(uri).unwrap(),
            },
            range: diagnostics.first().map(|d| d.range).unwrap_or_default(),
            context: CodeActionContext {
                diagnostics,
                only: None,
                trigger_kind: None,
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        }
    }

    /// Create a go-to-definition request
    pub fn create_goto_definition_request(
        uri: &str,
        line: u32,
        character: u32,
    ) -> GotoDefinitionParams {
        GotoDefinitionParams {
            text_document_position_params: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier {
                    uri: Url::parse(uri).unwrap(),
                },
                position: Position { line, character },
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        }
    }

    pub fn create_execute_command_request(command: &str, arguments: Vec<Value>) -> ExecuteCommandParams {
        ExecuteCommandParams {
            command: command.to_string(),
            arguments,
            work_done_progress_params: WorkDoneProgressParams::default(),
        }
    }
}

/// A document whose only finding is the undefined call to `DoThing`
pub fn create_test_unrealscript_source() -> &'static str {
    "class Foo extends Bar;\n\nfunction Existing() { DoThing(5, \"x\", bFlag); }"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_initialize_request() {
        let params = LspTestClient::create_initialize_request(None);
        assert!(params.capabilities.text_document.is_some());
        assert_eq!(
            params.capabilities.window.and_then(|w| w.show_document).map(|s| s.support),
            Some(true)
        );
        assert_eq!(params.client_info.as_ref().unwrap().name, "test-client");
    }

    #[test]
    fn test_create_did_open_notification() {
        let params = LspTestClient::create_did_open_notification("file:///src/Foo.uc", "class Foo;");
        assert_eq!(params.text_document.uri.as_str(), "file:///src/Foo.uc");
        assert_eq!(params.text_document.language_id, "unrealscript");
        assert_eq!(params.text_document.version, 1);
    }

    #[test]
    fn test_create_code_action_request_uses_first_range() {
        let diagnostic = Diagnostic {
            range: Range::new(Position::new(2, 22), Position::new(2, 29)),
            ..Diagnostic::default()
        };
        let params = LspTestClient::create_code_action_request("file:///src/Foo.uc", vec![diagnostic]);
        assert_eq!(params.range.start, Position::new(2, 22));
        assert_eq!(params.context.diagnostics.len(), 1);
    }
}
