use lsp_types::*;
use ucx_core::Document;

/// Create a test text document item
fn create_test_lsp_item(uri: &str, content: &str, version: i32) -> TextDocumentItem {
    TextDocumentItem {
        uri: Url::parse(uri).unwrap(),
        language_id: "unrealscript".to_string(),
        version,
        text: content.to_string(),
    }
}

fn change(range: Option<Range>, text: &str) -> TextDocumentContentChangeEvent {
    TextDocumentContentChangeEvent {
        range,
        range_length: None,
        text: text.to_string(),
    }
}

#[test]
fn test_document_from_lsp_item() {
    let document = Document::new(create_test_lsp_item(
        "file:///test/Foo.uc",
        "class Foo extends Actor;\n\nvar int Count;\n",
        3,
    ));

    assert_eq!(document.uri().as_str(), "file:///test/Foo.uc");
    assert_eq!(document.version(), 3);
    assert_eq!(document.language_id(), "unrealscript");
    assert_eq!(document.line_count(), 4);
    assert!(!document.is_parsed());
}

#[test]
fn test_multiple_incremental_changes() {
    let mut document = Document::new(create_test_lsp_item(
        "file:///test/Foo.uc",
        "class Foo;\nfunction A() {}\n",
        1,
    ));

    document
        .apply_changes(
            vec![
                change(Some(Range::new(Position::new(1, 9), Position::new(1, 10))), "Alpha"),
                change(Some(Range::new(Position::new(2, 0), Position::new(2, 0))), "function B() {}\n"),
            ],
            2,
        )
        .unwrap();

    assert_eq!(document.text(), "class Foo;\nfunction Alpha() {}\nfunction B() {}\n");
    let names: Vec<_> = document
        .ast()
        .functions
        .iter()
        .filter_map(|f| f.name.as_ref().map(|t| t.text.clone()))
        .collect();
    assert_eq!(names, vec!["Alpha", "B"]);
}

#[test]
fn test_document_with_syntax_errors() {
    let mut document = Document::new(create_test_lsp_item(
        "file:///test/Broken.uc",
        "class Broken extends Actor;\nfunction Good() {}\nfunction Bad( {\n",
        1,
    ));

    let ast = document.ast();
    assert!(!ast.errors.is_empty());
    assert_eq!(ast.name_lower(), Some("broken"));
    assert!(ast.functions.iter().any(|f| f.name_lower() == Some("good")));
}

#[test]
fn test_empty_document() {
    let mut document = Document::new(create_test_lsp_item("file:///test/Empty.uc", "", 1));

    let ast = document.ast();
    assert!(ast.name.is_none());
    assert!(ast.functions.is_empty());
    assert!(ast.tokens.is_empty());
}

#[test]
fn test_unicode_content_uses_utf16_columns() {
    let mut document = Document::new(create_test_lsp_item(
        "file:///test/Foo.uc",
        "class Foo;\nvar string S; // 😀\nvar int Count;\n",
        1,
    ));

    // Replace "Count" using UTF-16 columns on a line after the emoji.
    document
        .apply_changes(
            vec![change(Some(Range::new(Position::new(2, 8), Position::new(2, 13))), "N")],
            2,
        )
        .unwrap();
    assert_eq!(document.text(), "class Foo;\nvar string S; // 😀\nvar int N;\n");

    let ast = document.ast();
    let variable = ast.variables.iter().find(|v| v.name.text == "N").unwrap();
    assert_eq!((variable.name.line, variable.name.position), (2, 8));
}

#[test]
fn test_large_document() {
    let mut text = String::from("class Big extends Actor;\n");
    for i in 0..500 {
        text.push_str(&format!("function F{i}(int A)\n{{\n    local int B;\n    B = A + {i};\n}}\n"));
    }
    let mut document = Document::new(create_test_lsp_item("file:///test/Big.uc", &text, 1));

    let ast = document.ast();
    assert_eq!(ast.functions.len(), 500);
    assert!(ast.errors.is_empty());
    assert_eq!(ast.functions[499].name.as_ref().unwrap().line, 1 + 499 * 5);
}
