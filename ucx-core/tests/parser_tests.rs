use proptest::prelude::*;
use ucx_core::ast::{statements_recursively, Expression, Statement};
use ucx_core::{parse, tokenize, SemanticClass};

fn body_expression(source: &str, function: usize, statement: usize) -> Expression {
    let class = parse(source);
    match &class.functions[function].body[statement] {
        Statement::Expression(expr) => expr.clone(),
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_class_header() {
    let class = parse("class Foo extends Engine.Bar\n    abstract\n    config(Game);\n");

    assert_eq!(class.name.as_ref().unwrap().text, "Foo");
    assert_eq!(class.parent.as_ref().unwrap().text, "Bar");
    assert_eq!(class.name.as_ref().unwrap().class, SemanticClass::ClassDeclaration);
    assert_eq!(class.parent.as_ref().unwrap().class, SemanticClass::ClassReference);

    let first = class.class_declaration_first_token.as_ref().unwrap();
    let last = class.class_declaration_last_token.as_ref().unwrap();
    assert_eq!((first.line, first.position), (0, 0));
    assert_eq!((last.line, last.text.as_str()), (2, ";"));
    assert!(class.errors.is_empty(), "unexpected errors: {:?}", class.errors);
}

#[test]
fn test_expands_and_root_class() {
    let class = parse("class Info expands Actor;");
    assert_eq!(class.parent_lower(), Some("actor"));

    let root = parse("class Object\n    native;\n");
    assert_eq!(root.name_lower(), Some("object"));
    assert!(root.parent.is_none());
}

#[test]
fn test_variable_declarations() {
    let source = r#"class Foo extends Actor;

var int A, B;
var() config array<string> Names;
var enum EMode { MODE_A, MODE_B } Mode;
var name Name;
"#;
    let class = parse(source);

    let names: Vec<_> = class.variables.iter().map(|v| v.name.text.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "Names", "Mode", "Name"]);
    assert_eq!(class.variables[2].type_text, "array<string>");
    assert_eq!(class.variables[3].type_text, "EMode");
    assert_eq!(class.variables[4].type_text, "name");

    assert_eq!(class.enums.len(), 1);
    let values: Vec<_> = class.enums[0].values.iter().map(|v| v.text.as_str()).collect();
    assert_eq!(values, vec!["MODE_A", "MODE_B"]);
    assert!(class.errors.is_empty(), "unexpected errors: {:?}", class.errors);
}

#[test]
fn test_const_struct_enum() {
    let source = r#"class Foo extends Actor;

const MAX_PLAYERS = 16;

enum ETeam
{
    TEAM_Red,
    TEAM_Blue
};

struct native PlayerInfo extends BaseInfo
{
    var string PlayerName;
    var int Score;
};
"#;
    let class = parse(source);

    assert_eq!(class.constants.len(), 1);
    assert_eq!(class.constants[0].name.text, "MAX_PLAYERS");
    assert_eq!(class.constants[0].value.as_ref().unwrap().text, "16");

    assert_eq!(class.enums[0].name.text, "ETeam");
    assert_eq!(class.enums[0].values.len(), 2);

    assert_eq!(class.structs.len(), 1);
    let info = &class.structs[0];
    assert_eq!(info.name.text, "PlayerInfo");
    assert_eq!(info.parent.as_ref().unwrap().text, "BaseInfo");
    assert_eq!(info.members.len(), 2);
    assert!(class.errors.is_empty(), "unexpected errors: {:?}", class.errors);
}

#[test]
fn test_function_declaration() {
    let source = r#"class Foo extends Actor;

simulated function int Add(int A, optional out float B = 1.0)
{
    local int Sum, Extra;
    Sum = A + B;
    return Sum;
}
"#;
    let class = parse(source);
    assert_eq!(class.functions.len(), 1);

    let function = &class.functions[0];
    assert_eq!(function.name.as_ref().unwrap().text, "Add");
    assert_eq!(function.name.as_ref().unwrap().class, SemanticClass::FunctionDeclaration);
    assert_eq!(function.return_type.as_ref().unwrap().text, "int");
    assert!(!function.is_event);
    assert_eq!(function.modifiers.len(), 1);

    assert_eq!(function.params.len(), 2);
    assert_eq!(function.params[0].name.as_ref().unwrap().text, "A");
    assert_eq!(function.params[0].type_text, "int");
    let b = &function.params[1];
    assert_eq!(b.name.as_ref().unwrap().text, "B");
    assert_eq!(b.type_text, "float");
    assert!(b.is_optional);
    assert!(b.is_out);

    assert_eq!(function.body_first_token.as_ref().unwrap().line, 3);
    assert_eq!(function.body_last_token.as_ref().unwrap().line, 7);
    assert!(function.contains_line(5));
    assert!(!function.contains_line(2));

    let locals: Vec<_> = function
        .locals()
        .flat_map(|l| l.names.iter().map(|n| n.text.as_str()))
        .collect();
    assert_eq!(locals, vec!["Sum", "Extra"]);
    assert!(class.errors.is_empty(), "unexpected errors: {:?}", class.errors);
}

#[test]
fn test_native_declarations_without_body() {
    let source = "class Object native;\nnative(112) static final function string Left(coerce string S, int I);\nevent Tick(float DeltaTime);\n";
    let class = parse(source);

    assert_eq!(class.functions.len(), 2);
    assert_eq!(class.functions[0].name.as_ref().unwrap().text, "Left");
    assert!(class.functions[0].body.is_empty());
    assert!(class.functions[0].body_first_token.is_none());
    assert!(class.functions[1].is_event);
    assert!(class.errors.is_empty(), "unexpected errors: {:?}", class.errors);
}

#[test]
fn test_call_expressions() {
    let source = "class Foo;\nfunction Test()\n{\n    Foo(Bar(1), Baz.Qux(2));\n}\n";
    let expr = body_expression(source, 0, 0);

    let Expression::Call { callee, args } = &expr else {
        panic!("expected call, got {:?}", expr);
    };
    assert_eq!(callee.text, "Foo");
    assert_eq!(callee.class, SemanticClass::FunctionReference);
    assert_eq!((callee.line, callee.position), (3, 4));
    assert_eq!(args.len(), 2);

    match &args[0] {
        Expression::Call { callee, args } => {
            assert_eq!(callee.text, "Bar");
            assert_eq!(args.len(), 1);
        }
        other => panic!("expected nested call, got {:?}", other),
    }
    match &args[1] {
        Expression::Member { target, member, args } => {
            assert_eq!(target.op().text, "Baz");
            assert_eq!(member.text, "Qux");
            assert_eq!(args.as_ref().unwrap().len(), 1);
        }
        other => panic!("expected member call, got {:?}", other),
    }
}

#[test]
fn test_operator_precedence() {
    let source = "class Foo;\nfunction Test()\n{\n    X = A + B * C;\n}\n";
    let expr = body_expression(source, 0, 0);

    assert_eq!(expr.op().text, "=");
    let rhs = &expr.args()[1];
    assert_eq!(rhs.op().text, "+");
    assert_eq!(rhs.args()[0].op().text, "A");
    assert_eq!(rhs.args()[1].op().text, "*");
}

#[test]
fn test_string_concat_binds_looser_than_addition() {
    let source = "class Foo;\nfunction Test()\n{\n    S = \"a\" $ N + 1 @ \"b\";\n}\n";
    let expr = body_expression(source, 0, 0);

    let rhs = &expr.args()[1];
    assert_eq!(rhs.op().text, "@");
    assert_eq!(rhs.args()[0].op().text, "$");
    assert_eq!(rhs.args()[0].args()[1].op().text, "+");
}

#[test]
fn test_new_and_object_literals() {
    let source = "class Foo;\nfunction Test()\n{\n    P = new(self) class'Pawn';\n    T = Texture'Engine.Default';\n}\n";
    let class = parse(source);

    let Statement::Expression(first) = &class.functions[0].body[0] else {
        panic!("expected expression");
    };
    let new_expr = &first.args()[1];
    assert_eq!(new_expr.op().text, "new");
    assert_eq!(new_expr.args().len(), 2);
    assert_eq!(new_expr.args()[1].op().class, SemanticClass::LiteralName);

    let Statement::Expression(second) = &class.functions[0].body[1] else {
        panic!("expected expression");
    };
    assert_eq!(second.args()[1].op().text, "'Engine.Default'");
    assert!(class.errors.is_empty(), "unexpected errors: {:?}", class.errors);
}

#[test]
fn test_control_statements_nest() {
    let source = r#"class Foo;
function Test()
{
    local int i;
    if (A()) { B(); } else C();
    for (i = 0; i < 10; i++) { D(i); }
    while (E()) F();
    do { G(); } until (H());
    switch (I())
    {
        case 1:
            J();
            break;
        default:
            K();
    }
    foreach AllActors(class'Pawn', P) { L(P); }
}
"#;
    let class = parse(source);
    assert!(class.errors.is_empty(), "unexpected errors: {:?}", class.errors);

    let mut callees = Vec::new();
    for statement in statements_recursively(&class.functions[0].body) {
        for expression in statement.expressions() {
            expression.walk(&mut |e| {
                if let Expression::Call { callee, .. } = e {
                    callees.push(callee.text.clone());
                }
            });
        }
    }
    assert_eq!(
        callees,
        vec!["A", "B", "C", "D", "E", "F", "H", "G", "I", "J", "K", "AllActors", "L"]
    );
}

#[test]
fn test_state_functions_and_labels() {
    let source = r#"class Foo extends Actor;

auto state Idle
{
    ignores Touch;

    function Tick(float Delta)
    {
        Update();
    }

Begin:
    Sleep(1.0);
    goto 'Begin';
}
"#;
    let class = parse(source);
    assert!(class.errors.is_empty(), "unexpected errors: {:?}", class.errors);

    assert_eq!(class.states.len(), 1);
    assert_eq!(class.states[0].name.text, "Idle");
    assert_eq!(class.states[0].code.len(), 3);
    assert!(matches!(class.states[0].code[0], Statement::Label(_)));

    assert_eq!(class.functions.len(), 1);
    assert_eq!(class.functions[0].name.as_ref().unwrap().text, "Tick");
    assert_eq!(class.functions[0].state.as_ref().unwrap().text, "Idle");
}

#[test]
fn test_skipped_blocks() {
    let source = r#"class Foo extends Actor;

replication
{
    reliable if (Role == ROLE_Authority)
        Health;
}

function Test() { Foo(); }

defaultproperties
{
    Health=100
    Begin Object Class=Bar Name=Baz
    End Object
}
"#;
    let class = parse(source);
    assert!(class.errors.is_empty(), "unexpected errors: {:?}", class.errors);
    assert_eq!(class.functions.len(), 1);
    assert!(class.variables.is_empty());
}

#[test]
fn test_recovers_after_malformed_function() {
    let source = "class Foo;\nfunction Broken( { Foo(; }\nfunction Next() { Bar(); }\n";
    let class = parse(source);

    assert!(!class.errors.is_empty());
    assert_eq!(class.functions.len(), 2);
    assert_eq!(class.functions[1].name.as_ref().unwrap().text, "Next");
    assert_eq!(class.functions[1].body.len(), 1);
}

#[test]
fn test_empty_and_garbage_input() {
    let empty = parse("");
    assert!(empty.name.is_none());
    assert!(empty.functions.is_empty());

    let garbage = parse("}}} ((( ;;; \u{00e9} @@@ function");
    assert!(garbage.name.is_none());
    assert!(!garbage.errors.is_empty());
}

#[test]
fn test_tokens_keep_refined_classes() {
    let class = parse("class Foo extends Bar;\nfunction Test() { Baz(); }\n");
    let baz = class.token_at(1, 18).unwrap();
    assert_eq!(baz.text, "Baz");
    assert_eq!(baz.class, SemanticClass::FunctionReference);

    // A caret just past the end of a word still selects it.
    assert_eq!(class.token_at(0, 9).unwrap().text, "Foo");
    assert!(class.token_at(5, 0).is_none());
}

/// Parse `body` inside `F` followed by a second function, walking every
/// expression, and check that parsing resumes after the nesting.
fn parse_nested_body(body: &str) {
    let source = format!("class A;\nfunction F()\n{{\n{body}\n}}\nfunction G() {{ Log(); }}\n");
    let class = parse(&source);

    let mut visited = 0usize;
    for statement in statements_recursively(&class.functions[0].body) {
        for expression in statement.expressions() {
            expression.walk(&mut |_| visited += 1);
        }
    }
    assert!(
        class.errors.iter().any(|e| e.message.contains("nested too deeply")),
        "no nesting error for {:.40}",
        body
    );
    assert_eq!(class.functions.len(), 2);
    assert_eq!(class.functions[1].name.as_ref().unwrap().text, "G");
    assert_eq!(class.functions[1].body.len(), 1);
}

#[test]
fn test_deep_nesting_is_bounded() {
    let n = 5000;
    parse_nested_body(&format!("X = {};", "(".repeat(n)));
    parse_nested_body(&format!("X = {}1{};", "(".repeat(n), ")".repeat(n)));
    parse_nested_body(&format!("{}X = 1;{}", "{".repeat(n), "}".repeat(n)));
    parse_nested_body(&"if (X) ".repeat(n));
    parse_nested_body(&format!("X = {}B;", "!".repeat(n)));
    parse_nested_body(&format!("{}1{};", "Foo(".repeat(n), ")".repeat(n)));
    parse_nested_body(&format!("A{};", ".B".repeat(n)));
    parse_nested_body(&format!("X = A{};", " $ A".repeat(n)));
    parse_nested_body(&format!("X{};", " = X".repeat(n)));
}

#[test]
fn test_moderate_nesting_parses_cleanly() {
    let source = format!(
        "class A;\nfunction F()\n{{\n X = {}1{};\n}}\n",
        "(".repeat(50),
        ")".repeat(50)
    );
    let class = parse(&source);
    assert!(class.errors.is_empty(), "{:?}", class.errors);
    assert_eq!(class.functions[0].body.len(), 1);
}

proptest! {
    #[test]
    fn parse_never_panics(source in "\\PC{0,200}") {
        let _ = parse(&source);
    }

    #[test]
    fn parse_never_panics_on_script_like_text(
        source in "(class|function|var|local|if|\\(|\\)|\\{|\\}|;|,|=|\\+|'|\"|Foo|Bar|1|\\.|<|>|\n| )*"
    ) {
        let _ = parse(&source);
    }

    #[test]
    fn token_positions_stay_within_text(source in "[a-z0-9 (){};.'\"/*\n\t]{0,200}") {
        let lines: Vec<&str> = source.split('\n').collect();
        for token in tokenize(&source) {
            let line = lines.get(token.line as usize);
            prop_assert!(line.is_some(), "token {:?} past last line", token);
            let width = line.map(|l| l.encode_utf16().count() as u32).unwrap_or(0);
            prop_assert!(token.end_position() <= width, "token {:?} past line end", token);
        }
    }
}
