use crate::token::Token;

/// A recoverable problem the parser skipped past.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub position: u32,
    pub length: u32,
}

impl ParseError {
    pub fn at(token: &Token, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: token.line,
            position: token.position,
            length: token.len_utf16().max(1),
        }
    }
}

/// Expression tree.
///
/// Every variant has an operator token ([`Expression::op`]) and an ordered
/// argument list ([`Expression::args`]); a bare literal or identifier is its
/// own operator with no arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Token),
    Identifier(Token),
    /// `callee(args)`; also covers casts such as `Pawn(Owner)`.
    Call { callee: Token, args: Vec<Expression> },
    /// `target.member` or `target.member(args)`.
    Member {
        target: Box<Expression>,
        member: Token,
        args: Option<Vec<Expression>>,
    },
    /// Unary, binary, ternary, index and `new` forms.
    Operator { op: Token, args: Vec<Expression> },
}

impl Expression {
    pub fn op(&self) -> &Token {
        match self {
            Expression::Literal(token) | Expression::Identifier(token) => token,
            Expression::Call { callee, .. } => callee,
            Expression::Member { member, .. } => member,
            Expression::Operator { op, .. } => op,
        }
    }

    pub fn args(&self) -> &[Expression] {
        match self {
            Expression::Literal(_) | Expression::Identifier(_) => &[],
            Expression::Call { args, .. } | Expression::Operator { args, .. } => args,
            Expression::Member { args, .. } => args.as_deref().unwrap_or(&[]),
        }
    }

    /// The token of a bare literal or identifier.
    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Expression::Literal(token) | Expression::Identifier(token) => Some(token),
            _ => None,
        }
    }

    /// Visit this expression and every nested expression in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expression)) {
        visit(self);
        if let Expression::Member { target, .. } = self {
            target.walk(visit);
        }
        for arg in self.args() {
            arg.walk(visit);
        }
    }
}

/// `local Type A, B;`
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDeclaration {
    pub keyword: Token,
    pub type_name: Option<Token>,
    pub type_text: String,
    pub names: Vec<Token>,
}

/// A keyword-led statement. `header` holds the condition or operand
/// expressions in source order, `body` and `else_body` the nested
/// statements.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlStatement {
    pub keyword: Token,
    pub header: Vec<Expression>,
    pub body: Vec<Statement>,
    pub else_body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(Expression),
    Local(LocalDeclaration),
    Control(ControlStatement),
    Block(Vec<Statement>),
    Label(Token),
}

impl Statement {
    pub fn op(&self) -> Option<&Token> {
        match self {
            Statement::Expression(expr) => Some(expr.op()),
            Statement::Local(local) => Some(&local.keyword),
            Statement::Control(control) => Some(&control.keyword),
            Statement::Label(label) => Some(label),
            Statement::Block(_) => None,
        }
    }

    pub fn args(&self) -> &[Expression] {
        match self {
            Statement::Expression(expr) => expr.args(),
            Statement::Control(control) => &control.header,
            Statement::Local(_) | Statement::Block(_) | Statement::Label(_) => &[],
        }
    }

    /// Top-level expressions owned directly by this statement.
    pub fn expressions(&self) -> &[Expression] {
        match self {
            Statement::Expression(expr) => std::slice::from_ref(expr),
            Statement::Control(control) => &control.header,
            Statement::Local(_) | Statement::Block(_) | Statement::Label(_) => &[],
        }
    }

    fn children(&self) -> impl Iterator<Item = &Statement> {
        let (first, second): (&[Statement], &[Statement]) = match self {
            Statement::Control(control) => (&control.body, &control.else_body),
            Statement::Block(body) => (body, &[]),
            Statement::Expression(_) | Statement::Local(_) | Statement::Label(_) => (&[], &[]),
        };
        first.iter().chain(second.iter())
    }
}

/// Flatten a statement list and all nested bodies in source order.
pub fn statements_recursively(body: &[Statement]) -> Vec<&Statement> {
    let mut out = Vec::new();
    for statement in body {
        collect_statement(statement, &mut out);
    }
    out
}

fn collect_statement<'a>(statement: &'a Statement, out: &mut Vec<&'a Statement>) {
    out.push(statement);
    for child in statement.children() {
        collect_statement(child, out);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: Option<Token>,
    pub type_name: Option<Token>,
    pub type_text: String,
    pub is_optional: bool,
    pub is_out: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Option<Token>,
    /// Declared with `event`: invoked by the engine's lifecycle rather than
    /// by script calls.
    pub is_event: bool,
    pub modifiers: Vec<Token>,
    pub return_type: Option<Token>,
    pub params: Vec<Parameter>,
    pub body: Vec<Statement>,
    pub body_first_token: Option<Token>,
    pub body_last_token: Option<Token>,
    /// Owning `state` block, if the function was declared inside one.
    pub state: Option<Token>,
}

impl Function {
    pub fn name_lower(&self) -> Option<&str> {
        self.name.as_ref().map(|t| t.text_lower.as_str())
    }

    /// Bound containment on lines: `body_first_token.line <= line <=
    /// body_last_token.line`.
    pub fn contains_line(&self, line: u32) -> bool {
        match (&self.body_first_token, &self.body_last_token) {
            (Some(first), Some(last)) => first.line <= line && line <= last.line,
            _ => false,
        }
    }

    /// Bound containment on exact positions, inclusive of both braces.
    pub fn contains(&self, line: u32, position: u32) -> bool {
        match (&self.body_first_token, &self.body_last_token) {
            (Some(first), Some(last)) => {
                (first.line, first.position) <= (line, position)
                    && (line, position) <= (last.line, last.position)
            }
            _ => false,
        }
    }

    /// Every `local` declaration in the body, including nested blocks.
    pub fn locals(&self) -> impl Iterator<Item = &LocalDeclaration> {
        statements_recursively(&self.body)
            .into_iter()
            .filter_map(|statement| match statement {
                Statement::Local(local) => Some(local),
                _ => None,
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: Token,
    pub type_name: Option<Token>,
    pub type_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub name: Token,
    pub value: Option<Token>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    pub name: Token,
    pub values: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    pub name: Token,
    pub parent: Option<Token>,
    pub members: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub name: Token,
    pub parent: Option<Token>,
    /// Latent state code outside any function.
    pub code: Vec<Statement>,
}

/// Parsed class file.
///
/// Every field is optional or possibly empty: the parser always produces a
/// `Class`, even for empty or malformed text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Class {
    pub name: Option<Token>,
    /// `extends`/`expands` target; absent only for the root class.
    pub parent: Option<Token>,
    pub class_declaration_first_token: Option<Token>,
    pub class_declaration_last_token: Option<Token>,
    pub modifiers: Vec<Token>,
    pub functions: Vec<Function>,
    pub variables: Vec<Variable>,
    pub constants: Vec<Constant>,
    pub enums: Vec<Enum>,
    pub structs: Vec<Struct>,
    pub states: Vec<State>,
    /// Every token of the source with the parser's refined classes, ordered
    /// by position.
    pub tokens: Vec<Token>,
    pub errors: Vec<ParseError>,
}

impl Class {
    pub fn name_lower(&self) -> Option<&str> {
        self.name.as_ref().map(|t| t.text_lower.as_str())
    }

    pub fn parent_lower(&self) -> Option<&str> {
        self.parent.as_ref().map(|t| t.text_lower.as_str())
    }

    /// Token whose span contains `line`/`column`. A column just past the end
    /// of a word also selects it, matching where an editor caret sits after
    /// typing a name.
    pub fn token_at(&self, line: u32, column: u32) -> Option<&Token> {
        let start = self.tokens.partition_point(|t| t.line < line);
        let on_line = self.tokens[start..]
            .iter()
            .take_while(|t| t.line == line);

        let mut touching = None;
        for token in on_line {
            if token.contains(line, column) {
                return Some(token);
            }
            if token.end_position() == column && token.is_word() {
                touching = Some(token);
            }
        }
        touching
    }

    /// Index and reference of the function whose body contains the position.
    pub fn function_at(&self, line: u32, position: u32) -> Option<(usize, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .find(|(_, function)| function.contains(line, position))
    }
}
