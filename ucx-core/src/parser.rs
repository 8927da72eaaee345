use crate::ast::{
    Class, Constant, ControlStatement, Enum, Expression, Function, LocalDeclaration, Parameter,
    ParseError, State, Statement, Struct, Variable,
};
use crate::lexer::tokenize;
use crate::token::{SemanticClass, Token};
use tracing::debug;

const FUNCTION_KEYWORDS: &[&str] = &[
    "function",
    "event",
    "delegate",
    "operator",
    "preoperator",
    "postoperator",
];

const DECLARATION_MODIFIERS: &[&str] = &[
    "static", "final", "simulated", "native", "intrinsic", "private", "protected", "public",
    "latent", "iterator", "singular", "exec", "reliable", "unreliable", "client", "server",
    "auto", "noexport", "noexportheader", "virtual", "editoronly", "demorecording",
];

const VAR_MODIFIERS: &[&str] = &[
    "config", "globalconfig", "localized", "const", "editconst", "editconstarray",
    "editinline", "editinlineuse", "editinlinenotify", "export", "noexport", "native",
    "transient", "travel", "input", "private", "protected", "public", "deprecated",
    "instanced", "duplicatetransient", "noimport", "noclear", "repnotify", "interp",
    "nontransactional", "archetype", "editfixedsize", "edithide", "editoronly",
    "editortextbox", "automated", "cache", "databinding", "serializetext", "skipserialize",
    "notforconsole", "privatewrite", "protectedwrite", "init", "globalconfig",
];

const PARAM_MODIFIERS: &[&str] = &["optional", "out", "coerce", "const", "skip", "ref", "init"];

const SKIPPED_BLOCKS: &[&str] = &[
    "defaultproperties",
    "structdefaultproperties",
    "cpptext",
    "structcpptext",
    "replication",
];

const ASSIGNMENT_OPERATORS: &[&str] = &["=", "+=", "-=", "*=", "/=", "$=", "@="];

/// Deepest statement or expression nesting the parser descends into. Deeper
/// groups are skipped and reported.
const MAX_NESTING: usize = 128;

/// Parse a class file.
///
/// Parsing is total: it never panics and never fails. Malformed input yields
/// a partial [`Class`] whose `errors` list describes what was skipped.
pub fn parse(text: &str) -> Class {
    let class = Parser::new(tokenize(text)).parse_class();
    debug!(
        "Parsed class {:?}: {} functions, {} variables, {} errors",
        class.name.as_ref().map(|t| t.text.as_str()),
        class.functions.len(),
        class.variables.len(),
        class.errors.len()
    );
    class
}

enum Declaration {
    Function,
    State,
}

/// Recursive-descent parser over a token stream.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            depth: 0,
        }
    }

    // ── cursor helpers ──────────────────────────────────────────────────

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, punct: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(punct))
    }

    fn check_word(&self, lower: &str) -> bool {
        self.peek().is_some_and(|t| t.is(lower))
    }

    fn check_any_word(&self, words: &[&str]) -> bool {
        self.peek()
            .is_some_and(|t| words.contains(&t.text_lower.as_str()))
    }

    fn check_word_token(&self) -> bool {
        self.peek().is_some_and(Token::is_word)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos)?.clone();
        self.pos += 1;
        Some(token)
    }

    /// Consume the current token, refining identifiers to `class`.
    fn advance_as(&mut self, class: SemanticClass) -> Option<Token> {
        let token = self.tokens.get_mut(self.pos)?;
        if token.class == SemanticClass::Identifier {
            token.class = class;
        }
        let token = token.clone();
        self.pos += 1;
        Some(token)
    }

    fn eat(&mut self, punct: &str) -> Option<Token> {
        if self.check(punct) {
            self.advance()
        } else {
            None
        }
    }

    fn eat_word(&mut self, lower: &str) -> Option<Token> {
        if self.check_word(lower) {
            self.advance()
        } else {
            None
        }
    }

    fn expect(&mut self, punct: &str) -> Option<Token> {
        let token = self.eat(punct);
        if token.is_none() {
            self.error_here(format!("Expected '{punct}'"));
        }
        token
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let error = match self.peek().or_else(|| self.tokens.last()) {
            Some(token) => ParseError::at(token, message),
            None => ParseError {
                message: message.into(),
                line: 0,
                position: 0,
                length: 1,
            },
        };
        self.errors.push(error);
    }

    /// Skip a balanced group starting at the current opening token. Returns
    /// the closing token, or the last token consumed when the group is
    /// unterminated.
    fn skip_balanced(&mut self, open: &str, close: &str) -> Option<Token> {
        let mut depth = 0usize;
        let mut last = None;
        while let Some(token) = self.advance() {
            if token.is_punct(open) {
                depth += 1;
            } else if token.is_punct(close) {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(token);
                }
            }
            last = Some(token);
        }
        self.error_here(format!("Unterminated '{open}'"));
        last
    }

    /// Enter one nesting level; `false` once `MAX_NESTING` is reached.
    fn descend(&mut self) -> bool {
        if self.depth >= MAX_NESTING {
            return false;
        }
        self.depth += 1;
        true
    }

    /// Skip the rest of a statement nested too deeply to parse.
    fn skip_nested_statement(&mut self) {
        if self.check("}") || self.check(";") {
            return;
        }
        self.error_here("Statement nested too deeply");
        if self.check("{") {
            self.skip_balanced("{", "}");
        } else {
            self.recover_to_semicolon();
        }
    }

    /// Skip the rest of an expression nested too deeply to parse, stopping
    /// before the `)`, `]` or `,` that ends the enclosing group.
    fn skip_nested_expression(&mut self) {
        self.error_here("Expression nested too deeply");
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            if token.is_punct("{") || token.is_punct("}") || token.is_punct(";") {
                return;
            }
            if token.is_punct("(") || token.is_punct("[") {
                depth += 1;
            } else if token.is_punct(")") || token.is_punct("]") {
                if depth == 0 {
                    return;
                }
                depth -= 1;
            } else if token.is_punct(",") && depth == 0 {
                return;
            }
            self.pos += 1;
        }
    }

    /// Skip `<...>` angle groups, which the lexer may have fused into `>>`.
    fn skip_angles(&mut self) -> String {
        let mut text = String::new();
        let mut depth = 0i32;
        while let Some(token) = self.peek() {
            if token.is_punct(";") || token.is_punct("{") || token.is_punct("}") {
                break;
            }
            let opens = token.text.matches('<').count() as i32;
            let closes = token.text.matches('>').count() as i32;
            let is_angle = token.class == SemanticClass::Operator && (opens > 0 || closes > 0);
            text.push_str(&token.text);
            self.pos += 1;
            if is_angle {
                depth += opens - closes;
                if depth <= 0 {
                    break;
                }
            }
        }
        text
    }

    /// Skip to the next `;` at brace depth zero and consume it. Stops before
    /// an unmatched `}` so the enclosing block can close.
    fn recover_to_semicolon(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            if token.is_punct("{") {
                depth += 1;
            } else if token.is_punct("}") {
                if depth == 0 {
                    return;
                }
                depth -= 1;
            } else if token.is_punct(";") && depth == 0 {
                self.pos += 1;
                return;
            }
            self.pos += 1;
        }
    }

    // ── declarations ────────────────────────────────────────────────────

    fn parse_class(mut self) -> Class {
        let mut class = Class::default();

        while let Some(token) = self.peek() {
            let start = self.pos;
            let lower = token.text_lower.clone();

            match lower.as_str() {
                "class" if class.class_declaration_first_token.is_none() => {
                    self.parse_class_header(&mut class)
                }
                "var" => {
                    let (variables, inline) = self.parse_var();
                    class.variables.extend(variables);
                    class.enums.extend(inline.enums);
                    class.structs.extend(inline.structs);
                }
                "const" => {
                    if let Some(constant) = self.parse_const() {
                        class.constants.push(constant);
                    }
                }
                "enum" => {
                    if let Some(declaration) = self.parse_enum() {
                        class.enums.push(declaration);
                    }
                    self.eat(";");
                }
                "struct" => {
                    let mut inline = InlineTypes::default();
                    self.parse_struct(&mut inline);
                    class.enums.extend(inline.enums);
                    class.structs.extend(inline.structs);
                    self.eat(";");
                }
                word if SKIPPED_BLOCKS.contains(&word) => {
                    self.advance();
                    if self.check("{") {
                        self.skip_balanced("{", "}");
                    }
                }
                ";" => {
                    self.advance();
                }
                _ => match self.declaration_kind() {
                    Some(Declaration::Function) => {
                        let function = self.parse_function(None);
                        class.functions.push(function);
                    }
                    Some(Declaration::State) => {
                        let (state, functions) = self.parse_state();
                        class.functions.extend(functions);
                        if let Some(state) = state {
                            class.states.push(state);
                        }
                    }
                    None => {
                        self.error_here(format!("Unexpected '{}'", token_text(self.peek())));
                        self.advance();
                    }
                },
            }

            if self.pos == start {
                self.advance();
            }
        }

        class.errors = self.errors;
        class.tokens = self.tokens;
        class
    }

    /// `class Name extends [Package.]Parent modifiers... ;`
    fn parse_class_header(&mut self, class: &mut Class) {
        class.class_declaration_first_token = self.advance();

        if self.check_word_token() {
            class.name = self.advance_as(SemanticClass::ClassDeclaration);
        } else {
            self.error_here("Expected class name");
        }

        if self.eat_word("extends").is_some() || self.eat_word("expands").is_some() {
            let mut parent = None;
            while self.check_word_token() {
                parent = self.advance_as(SemanticClass::ClassReference);
                if self.eat(".").is_none() {
                    break;
                }
            }
            if parent.is_none() {
                self.error_here("Expected parent class name");
            }
            class.parent = parent;
        }

        while let Some(token) = self.peek() {
            if token.is_punct(";") {
                class.class_declaration_last_token = self.advance();
                return;
            }
            if token.is("var") || self.declaration_kind().is_some() {
                break;
            }
            if token.is_punct("(") {
                self.skip_balanced("(", ")");
                continue;
            }
            if let Some(modifier) = self.advance() {
                class.modifiers.push(modifier);
            }
        }

        self.error_here("Expected ';' after class declaration");
        class.class_declaration_last_token = class.class_declaration_first_token.clone();
    }

    /// Look ahead over modifiers to see whether a function or state
    /// declaration starts here.
    fn declaration_kind(&self) -> Option<Declaration> {
        let mut index = self.pos;
        while let Some(token) = self.tokens.get(index) {
            let lower = token.text_lower.as_str();
            if FUNCTION_KEYWORDS.contains(&lower) {
                return Some(Declaration::Function);
            }
            if lower == "state" {
                return Some(Declaration::State);
            }
            if !DECLARATION_MODIFIERS.contains(&lower) {
                return None;
            }
            index += 1;
            if self.tokens.get(index).is_some_and(|t| t.is_punct("(")) {
                index = self.matching_close(index)? + 1;
            }
        }
        None
    }

    fn matching_close(&self, open_index: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (index, token) in self.tokens.iter().enumerate().skip(open_index) {
            if token.is_punct("(") {
                depth += 1;
            } else if token.is_punct(")") {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
        }
        None
    }

    fn parse_function(&mut self, state: Option<Token>) -> Function {
        let mut modifiers = Vec::new();
        while !self.check_any_word(FUNCTION_KEYWORDS) && !self.at_end() {
            if let Some(modifier) = self.advance() {
                modifiers.push(modifier);
            }
            if self.check("(") {
                self.skip_balanced("(", ")");
            }
        }

        let keyword = self.advance();
        let is_event = keyword.as_ref().is_some_and(|k| k.is("event"));
        let is_operator = keyword
            .as_ref()
            .is_some_and(|k| k.text_lower.ends_with("operator"));
        if is_operator && self.check("(") {
            self.skip_balanced("(", ")");
        }

        // Header: optional return type followed by the name, up to `(`.
        let header_start = self.pos;
        while let Some(token) = self.peek() {
            if token.is_punct("(") || token.is_punct(";") || token.is_punct("{") {
                break;
            }
            if token.is_punct("<") {
                self.skip_angles();
                continue;
            }
            self.pos += 1;
        }
        let header_end = self.pos;

        let mut name = None;
        let mut return_type = None;
        if header_end > header_start {
            let name_index = header_end - 1;
            if let Some(token) = self.tokens.get_mut(name_index) {
                if token.class == SemanticClass::Identifier {
                    token.class = SemanticClass::FunctionDeclaration;
                }
                name = Some(token.clone());
            }
            if name_index > header_start {
                if let Some(token) = self.tokens.get_mut(header_start) {
                    if token.class == SemanticClass::Identifier {
                        token.class = SemanticClass::TypeReference;
                    }
                    return_type = Some(token.clone());
                }
            }
        } else {
            self.error_here("Expected function name");
        }

        let params = if self.check("(") {
            self.parse_params()
        } else {
            self.error_here("Expected '(' after function name");
            Vec::new()
        };

        // Trailing specifiers such as `const`.
        while self.check_word_token() {
            self.advance();
        }

        let mut function = Function {
            name,
            is_event,
            modifiers,
            return_type,
            params,
            body: Vec::new(),
            body_first_token: None,
            body_last_token: None,
            state,
        };

        if self.check("{") {
            function.body_first_token = self.advance();
            let (body, last) = self.parse_block_body();
            function.body = body;
            function.body_last_token = last.or_else(|| function.body_first_token.clone());
        } else if self.eat(";").is_none() {
            self.error_here("Expected function body or ';'");
            self.recover_to_semicolon();
        }

        function
    }

    fn parse_params(&mut self) -> Vec<Parameter> {
        self.advance();
        let mut params = Vec::new();

        loop {
            let mut tokens: Vec<usize> = Vec::new();
            let mut depth = 0usize;
            while let Some(token) = self.peek() {
                if depth == 0 && (token.is_punct(",") || token.is_punct(")")) {
                    break;
                }
                if token.is_punct("{") || token.is_punct(";") {
                    break;
                }
                if token.is_punct("(") || token.is_punct("[") {
                    depth += 1;
                } else if token.is_punct(")") || token.is_punct("]") {
                    depth = depth.saturating_sub(1);
                }
                tokens.push(self.pos);
                self.pos += 1;
            }

            if let Some(param) = self.build_param(&tokens) {
                params.push(param);
            }

            if self.eat(",").is_some() {
                continue;
            }
            if self.eat(")").is_none() {
                self.error_here("Expected ')' after parameters");
            }
            break;
        }

        params
    }

    fn build_param(&mut self, indices: &[usize]) -> Option<Parameter> {
        let declaration_end = indices
            .iter()
            .position(|&i| self.tokens[i].is_punct("=") || self.tokens[i].is_punct("["))
            .unwrap_or(indices.len());
        let declaration = &indices[..declaration_end];

        let mut is_optional = false;
        let mut is_out = false;
        let mut type_start = None;
        for (offset, &index) in declaration.iter().enumerate() {
            let token = &self.tokens[index];
            match token.text_lower.as_str() {
                "optional" => is_optional = true,
                "out" => is_out = true,
                lower if PARAM_MODIFIERS.contains(&lower) => {}
                _ => {
                    type_start = Some(offset);
                    break;
                }
            }
        }

        let type_start = type_start?;
        let name_offset = declaration.iter().rposition(|&i| self.tokens[i].is_word())?;

        let name = if name_offset > type_start {
            let token = &mut self.tokens[declaration[name_offset]];
            if token.class == SemanticClass::Identifier {
                token.class = SemanticClass::VariableDeclaration;
            }
            Some(token.clone())
        } else {
            None
        };

        let type_end = if name.is_some() {
            name_offset
        } else {
            declaration.len()
        };
        let type_indices = &declaration[type_start..type_end];
        let type_text: String = type_indices
            .iter()
            .map(|&i| self.tokens[i].text.as_str())
            .collect();
        let type_name = type_indices.first().map(|&i| {
            let token = &mut self.tokens[i];
            if token.class == SemanticClass::Identifier {
                token.class = SemanticClass::TypeReference;
            }
            token.clone()
        });

        Some(Parameter {
            name,
            type_name,
            type_text,
            is_optional,
            is_out,
        })
    }

    /// Parse a type reference such as `int`, `array<int>` or `class<Actor>`.
    fn parse_type(&mut self) -> (Option<Token>, String) {
        if !self.check_word_token() {
            self.error_here("Expected type");
            return (None, String::new());
        }
        let type_name = self.advance_as(SemanticClass::TypeReference);
        let mut text = type_name
            .as_ref()
            .map(|t| t.text.clone())
            .unwrap_or_default();
        if self.check("<") {
            text.push_str(&self.skip_angles());
        }
        (type_name, text)
    }

    /// Declared names after a type: `A, B[4], C<Meta>;`
    fn parse_declarator_names(&mut self) -> Vec<Token> {
        let mut names = Vec::new();
        loop {
            if self.check_word_token() {
                if let Some(name) = self.advance_as(SemanticClass::VariableDeclaration) {
                    names.push(name);
                }
            } else {
                self.error_here("Expected variable name");
                self.recover_to_semicolon();
                return names;
            }
            if self.check("[") {
                self.skip_balanced("[", "]");
            }
            if self.check("<") {
                self.skip_angles();
            }
            if self.eat(",").is_some() {
                continue;
            }
            if self.eat(";").is_none() {
                self.error_here("Expected ';'");
                self.recover_to_semicolon();
            }
            return names;
        }
    }

    fn parse_var(&mut self) -> (Vec<Variable>, InlineTypes) {
        self.advance();
        let mut inline = InlineTypes::default();

        if self.check("(") {
            self.skip_balanced("(", ")");
        }
        while self.check_any_word(VAR_MODIFIERS) {
            self.advance();
            if self.check("(") {
                self.skip_balanced("(", ")");
            }
        }

        let (type_name, type_text) = if self.check_word("enum") {
            let declaration = self.parse_enum();
            let name = declaration.as_ref().map(|e| e.name.clone());
            inline.enums.extend(declaration);
            let text = name.as_ref().map(|t| t.text.clone()).unwrap_or_default();
            (name, text)
        } else if self.check_word("struct") {
            let name = self.parse_struct(&mut inline);
            let text = name.as_ref().map(|t| t.text.clone()).unwrap_or_default();
            (name, text)
        } else {
            self.parse_type()
        };

        if type_name.is_none() {
            self.recover_to_semicolon();
            return (Vec::new(), inline);
        }

        let variables = self
            .parse_declarator_names()
            .into_iter()
            .map(|name| Variable {
                name,
                type_name: type_name.clone(),
                type_text: type_text.clone(),
            })
            .collect();
        (variables, inline)
    }

    fn parse_const(&mut self) -> Option<Constant> {
        self.advance();
        if !self.check_word_token() {
            self.error_here("Expected constant name");
            self.recover_to_semicolon();
            return None;
        }
        let name = self.advance_as(SemanticClass::VariableDeclaration)?;
        let mut value = None;
        if self.eat("=").is_some() {
            value = self.peek().cloned();
        }
        self.recover_to_semicolon();
        Some(Constant { name, value })
    }

    /// `enum Name { A, B };` without the trailing semicolon.
    fn parse_enum(&mut self) -> Option<Enum> {
        self.advance();
        if !self.check_word_token() {
            self.error_here("Expected enum name");
            return None;
        }
        let name = self.advance_as(SemanticClass::TypeReference)?;
        let mut values = Vec::new();

        if self.expect("{").is_some() {
            while let Some(token) = self.peek() {
                if token.is_punct("}") {
                    self.advance();
                    break;
                }
                if token.is_word() {
                    if let Some(value) = self.advance_as(SemanticClass::VariableDeclaration) {
                        values.push(value);
                    }
                    if self.check("<") {
                        self.skip_angles();
                    }
                } else if token.is_punct(";") {
                    self.error_here("Expected '}' to close enum");
                    break;
                } else {
                    self.advance();
                }
            }
        }

        Some(Enum { name, values })
    }

    /// `struct [modifiers] Name [extends Base] { ... }`; returns the name.
    fn parse_struct(&mut self, inline: &mut InlineTypes) -> Option<Token> {
        self.advance();

        let mut name_index = None;
        while let Some(token) = self.peek() {
            if token.is_punct("{") || token.is("extends") || token.is_punct(";") {
                break;
            }
            if token.is_punct("(") {
                self.skip_balanced("(", ")");
                continue;
            }
            if token.is_word() {
                name_index = Some(self.pos);
            }
            self.pos += 1;
        }

        let name = name_index.map(|index| {
            let token = &mut self.tokens[index];
            if token.class == SemanticClass::Identifier {
                token.class = SemanticClass::TypeReference;
            }
            token.clone()
        });
        if name.is_none() {
            self.error_here("Expected struct name");
        }

        let mut parent = None;
        if self.eat_word("extends").is_some() {
            while self.check_word_token() {
                parent = self.advance_as(SemanticClass::TypeReference);
                if self.eat(".").is_none() {
                    break;
                }
            }
        }

        let mut members = Vec::new();
        if self.expect("{").is_some() {
            while let Some(token) = self.peek() {
                let start = self.pos;
                let lower = token.text_lower.clone();
                match lower.as_str() {
                    "}" => {
                        self.advance();
                        break;
                    }
                    "var" => {
                        let (variables, nested) = self.parse_var();
                        members.extend(variables);
                        inline.enums.extend(nested.enums);
                        inline.structs.extend(nested.structs);
                    }
                    "enum" => {
                        if let Some(declaration) = self.parse_enum() {
                            inline.enums.push(declaration);
                        }
                        self.eat(";");
                    }
                    "struct" => {
                        self.parse_struct(inline);
                        self.eat(";");
                    }
                    word if SKIPPED_BLOCKS.contains(&word) => {
                        self.advance();
                        if self.check("{") {
                            self.skip_balanced("{", "}");
                        }
                    }
                    _ => {
                        self.advance();
                    }
                }
                if self.pos == start {
                    self.advance();
                }
            }
        }

        if let Some(name) = &name {
            inline.structs.push(Struct {
                name: name.clone(),
                parent,
                members,
            });
        }
        name
    }

    /// `[auto] state [()] Name [extends Base] { ... }`
    fn parse_state(&mut self) -> (Option<State>, Vec<Function>) {
        while !self.check_word("state") && !self.at_end() {
            self.advance();
        }
        self.advance();
        if self.check("(") {
            self.skip_balanced("(", ")");
        }

        let name = if self.check_word_token() {
            self.advance_as(SemanticClass::ClassDeclaration)
        } else {
            self.error_here("Expected state name");
            None
        };

        let mut parent = None;
        if self.eat_word("extends").is_some() && self.check_word_token() {
            parent = self.advance_as(SemanticClass::ClassReference);
        }

        let mut functions = Vec::new();
        let mut code = Vec::new();

        if self.expect("{").is_some() {
            while let Some(token) = self.peek() {
                let start = self.pos;
                if token.is_punct("}") {
                    self.advance();
                    break;
                }
                if token.is("ignores") {
                    self.recover_to_semicolon();
                } else if matches!(self.declaration_kind(), Some(Declaration::Function)) {
                    functions.push(self.parse_function(name.clone()));
                } else if let Some(statement) = self.parse_statement() {
                    code.push(statement);
                }
                if self.pos == start {
                    self.error_here(format!("Unexpected '{}'", token_text(self.peek())));
                    self.advance();
                }
            }
        }

        let state = name.map(|name| State { name, parent, code });
        (state, functions)
    }

    // ── statements ──────────────────────────────────────────────────────

    /// Parse statements after an opening `{` up to and including the
    /// matching `}`. Returns the statements and the closing token.
    fn parse_block_body(&mut self) -> (Vec<Statement>, Option<Token>) {
        let mut statements = Vec::new();
        while let Some(token) = self.peek() {
            if token.is_punct("}") {
                let close = self.advance();
                return (statements, close);
            }
            let start = self.pos;
            if let Some(statement) = self.parse_statement() {
                statements.push(statement);
            }
            if self.pos == start {
                self.error_here(format!("Unexpected '{}'", token_text(self.peek())));
                self.advance();
            }
        }
        self.error_here("Expected '}'");
        let last = self.tokens.last().cloned();
        (statements, last)
    }

    /// The statement or block after a control header, flattened into a list.
    fn parse_branch(&mut self) -> Vec<Statement> {
        if self.check("{") {
            self.advance();
            let (body, _) = self.parse_block_body();
            return body;
        }
        self.parse_statement().into_iter().collect()
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        let depth = self.depth;
        let statement = if self.descend() {
            self.parse_statement_at_depth()
        } else {
            self.skip_nested_statement();
            None
        };
        self.depth = depth;
        statement
    }

    fn parse_statement_at_depth(&mut self) -> Option<Statement> {
        let token = self.peek()?.clone();

        if token.is_punct("{") {
            self.advance();
            let (body, _) = self.parse_block_body();
            return Some(Statement::Block(body));
        }
        if token.is_punct(";") {
            self.advance();
            return None;
        }
        if token.is_punct("}") {
            return None;
        }

        let next_is_colon = self
            .peek_at(1)
            .is_some_and(|t| t.is_punct(":"));

        match token.text_lower.as_str() {
            "local" => Some(self.parse_local()),
            "if" => {
                let keyword = self.advance()?;
                let header = self.parse_paren_header();
                let body = self.parse_branch();
                let else_body = if self.eat_word("else").is_some() {
                    self.parse_branch()
                } else {
                    Vec::new()
                };
                Some(control(keyword, header, body, else_body))
            }
            "while" | "switch" => {
                let keyword = self.advance()?;
                let header = self.parse_paren_header();
                let body = self.parse_branch();
                Some(control(keyword, header, body, Vec::new()))
            }
            "do" => {
                let keyword = self.advance()?;
                let body = self.parse_branch();
                let header = if self.eat_word("until").is_some() {
                    self.parse_paren_header()
                } else {
                    self.error_here("Expected 'until'");
                    Vec::new()
                };
                self.eat(";");
                Some(control(keyword, header, body, Vec::new()))
            }
            "for" => {
                let keyword = self.advance()?;
                let header = self.parse_for_header();
                let body = self.parse_branch();
                Some(control(keyword, header, body, Vec::new()))
            }
            "foreach" => {
                let keyword = self.advance()?;
                let header = self.parse_expression().into_iter().collect();
                let body = self.parse_branch();
                Some(control(keyword, header, body, Vec::new()))
            }
            "case" => {
                let keyword = self.advance()?;
                let header = self.parse_expression().into_iter().collect();
                self.expect(":");
                Some(control(keyword, header, Vec::new(), Vec::new()))
            }
            "default" if next_is_colon => {
                let keyword = self.advance()?;
                self.advance();
                Some(control(keyword, Vec::new(), Vec::new(), Vec::new()))
            }
            "return" | "goto" => {
                let keyword = self.advance()?;
                let header = if self.check(";") || self.check("}") {
                    Vec::new()
                } else {
                    self.parse_expression().into_iter().collect()
                };
                self.finish_statement();
                Some(control(keyword, header, Vec::new(), Vec::new()))
            }
            "break" | "continue" | "stop" => {
                let keyword = self.advance()?;
                self.finish_statement();
                Some(control(keyword, Vec::new(), Vec::new(), Vec::new()))
            }
            "assert" => {
                let keyword = self.advance()?;
                let header = self.parse_paren_header();
                self.finish_statement();
                Some(control(keyword, header, Vec::new(), Vec::new()))
            }
            _ if next_is_colon && token.class == SemanticClass::Identifier => {
                let label = self.advance()?;
                self.advance();
                Some(Statement::Label(label))
            }
            _ => {
                let start = self.pos;
                match self.parse_expression() {
                    Some(expression) => {
                        self.finish_statement();
                        Some(Statement::Expression(expression))
                    }
                    None if self.pos == start => {
                        self.error_here(format!("Unexpected '{}'", token.text));
                        self.advance();
                        None
                    }
                    None => {
                        self.finish_statement();
                        None
                    }
                }
            }
        }
    }

    /// Consume the `;` ending a simple statement, recovering when missing.
    fn finish_statement(&mut self) {
        if self.eat(";").is_some() || self.check("}") {
            return;
        }
        self.error_here("Expected ';'");
        self.recover_to_semicolon();
    }

    fn parse_local(&mut self) -> Statement {
        let keyword = self.advance().unwrap_or_else(|| Token::new("local", SemanticClass::Keyword, 0, 0));
        let (type_name, type_text) = self.parse_type();
        let names = if type_name.is_some() {
            self.parse_declarator_names()
        } else {
            self.recover_to_semicolon();
            Vec::new()
        };
        Statement::Local(LocalDeclaration {
            keyword,
            type_name,
            type_text,
            names,
        })
    }

    fn parse_paren_header(&mut self) -> Vec<Expression> {
        if self.expect("(").is_none() {
            return Vec::new();
        }
        let header: Vec<Expression> = self.parse_expression().into_iter().collect();
        if self.eat(")").is_none() {
            self.error_here("Expected ')'");
            self.skip_to_close_paren();
        }
        header
    }

    fn parse_for_header(&mut self) -> Vec<Expression> {
        let mut header = Vec::new();
        if self.expect("(").is_none() {
            return header;
        }
        loop {
            if self.eat(")").is_some() {
                break;
            }
            if self.eat(";").is_some() {
                continue;
            }
            match self.parse_expression() {
                Some(expression) => header.push(expression),
                None => {
                    self.error_here("Expected expression in 'for' header");
                    self.skip_to_close_paren();
                    break;
                }
            }
        }
        header
    }

    /// Recovery inside a parenthesized header: skip to the `)` that closes
    /// the current group without crossing a block boundary.
    fn skip_to_close_paren(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            if token.is_punct("{") || token.is_punct("}") || token.is_punct(";") {
                return;
            }
            if token.is_punct("(") {
                depth += 1;
            } else if token.is_punct(")") {
                self.pos += 1;
                if depth == 0 {
                    return;
                }
                depth -= 1;
                continue;
            }
            self.pos += 1;
        }
    }

    // ── expressions ─────────────────────────────────────────────────────

    fn parse_expression(&mut self) -> Option<Expression> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Option<Expression> {
        let depth = self.depth;
        let expression = if self.descend() {
            self.parse_binary_at_depth(min_precedence)
        } else {
            self.skip_nested_expression();
            None
        };
        self.depth = depth;
        expression
    }

    /// Each operator folded into `lhs` counts as one more nesting level, so
    /// long operator chains stay within `MAX_NESTING` as well.
    fn parse_binary_at_depth(&mut self, min_precedence: u8) -> Option<Expression> {
        let mut lhs = self.parse_unary()?;

        while let Some(token) = self.peek() {
            if token.class != SemanticClass::Operator {
                break;
            }

            if token.is_punct("?") {
                if min_precedence > 2 {
                    break;
                }
                if !self.descend() {
                    self.skip_nested_expression();
                    break;
                }
                let op = self.advance()?;
                let then_branch = self.parse_binary(2);
                self.expect(":");
                let else_branch = self.parse_binary(2);
                let mut args = vec![lhs];
                args.extend(then_branch);
                args.extend(else_branch);
                lhs = Expression::Operator { op, args };
                continue;
            }

            let Some(precedence) = binary_precedence(token) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            if !self.descend() {
                self.skip_nested_expression();
                break;
            }
            let op = self.advance()?;
            // Assignment is right-associative; everything else is left.
            let next_min = if precedence == 1 { 1 } else { precedence + 1 };
            match self.parse_binary(next_min) {
                Some(rhs) => {
                    lhs = Expression::Operator {
                        op,
                        args: vec![lhs, rhs],
                    };
                }
                None => {
                    self.errors.push(ParseError::at(&op, "Expected expression after operator"));
                    lhs = Expression::Operator {
                        op,
                        args: vec![lhs],
                    };
                    break;
                }
            }
        }

        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<Expression> {
        let depth = self.depth;
        let expression = if self.descend() {
            self.parse_unary_at_depth()
        } else {
            self.skip_nested_expression();
            None
        };
        self.depth = depth;
        expression
    }

    fn parse_unary_at_depth(&mut self) -> Option<Expression> {
        let token = self.peek()?;
        let is_prefix = token.class == SemanticClass::Operator
            && matches!(token.text.as_str(), "!" | "-" | "+" | "~" | "++" | "--");
        if is_prefix {
            let op = self.advance()?;
            let operand = self.parse_unary();
            return Some(Expression::Operator {
                op,
                args: operand.into_iter().collect(),
            });
        }
        let primary = self.parse_primary()?;
        Some(self.parse_postfix(primary))
    }

    fn parse_primary(&mut self) -> Option<Expression> {
        let token = self.peek()?.clone();

        match token.class {
            SemanticClass::LiteralString | SemanticClass::LiteralName | SemanticClass::LiteralNumber => {
                self.advance();
                return Some(Expression::Literal(token));
            }
            SemanticClass::Punctuation if token.is_punct("(") => {
                self.advance();
                let inner = self.parse_expression();
                if self.eat(")").is_none() {
                    self.error_here("Expected ')'");
                    self.skip_to_close_paren();
                }
                return inner;
            }
            _ => {}
        }

        if !token.is_word() {
            return None;
        }

        let next = self.peek_at(1).cloned();
        let next_is = |punct: &str| next.as_ref().is_some_and(|t| t.is_punct(punct));
        let next_is_name_literal = next
            .as_ref()
            .is_some_and(|t| t.class == SemanticClass::LiteralName);

        match token.text_lower.as_str() {
            "true" | "false" | "none" => {
                self.advance();
                Some(Expression::Literal(token))
            }
            "new" => self.parse_new(),
            "super" | "global" => {
                let keyword = self.advance()?;
                if self.check("(") {
                    self.skip_balanced("(", ")");
                }
                Some(Expression::Identifier(keyword))
            }
            "class" if next_is("<") => {
                let keyword = self.advance()?;
                self.skip_angles();
                if self.check("(") {
                    let args = self.parse_call_args();
                    return Some(Expression::Operator { op: keyword, args });
                }
                Some(Expression::Identifier(keyword))
            }
            _ if next_is_name_literal => {
                // Object literal: class'Foo', Texture'Pkg.Tex'
                self.advance_as(SemanticClass::ClassReference);
                let literal = self.advance()?;
                Some(Expression::Literal(literal))
            }
            _ if next_is("(") => {
                let callee = self.advance_as(SemanticClass::FunctionReference)?;
                let args = self.parse_call_args();
                Some(Expression::Call { callee, args })
            }
            _ => {
                let identifier = self.advance()?;
                Some(Expression::Identifier(identifier))
            }
        }
    }

    /// `new [(Outer, Name, Flags)] ClassExpr [(Template)]`
    fn parse_new(&mut self) -> Option<Expression> {
        let op = self.advance()?;
        let mut args = if self.check("(") {
            self.parse_call_args()
        } else {
            Vec::new()
        };
        if let Some(target) = self.parse_unary() {
            args.push(target);
        } else {
            self.error_here("Expected class after 'new'");
        }
        Some(Expression::Operator { op, args })
    }

    fn parse_postfix(&mut self, mut expression: Expression) -> Expression {
        loop {
            let wraps = self.check(".") || self.check("[") || self.check("++") || self.check("--");
            if !wraps {
                break;
            }
            if !self.descend() {
                self.skip_nested_expression();
                break;
            }
            if self.check(".") {
                let Some(member_token) = self.peek_at(1) else {
                    break;
                };
                if !member_token.is_word() {
                    break;
                }
                self.advance();
                let calls = self.peek_at(1).is_some_and(|t| t.is_punct("("));
                let class = if calls {
                    SemanticClass::FunctionReference
                } else {
                    SemanticClass::Identifier
                };
                let Some(member) = self.advance_as(class) else {
                    break;
                };
                let args = if calls {
                    Some(self.parse_call_args())
                } else {
                    None
                };
                expression = Expression::Member {
                    target: Box::new(expression),
                    member,
                    args,
                };
            } else if self.check("[") {
                let Some(op) = self.advance() else {
                    break;
                };
                let mut args = vec![expression];
                args.extend(self.parse_expression());
                if self.eat("]").is_none() {
                    self.error_here("Expected ']'");
                }
                expression = Expression::Operator { op, args };
            } else if self.check("++") || self.check("--") {
                let Some(op) = self.advance() else {
                    break;
                };
                expression = Expression::Operator {
                    op,
                    args: vec![expression],
                };
            } else {
                break;
            }
        }
        expression
    }

    /// Parse `( arg, arg, ... )`. Omitted optional arguments (`Foo(A,,C)`)
    /// are skipped.
    fn parse_call_args(&mut self) -> Vec<Expression> {
        let mut args = Vec::new();
        if self.expect("(").is_none() {
            return args;
        }

        loop {
            let Some(token) = self.peek() else {
                self.error_here("Expected ')'");
                break;
            };
            if token.is_punct(")") {
                self.advance();
                break;
            }
            if token.is_punct(",") {
                self.advance();
                continue;
            }
            if token.is_punct(";") || token.is_punct("{") || token.is_punct("}") {
                self.error_here("Expected ')'");
                break;
            }
            let start = self.pos;
            match self.parse_expression() {
                Some(arg) => args.push(arg),
                None if self.pos == start => {
                    self.error_here(format!("Unexpected '{}' in argument list", token_text(self.peek())));
                    self.advance();
                }
                None => {}
            }
        }

        args
    }
}

#[derive(Default)]
struct InlineTypes {
    enums: Vec<Enum>,
    structs: Vec<Struct>,
}

fn control(
    keyword: Token,
    header: Vec<Expression>,
    body: Vec<Statement>,
    else_body: Vec<Statement>,
) -> Statement {
    Statement::Control(ControlStatement {
        keyword,
        header,
        body,
        else_body,
    })
}

fn token_text(token: Option<&Token>) -> &str {
    token.map(|t| t.text.as_str()).unwrap_or("end of file")
}

fn binary_precedence(token: &Token) -> Option<u8> {
    let text = token.text_lower.as_str();
    let precedence = match text {
        _ if ASSIGNMENT_OPERATORS.contains(&text) => 1,
        "||" | "^^" => 3,
        "&&" => 4,
        "|" => 5,
        "^" => 6,
        "&" => 7,
        "==" | "!=" | "~=" => 8,
        "<" | ">" | "<=" | ">=" => 9,
        "<<" | ">>" | ">>>" => 10,
        "$" | "@" => 11,
        "+" | "-" => 12,
        "*" | "/" | "%" | "dot" | "cross" | "clockwisefrom" => 13,
        "**" => 14,
        _ => return None,
    };
    Some(precedence)
}
