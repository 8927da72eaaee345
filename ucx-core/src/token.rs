use serde::Serialize;

/// Semantic classification attached to every token.
///
/// The lexer only distinguishes words, literals, operators and punctuation;
/// the parser refines identifiers into declaration and reference classes when
/// it copies them into the AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SemanticClass {
    /// Unrecognized character or unresolved word.
    None,
    Keyword,
    Identifier,
    FunctionReference,
    FunctionDeclaration,
    ClassDeclaration,
    ClassReference,
    TypeReference,
    VariableDeclaration,
    LiteralString,
    LiteralName,
    LiteralNumber,
    Operator,
    Punctuation,
}

/// A positioned token.
///
/// `line` and `position` are 0-based; `position` counts UTF-16 code units so
/// it can be handed to an LSP client without conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub text_lower: String,
    pub class: SemanticClass,
    pub line: u32,
    pub position: u32,
}

impl Token {
    pub fn new(text: impl Into<String>, class: SemanticClass, line: u32, position: u32) -> Self {
        let text = text.into();
        let text_lower = text.to_lowercase();
        Self {
            text,
            text_lower,
            class,
            line,
            position,
        }
    }

    /// Length of the token text in UTF-16 code units.
    pub fn len_utf16(&self) -> u32 {
        self.text.encode_utf16().count() as u32
    }

    /// Column one past the last code unit of the token.
    pub fn end_position(&self) -> u32 {
        self.position + self.len_utf16()
    }

    /// True when the token starts exactly at `line`/`position`.
    pub fn starts_at(&self, line: u32, position: u32) -> bool {
        self.line == line && self.position == position
    }

    /// True when `column` falls inside `[position, end_position)` on `line`.
    pub fn contains(&self, line: u32, column: u32) -> bool {
        self.line == line && column >= self.position && column < self.end_position()
    }

    pub fn is_keyword(&self) -> bool {
        self.class == SemanticClass::Keyword
    }

    /// True for identifiers and keywords, i.e. anything that spells a word.
    pub fn is_word(&self) -> bool {
        self.text
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        matches!(self.class, SemanticClass::Punctuation | SemanticClass::Operator)
            && self.text == punct
    }

    /// Case-insensitive comparison against a lowercase keyword.
    pub fn is(&self, lower: &str) -> bool {
        self.text_lower == lower
    }
}

/// Reserved words of the language, lowercase.
///
/// This is a superset of the words the undefined-function rule must never
/// treat as calls: it also covers declaration keywords, modifiers, primitive
/// type names (so casts such as `int(X)` are not mistaken for calls) and the
/// intrinsic forms `vect`/`rot`.
pub const KEYWORDS: &[&str] = &[
    // control flow
    "if", "else", "switch", "case", "while", "for", "foreach", "return", "break",
    "continue", "default", "do", "until", "goto", "stop", "assert",
    // values and qualifiers
    "true", "false", "none", "self", "super", "global", "static",
    // expressions
    "new", "class", "log",
    // declarations
    "var", "local", "function", "event", "delegate", "operator", "preoperator",
    "postoperator", "state", "struct", "enum", "const", "extends", "expands",
    "ignores", "defaultproperties", "structdefaultproperties", "cpptext",
    "structcpptext", "replication", "reliable", "unreliable",
    // modifiers
    "abstract", "native", "nativereplication", "final", "simulated", "private",
    "protected", "public", "latent", "iterator", "singular", "exec", "transient",
    "config", "globalconfig", "localized", "editconst", "editinline", "export",
    "noexport", "optional", "out", "coerce", "intrinsic", "placeable",
    "notplaceable", "within", "dependson", "hidecategories", "showcategories",
    "collapsecategories", "dontcollapsecategories", "perobjectconfig",
    "edfindable", "deprecated", "instanced", "editinlinenew",
    "noteditinlinenew",
    // primitive types
    "byte", "int", "bool", "float", "string", "name", "array",
    // intrinsic forms
    "vect", "rot", "arraycount", "enumcount", "nameof", "sizeof",
];

/// Operators spelled as words.
pub const WORD_OPERATORS: &[&str] = &["dot", "cross", "clockwisefrom"];

pub fn is_keyword(lower: &str) -> bool {
    KEYWORDS.contains(&lower)
}

pub fn is_word_operator(lower: &str) -> bool {
    WORD_OPERATORS.contains(&lower)
}
