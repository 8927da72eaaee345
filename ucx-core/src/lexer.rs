use crate::token::{is_keyword, is_word_operator, SemanticClass, Token};

/// Multi-character operators, longest first so the scanner can take the
/// first prefix that matches.
const OPERATORS: &[&str] = &[
    ">>>", "<<", ">>", "==", "!=", "<=", ">=", "&&", "||", "^^", "++", "--", "+=", "-=",
    "*=", "/=", "$=", "@=", "~=", "**",
];

const SINGLE_OPERATORS: &str = "+-*/%<>=!~&|^$@?:.#";
const PUNCTUATION: &str = "(){}[];,";

/// Convert source text into a flat, ordered token stream.
///
/// Whitespace, comments, `#exec` directives and backtick macro lines are
/// skipped. Lexing never fails: characters that start no token become
/// single-character tokens classified as [`SemanticClass::None`].
pub fn tokenize(text: &str) -> Vec<Token> {
    Lexer::new(text).run()
}

struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: u32,
    column: u32,
    /// Whether anything but whitespace was consumed since the last newline.
    line_has_content: bool,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            index: 0,
            line: 0,
            column: 0,
            line_has_content: false,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Token> {
        while let Some(c) = self.peek(0) {
            if c.is_whitespace() {
                self.bump();
                continue;
            }

            match (c, self.peek(1)) {
                ('/', Some('/')) => self.skip_line(),
                ('/', Some('*')) => self.skip_block_comment(),
                ('#', _) if !self.line_has_content => self.skip_line(),
                ('`', _) => self.skip_line(),
                _ => self.scan_token(c),
            }
        }
        self.tokens
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek(0)?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
            self.line_has_content = false;
        } else {
            self.column += c.len_utf16() as u32;
            self.line_has_content |= !c.is_whitespace();
        }
        Some(c)
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) {
        self.bump();
        self.bump();
        while let Some(c) = self.bump() {
            if c == '*' && self.peek(0) == Some('/') {
                self.bump();
                return;
            }
        }
    }

    fn scan_token(&mut self, c: char) {
        let (line, column, start) = (self.line, self.column, self.index);

        let class = if c.is_alphabetic() || c == '_' {
            self.scan_word(start)
        } else if c.is_ascii_digit() || (c == '.' && self.peek(1).is_some_and(|d| d.is_ascii_digit())) {
            self.scan_number();
            SemanticClass::LiteralNumber
        } else if c == '"' {
            self.scan_quoted('"');
            SemanticClass::LiteralString
        } else if c == '\'' {
            self.scan_quoted('\'');
            SemanticClass::LiteralName
        } else if PUNCTUATION.contains(c) {
            self.bump();
            SemanticClass::Punctuation
        } else if let Some(op) = self.match_operator() {
            for _ in 0..op.chars().count() {
                self.bump();
            }
            SemanticClass::Operator
        } else if SINGLE_OPERATORS.contains(c) {
            self.bump();
            SemanticClass::Operator
        } else {
            self.bump();
            SemanticClass::None
        };

        let text: String = self.chars[start..self.index].iter().collect();
        self.tokens.push(Token::new(text, class, line, column));
    }

    fn scan_word(&mut self, start: usize) -> SemanticClass {
        while self
            .peek(0)
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.bump();
        }
        let lower: String = self.chars[start..self.index]
            .iter()
            .collect::<String>()
            .to_lowercase();
        if is_keyword(&lower) {
            SemanticClass::Keyword
        } else if is_word_operator(&lower) {
            SemanticClass::Operator
        } else {
            SemanticClass::Identifier
        }
    }

    fn scan_number(&mut self) {
        if self.peek(0) == Some('0') && matches!(self.peek(1), Some('x' | 'X')) {
            self.bump();
            self.bump();
            while self.peek(0).is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            return;
        }

        while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek(0) == Some('.') && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(0), Some('e' | 'E'))
            && (self.peek(1).is_some_and(|c| c.is_ascii_digit())
                || (matches!(self.peek(1), Some('+' | '-'))
                    && self.peek(2).is_some_and(|c| c.is_ascii_digit())))
        {
            self.bump();
            self.bump();
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(0), Some('f' | 'F')) {
            self.bump();
        }
    }

    /// Scan a quoted literal. Unterminated literals stop at the end of the
    /// line so a stray quote cannot swallow the rest of the file.
    fn scan_quoted(&mut self, quote: char) {
        self.bump();
        while let Some(c) = self.peek(0) {
            match c {
                '\n' => return,
                '\\' => {
                    self.bump();
                    if self.peek(0).is_some_and(|n| n != '\n') {
                        self.bump();
                    }
                }
                c if c == quote => {
                    self.bump();
                    return;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn match_operator(&self) -> Option<&'static str> {
        OPERATORS.iter().copied().find(|op| {
            op.chars()
                .enumerate()
                .all(|(i, c)| self.peek(i) == Some(c))
        })
    }
}
