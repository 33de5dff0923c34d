//! Query lexer — turns expression text into a token stream.
//!
//! Tokens carry the byte position they started at so parse errors can point
//! back into the query text. Two-character operators (`==`, `!=`, `<=`,
//! `>=`, `//`, `|=`, `+=`, `-=`, `*=`, `/=`, `//=`, `..`) are matched
//! greedily. A `-` directly followed by a digit lexes as the sign of a
//! number literal regardless of context, so `a-1` needs whitespace to mean
//! subtraction.

use crate::error::{Error, Result};

/// The kind of a lexed token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Structural
    Dot,
    DotDot,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Pipe,
    Colon,
    Semicolon,
    Comma,
    Question,

    // Literals
    Number(f64),
    String(String),
    True,
    False,
    Null,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Comparison
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,

    // Logical
    And,
    Or,
    Not,

    // Alternative
    Alt,

    // Assignment family: tokenized, frozen at unsupported downstream
    Assign,
    UpdateAssign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    AltAssign,

    // Keywords
    If,
    Then,
    Else,
    Elif,
    End,
    As,
    Def,
    Try,
    Catch,
    Reduce,
    Foreach,
    While,
    Until,

    /// Word matching `[A-Za-z_][A-Za-z0-9_]*` that is not a keyword.
    Ident(String),

    /// Format directive `@name`.
    Format(String),

    Eof,
}

/// A token plus the byte offset it started at in the query text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word {
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "if" => TokenKind::If,
        "then" => TokenKind::Then,
        "else" => TokenKind::Else,
        "elif" => TokenKind::Elif,
        "end" => TokenKind::End,
        "as" => TokenKind::As,
        "def" => TokenKind::Def,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "reduce" => TokenKind::Reduce,
        "foreach" => TokenKind::Foreach,
        "while" => TokenKind::While,
        "until" => TokenKind::Until,
        _ => return None,
    };
    Some(kind)
}

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
}

impl Lexer {
    pub fn new(query: &str) -> Self {
        Lexer {
            input: query.chars().collect(),
            pos: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos + 1).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn error(&self, position: usize, message: impl Into<String>) -> Error {
        Error::Lex {
            position,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.current().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn read_word(&mut self) -> String {
        let start = self.pos;
        while self
            .current()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }
        self.input[start..self.pos].iter().collect()
    }

    fn read_number(&mut self) -> Result<f64> {
        let start = self.pos;
        if self.current() == Some('-') {
            self.advance();
        }
        while self.current().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.current() == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.current().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.current(), Some('e') | Some('E')) {
            self.advance();
            if matches!(self.current(), Some('+') | Some('-')) {
                self.advance();
            }
            while self.current().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text: String = self.input[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map_err(|_| self.error(start, format!("Malformed number '{}'", text)))
    }

    fn read_string(&mut self) -> Result<String> {
        let start = self.pos;
        self.advance(); // opening quote
        let mut out = String::new();
        while let Some(c) = self.current() {
            match c {
                '"' => {
                    self.advance();
                    return Ok(out);
                }
                '\\' => {
                    self.advance();
                    match self.current() {
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some('r') => out.push('\r'),
                        Some('\\') => out.push('\\'),
                        Some('"') => out.push('"'),
                        Some('/') => out.push('/'),
                        Some(other) => {
                            return Err(self.error(
                                self.pos,
                                format!("Invalid escape sequence '\\{}'", other),
                            ))
                        }
                        None => return Err(self.error(start, "Unterminated string")),
                    }
                    self.advance();
                }
                _ => {
                    out.push(c);
                    self.advance();
                }
            }
        }
        Err(self.error(start, "Unterminated string"))
    }

    /// Tokenize the whole query. The returned stream always ends in `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            let position = self.pos;
            let Some(c) = self.current() else { break };

            let kind = match c {
                '.' => {
                    self.advance();
                    if self.current() == Some('.') {
                        self.advance();
                        TokenKind::DotDot
                    } else {
                        TokenKind::Dot
                    }
                }
                '[' => {
                    self.advance();
                    TokenKind::LBracket
                }
                ']' => {
                    self.advance();
                    TokenKind::RBracket
                }
                '{' => {
                    self.advance();
                    TokenKind::LBrace
                }
                '}' => {
                    self.advance();
                    TokenKind::RBrace
                }
                '(' => {
                    self.advance();
                    TokenKind::LParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RParen
                }
                ':' => {
                    self.advance();
                    TokenKind::Colon
                }
                ';' => {
                    self.advance();
                    TokenKind::Semicolon
                }
                ',' => {
                    self.advance();
                    TokenKind::Comma
                }
                '?' => {
                    self.advance();
                    TokenKind::Question
                }
                '|' => {
                    self.advance();
                    if self.current() == Some('=') {
                        self.advance();
                        TokenKind::UpdateAssign
                    } else {
                        TokenKind::Pipe
                    }
                }
                '+' => {
                    self.advance();
                    if self.current() == Some('=') {
                        self.advance();
                        TokenKind::PlusAssign
                    } else {
                        TokenKind::Plus
                    }
                }
                '*' => {
                    self.advance();
                    if self.current() == Some('=') {
                        self.advance();
                        TokenKind::StarAssign
                    } else {
                        TokenKind::Star
                    }
                }
                '%' => {
                    self.advance();
                    TokenKind::Percent
                }
                '/' => {
                    self.advance();
                    if self.current() == Some('/') {
                        self.advance();
                        if self.current() == Some('=') {
                            self.advance();
                            TokenKind::AltAssign
                        } else {
                            TokenKind::Alt
                        }
                    } else if self.current() == Some('=') {
                        self.advance();
                        TokenKind::SlashAssign
                    } else {
                        TokenKind::Slash
                    }
                }
                '=' => {
                    self.advance();
                    if self.current() == Some('=') {
                        self.advance();
                        TokenKind::Eq
                    } else {
                        TokenKind::Assign
                    }
                }
                '!' => {
                    self.advance();
                    if self.current() == Some('=') {
                        self.advance();
                        TokenKind::NotEq
                    } else {
                        return Err(self.error(position, "Unexpected '!' (did you mean '!='?)"));
                    }
                }
                '<' => {
                    self.advance();
                    if self.current() == Some('=') {
                        self.advance();
                        TokenKind::LessEq
                    } else {
                        TokenKind::Less
                    }
                }
                '>' => {
                    self.advance();
                    if self.current() == Some('=') {
                        self.advance();
                        TokenKind::GreaterEq
                    } else {
                        TokenKind::Greater
                    }
                }
                '-' => {
                    if self.peek() == Some('=') {
                        self.advance();
                        self.advance();
                        TokenKind::MinusAssign
                    } else if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        TokenKind::Number(self.read_number()?)
                    } else {
                        self.advance();
                        TokenKind::Minus
                    }
                }
                '"' => TokenKind::String(self.read_string()?),
                '@' => {
                    self.advance();
                    if self
                        .current()
                        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                    {
                        TokenKind::Format(self.read_word())
                    } else {
                        return Err(self.error(position, "Expected format name after '@'"));
                    }
                }
                c if c.is_ascii_digit() => TokenKind::Number(self.read_number()?),
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let word = self.read_word();
                    keyword(&word).unwrap_or(TokenKind::Ident(word))
                }
                other => {
                    return Err(self.error(position, format!("Unexpected character '{}'", other)))
                }
            };

            tokens.push(Token { kind, position });
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            position: self.pos,
        });
        Ok(tokens)
    }
}
