use std::fmt;

/// The closed set of lexical categories the scanner produces.
///
/// `String`/`Number` carry their decoded literal inline rather than in a
/// separate `literal` field on `Token` — there's exactly one token kind per
/// literal shape, so the literal belongs on the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Single-character tokens.
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,

    // One or two character tokens.
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals.
    Identifier,
    String { literal: String },
    Number { literal: f64 },

    // Keywords.
    And,
    Class,
    Else,
    False,
    Fun,
    For,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,

    Eof,
}

// Built at compile time from the keyword list in build.rs.
include!(concat!(env!("OUT_DIR"), "/keywords.rs"));

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub line: i32,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: impl Into<String>, line: i32) -> Self {
        Self {
            token_type,
            lexeme: lexeme.into(),
            line,
        }
    }

    pub fn eof(line: i32) -> Self {
        Self::new(TokenType::Eof, "", line)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lexeme)
    }
}
