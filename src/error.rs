//! The three closed error kinds from the spec: parse/static errors (reported
//! immediately and collected for the driver's exit code), runtime errors
//! (abort the current top-level execution), and the I/O error the CLI can
//! hit opening a script file.

use thiserror::Error;

use crate::token::{Token, TokenType};

/// A parse-time or resolve-time static error, attached to the token where it
/// was detected. Both the parser and the resolver route through [`report`]
/// so the two phases share one wire format.
#[derive(Debug, Clone, Error)]
#[error("[line {line}] Error{where_}: {message}")]
pub struct StaticError {
    pub line: i32,
    pub where_: String,
    pub message: String,
}

/// Raised by any runtime evaluation violation (wrong operand types, calling
/// a non-callable, undefined variable, wrong arity, ...).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub token: Token,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: &Token, message: impl Into<String>) -> Self {
        Self {
            token: token.clone(),
            message: message.into(),
        }
    }
}

/// Top-level error the CLI driver can observe. `Io` is not a Lox-level error
/// kind — it never goes through the `[line N] Error: ...` reporting format.
#[derive(Debug, Error)]
pub enum GloxError {
    #[error("{0}")]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reports a static error in the canonical `[line N] Error <where>: <message>`
/// shape immediately to stderr. Called eagerly by both the parser and the
/// resolver; callers additionally collect a [`StaticError`] so the driver
/// can tell "no static errors occurred" without re-parsing stderr.
pub fn report(line: i32, where_: &str, message: &str) {
    eprintln!("[line {line}] Error{where_}: {message}");
}

/// Builds and reports a [`StaticError`] located at `token` — "at end" for
/// the EOF sentinel, "at '<lexeme>'" otherwise.
pub fn parser_error(token: &Token, message: &str) -> StaticError {
    let where_ = if token.token_type == TokenType::Eof {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    };
    report(token.line, &where_, message);
    StaticError {
        line: token.line,
        where_,
        message: message.to_string(),
    }
}

/// Reports a runtime error in the `<message>\n[line N]` shape spec.md
/// mandates for the driver's stderr output.
pub fn report_runtime_error(err: &RuntimeError) {
    eprintln!("{}\n[line {}]", err.message, err.token.line);
}
