//! Library entry point for the `glox` interpreter pipeline — scanner →
//! parser → resolver → interpreter — exposed so the CLI binary and the
//! integration tests under `tests/` drive the same code.

pub mod ast;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

use error::StaticError;
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

/// What running a chunk of source produced, in terms the driver needs to
/// pick an exit code — not a single `Result`, since static errors and a
/// runtime error are reported differently (spec.md §7: batched vs. abort).
pub enum Outcome {
    Ok,
    StaticErrors(Vec<StaticError>),
    RuntimeError(error::RuntimeError),
}

/// Runs one chunk of Lox source against a fresh interpreter (`globals`
/// start empty except for `clock` each time — used by `run_file` and by
/// each top-level call in the REPL driver, which keeps its own
/// long-lived `Interpreter` across lines instead of calling this).
pub fn run(source: &str) -> Outcome {
    let mut interpreter = Interpreter::new(Default::default());
    run_with(&mut interpreter, source)
}

/// Runs one chunk of source against an existing interpreter, so a REPL can
/// keep global state (variables, functions, classes) alive across lines.
pub fn run_with(interpreter: &mut Interpreter, source: &str) -> Outcome {
    let (tokens, had_scan_error) = Scanner::new(source.to_string()).scan_tokens();
    if had_scan_error {
        // The scanner already reported each bad character/unterminated
        // string itself; it has no structured error list to hand back, so
        // the driver only needs to know to treat this as a static failure.
        return Outcome::StaticErrors(Vec::new());
    }

    let (statements, parse_errors) = Parser::new(&tokens).parse();
    if !parse_errors.is_empty() {
        return Outcome::StaticErrors(parse_errors);
    }

    let (locals, resolve_errors) = Resolver::resolve(&statements);
    if !resolve_errors.is_empty() {
        return Outcome::StaticErrors(resolve_errors);
    }

    interpreter.replace_locals(locals);
    match interpreter.interpret(&statements) {
        Ok(()) => Outcome::Ok,
        Err(err) => Outcome::RuntimeError(err),
    }
}
