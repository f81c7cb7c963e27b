//! Command-line front end: file mode and an interactive REPL. Kept thin —
//! everything that isn't "parse CLI args" or "loop over stdin lines" lives
//! in the library target (`lib.rs`) so it's exercised by `tests/` too.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;

use glox::ast::Stmt;
use glox::error::report_runtime_error;
use glox::interpreter::Interpreter;
use glox::parser::Parser;
use glox::resolver::Resolver;
use glox::scanner::Scanner;
use glox::Outcome;

/// A tree-walking interpreter for Lox.
#[derive(ClapParser, Debug)]
#[command(name = "glox", version, about)]
struct Cli {
    /// Script to execute. Omit to start an interactive REPL.
    script: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.script {
        Some(path) => run_file(&path),
        None => run_prompt(),
    }
}

fn run_file(path: &PathBuf) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read {}: {err}", path.display());
            return ExitCode::from(64);
        }
    };

    match glox::run(&source) {
        Outcome::Ok => ExitCode::from(0),
        Outcome::StaticErrors(_) => ExitCode::from(65),
        Outcome::RuntimeError(err) => {
            report_runtime_error(&err);
            ExitCode::from(70)
        }
    }
}

/// An empty line ends the REPL session (spec.md §6). A line that's a single
/// bare expression statement has its value printed automatically, even
/// without `print` — the classic REPL convenience, grounded in the
/// original Go `glox.go`'s REPL unconditionally printing the evaluated
/// expression's value.
fn run_prompt() -> ExitCode {
    let mut interpreter = Interpreter::new(Default::default());
    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        let bytes_read = stdin.lock().read_line(&mut line).unwrap_or(0);
        if bytes_read == 0 || line.trim().is_empty() {
            break;
        }

        execute_line(&mut interpreter, &line);
    }

    ExitCode::from(0)
}

/// Each static error was already written to stderr as it was detected
/// (parser_error/report); a runtime error aborts just this line and the
/// loop carries on to the next one, per spec.md §5.
fn execute_line(interpreter: &mut Interpreter, source: &str) {
    let (tokens, had_scan_error) = Scanner::new(source.to_string()).scan_tokens();
    if had_scan_error {
        return;
    }

    let (statements, parse_errors) = Parser::new(&tokens).parse();
    if !parse_errors.is_empty() {
        return;
    }

    // A single bare expression statement has its value printed
    // automatically (no trailing `print`, no other statements on the line).
    if let [Stmt::Expression(expr)] = statements.as_slice() {
        let (locals, resolve_errors) = Resolver::resolve(&statements);
        if !resolve_errors.is_empty() {
            return;
        }
        interpreter.replace_locals(locals);
        match interpreter.evaluate_for_repl(expr) {
            Ok(value) => println!("{}", value.stringify()),
            Err(err) => report_runtime_error(&err),
        }
        return;
    }

    let (locals, resolve_errors) = Resolver::resolve(&statements);
    if !resolve_errors.is_empty() {
        return;
    }
    interpreter.replace_locals(locals);

    if let Err(err) = interpreter.interpret(&statements) {
        report_runtime_error(&err);
    }
}
