//! End-to-end tests driving the compiled `glox` binary as a subprocess —
//! these exercise the CLI surface (file mode, exit codes, stderr format)
//! that the in-crate unit tests under `src/` can't reach, since they call
//! into the library directly rather than through `main`.

use std::io::Write;
use std::process::{Command, Output};

fn run_file(source: &str) -> Output {
    let mut script = tempfile();
    write!(script, "{source}").expect("write script to temp file");

    Command::new(env!("CARGO_BIN_EXE_glox"))
        .arg(script.path())
        .output()
        .expect("spawn glox")
}

fn tempfile() -> NamedTempFile {
    NamedTempFile::new()
}

/// A minimal temp-file helper so this test file doesn't need an extra
/// dev-dependency just to get a scratch path that cleans itself up.
struct NamedTempFile {
    path: std::path::PathBuf,
    file: std::fs::File,
}

impl NamedTempFile {
    fn new() -> Self {
        let mut path = std::env::temp_dir();
        let unique = format!(
            "glox_e2e_{}_{}.lox",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("system clock is after the Unix epoch")
                .as_nanos()
        );
        path.push(unique);
        let file = std::fs::File::create(&path).expect("create temp script file");
        Self { path, file }
    }

    fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Write for NamedTempFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl Drop for NamedTempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

// spec.md §8 scenario (a): closures capture variables, not values.
#[test]
fn closures_capture_variables_not_values() {
    let output = run_file(
        r#"
        var a = "global";
        {
            fun show() { print a; }
            show();
            var a = "block";
            show();
        }
        "#,
    );
    assert!(output.status.success());
    assert_eq!(stdout(&output), "global\nglobal\n");
}

// spec.md §8 scenario (b): precedence and division.
#[test]
fn arithmetic_precedence_and_division() {
    let output = run_file("print 1 + 2 * 3; print (1 + 2) * 3; print 10 / 4;");
    assert!(output.status.success());
    assert_eq!(stdout(&output), "7\n9\n2.5\n");
}

// spec.md §8 scenario (c): for-loop desugaring.
#[test]
fn for_loop_desugars_and_runs() {
    let output = run_file("for (var i = 0; i < 3; i = i + 1) print i;");
    assert!(output.status.success());
    assert_eq!(stdout(&output), "0\n1\n2\n");
}

// spec.md §8 scenario (d): class with init and method.
#[test]
fn class_init_and_method() {
    let output = run_file(
        r#"
        class Greeter {
            init(name) { this.name = name; }
            hi() { print "hi " + this.name; }
        }
        Greeter("world").hi();
        "#,
    );
    assert!(output.status.success());
    assert_eq!(stdout(&output), "hi world\n");
}

// spec.md §8 scenario (e): inheritance and super.
#[test]
fn inheritance_and_super() {
    let output = run_file(
        r#"
        class A { speak() { print "A"; } }
        class B < A {
            speak() { super.speak(); print "B"; }
        }
        B().speak();
        "#,
    );
    assert!(output.status.success());
    assert_eq!(stdout(&output), "A\nB\n");
}

// spec.md §8 scenario (f): runtime error message and exit code 70.
#[test]
fn runtime_error_reports_line_and_exits_70() {
    let output = run_file("print \"a\" - 1;");
    assert_eq!(output.status.code(), Some(70));
    assert!(stderr(&output).contains("[line 1]"));
}

// spec.md §6: exit code 65 on a static (parse/resolve) error, no execution.
#[test]
fn parse_error_exits_65_without_running_the_program() {
    let output = run_file("print 1 +;\nprint \"never\";");
    assert_eq!(output.status.code(), Some(65));
    assert!(!stdout(&output).contains("never"));
}

// spec.md §6: exit code 65 also covers resolver-level static errors.
#[test]
fn resolver_error_exits_65() {
    let output = run_file("fun f() { return 1; } class A { init() { return 1; } }");
    assert_eq!(output.status.code(), Some(65));
}

// spec.md §8 invariant 4: two binds of the same method are independent
// bound-method values that both see the same `this`.
#[test]
fn bound_methods_are_independent_but_share_this() {
    let output = run_file(
        r#"
        class Counter {
            init() { this.n = 0; }
            bump() { this.n = this.n + 1; return this.n; }
        }
        var c = Counter();
        var a = c.bump;
        var b = c.bump;
        print a();
        print b();
        "#,
    );
    assert!(output.status.success());
    assert_eq!(stdout(&output), "1\n2\n");
}

// spec.md §4.3: `init`'s return value is always the instance, regardless of
// an explicit bare `return;`.
#[test]
fn bare_return_in_initializer_still_yields_the_instance() {
    let output = run_file(
        r#"
        class A {
            init() {
                this.x = 1;
                return;
            }
        }
        print A().x;
        "#,
    );
    assert!(output.status.success());
    assert_eq!(stdout(&output), "1\n");
}

// spec.md §4.1: argument lists over 255 entries are a non-fatal diagnostic,
// not a parser crash — the rest of the file still runs.
#[test]
fn too_many_arguments_is_non_fatal_and_reports_statically() {
    let args = (0..260).map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
    let source = format!("fun f() {{}}\nf({args});");
    let output = run_file(&source);
    assert_eq!(output.status.code(), Some(65));
    assert!(stderr(&output).contains("Can't have more than 255 arguments."));
}

// No top-level invariant in spec.md pins down multi-line REPL behavior, but
// file mode must treat the whole file as one program, not line-by-line.
#[test]
fn multiple_statements_across_lines_share_one_program_scope() {
    let output = run_file("var x = 1;\nx = x + 1;\nprint x;\n");
    assert!(output.status.success());
    assert_eq!(stdout(&output), "2\n");
}

#[test]
fn usage_message_on_too_many_arguments() {
    let output = Command::new(env!("CARGO_BIN_EXE_glox"))
        .arg("a")
        .arg("b")
        .output()
        .expect("spawn glox");
    assert!(!output.status.success());
}
