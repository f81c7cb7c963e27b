//! Static scope-resolution pass between parsing and interpretation.
//!
//! The teacher's version (and the Go original it was ported from) mutated an
//! `&mut Interpreter` as it walked the tree, writing resolved depths directly
//! into the interpreter's own side table. That coupling only existed because
//! Java and Go don't have an easy way to hand back an owned map from a
//! recursive walk; Rust does, so this is a pure function instead —
//! `resolve` takes a finished statement list and returns the side table plus
//! any static errors, with no interpreter in sight. The walk itself (scope
//! stack, declare/define, function-type and class-type tracking) follows the
//! teacher's `resolver.rs` method for method.

use std::collections::HashMap;
use std::mem;

use crate::ast::{Expr, ExprKind, NodeId, Stmt};
use crate::error::{parser_error, StaticError};
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

pub struct Resolver {
    // The stack of scopes currently in scope. Each map is a single block
    // scope; keys are variable names, values record whether the variable's
    // initializer has finished resolving. Only local scopes are tracked —
    // globals are more dynamic in Lox and are left to resolve at runtime.
    scopes: Vec<HashMap<String, bool>>,
    locals: HashMap<NodeId, usize>,
    errors: Vec<StaticError>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl Resolver {
    /// Resolves a whole program, returning the id→depth side table the
    /// interpreter consults for every variable reference, plus any static
    /// errors found along the way (self-read-in-initializer, return outside
    /// a function, `this`/`super` outside a class, a class inheriting from
    /// itself, a name redeclared in the same scope).
    pub fn resolve(statements: &[Stmt]) -> (HashMap<NodeId, usize>, Vec<StaticError>) {
        let mut resolver = Self {
            scopes: Vec::new(),
            locals: HashMap::new(),
            errors: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        };
        resolver.resolve_stmts(statements);
        (resolver.locals, resolver.errors)
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_stmt(statement);
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    // Declaration adds the name to the innermost scope, bound to `false`
    // ("not ready yet"). This is what lets `visit_variable` catch
    // `var a = a;` — reading `a` while its own initializer is still being
    // resolved.
    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.errors.push(parser_error(
                    name,
                    "Already a variable with this name in this scope.",
                ));
            }
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    // Walk from the innermost scope outward; the first scope that has the
    // name is `distance` hops away from here. No match at all means the
    // resolver assumes it's global and leaves `id` out of the side table —
    // the interpreter falls back to a dynamic lookup for those.
    fn resolve_local(&mut self, id: NodeId, name: &Token) {
        for (i, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.locals.insert(id, i);
                return;
            }
        }
    }

    fn resolve_function(&mut self, params: &[Token], body: &[Stmt], kind: FunctionType) {
        let enclosing_function = mem::replace(&mut self.current_function, kind);
        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(body);
        self.end_scope();
        self.current_function = enclosing_function;
    }

    fn resolve_stmt(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
            Stmt::Expression(expr) => self.resolve_expr(expr),
            Stmt::Function(decl) => {
                self.declare(&decl.name);
                // Defined eagerly, before the body is resolved, so a
                // function can recursively refer to itself.
                self.define(&decl.name);
                self.resolve_function(&decl.params, &decl.body, FunctionType::Function);
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::Print(expr) => self.resolve_expr(expr),
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.errors
                        .push(parser_error(keyword, "Can't return from top-level code."));
                }
                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.errors.push(parser_error(
                            keyword,
                            "Can't return a value from an initializer.",
                        ));
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer);
                }
                self.define(name);
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
        }
    }

    // A `this`-only scope is pushed around the method table so every method
    // body finds `this` one hop further out than its own locals — exactly
    // the same trick used for `super`, pushed one level further out still
    // when there's a superclass.
    fn resolve_class(&mut self, name: &Token, superclass: Option<&Expr>, methods: &[std::rc::Rc<crate::ast::FunctionDecl>]) {
        let enclosing_class = mem::replace(
            &mut self.current_class,
            if superclass.is_some() {
                ClassType::Subclass
            } else {
                ClassType::Class
            },
        );

        self.declare(name);
        self.define(name);

        if let Some(superclass_expr) = superclass {
            if let ExprKind::Variable(super_name) = &superclass_expr.kind {
                if super_name.lexeme == name.lexeme {
                    self.errors
                        .push(parser_error(super_name, "A class can't inherit from itself."));
                }
            }
            self.resolve_expr(superclass_expr);

            self.begin_scope();
            self.scopes
                .last_mut()
                .expect("scope just pushed")
                .insert("super".to_string(), true);
        }

        self.begin_scope();
        self.scopes
            .last_mut()
            .expect("scope just pushed")
            .insert("this".to_string(), true);

        for method in methods {
            let kind = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(&method.params, &method.body, kind);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Variable(name) => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.errors.push(parser_error(
                            name,
                            "Can't read local variable in its own initializer.",
                        ));
                    }
                }
                self.resolve_local(expr.id, name);
            }
            ExprKind::Assign { name, value } => {
                self.resolve_expr(value);
                self.resolve_local(expr.id, name);
            }
            ExprKind::Unary { right, .. } => self.resolve_expr(right),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            ExprKind::Grouping(inner) => self.resolve_expr(inner),
            ExprKind::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
            // The property name itself is resolved dynamically at runtime
            // (Lox has no static notion of a class's member set), so only
            // the object expression needs a walk here.
            ExprKind::Get { object, .. } => self.resolve_expr(object),
            ExprKind::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            ExprKind::This(keyword) => {
                if self.current_class == ClassType::None {
                    self.errors
                        .push(parser_error(keyword, "Can't use 'this' outside of a class."));
                } else {
                    self.resolve_local(expr.id, keyword);
                }
            }
            ExprKind::Super { keyword, .. } => {
                match self.current_class {
                    ClassType::None => self
                        .errors
                        .push(parser_error(keyword, "Can't use 'super' outside of a class.")),
                    ClassType::Class => self.errors.push(parser_error(
                        keyword,
                        "Can't use 'super' in a class with no superclass.",
                    )),
                    ClassType::Subclass => {}
                }
                self.resolve_local(expr.id, keyword);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve(source: &str) -> (HashMap<NodeId, usize>, Vec<StaticError>) {
        let (tokens, had_scan_error) = Scanner::new(source.to_string()).scan_tokens();
        assert!(!had_scan_error);
        let (stmts, parse_errors) = Parser::new(&tokens).parse();
        assert!(parse_errors.is_empty(), "{parse_errors:?}");
        Resolver::resolve(&stmts)
    }

    #[test]
    fn reading_a_local_in_its_own_initializer_is_an_error() {
        let (_, errors) = resolve("{ var a = a; }");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn shadowing_at_the_same_scope_is_an_error() {
        let (_, errors) = resolve("{ var a = 1; var a = 2; }");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn return_outside_a_function_is_an_error() {
        let (_, errors) = resolve("return 1;");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn returning_a_value_from_an_initializer_is_an_error() {
        let (_, errors) = resolve("class A { init() { return 1; } }");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn this_outside_a_class_is_an_error() {
        let (_, errors) = resolve("print this;");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn a_class_inheriting_from_itself_is_an_error() {
        let (_, errors) = resolve("class A < A {}");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn super_with_no_superclass_is_an_error() {
        let (_, errors) = resolve("class A { f() { super.g(); } }");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn nested_block_locals_resolve_to_increasing_depth() {
        let (locals, errors) = resolve("{ var a = 1; { print a; } }");
        assert!(errors.is_empty());
        assert_eq!(locals.values().next().copied(), Some(1));
    }
}
