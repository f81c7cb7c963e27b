//! Recursive-descent parser with one-token lookahead, producing the
//! `Expr`/`Stmt` tree in `ast.rs`. Kept close to the teacher's shape: same
//! token-match-and-advance helper macro (renamed `match_advance!` here so it
//! doesn't shadow the prelude's `matches!` inside the test module below),
//! same method-per-production structure, same synchronize-on-error
//! recovery. What's added on top is the stuff the
//! teacher's own later files (`resolver.rs`, `class.rs`) already assumed
//! existed — `Get`/`Set`/`This`/`Super` assignment targets, node ids for the
//! resolver's side table — and error accumulation instead of an immediate
//! `?`-propagated bailout.

use crate::ast::{Expr, ExprKind, FunctionDecl, LiteralValue, NodeId, Stmt};
use crate::error::{parser_error, StaticError};
use crate::token::{Token, TokenType};

use std::rc::Rc;

pub struct Parser<'t> {
    tokens: &'t [Token],
    current: usize,
    next_id: NodeId,
    errors: Vec<StaticError>,
}

macro_rules! match_advance {
    ( $sel:ident, $( $x:expr ),* ) => {{
        if $( $sel.check($x) )||* {
            $sel.advance();
            true
        } else {
            false
        }
    }};
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            current: 0,
            next_id: 0,
            errors: Vec::new(),
        }
    }

    fn next_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.next_id(),
            kind,
        }
    }

    // program        → declaration* EOF ;
    //
    // A parse error inside one declaration doesn't abort the whole program:
    // `declaration()` swallows it (after synchronizing) and contributes
    // nothing to `statements`, so a syntax error in one statement doesn't
    // prevent parsing the rest of the file.
    pub fn parse(mut self) -> (Vec<Stmt>, Vec<StaticError>) {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        (statements, self.errors)
    }

    // declaration    → classDecl | funDecl | varDecl | statement ;
    fn declaration(&mut self) -> Option<Stmt> {
        let result = if match_advance!(self, TokenType::Class) {
            self.class_declaration()
        } else if match_advance!(self, TokenType::Fun) {
            self.function("function").map(Stmt::Function)
        } else if match_advance!(self, TokenType::Var) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(()) => {
                self.synchronize();
                None
            }
        }
    }

    // classDecl      → "class" IDENTIFIER ( "<" IDENTIFIER )? "{" function* "}" ;
    fn class_declaration(&mut self) -> Result<Stmt, ()> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;
        let superclass = if match_advance!(self, TokenType::Less) {
            let super_name = self.consume(TokenType::Identifier, "Expect superclass name.")?;
            Some(self.expr(ExprKind::Variable(super_name)))
        } else {
            None
        };

        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    // Fields aren't declared up front the way they are in statically typed
    // languages — instances are loose bags of data you add to freely from
    // ordinary imperative code (an assignment inside `init`, usually).

    // funDecl        → "fun" function ;
    // function       → IDENTIFIER "(" parameters? ")" block ;
    // parameters     → IDENTIFIER ( "," IDENTIFIER )* ;
    //
    // Reused for methods inside a class body — `kind` only changes the
    // wording of diagnostics ("Expect method name." vs "Expect function
    // name.").
    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl>, ()> {
        let name = self.consume(TokenType::Identifier, &format!("Expect {kind} name."))?;

        self.consume(TokenType::LeftParen, &format!("Expect '(' after {kind} name."))?;
        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() >= 255 {
                    let next = self.peek().clone();
                    self.error(next, "Can't have more than 255 parameters.");
                }
                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
                if !match_advance!(self, TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;

        self.consume(TokenType::LeftBrace, &format!("Expect '{{' before {kind} body."))?;
        let body = self.block()?;

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    // statement      → exprStmt | printStmt | ifStmt | block | returnStmt
    //                | whileStmt | forStmt ;
    fn statement(&mut self) -> Result<Stmt, ()> {
        if match_advance!(self, TokenType::For) {
            self.for_statement()
        } else if match_advance!(self, TokenType::If) {
            self.if_statement()
        } else if match_advance!(self, TokenType::Print) {
            self.print_statement()
        } else if match_advance!(self, TokenType::Return) {
            self.return_statement()
        } else if match_advance!(self, TokenType::While) {
            self.while_statement()
        } else if match_advance!(self, TokenType::LeftBrace) {
            Ok(Stmt::Block(self.block()?))
        } else {
            self.expression_statement()
        }
    }

    // returnStmt     → "return" expression? ";" ;
    fn return_statement(&mut self) -> Result<Stmt, ()> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    // the else is bound to the nearest preceding if, as usual
    // ifStmt         → "if" "(" expression ")" statement ( "else" statement )? ;
    fn if_statement(&mut self) -> Result<Stmt, ()> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if match_advance!(self, TokenType::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    // block          → "{" declaration* "}" ;
    fn block(&mut self) -> Result<Vec<Stmt>, ()> {
        let mut statements = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    // whileStmt      → "while" "(" expression ")" statement ;
    fn while_statement(&mut self) -> Result<Stmt, ()> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    // forStmt        → "for" "(" ( varDecl | exprStmt | ";" )
    //                   expression? ";" expression? ")" statement ;
    //
    // Desugared entirely here, so the resolver and interpreter never see a
    // dedicated "for" node — only the `{ init; while (cond) { body incr; } }`
    // it expands to.
    fn for_statement(&mut self) -> Result<Stmt, ()> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if match_advance!(self, TokenType::Semicolon) {
            None
        } else if match_advance!(self, TokenType::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenType::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition = condition.unwrap_or_else(|| self.expr(ExprKind::Literal(LiteralValue::Bool(true))));
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    // varDecl        → "var" IDENTIFIER ( "=" expression )? ";" ;
    fn var_declaration(&mut self) -> Result<Stmt, ()> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if match_advance!(self, TokenType::Equal) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    // printStmt      → "print" expression ";" ;
    fn print_statement(&mut self) -> Result<Stmt, ()> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    // exprStmt       → expression ";" ;
    fn expression_statement(&mut self) -> Result<Stmt, ()> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(value))
    }

    // expression     → assignment ;
    fn expression(&mut self) -> Result<Expr, ()> {
        self.assignment()
    }

    // The left side is parsed as an ordinary expression first, then — only
    // if an `=` follows — reinterpreted as an assignment target. A
    // `Variable` becomes `Assign`; a `Get` becomes `Set`; anything else is a
    // (non-fatal) "Invalid assignment target" diagnostic, since the parser
    // isn't in a confused state and doesn't need to synchronize.
    //
    // assignment     → ( call "." )? IDENTIFIER "=" assignment | logic_or ;
    fn assignment(&mut self) -> Result<Expr, ()> {
        let expr = self.logic_or()?;

        if match_advance!(self, TokenType::Equal) {
            let equals = self.previous().clone();
            let value = Box::new(self.assignment()?);

            return match expr.kind {
                ExprKind::Variable(name) => Ok(self.expr(ExprKind::Assign { name, value })),
                ExprKind::Get { object, name } => {
                    Ok(self.expr(ExprKind::Set { object, name, value }))
                }
                _ => {
                    self.error(equals, "Invalid assignment target.");
                    Ok(expr)
                }
            };
        }

        Ok(expr)
    }

    // logic_or       → logic_and ( "or" logic_and )* ;
    fn logic_or(&mut self) -> Result<Expr, ()> {
        let mut expr = self.logic_and()?;
        while match_advance!(self, TokenType::Or) {
            let operator = self.previous().clone();
            let right = self.logic_and()?;
            expr = self.expr(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    // logic_and      → equality ( "and" equality )* ;
    fn logic_and(&mut self) -> Result<Expr, ()> {
        let mut expr = self.equality()?;
        while match_advance!(self, TokenType::And) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = self.expr(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    // equality       → comparison ( ( "!=" | "==" ) comparison )* ;
    fn equality(&mut self) -> Result<Expr, ()> {
        let mut expr = self.comparison()?;
        while match_advance!(self, TokenType::BangEqual, TokenType::EqualEqual) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = self.expr(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    // comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
    fn comparison(&mut self) -> Result<Expr, ()> {
        let mut expr = self.term()?;
        while match_advance!(
            self,
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual
        ) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = self.expr(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    // term           → factor ( ( "-" | "+" ) factor )* ;
    fn term(&mut self) -> Result<Expr, ()> {
        let mut expr = self.factor()?;
        while match_advance!(self, TokenType::Minus, TokenType::Plus) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = self.expr(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    // factor         → unary ( ( "/" | "*" ) unary )* ;
    fn factor(&mut self) -> Result<Expr, ()> {
        let mut expr = self.unary()?;
        while match_advance!(self, TokenType::Slash, TokenType::Star) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = self.expr(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    // unary          → ( "!" | "-" ) unary | call ;
    fn unary(&mut self) -> Result<Expr, ()> {
        if match_advance!(self, TokenType::Bang, TokenType::Minus) {
            let operator = self.previous().clone();
            let right = Box::new(self.unary()?);
            return Ok(self.expr(ExprKind::Unary { operator, right }));
        }
        self.call()
    }

    // call           → primary ( "(" arguments? ")" | "." IDENTIFIER )* ;
    fn call(&mut self) -> Result<Expr, ()> {
        let mut expr = self.primary()?;

        loop {
            if match_advance!(self, TokenType::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if match_advance!(self, TokenType::Dot) {
                let name = self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = self.expr(ExprKind::Get {
                    object: Box::new(expr),
                    name,
                });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    // arguments      → expression ( "," expression )* ;
    fn finish_call(&mut self, callee: Expr) -> Result<Expr, ()> {
        let mut arguments = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    let next = self.peek().clone();
                    self.error(next, "Can't have more than 255 arguments.");
                }
                arguments.push(self.expression()?);
                if !match_advance!(self, TokenType::Comma) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;

        Ok(self.expr(ExprKind::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        }))
    }

    // primary        → NUMBER | STRING | "true" | "false" | "nil"
    //                | "(" expression ")" | IDENTIFIER
    //                | "this" | "super" "." IDENTIFIER ;
    fn primary(&mut self) -> Result<Expr, ()> {
        if match_advance!(self, TokenType::False) {
            return Ok(self.expr(ExprKind::Literal(LiteralValue::Bool(false))));
        }
        if match_advance!(self, TokenType::True) {
            return Ok(self.expr(ExprKind::Literal(LiteralValue::Bool(true))));
        }
        if match_advance!(self, TokenType::Nil) {
            return Ok(self.expr(ExprKind::Literal(LiteralValue::Nil)));
        }
        if let TokenType::Number { literal } = self.peek().token_type.clone() {
            self.advance();
            return Ok(self.expr(ExprKind::Literal(LiteralValue::Number(literal))));
        }
        if let TokenType::String { literal } = self.peek().token_type.clone() {
            self.advance();
            return Ok(self.expr(ExprKind::Literal(LiteralValue::String(literal))));
        }
        if match_advance!(self, TokenType::Super) {
            let keyword = self.previous().clone();
            self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(TokenType::Identifier, "Expect superclass method name.")?;
            return Ok(self.expr(ExprKind::Super { keyword, method }));
        }
        if match_advance!(self, TokenType::This) {
            let keyword = self.previous().clone();
            return Ok(self.expr(ExprKind::This(keyword)));
        }
        if match_advance!(self, TokenType::Identifier) {
            let name = self.previous().clone();
            return Ok(self.expr(ExprKind::Variable(name)));
        }
        if match_advance!(self, TokenType::LeftParen) {
            let expression = Box::new(self.expression()?);
            self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
            return Ok(self.expr(ExprKind::Grouping(expression)));
        }

        let next = self.peek().clone();
        self.error(next, "Expect expression.");
        Err(())
    }

    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }

            match self.peek().token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // returns true if the current token is of the given type; unlike
    // match_advance!, never consumes it
    fn check(&self, token_type: TokenType) -> bool {
        !self.is_at_end() && self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<Token, ()> {
        if self.check(token_type) {
            Ok(self.advance().clone())
        } else {
            let next = self.peek().clone();
            self.error(next, message);
            Err(())
        }
    }

    fn error(&mut self, token: Token, message: &str) {
        self.errors.push(parser_error(&token, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> (Vec<Stmt>, Vec<StaticError>) {
        let (tokens, had_scan_error) = Scanner::new(source.to_string()).scan_tokens();
        assert!(!had_scan_error);
        Parser::new(&tokens).parse()
    }

    #[test]
    fn precedence_groups_multiplication_before_addition() {
        let (stmts, errors) = parse("1 + 2 * 3;");
        assert!(errors.is_empty());
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Stmt::Expression(Expr {
                kind: ExprKind::Binary { operator, right, .. },
                ..
            }) => {
                assert_eq!(operator.token_type, TokenType::Plus);
                assert!(matches!(right.kind, ExprKind::Binary { .. }));
            }
            other => panic!("expected a binary expression statement, got {other:?}"),
        }
    }

    #[test]
    fn for_loop_desugars_to_a_block_containing_a_while() {
        let (stmts, errors) = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(errors.is_empty());
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Stmt::Block(inner) => {
                assert_eq!(inner.len(), 2);
                assert!(matches!(inner[0], Stmt::Var { .. }));
                assert!(matches!(inner[1], Stmt::While { .. }));
            }
            other => panic!("expected a desugared block, got {other:?}"),
        }
    }

    #[test]
    fn assignment_to_a_non_lvalue_is_a_recoverable_error() {
        let (stmts, errors) = parse("1 = 2;");
        assert_eq!(errors.len(), 1);
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn invalid_syntax_synchronizes_and_keeps_parsing() {
        let (stmts, errors) = parse("var = 1; var ok = 2;");
        assert!(!errors.is_empty());
        assert!(stmts
            .iter()
            .any(|s| matches!(s, Stmt::Var { name, .. } if name.lexeme == "ok")));
    }

    #[test]
    fn assign_becomes_set_through_a_get_chain() {
        let (stmts, errors) = parse("a.b = 1;");
        assert!(errors.is_empty());
        assert!(matches!(
            stmts[0],
            Stmt::Expression(Expr {
                kind: ExprKind::Set { .. },
                ..
            })
        ));
    }
}
