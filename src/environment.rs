use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;

pub type EnvRef = Rc<RefCell<Environment>>;

/// A name→value map plus a link to an enclosing environment. Every closure
/// shares ownership of the environment it was created in via `Rc`; a chain
/// is kept alive exactly as long as its longest-surviving capturer.
#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new_global() -> EnvRef {
        Rc::new(RefCell::new(Self {
            values: HashMap::new(),
            enclosing: None,
        }))
    }

    pub fn new_enclosed(enclosing: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Self {
            values: HashMap::new(),
            enclosing: Some(Rc::clone(enclosing)),
        }))
    }

    pub fn define(&mut self, name: String, value: Value) {
        self.values.insert(name, value);
    }

    /// Dynamic (scan-the-chain) lookup, used only for names the resolver
    /// left unrecorded — i.e. names it determined must be global.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.get(&name.lexeme) {
            return Ok(value.clone());
        }
        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get(name),
            None => Err(undefined_variable(name)),
        }
    }

    /// Dynamic (scan-the-chain) assignment, used only for globals.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if self.values.contains_key(&name.lexeme) {
            self.values.insert(name.lexeme.clone(), value);
            return Ok(());
        }
        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, value),
            None => Err(undefined_variable(name)),
        }
    }

    /// Walks `distance` hops up the chain toward globals. Depth 0 is `env`
    /// itself. The resolver computes `distance` as the number of enclosing
    /// environments to skip, so this always walks *up*, never down — the
    /// source-observed bug spec.md §9 calls out is not reproduced here.
    fn ancestor(env: &EnvRef, distance: usize) -> EnvRef {
        let mut current = Rc::clone(env);
        for _ in 0..distance {
            let next = current
                .borrow()
                .enclosing
                .clone()
                .expect("resolver-computed depth stays within the live environment chain");
            current = next;
        }
        current
    }

    /// Depth-indexed read, used for every variable/this/super reference the
    /// resolver recorded a depth for.
    pub fn get_at(env: &EnvRef, distance: usize, name: &str) -> Value {
        Self::ancestor(env, distance)
            .borrow()
            .values
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("resolver guarantees '{name}' is bound at depth {distance}"))
    }

    /// Depth-indexed write, used for assignments the resolver recorded a
    /// depth for.
    pub fn assign_at(env: &EnvRef, distance: usize, name: &Token, value: Value) {
        Self::ancestor(env, distance)
            .borrow_mut()
            .values
            .insert(name.lexeme.clone(), value);
    }
}

fn undefined_variable(name: &Token) -> RuntimeError {
    RuntimeError::new(name, format!("Undefined variable '{}'.", name.lexeme))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::Identifier, name, 1)
    }

    #[test]
    fn reads_fall_through_to_enclosing_scopes() {
        let globals = Environment::new_global();
        globals.borrow_mut().define("a".into(), Value::Number(1.0));
        let local = Environment::new_enclosed(&globals);

        assert_eq!(local.borrow().get(&ident("a")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_does_not_shadow_into_a_new_binding() {
        let globals = Environment::new_global();
        globals.borrow_mut().define("a".into(), Value::Number(1.0));
        let local = Environment::new_enclosed(&globals);

        local
            .borrow_mut()
            .assign(&ident("a"), Value::Number(2.0))
            .unwrap();

        assert_eq!(
            globals.borrow().get(&ident("a")).unwrap(),
            Value::Number(2.0)
        );
    }

    #[test]
    fn assigning_an_undefined_name_is_a_runtime_error() {
        let globals = Environment::new_global();
        assert!(globals
            .borrow_mut()
            .assign(&ident("missing"), Value::Nil)
            .is_err());
    }

    #[test]
    fn get_at_and_assign_at_skip_the_recorded_depth() {
        let globals = Environment::new_global();
        let outer = Environment::new_enclosed(&globals);
        outer.borrow_mut().define("x".into(), Value::Number(1.0));
        let inner = Environment::new_enclosed(&outer);

        assert_eq!(Environment::get_at(&inner, 1, "x"), Value::Number(1.0));
        Environment::assign_at(&inner, 1, &ident("x"), Value::Number(9.0));
        assert_eq!(Environment::get_at(&inner, 1, "x"), Value::Number(9.0));
    }
}
