//! Runtime values and the concrete callables: user functions (and the bound
//! methods produced from them), the `clock` native, and classes/instances.
//!
//! This merges and completes what the teacher spread across `object.rs`
//! (the `Object` enum), `function.rs` (`Function::Native`/`Function::User`)
//! and `class.rs` (`LoxClass`/`LoxInstance`) — those three disagreed on the
//! shape of `Object::Instance` (referenced in `class.rs`, never declared in
//! `object.rs`), which is the inconsistency this module resolves.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ast::FunctionDecl;
use crate::environment::{EnvRef, Environment};
use crate::error::RuntimeError;
use crate::interpreter::{Interpreter, Signal};
use crate::token::Token;

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Function(Rc<LoxFunction>),
    Native(Rc<NativeFunction>),
    Class(Rc<LoxClass>),
    Instance(Rc<RefCell<LoxInstance>>),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Stringification rule from spec.md §4.3: integer-when-integral
    /// numbers, lowercase booleans, `"<native fn>"` for builtins, etc.
    pub fn stringify(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Function(f) => format!("<fn {}>", f.declaration.name.lexeme),
            Value::Native(_) => "<native fn>".to_string(),
            Value::Class(c) => c.name.clone(),
            Value::Instance(i) => format!("{} Instance", i.borrow().class.name),
        }
    }

    /// Dispatches a call to whichever concrete callable `self` holds, or
    /// reports the spec-mandated error for a non-callable callee.
    pub fn invoke(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, RuntimeError> {
        match self {
            Value::Function(f) => f.call(interpreter, arguments),
            Value::Native(n) => n.call(arguments),
            Value::Class(c) => c.call(interpreter, arguments),
            _ => Err(RuntimeError::new(
                paren,
                "Can only call functions and classes.",
            )),
        }
    }

    pub fn arity(&self) -> Option<usize> {
        match self {
            Value::Function(f) => Some(f.arity()),
            Value::Native(n) => Some(n.arity),
            Value::Class(c) => Some(c.arity()),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stringify())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e18 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A host-implemented callable. Only `clock` exists today; the registry is
/// a plain `fn` pointer so adding another builtin is a one-line addition to
/// [`crate::interpreter::Interpreter::new`].
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: fn(&[Value]) -> Value,
}

impl NativeFunction {
    fn call(&self, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        Ok((self.func)(&arguments))
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

pub fn clock() -> NativeFunction {
    NativeFunction {
        name: "clock",
        arity: 0,
        func: |_args| {
            let secs = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("system clock is after the Unix epoch")
                .as_secs_f64();
            Value::Number(secs)
        },
    }
}

/// A user-defined function or method. Bound methods (produced by
/// [`LoxFunction::bind`]) are the same type wrapped around a fresh closure
/// that defines `this` — there's no separate "BoundMethod" type.
#[derive(Debug)]
pub struct LoxFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: EnvRef,
    pub is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvRef, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    pub fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        let env = Environment::new_enclosed(&self.closure);
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            env.borrow_mut().define(param.lexeme.clone(), argument);
        }

        log::trace!("calling <fn {}>", self.declaration.name.lexeme);
        let result = interpreter.execute_block(&self.declaration.body, env);

        // The initializer's own return value is discarded either way: a
        // `return;` or falling off the end both yield `this`, and so does
        // an explicit `return value;` (spec.md §4.3's initializer-return
        // invariant — `init` always yields the constructed instance).
        if self.is_initializer {
            return Ok(Environment::get_at(&self.closure, 0, "this"));
        }

        match result {
            Ok(()) => Ok(Value::Nil),
            Err(Signal::Return(value)) => Ok(value),
            Err(Signal::Error(err)) => Err(err),
        }
    }

    /// Wraps this function in a fresh closure-within-a-closure that defines
    /// `this` to `instance` — a closure-within-a-closure, becoming the
    /// parent of the method body's own call environment.
    pub fn bind(self: &Rc<Self>, instance: Rc<RefCell<LoxInstance>>) -> Rc<LoxFunction> {
        let env = Environment::new_enclosed(&self.closure);
        env.borrow_mut()
            .define("this".to_string(), Value::Instance(instance));
        Rc::new(LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: env,
            is_initializer: self.is_initializer,
        })
    }
}

/// The instance stores the state, the class stores the behavior.
#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub methods: HashMap<String, Rc<LoxFunction>>,
    pub superclass: Option<Rc<LoxClass>>,
}

impl LoxClass {
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }
        self.superclass.as_ref().and_then(|s| s.find_method(name))
    }

    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }

    /// Calling a class constructs an instance and, if present, runs `init`
    /// against it before handing the instance back.
    pub fn call(self: &Rc<Self>, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        let instance = Rc::new(RefCell::new(LoxInstance {
            class: Rc::clone(self),
            fields: HashMap::new(),
        }));
        if let Some(initializer) = self.find_method("init") {
            initializer.bind(Rc::clone(&instance)).call(interpreter, arguments)?;
        }
        Ok(Value::Instance(instance))
    }
}

#[derive(Debug)]
pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    /// Field lookup first, then a method bound fresh to `instance`. Two
    /// calls to this for the same method name produce two distinct bound
    /// values (spec.md §8 invariant 4), since each bind allocates its own
    /// `this`-defining environment.
    pub fn get(instance: &Rc<RefCell<LoxInstance>>, name: &Token) -> Result<Value, RuntimeError> {
        {
            let this = instance.borrow();
            if let Some(value) = this.fields.get(&name.lexeme) {
                return Ok(value.clone());
            }
        }
        let method = instance.borrow().class.find_method(&name.lexeme);
        match method {
            Some(method) => Ok(Value::Function(method.bind(Rc::clone(instance)))),
            None => Err(RuntimeError::new(
                name,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }

    // Lox allows freely creating new fields on instances, so there's no
    // need to check whether the key already exists.
    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;
    use assert_matches::assert_matches;

    #[test]
    fn truthiness_treats_only_nil_and_false_as_falsy() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
    }

    #[test]
    fn equality_has_no_implicit_conversions_across_kinds() {
        assert!(Value::Nil.is_equal(&Value::Nil));
        assert!(!Value::Number(0.0).is_equal(&Value::Bool(false)));
        assert!(!Value::String("1".into()).is_equal(&Value::Number(1.0)));
    }

    #[test]
    fn integral_numbers_stringify_without_a_decimal_point() {
        assert_eq!(Value::Number(4.0).stringify(), "4");
        assert_eq!(Value::Number(2.5).stringify(), "2.5");
    }

    #[test]
    fn clock_is_a_zero_arity_native_returning_a_number() {
        let native = clock();
        assert_eq!(native.arity, 0);
        let result = native.call(Vec::new()).unwrap();
        assert_matches!(result, Value::Number(_));
    }

    #[test]
    fn method_lookup_walks_the_superclass_chain() {
        let base = Rc::new(LoxClass {
            name: "Base".to_string(),
            methods: {
                let mut m = HashMap::new();
                m.insert(
                    "greet".to_string(),
                    Rc::new(LoxFunction::new(
                        Rc::new(FunctionDecl {
                            name: Token::new(TokenType::Identifier, "greet", 1),
                            params: Vec::new(),
                            body: Vec::new(),
                        }),
                        Environment::new_global(),
                        false,
                    )),
                );
                m
            },
            superclass: None,
        });
        let derived = LoxClass {
            name: "Derived".to_string(),
            methods: HashMap::new(),
            superclass: Some(Rc::clone(&base)),
        };

        assert!(derived.find_method("greet").is_some());
        assert!(derived.find_method("missing").is_none());
    }

    #[test]
    fn binding_the_same_method_twice_yields_independent_closures() {
        let class = Rc::new(LoxClass {
            name: "C".to_string(),
            methods: HashMap::new(),
            superclass: None,
        });
        let instance = Rc::new(RefCell::new(LoxInstance {
            class,
            fields: HashMap::new(),
        }));
        let method = Rc::new(LoxFunction::new(
            Rc::new(FunctionDecl {
                name: Token::new(TokenType::Identifier, "m", 1),
                params: Vec::new(),
                body: Vec::new(),
            }),
            Environment::new_global(),
            false,
        ));

        let bound_a = method.bind(Rc::clone(&instance));
        let bound_b = method.bind(Rc::clone(&instance));
        assert!(!Rc::ptr_eq(&bound_a, &bound_b));
        assert!(!Rc::ptr_eq(&bound_a.closure, &bound_b.closure));
    }
}
