//! Runtime environment for the tree-walking interpreter.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::builtins::BUILTINS;
use crate::runtime::value::Value;

/// A scope of variable bindings with an optional enclosing scope.
pub struct Environment {
    store: HashMap<String, Value>,
    outer: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    fn new() -> Self {
        Self {
            store: HashMap::new(),
            outer: None,
        }
    }

    /// The top-level environment: a fresh scope whose outer scope holds the
    /// builtin functions.
    pub fn global() -> Rc<RefCell<Environment>> {
        let mut builtin_scope = Environment::new();
        for builtin in BUILTINS {
            builtin_scope
                .store
                .insert(builtin.name.to_string(), Value::Builtin(builtin));
        }
        Environment::enclosed(Rc::new(RefCell::new(builtin_scope)))
    }

    /// A new scope nested inside `outer`.
    pub fn enclosed(outer: Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        let mut env = Environment::new();
        env.outer = Some(outer);
        Rc::new(RefCell::new(env))
    }

    /// Bind `name` in this scope, shadowing any outer binding.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.store.insert(name.into(), value);
    }

    /// Look up `name`, walking outward through enclosing scopes.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.store.get(name) {
            return Some(value.clone());
        }
        self.outer
            .as_ref()
            .and_then(|outer| outer.borrow().get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_environment_resolves_builtins() {
        let env = Environment::global();
        let value = env.borrow().get("len").expect("len should resolve");
        assert!(matches!(value, Value::Builtin(b) if b.name == "len"));
        assert!(env.borrow().get("missing").is_none());
    }

    #[test]
    fn inner_scopes_shadow_and_fall_through() {
        let outer = Environment::global();
        outer.borrow_mut().set("a", Value::Integer(1));
        outer.borrow_mut().set("b", Value::Integer(2));

        let inner = Environment::enclosed(outer.clone());
        inner.borrow_mut().set("a", Value::Integer(10));

        assert_eq!(inner.borrow().get("a"), Some(Value::Integer(10)));
        assert_eq!(inner.borrow().get("b"), Some(Value::Integer(2)));
        assert_eq!(outer.borrow().get("a"), Some(Value::Integer(1)));
    }
}
