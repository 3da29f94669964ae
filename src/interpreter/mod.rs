//! Tree-walking interpreter for Mica.
//!
//! Evaluates the AST directly against a chain of environments. The bytecode
//! VM is the faster engine; this one is kept for REPL use and as a semantic
//! reference, sharing its evaluation rules through [`crate::runtime::ops`].

pub mod environment;

pub use environment::Environment;

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{Block, Expr, Program, Stmt};
use crate::error::RuntimeError;
use crate::runtime::ops;
use crate::runtime::value::{Function, HashKey, HashPair, Value};

/// The interpreter owns the global environment, so bindings persist across
/// `interpret` calls within one session.
pub struct Interpreter {
    env: Rc<RefCell<Environment>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            env: Environment::global(),
        }
    }

    /// Evaluate a program and return the value of its last statement.
    pub fn interpret(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        let env = self.env.clone();
        let mut result = Value::Null;
        for statement in &program.statements {
            match statement {
                Stmt::Return(value) => return self.eval_expression(value, &env),
                Stmt::Expression(expression) => {
                    match self.eval_expression(expression, &env)? {
                        Value::ReturnValue(inner) => return Ok(*inner),
                        value => result = value,
                    }
                }
                Stmt::Let { name, value } => {
                    let value = self.eval_expression(value, &env)?;
                    env.borrow_mut().set(name.clone(), value);
                    result = Value::Null;
                }
            }
        }
        Ok(result)
    }

    /// Evaluate a block. An executed `return` comes back wrapped in
    /// `Value::ReturnValue` so enclosing blocks keep unwinding.
    fn eval_block(
        &self,
        block: &Block,
        env: &Rc<RefCell<Environment>>,
    ) -> Result<Value, RuntimeError> {
        let mut result = Value::Null;
        for statement in &block.statements {
            match statement {
                Stmt::Return(value) => {
                    let value = self.eval_expression(value, env)?;
                    return Ok(Value::ReturnValue(Box::new(value)));
                }
                Stmt::Expression(expression) => {
                    result = self.eval_expression(expression, env)?;
                    if matches!(result, Value::ReturnValue(_)) {
                        return Ok(result);
                    }
                }
                Stmt::Let { name, value } => {
                    let value = self.eval_expression(value, env)?;
                    env.borrow_mut().set(name.clone(), value);
                    result = Value::Null;
                }
            }
        }
        Ok(result)
    }

    fn eval_expression(
        &self,
        expression: &Expr,
        env: &Rc<RefCell<Environment>>,
    ) -> Result<Value, RuntimeError> {
        match expression {
            Expr::Integer(value) => Ok(Value::Integer(*value)),
            Expr::Boolean(value) => Ok(Value::Boolean(*value)),
            Expr::Str(value) => Ok(Value::from_string(value.clone())),
            Expr::Identifier(name) => env
                .borrow()
                .get(name)
                .ok_or_else(|| RuntimeError::UndefinedVariable(name.clone())),
            Expr::Prefix { operator, right } => {
                let right = self.eval_expression(right, env)?;
                ops::eval_prefix(*operator, &right)
            }
            Expr::Infix {
                left,
                operator,
                right,
            } => {
                let left = self.eval_expression(left, env)?;
                let right = self.eval_expression(right, env)?;
                ops::eval_infix(&left, *operator, &right)
            }
            Expr::If {
                condition,
                consequence,
                alternative,
            } => {
                let condition = self.eval_expression(condition, env)?;
                if ops::is_truthy(&condition) {
                    self.eval_block(consequence, env)
                } else if let Some(alternative) = alternative {
                    self.eval_block(alternative, env)
                } else {
                    Ok(Value::Null)
                }
            }
            Expr::Function(literal) => Ok(Value::Function(Rc::new(Function {
                parameters: literal.parameters.clone(),
                body: literal.body.clone(),
                env: env.clone(),
            }))),
            Expr::Call {
                function,
                arguments,
            } => {
                let function = self.eval_expression(function, env)?;
                let arguments = self.eval_expressions(arguments, env)?;
                self.apply_function(function, arguments)
            }
            Expr::Array(elements) => {
                let elements = self.eval_expressions(elements, env)?;
                Ok(Value::Array(Rc::new(elements)))
            }
            Expr::Hash(entries) => self.eval_hash_literal(entries, env),
            Expr::Index { left, index } => {
                let left = self.eval_expression(left, env)?;
                let index = self.eval_expression(index, env)?;
                ops::eval_index(&left, &index)
            }
        }
    }

    fn eval_expressions(
        &self,
        expressions: &[Expr],
        env: &Rc<RefCell<Environment>>,
    ) -> Result<Vec<Value>, RuntimeError> {
        expressions
            .iter()
            .map(|e| self.eval_expression(e, env))
            .collect()
    }

    fn eval_hash_literal(
        &self,
        entries: &[(Expr, Expr)],
        env: &Rc<RefCell<Environment>>,
    ) -> Result<Value, RuntimeError> {
        let mut pairs = IndexMap::with_capacity(entries.len());
        for (key_expr, value_expr) in entries {
            let key = self.eval_expression(key_expr, env)?;
            let value = self.eval_expression(value_expr, env)?;
            let hash_key =
                HashKey::from_value(&key).ok_or(RuntimeError::UnhashableKey(key.type_name()))?;
            pairs.insert(hash_key, HashPair { key, value });
        }
        Ok(Value::Hash(Rc::new(pairs)))
    }

    fn apply_function(
        &self,
        function: Value,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match function {
            Value::Function(func) => {
                if arguments.len() != func.parameters.len() {
                    return Err(RuntimeError::WrongArity {
                        expected: func.parameters.len(),
                        got: arguments.len(),
                    });
                }
                let inner = Environment::enclosed(func.env.clone());
                for (parameter, argument) in func.parameters.iter().zip(arguments) {
                    inner.borrow_mut().set(parameter.clone(), argument);
                }
                let result = self.eval_block(&func.body, &inner)?;
                Ok(unwrap_return(result))
            }
            Value::Builtin(builtin) => (builtin.func)(&arguments),
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn unwrap_return(value: Value) -> Value {
    match value {
        Value::ReturnValue(inner) => *inner,
        value => value,
    }
}
