//! Runtime values for Mica.

use std::cell::RefCell;
use std::fmt;
use std::hash::Hasher;
use std::rc::Rc;

use fnv::FnvHasher;
use indexmap::IndexMap;

use crate::ast::Block;
use crate::interpreter::Environment;
use crate::runtime::builtins::BuiltinDef;

/// A runtime value.
///
/// Heap variants are behind `Rc` so the operand stack, globals, closures and
/// hashes share values without copying. No value is mutated after
/// construction.
#[derive(Debug, Clone)]
pub enum Value {
    /// Signed 64-bit integer
    Integer(i64),
    /// Boolean
    Boolean(bool),
    /// Immutable UTF-8 string
    String(Rc<String>),
    /// The null value
    Null,
    /// Ordered sequence of values
    Array(Rc<Vec<Value>>),
    /// Key-value map; see [`HashKey`] for the key derivation
    Hash(Rc<IndexMap<HashKey, HashPair>>),
    /// A bytecode routine template; lives in the constant pool only, never
    /// on the operand stack
    CompiledFunction(Rc<CompiledFunction>),
    /// A callable: compiled function plus captured free values
    Closure(Rc<Closure>),
    /// A tree-walker function capturing its defining environment
    Function(Rc<Function>),
    /// A host-provided function
    Builtin(&'static BuiltinDef),
    /// Early-return wrapper used internally by the tree-walking
    /// interpreter; the compiler and VM never produce it
    ReturnValue(Box<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Integer",
            Value::Boolean(_) => "Boolean",
            Value::String(_) => "String",
            Value::Null => "Null",
            Value::Array(_) => "Array",
            Value::Hash(_) => "Hash",
            Value::CompiledFunction(_) => "CompiledFunction",
            Value::Closure(_) => "Closure",
            Value::Function(_) => "Function",
            Value::Builtin(_) => "Builtin",
            Value::ReturnValue(_) => "ReturnValue",
        }
    }

    pub fn from_string(s: impl Into<String>) -> Value {
        Value::String(Rc::new(s.into()))
    }

    /// Human-readable rendering of the value.
    pub fn inspect(&self) -> String {
        match self {
            Value::Integer(n) => n.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::String(s) => s.to_string(),
            Value::Null => "null".to_string(),
            Value::Array(elements) => {
                let rendered: Vec<String> = elements.iter().map(Value::inspect).collect();
                format!("[{}]", rendered.join(", "))
            }
            Value::Hash(pairs) => {
                let rendered: Vec<String> = pairs
                    .values()
                    .map(|pair| format!("{}: {}", pair.key.inspect(), pair.value.inspect()))
                    .collect();
                format!("{{{}}}", rendered.join(", "))
            }
            Value::CompiledFunction(_) | Value::Closure(_) | Value::Function(_) => {
                "fn(...) {...}".to_string()
            }
            Value::Builtin(_) => "builtin function".to_string(),
            Value::ReturnValue(inner) => inner.inspect(),
        }
    }
}

/// Equality follows the language semantics: value equality for integers,
/// booleans, strings and null; reference identity for aggregates and
/// callables; false across disjoint kinds.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b),
            (Value::CompiledFunction(a), Value::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inspect())
    }
}

/// Which kind of value a hash key was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKeyKind {
    Integer,
    Boolean,
    String,
}

/// A canonical hash key: the value kind plus a 64-bit hash. Integers use
/// their bit pattern, booleans 0/1, strings FNV-1a over their UTF-8 bytes.
/// Only integers, booleans and strings are hashable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub kind: HashKeyKind,
    pub value: u64,
}

impl HashKey {
    /// Derive the hash key for a value, or `None` if it is not hashable.
    pub fn from_value(value: &Value) -> Option<HashKey> {
        match value {
            Value::Integer(n) => Some(HashKey {
                kind: HashKeyKind::Integer,
                value: *n as u64,
            }),
            Value::Boolean(b) => Some(HashKey {
                kind: HashKeyKind::Boolean,
                value: *b as u64,
            }),
            Value::String(s) => {
                let mut hasher = FnvHasher::default();
                hasher.write(s.as_bytes());
                Some(HashKey {
                    kind: HashKeyKind::String,
                    value: hasher.finish(),
                })
            }
            _ => None,
        }
    }
}

/// A stored hash entry. The original key value is retained so iteration and
/// `inspect` expose it, not the derived hash.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

/// A compiled bytecode routine: its instruction stream plus the frame shape
/// the VM needs to execute it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Vec<u8>,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A compiled function paired with its captured free values, in the order
/// the compiler emitted their loads.
#[derive(Debug, Clone)]
pub struct Closure {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Value>,
}

/// A tree-walker function value: parameters, body and the environment the
/// literal was evaluated in.
#[derive(Clone)]
pub struct Function {
    pub parameters: Vec<String>,
    pub body: Block,
    pub env: Rc<RefCell<Environment>>,
}

// The captured environment can refer back to the function itself, so the
// derived Debug would recurse forever.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}
