//! The builtin function registry.
//!
//! The registry is ordered: `OpGetBuiltin` operands and the builtin scope of
//! the symbol table both index into it, so the order here is part of the
//! bytecode contract.

use std::rc::Rc;

use crate::error::RuntimeError;
use crate::runtime::value::Value;

/// The native signature of a builtin.
pub type BuiltinFn = fn(&[Value]) -> Result<Value, RuntimeError>;

/// A registered builtin: its source-level name and native implementation.
#[derive(Debug)]
pub struct BuiltinDef {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// All builtins, in registration order.
pub static BUILTINS: &[BuiltinDef] = &[
    BuiltinDef {
        name: "len",
        func: builtin_len,
    },
    BuiltinDef {
        name: "puts",
        func: builtin_puts,
    },
    BuiltinDef {
        name: "first",
        func: builtin_first,
    },
    BuiltinDef {
        name: "last",
        func: builtin_last,
    },
    BuiltinDef {
        name: "rest",
        func: builtin_rest,
    },
    BuiltinDef {
        name: "push",
        func: builtin_push,
    },
];

/// Look up a builtin by name.
pub fn lookup(name: &str) -> Option<&'static BuiltinDef> {
    BUILTINS.iter().find(|b| b.name == name)
}

fn expect_arity(
    builtin: &'static str,
    expected: usize,
    args: &[Value],
) -> Result<(), RuntimeError> {
    if args.len() != expected {
        return Err(RuntimeError::BuiltinArity {
            builtin,
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn expect_array<'a>(
    builtin: &'static str,
    value: &'a Value,
) -> Result<&'a Rc<Vec<Value>>, RuntimeError> {
    match value {
        Value::Array(elements) => Ok(elements),
        other => Err(RuntimeError::BadBuiltinArgument {
            builtin,
            got: other.type_name(),
        }),
    }
}

fn builtin_len(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("len", 1, args)?;
    match &args[0] {
        Value::String(s) => Ok(Value::Integer(s.len() as i64)),
        Value::Array(elements) => Ok(Value::Integer(elements.len() as i64)),
        other => Err(RuntimeError::BadBuiltinArgument {
            builtin: "len",
            got: other.type_name(),
        }),
    }
}

fn builtin_puts(args: &[Value]) -> Result<Value, RuntimeError> {
    for arg in args {
        println!("{}", arg.inspect());
    }
    Ok(Value::Null)
}

fn builtin_first(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("first", 1, args)?;
    let elements = expect_array("first", &args[0])?;
    Ok(elements.first().cloned().unwrap_or(Value::Null))
}

fn builtin_last(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("last", 1, args)?;
    let elements = expect_array("last", &args[0])?;
    Ok(elements.last().cloned().unwrap_or(Value::Null))
}

fn builtin_rest(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("rest", 1, args)?;
    let elements = expect_array("rest", &args[0])?;
    if elements.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::Array(Rc::new(elements[1..].to_vec())))
}

fn builtin_push(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("push", 2, args)?;
    let elements = expect_array("push", &args[0])?;
    let mut extended = elements.as_ref().clone();
    extended.push(args[1].clone());
    Ok(Value::Array(Rc::new(extended)))
}
