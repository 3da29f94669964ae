//! Prefix, infix, index and truthiness semantics.
//!
//! Shared by the bytecode VM and the tree-walking interpreter.

use std::rc::Rc;

use crate::ast::{InfixOp, PrefixOp};
use crate::error::RuntimeError;
use crate::runtime::value::{HashKey, Value};

/// Truthiness: false and null are falsy, everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::Null => false,
        _ => true,
    }
}

/// Evaluate a prefix operation.
pub fn eval_prefix(operator: PrefixOp, right: &Value) -> Result<Value, RuntimeError> {
    match operator {
        PrefixOp::Neg => match right {
            Value::Integer(n) => Ok(Value::Integer(-n)),
            other => Err(RuntimeError::InvalidPrefixOperand {
                operator: operator.symbol(),
                operand: other.type_name(),
            }),
        },
        PrefixOp::Not => Ok(Value::Boolean(!is_truthy(right))),
    }
}

/// Evaluate an infix operation.
///
/// Integer pairs support the full operator set; string pairs support
/// concatenation and equality. For any other pairing, `==`/`!=` compare by
/// the language's equality rules (identity for aggregates, false across
/// kinds) and the remaining operators are errors.
pub fn eval_infix(left: &Value, operator: InfixOp, right: &Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => eval_integer_infix(*l, operator, *r),
        (Value::String(l), Value::String(r)) => eval_string_infix(l, operator, r),
        _ => match operator {
            InfixOp::Eq => Ok(Value::Boolean(left == right)),
            InfixOp::NotEq => Ok(Value::Boolean(left != right)),
            _ => Err(RuntimeError::InvalidInfixOperands {
                operator: operator.symbol(),
                left: left.type_name(),
                right: right.type_name(),
            }),
        },
    }
}

fn eval_integer_infix(left: i64, operator: InfixOp, right: i64) -> Result<Value, RuntimeError> {
    let value = match operator {
        InfixOp::Add => Value::Integer(left.wrapping_add(right)),
        InfixOp::Sub => Value::Integer(left.wrapping_sub(right)),
        InfixOp::Mul => Value::Integer(left.wrapping_mul(right)),
        InfixOp::Div => {
            if right == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Value::Integer(left.wrapping_div(right))
        }
        InfixOp::Lt => Value::Boolean(left < right),
        InfixOp::Gt => Value::Boolean(left > right),
        InfixOp::Eq => Value::Boolean(left == right),
        InfixOp::NotEq => Value::Boolean(left != right),
    };
    Ok(value)
}

fn eval_string_infix(left: &str, operator: InfixOp, right: &str) -> Result<Value, RuntimeError> {
    match operator {
        InfixOp::Add => Ok(Value::String(Rc::new(format!("{}{}", left, right)))),
        InfixOp::Eq => Ok(Value::Boolean(left == right)),
        InfixOp::NotEq => Ok(Value::Boolean(left != right)),
        _ => Err(RuntimeError::InvalidInfixOperands {
            operator: operator.symbol(),
            left: "String",
            right: "String",
        }),
    }
}

/// Evaluate an index operation.
///
/// Arrays require an integer index and yield null when it is out of range;
/// hashes require a hashable key and yield null on a miss. Anything else is
/// an error.
pub fn eval_index(left: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match (left, index) {
        (Value::Array(elements), Value::Integer(i)) => {
            if *i < 0 || *i as usize >= elements.len() {
                return Ok(Value::Null);
            }
            Ok(elements[*i as usize].clone())
        }
        (Value::Hash(pairs), key) => {
            let hash_key = HashKey::from_value(key)
                .ok_or(RuntimeError::UnhashableKey(key.type_name()))?;
            Ok(pairs
                .get(&hash_key)
                .map(|pair| pair.value.clone())
                .unwrap_or(Value::Null))
        }
        _ => Err(RuntimeError::NotIndexable {
            left: left.type_name(),
            index: index.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(s: &str) -> Value {
        Value::from_string(s)
    }

    #[test]
    fn truthiness_follows_the_language_rules() {
        assert!(!is_truthy(&Value::Boolean(false)));
        assert!(!is_truthy(&Value::Null));
        assert!(is_truthy(&Value::Boolean(true)));
        assert!(is_truthy(&Value::Integer(0)));
        assert!(is_truthy(&string("")));
        assert!(is_truthy(&Value::Array(Rc::new(vec![]))));
    }

    #[test]
    fn minus_negates_integers_only() {
        assert_eq!(
            eval_prefix(PrefixOp::Neg, &Value::Integer(5)),
            Ok(Value::Integer(-5))
        );
        assert_eq!(
            eval_prefix(PrefixOp::Neg, &Value::Integer(0)),
            Ok(Value::Integer(0))
        );
        assert_eq!(
            eval_prefix(PrefixOp::Neg, &Value::Boolean(true)),
            Err(RuntimeError::InvalidPrefixOperand {
                operator: "-",
                operand: "Boolean",
            })
        );
    }

    #[test]
    fn bang_inverts_truthiness() {
        assert_eq!(
            eval_prefix(PrefixOp::Not, &Value::Boolean(true)),
            Ok(Value::Boolean(false))
        );
        assert_eq!(
            eval_prefix(PrefixOp::Not, &Value::Null),
            Ok(Value::Boolean(true))
        );
        assert_eq!(
            eval_prefix(PrefixOp::Not, &Value::Integer(5)),
            Ok(Value::Boolean(false))
        );
    }

    #[test]
    fn integer_arithmetic_and_comparison() {
        assert_eq!(
            eval_infix(&Value::Integer(2), InfixOp::Add, &Value::Integer(3)),
            Ok(Value::Integer(5))
        );
        assert_eq!(
            eval_infix(&Value::Integer(2), InfixOp::Lt, &Value::Integer(3)),
            Ok(Value::Boolean(true))
        );
        assert_eq!(
            eval_infix(&Value::Integer(6), InfixOp::Div, &Value::Integer(0)),
            Err(RuntimeError::DivisionByZero)
        );
    }

    #[test]
    fn string_concatenation_and_equality() {
        assert_eq!(
            eval_infix(&string("mi"), InfixOp::Add, &string("ca")),
            Ok(string("mica"))
        );
        assert_eq!(
            eval_infix(&string("a"), InfixOp::Eq, &string("a")),
            Ok(Value::Boolean(true))
        );
        assert_eq!(
            eval_infix(&string("a"), InfixOp::Sub, &string("b")),
            Err(RuntimeError::InvalidInfixOperands {
                operator: "-",
                left: "String",
                right: "String",
            })
        );
    }

    #[test]
    fn cross_kind_equality_yields_false_and_other_operators_fail() {
        assert_eq!(
            eval_infix(&Value::Integer(1), InfixOp::Eq, &string("1")),
            Ok(Value::Boolean(false))
        );
        assert_eq!(
            eval_infix(&Value::Integer(1), InfixOp::NotEq, &Value::Boolean(true)),
            Ok(Value::Boolean(true))
        );
        assert_eq!(
            eval_infix(&Value::Integer(1), InfixOp::Add, &Value::Boolean(true)),
            Err(RuntimeError::InvalidInfixOperands {
                operator: "+",
                left: "Integer",
                right: "Boolean",
            })
        );
    }

    #[test]
    fn array_indexing_yields_null_out_of_range() {
        let array = Value::Array(Rc::new(vec![Value::Integer(10), Value::Integer(20)]));
        assert_eq!(
            eval_index(&array, &Value::Integer(0)),
            Ok(Value::Integer(10))
        );
        assert_eq!(eval_index(&array, &Value::Integer(2)), Ok(Value::Null));
        assert_eq!(eval_index(&array, &Value::Integer(-1)), Ok(Value::Null));
        assert_eq!(
            eval_index(&array, &string("0")),
            Err(RuntimeError::NotIndexable {
                left: "Array",
                index: "String",
            })
        );
    }

    #[test]
    fn indexing_non_collections_fails() {
        assert_eq!(
            eval_index(&Value::Integer(1), &Value::Integer(0)),
            Err(RuntimeError::NotIndexable {
                left: "Integer",
                index: "Integer",
            })
        );
    }
}
