//! Error types for all phases of the Mica toolchain.

use thiserror::Error;

/// Parser errors.
#[derive(Debug, Error, PartialEq)]
pub enum ParserError {
    #[error("unexpected token '{found}', expected {expected}")]
    UnexpectedToken { expected: String, found: String },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("illegal character sequence '{0}'")]
    IllegalToken(String),
}

impl ParserError {
    pub fn unexpected_token(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Instruction encoding/decoding errors.
#[derive(Debug, Error, PartialEq)]
pub enum CodeError {
    #[error("undefined opcode {0}")]
    UndefinedOpcode(u8),

    #[error("cannot decode an empty instruction")]
    EmptyInstruction,

    #[error("truncated instruction for {op}: expected {expected} bytes, got {got}")]
    TruncatedInstruction {
        op: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Bytecode compilation errors.
#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("too many constants in one compilation unit")]
    TooManyConstants,

    #[error("function captures too many free variables")]
    TooManyFreeVariables,
}

/// Runtime errors, raised by the VM, the tree-walking interpreter and the
/// builtin functions.
#[derive(Debug, Error, PartialEq)]
pub enum RuntimeError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("call stack overflow")]
    FrameOverflow,

    #[error("cannot return outside of a function")]
    ReturnOutsideFunction,

    #[error("globals store overflow")]
    GlobalsOverflow,

    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    #[error("missing constant at index {0}")]
    MissingConstant(usize),

    #[error("constant at index {0} is not a function")]
    NotAFunctionConstant(usize),

    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("unsupported operand for prefix '{operator}': {operand}")]
    InvalidPrefixOperand {
        operator: &'static str,
        operand: &'static str,
    },

    #[error("unsupported operand types for '{operator}': {left} and {right}")]
    InvalidInfixOperands {
        operator: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("cannot index {left} with {index}")]
    NotIndexable {
        left: &'static str,
        index: &'static str,
    },

    #[error("unusable as hash key: {0}")]
    UnhashableKey(&'static str),

    #[error("cannot call value of type {0}")]
    NotCallable(&'static str),

    #[error("wrong number of arguments: expected {expected}, got {got}")]
    WrongArity { expected: usize, got: usize },

    #[error("wrong number of arguments to `{builtin}`: expected {expected}, got {got}")]
    BuiltinArity {
        builtin: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("argument to `{builtin}` not supported, got {got}")]
    BadBuiltinArgument {
        builtin: &'static str,
        got: &'static str,
    },
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum MicaError {
    #[error("parse error: {0}")]
    Parser(#[from] ParserError),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("bytecode error: {0}")]
    Code(#[from] CodeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
