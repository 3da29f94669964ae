//! Mica: a dynamically-typed expression language with first-class
//! functions and lexical closures.
//!
//! Source text flows through the lexer and parser into an AST, which either
//! execution engine can run:
//!
//! - **Bytecode VM** (default): the compiler reduces the AST to a compact
//!   stack-machine instruction stream plus a constant pool, executed by a
//!   virtual machine with an operand stack, call frames and a globals array.
//! - **Tree-walk interpreter**: direct AST evaluation over environment
//!   chains, sharing the VM's value model and evaluation rules.

#![allow(clippy::new_without_default)]

pub mod ast;
pub mod bytecode;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod runtime;

use error::MicaError;
use runtime::Value;

/// Which engine executes the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Tree-walking interpreter
    TreeWalk,
    /// Bytecode compiler + virtual machine
    #[default]
    Bytecode,
}

/// Parse source code into an AST without executing.
pub fn parse(source: &str) -> Result<ast::Program, MicaError> {
    let tokens = lexer::Scanner::new(source).scan_tokens();
    let program = parser::Parser::new(tokens).parse()?;
    Ok(program)
}

/// Compile source code to bytecode without executing.
pub fn compile(source: &str) -> Result<bytecode::Bytecode, MicaError> {
    let program = parse(source)?;
    let bytecode = bytecode::Compiler::new().compile(&program)?;
    Ok(bytecode)
}

/// Run a program with the default engine and return the value of its last
/// statement.
pub fn run(source: &str) -> Result<Value, MicaError> {
    run_with_options(source, ExecutionMode::default(), false)
}

/// Run a program with full control over engine selection and disassembly
/// output.
pub fn run_with_options(
    source: &str,
    mode: ExecutionMode,
    disassemble: bool,
) -> Result<Value, MicaError> {
    let program = parse(source)?;
    match mode {
        ExecutionMode::TreeWalk => {
            let mut interpreter = interpreter::Interpreter::new();
            Ok(interpreter.interpret(&program)?)
        }
        ExecutionMode::Bytecode => {
            let bytecode = bytecode::Compiler::new().compile(&program)?;
            if disassemble {
                print!("{}", bytecode::disassemble(&bytecode.instructions));
                println!("---");
            }
            let mut vm = bytecode::Vm::new(bytecode);
            vm.run()?;
            Ok(vm.last_popped().clone())
        }
    }
}
