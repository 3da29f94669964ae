//! Bytecode compiler and virtual machine for Mica.
//!
//! # Architecture
//!
//! - `instruction`: the opcode table, instruction encoding and disassembly
//! - `symbol`: lexically scoped symbol tables with free-variable capture
//! - `compiler`: transforms the AST into bytecode plus a constant pool
//! - `frame`: per-call records of closure, instruction cursor and stack base
//! - `vm`: the stack machine executing the instruction stream

pub mod compiler;
pub mod frame;
pub mod instruction;
pub mod symbol;
pub mod vm;

pub use compiler::{Bytecode, Compiler};
pub use instruction::{disassemble, make, unmake, Instructions, OpCode};
pub use symbol::{Symbol, SymbolScope, SymbolTable};
pub use vm::Vm;
