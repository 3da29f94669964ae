//! AST node definitions for Mica.

pub mod expr;
pub mod stmt;

pub use expr::{Expr, FunctionLiteral, InfixOp, PrefixOp};
pub use stmt::{Block, Program, Stmt};
