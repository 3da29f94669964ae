//! Statement AST nodes.

use crate::ast::expr::Expr;

/// A parsed program: a sequence of statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// All statement variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Variable binding: `let name = value;`
    Let { name: String, value: Expr },
    /// Early return: `return value;`
    Return(Expr),
    /// A bare expression followed by an optional semicolon
    Expression(Expr),
}

/// A braced sequence of statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
}
