//! Bytecode compiler: transforms the AST into instructions and constants.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{Block, Expr, FunctionLiteral, InfixOp, PrefixOp, Program, Stmt};
use crate::bytecode::instruction::{self, Instructions, OpCode};
use crate::bytecode::symbol::{Symbol, SymbolScope, SymbolTable};
use crate::error::CompileError;
use crate::runtime::value::{CompiledFunction, Value};

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Jump operand emitted before the target is known; patched in place.
const PLACEHOLDER: usize = 9999;

/// The compiler's output: an instruction stream plus its constant pool.
/// Constants are append-only, so their indices are stable.
#[derive(Debug, Clone, PartialEq)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Value>,
}

/// The opcode and offset of an instruction already written to a scope.
struct EmittedInstruction {
    opcode: OpCode,
    position: usize,
}

/// Per-scope instruction buffer. Tracking the last two emitted instructions
/// makes truncating a trailing `OpPop` a bounded operation.
struct CompilationScope {
    instructions: Instructions,
    last: Option<EmittedInstruction>,
    previous: Option<EmittedInstruction>,
}

impl CompilationScope {
    fn new() -> Self {
        Self {
            instructions: Instructions::new(),
            last: None,
            previous: None,
        }
    }
}

/// The bytecode compiler.
pub struct Compiler {
    /// Instruction buffers, one per function scope being compiled
    scopes: Vec<CompilationScope>,
    /// The symbol table of the scope being compiled
    symbol_table: Rc<RefCell<SymbolTable>>,
    /// The constant pool under construction
    constants: Vec<Value>,
}

impl Compiler {
    /// A fresh compiler whose symbol table is the global scope.
    pub fn new() -> Self {
        Self::with_state(SymbolTable::global(), Vec::new())
    }

    /// A compiler that continues from an existing symbol table and constant
    /// pool; the REPL uses this to keep bindings across lines.
    pub fn with_state(symbol_table: Rc<RefCell<SymbolTable>>, constants: Vec<Value>) -> Self {
        Self {
            scopes: vec![CompilationScope::new()],
            symbol_table,
            constants,
        }
    }

    /// Compile a program.
    pub fn compile(&mut self, program: &Program) -> CompileResult<Bytecode> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }
        Ok(Bytecode {
            instructions: self.scope().instructions.clone(),
            constants: self.constants.clone(),
        })
    }

    fn scope(&self) -> &CompilationScope {
        self.scopes.last().expect("compiler scope stack is never empty")
    }

    fn scope_mut(&mut self) -> &mut CompilationScope {
        self.scopes
            .last_mut()
            .expect("compiler scope stack is never empty")
    }

    /// Append an instruction to the current scope and return its offset.
    fn emit(&mut self, op: OpCode, operands: &[usize]) -> usize {
        let instruction = instruction::make(op, operands);
        let scope = self.scope_mut();
        let position = scope.instructions.len();
        scope.instructions.extend(instruction);
        scope.previous = scope.last.take();
        scope.last = Some(EmittedInstruction {
            opcode: op,
            position,
        });
        position
    }

    fn last_is(&self, op: OpCode) -> bool {
        matches!(&self.scope().last, Some(last) if last.opcode == op)
    }

    /// Drop the trailing `OpPop` so the statement's value stays on the stack.
    fn truncate_last_pop(&mut self) {
        let scope = self.scope_mut();
        if let Some(last) = scope.last.take() {
            scope.instructions.truncate(last.position);
            scope.last = scope.previous.take();
        }
    }

    /// Rewrite the operand of the jump at `position` to the current end of
    /// the buffer. Only the operand bytes change.
    fn change_jump_operand(&mut self, position: usize) {
        let target = self.scope().instructions.len();
        assert!(target <= u16::MAX as usize, "jump target out of range");
        let bytes = (target as u16).to_be_bytes();
        let scope = self.scope_mut();
        scope.instructions[position + 1] = bytes[0];
        scope.instructions[position + 2] = bytes[1];
    }

    fn add_constant(&mut self, value: Value) -> CompileResult<usize> {
        if self.constants.len() > u16::MAX as usize {
            return Err(CompileError::TooManyConstants);
        }
        self.constants.push(value);
        Ok(self.constants.len() - 1)
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::new());
        self.symbol_table = SymbolTable::enclosed(self.symbol_table.clone());
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self
            .scopes
            .pop()
            .expect("leave_scope is only called after enter_scope");
        let outer = self
            .symbol_table
            .borrow()
            .outer()
            .expect("function scopes always have a parent");
        self.symbol_table = outer;
        scope.instructions
    }

    fn compile_statement(&mut self, statement: &Stmt) -> CompileResult<()> {
        match statement {
            Stmt::Let { name, value } => {
                // Defining before compiling the value lets the value refer
                // to the binding, which is what makes `let f = fn() {...}`
                // self-recursive.
                let symbol = self.symbol_table.borrow_mut().define(name);
                self.compile_expression(value)?;
                let op = if symbol.scope == SymbolScope::Global {
                    OpCode::SetGlobal
                } else {
                    OpCode::SetLocal
                };
                self.emit(op, &[symbol.index]);
            }
            Stmt::Return(value) => {
                self.compile_expression(value)?;
                self.emit(OpCode::ReturnValue, &[]);
            }
            Stmt::Expression(expression) => {
                self.compile_expression(expression)?;
                self.emit(OpCode::Pop, &[]);
            }
        }
        Ok(())
    }

    fn compile_expression(&mut self, expression: &Expr) -> CompileResult<()> {
        match expression {
            Expr::Integer(value) => {
                let index = self.add_constant(Value::Integer(*value))?;
                self.emit(OpCode::Constant, &[index]);
            }
            Expr::Boolean(true) => {
                self.emit(OpCode::True, &[]);
            }
            Expr::Boolean(false) => {
                self.emit(OpCode::False, &[]);
            }
            Expr::Str(value) => {
                let index = self.add_constant(Value::from_string(value.clone()))?;
                self.emit(OpCode::Constant, &[index]);
            }
            Expr::Identifier(name) => {
                let symbol = self
                    .symbol_table
                    .borrow_mut()
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                self.load_symbol(&symbol);
            }
            Expr::Prefix { operator, right } => {
                self.compile_expression(right)?;
                let op = match operator {
                    PrefixOp::Neg => OpCode::Minus,
                    PrefixOp::Not => OpCode::Bang,
                };
                self.emit(op, &[]);
            }
            Expr::Infix {
                left,
                operator,
                right,
            } => {
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                let op = match operator {
                    InfixOp::Add => OpCode::Add,
                    InfixOp::Sub => OpCode::Sub,
                    InfixOp::Mul => OpCode::Mul,
                    InfixOp::Div => OpCode::Div,
                    InfixOp::Eq => OpCode::Equal,
                    InfixOp::NotEq => OpCode::NotEqual,
                    InfixOp::Gt => OpCode::GreaterThan,
                    InfixOp::Lt => OpCode::LowerThan,
                };
                self.emit(op, &[]);
            }
            Expr::If {
                condition,
                consequence,
                alternative,
            } => self.compile_if_expression(condition, consequence, alternative.as_ref())?,
            Expr::Function(literal) => self.compile_function_literal(literal)?,
            Expr::Call {
                function,
                arguments,
            } => {
                self.compile_expression(function)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(OpCode::Call, &[arguments.len()]);
            }
            Expr::Array(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(OpCode::Array, &[elements.len()]);
            }
            Expr::Hash(entries) => {
                // Pairs compile in source order, so identical source text
                // yields identical bytecode.
                for (key, value) in entries {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(OpCode::Hash, &[entries.len()]);
            }
            Expr::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(OpCode::Index, &[]);
            }
        }
        Ok(())
    }

    fn compile_if_expression(
        &mut self,
        condition: &Expr,
        consequence: &Block,
        alternative: Option<&Block>,
    ) -> CompileResult<()> {
        self.compile_expression(condition)?;
        let jump_if_false = self.emit(OpCode::JumpIfFalse, &[PLACEHOLDER]);
        self.compile_branch(consequence)?;
        let jump_over_alternative = self.emit(OpCode::Jump, &[PLACEHOLDER]);
        self.change_jump_operand(jump_if_false);
        match alternative {
            Some(block) => self.compile_branch(block)?,
            None => {
                self.emit(OpCode::Null, &[]);
            }
        }
        self.change_jump_operand(jump_over_alternative);
        Ok(())
    }

    /// Compile an `if` branch so it leaves exactly one value on the stack:
    /// a trailing expression statement keeps its value (the `OpPop` is
    /// truncated), a branch that returned needs none, and anything else
    /// produces null.
    fn compile_branch(&mut self, block: &Block) -> CompileResult<()> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }
        if self.last_is(OpCode::Pop) {
            self.truncate_last_pop();
        } else if !self.last_is(OpCode::ReturnValue) {
            self.emit(OpCode::Null, &[]);
        }
        Ok(())
    }

    fn compile_function_literal(&mut self, literal: &FunctionLiteral) -> CompileResult<()> {
        self.enter_scope();
        if let Some(name) = &literal.name {
            self.symbol_table.borrow_mut().define_function_name(name);
        }
        for parameter in &literal.parameters {
            self.symbol_table.borrow_mut().define(parameter);
        }
        self.compile_function_body(&literal.body)?;

        let num_locals = self.symbol_table.borrow().count_definitions();
        let free = self.symbol_table.borrow().free_symbols();
        let instructions = self.leave_scope();

        // Load each captured original in the enclosing scope; the closure
        // instruction collects them off the stack.
        for symbol in &free {
            self.load_symbol(symbol);
        }
        if free.len() > u8::MAX as usize {
            return Err(CompileError::TooManyFreeVariables);
        }

        let func = Value::CompiledFunction(Rc::new(CompiledFunction {
            instructions,
            num_locals,
            num_parameters: literal.parameters.len(),
        }));
        let index = self.add_constant(func)?;
        self.emit(OpCode::Closure, &[index, free.len()]);
        Ok(())
    }

    /// Compile a function body so every path returns: an implicit value
    /// return for a trailing expression, a bare return otherwise.
    fn compile_function_body(&mut self, body: &Block) -> CompileResult<()> {
        if body.statements.is_empty() {
            self.emit(OpCode::Return, &[]);
            return Ok(());
        }
        for statement in &body.statements {
            self.compile_statement(statement)?;
        }
        if self.last_is(OpCode::Pop) {
            self.truncate_last_pop();
            self.emit(OpCode::ReturnValue, &[]);
        } else if !self.last_is(OpCode::ReturnValue) {
            self.emit(OpCode::Return, &[]);
        }
        Ok(())
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Builtin => self.emit(OpCode::GetBuiltin, &[symbol.index]),
            SymbolScope::Global => self.emit(OpCode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(OpCode::GetLocal, &[symbol.index]),
            SymbolScope::Free => self.emit(OpCode::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(OpCode::CurrentClosure, &[]),
        };
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
