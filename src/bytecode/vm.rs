//! Stack-based virtual machine executing Mica bytecode.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{InfixOp, PrefixOp};
use crate::bytecode::compiler::Bytecode;
use crate::bytecode::frame::Frame;
use crate::bytecode::instruction::OpCode;
use crate::error::RuntimeError;
use crate::runtime::builtins::{BuiltinDef, BUILTINS};
use crate::runtime::ops;
use crate::runtime::value::{Closure, CompiledFunction, HashKey, HashPair, Value};

/// Operand stack capacity; locals live here too.
pub const STACK_SIZE: usize = 2048;
/// Number of global slots.
pub const GLOBALS_SIZE: usize = 65536;
/// Call-frame stack capacity.
pub const FRAMES_SIZE: usize = 1024;

/// Result type for VM execution.
pub type VmResult<T> = Result<T, RuntimeError>;

/// The virtual machine: one operand stack, one frame stack, one globals
/// array, plus the read-only constant pool produced by the compiler.
pub struct Vm {
    constants: Vec<Value>,
    stack: Vec<Value>,
    /// Next free stack slot; `stack[sp]` is the last popped value
    sp: usize,
    globals: Vec<Value>,
    frames: Vec<Frame>,
}

impl Vm {
    /// A VM with a fresh globals array.
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_globals(bytecode, vec![Value::Null; GLOBALS_SIZE])
    }

    /// A VM reusing an existing globals array; the REPL uses this to keep
    /// bindings alive across lines.
    pub fn with_globals(bytecode: Bytecode, globals: Vec<Value>) -> Self {
        // The top-level instructions run in a synthetic closure with no
        // free values, so the dispatch loop has a single code path.
        let main_fn = Rc::new(CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        });
        let main_closure = Rc::new(Closure {
            func: main_fn,
            free: Vec::new(),
        });
        let mut frames = Vec::with_capacity(FRAMES_SIZE);
        frames.push(Frame::new(main_closure, 0));

        Self {
            constants: bytecode.constants,
            stack: vec![Value::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames,
        }
    }

    /// Take back the globals array after a run.
    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    /// The slot just above the stack pointer: the value most recently
    /// popped by a trailing `OpPop`. The REPL prints this.
    pub fn last_popped(&self) -> &Value {
        &self.stack[self.sp]
    }

    /// Execute until the main frame's cursor reaches the end of its
    /// instructions.
    pub fn run(&mut self) -> VmResult<()> {
        while self.frame().ins_index < self.frame().instructions().len() {
            let byte = self.read_u8();
            let op = OpCode::from_u8(byte).ok_or(RuntimeError::UnknownOpcode(byte))?;
            self.execute(op)?;
        }
        Ok(())
    }

    fn execute(&mut self, op: OpCode) -> VmResult<()> {
        match op {
            OpCode::Constant => {
                let index = self.read_u16() as usize;
                let value = self.read_constant(index)?;
                self.push(value)?;
            }
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::True => self.push(Value::Boolean(true))?,
            OpCode::False => self.push(Value::Boolean(false))?,
            OpCode::Null => self.push(Value::Null)?,

            OpCode::Array => {
                let count = self.read_u16() as usize;
                let elements = self.pop_n_reversed(count)?;
                self.push(Value::Array(Rc::new(elements)))?;
            }
            OpCode::Hash => {
                let count = self.read_u16() as usize;
                self.build_hash(count)?;
            }

            OpCode::Add => self.binary_op(InfixOp::Add)?,
            OpCode::Sub => self.binary_op(InfixOp::Sub)?,
            OpCode::Mul => self.binary_op(InfixOp::Mul)?,
            OpCode::Div => self.binary_op(InfixOp::Div)?,
            OpCode::Equal => self.binary_op(InfixOp::Eq)?,
            OpCode::NotEqual => self.binary_op(InfixOp::NotEq)?,
            OpCode::GreaterThan => self.binary_op(InfixOp::Gt)?,
            OpCode::LowerThan => self.binary_op(InfixOp::Lt)?,

            OpCode::Minus => self.unary_op(PrefixOp::Neg)?,
            OpCode::Bang => self.unary_op(PrefixOp::Not)?,

            OpCode::Index => {
                let index = self.pop()?;
                let left = self.pop()?;
                let result = ops::eval_index(&left, &index)?;
                self.push(result)?;
            }

            OpCode::Jump => {
                let target = self.read_u16() as usize;
                self.frame_mut().ins_index = target;
            }
            OpCode::JumpIfFalse => {
                let target = self.read_u16() as usize;
                let condition = self.pop()?;
                if !ops::is_truthy(&condition) {
                    self.frame_mut().ins_index = target;
                }
            }

            OpCode::SetGlobal => {
                let index = self.read_u16() as usize;
                if index >= self.globals.len() {
                    return Err(RuntimeError::GlobalsOverflow);
                }
                self.globals[index] = self.pop()?;
            }
            OpCode::GetGlobal => {
                let index = self.read_u16() as usize;
                let value = self.globals[index].clone();
                self.push(value)?;
            }
            OpCode::SetLocal => {
                let index = self.read_u16() as usize;
                let base = self.frame().base_stack_index;
                self.stack[base + index] = self.pop()?;
            }
            OpCode::GetLocal => {
                let index = self.read_u16() as usize;
                let base = self.frame().base_stack_index;
                let value = self.stack[base + index].clone();
                self.push(value)?;
            }
            OpCode::GetBuiltin => {
                let index = self.read_u8() as usize;
                self.push(Value::Builtin(&BUILTINS[index]))?;
            }
            OpCode::GetFree => {
                let index = self.read_u8() as usize;
                let value = self.frame().closure.free[index].clone();
                self.push(value)?;
            }

            OpCode::Call => {
                let arg_count = self.read_u8() as usize;
                self.call(arg_count)?;
            }
            OpCode::Closure => {
                let fn_index = self.read_u16() as usize;
                let free_count = self.read_u8() as usize;
                self.build_closure(fn_index, free_count)?;
            }
            OpCode::CurrentClosure => {
                let closure = self.frame().closure.clone();
                self.push(Value::Closure(closure))?;
            }

            OpCode::ReturnValue => {
                let value = self.pop()?;
                let frame = self.pop_frame()?;
                self.sp = frame.base_stack_index - 1;
                self.push(value)?;
            }
            OpCode::Return => {
                let frame = self.pop_frame()?;
                self.sp = frame.base_stack_index - 1;
                self.push(Value::Null)?;
            }
        }
        Ok(())
    }

    fn frame(&self) -> &Frame {
        self.frames.last().expect("frame stack is never empty")
    }

    fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack is never empty")
    }

    fn pop_frame(&mut self) -> VmResult<Frame> {
        // The main frame must stay: returning from it would tear down the
        // whole machine.
        if self.frames.len() < 2 {
            return Err(RuntimeError::ReturnOutsideFunction);
        }
        self.frames.pop().ok_or(RuntimeError::ReturnOutsideFunction)
    }

    fn read_u8(&mut self) -> u8 {
        let frame = self.frame_mut();
        let byte = frame.closure.func.instructions[frame.ins_index];
        frame.ins_index += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let frame = self.frame_mut();
        let instructions = &frame.closure.func.instructions;
        let value = u16::from_be_bytes([
            instructions[frame.ins_index],
            instructions[frame.ins_index + 1],
        ]);
        frame.ins_index += 2;
        value
    }

    fn read_constant(&self, index: usize) -> VmResult<Value> {
        self.constants
            .get(index)
            .cloned()
            .ok_or(RuntimeError::MissingConstant(index))
    }

    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> VmResult<Value> {
        if self.sp == 0 {
            return Err(RuntimeError::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.stack[self.sp].clone())
    }

    /// Pop `count` values and return them in original push order.
    fn pop_n_reversed(&mut self, count: usize) -> VmResult<Vec<Value>> {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.pop()?);
        }
        values.reverse();
        Ok(values)
    }

    fn binary_op(&mut self, operator: InfixOp) -> VmResult<()> {
        let right = self.pop()?;
        let left = self.pop()?;
        let result = ops::eval_infix(&left, operator, &right)?;
        self.push(result)
    }

    fn unary_op(&mut self, operator: PrefixOp) -> VmResult<()> {
        let operand = self.pop()?;
        let result = ops::eval_prefix(operator, &operand)?;
        self.push(result)
    }

    /// Pop `count` pairs (value on top of its key) and assemble the hash,
    /// keeping entries in their original push order.
    fn build_hash(&mut self, count: usize) -> VmResult<()> {
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let value = self.pop()?;
            let key = self.pop()?;
            entries.push((key, value));
        }

        let mut pairs = IndexMap::with_capacity(count);
        for (key, value) in entries.into_iter().rev() {
            let hash_key =
                HashKey::from_value(&key).ok_or(RuntimeError::UnhashableKey(key.type_name()))?;
            pairs.insert(hash_key, HashPair { key, value });
        }
        self.push(Value::Hash(Rc::new(pairs)))
    }

    fn build_closure(&mut self, fn_index: usize, free_count: usize) -> VmResult<()> {
        let constant = self.read_constant(fn_index)?;
        let Value::CompiledFunction(func) = constant else {
            return Err(RuntimeError::NotAFunctionConstant(fn_index));
        };
        let free = self.pop_n_reversed(free_count)?;
        self.push(Value::Closure(Rc::new(Closure { func, free })))
    }

    /// Dispatch a call. The callee sits under its arguments.
    fn call(&mut self, arg_count: usize) -> VmResult<()> {
        let callee = self.stack[self.sp - arg_count - 1].clone();
        match callee {
            Value::Closure(closure) => self.call_closure(closure, arg_count),
            Value::Builtin(builtin) => self.call_builtin(builtin, arg_count),
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, arg_count: usize) -> VmResult<()> {
        if closure.func.num_parameters != arg_count {
            return Err(RuntimeError::WrongArity {
                expected: closure.func.num_parameters,
                got: arg_count,
            });
        }
        if self.frames.len() >= FRAMES_SIZE {
            return Err(RuntimeError::FrameOverflow);
        }
        // Arguments already sit in the frame's first local slots; the
        // callee itself stays just below the base, where CurrentClosure
        // reads it through the frame.
        let base = self.sp - arg_count;
        let num_locals = closure.func.num_locals;
        self.frames.push(Frame::new(closure, base));
        self.sp += num_locals;
        if self.sp > STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        Ok(())
    }

    fn call_builtin(&mut self, builtin: &'static BuiltinDef, arg_count: usize) -> VmResult<()> {
        let arguments = self.pop_n_reversed(arg_count)?;
        self.pop()?; // the builtin itself
        let result = (builtin.func)(&arguments)?;
        self.push(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compiler::Compiler;
    use crate::bytecode::symbol::SymbolTable;
    use crate::lexer::Scanner;
    use crate::parser::Parser;

    fn compile(source: &str) -> Bytecode {
        let tokens = Scanner::new(source).scan_tokens();
        let program = Parser::new(tokens)
            .parse()
            .unwrap_or_else(|e| panic!("parse error for {:?}: {}", source, e));
        Compiler::new()
            .compile(&program)
            .unwrap_or_else(|e| panic!("compile error for {:?}: {}", source, e))
    }

    fn run(source: &str) -> Value {
        let mut vm = Vm::new(compile(source));
        vm.run()
            .unwrap_or_else(|e| panic!("runtime error for {:?}: {}", source, e));
        vm.last_popped().clone()
    }

    fn run_err(source: &str) -> RuntimeError {
        let mut vm = Vm::new(compile(source));
        vm.run()
            .expect_err(&format!("expected a runtime error for {:?}", source))
    }

    fn check_int(cases: &[(&str, i64)]) {
        for (source, expected) in cases {
            assert_eq!(run(source), Value::Integer(*expected), "source: {}", source);
        }
    }

    fn check_bool(cases: &[(&str, bool)]) {
        for (source, expected) in cases {
            assert_eq!(run(source), Value::Boolean(*expected), "source: {}", source);
        }
    }

    #[test]
    fn runs_integer_arithmetic() {
        check_int(&[
            ("1;", 1),
            ("2;", 2),
            ("1 + 2;", 3),
            ("1 - 2;", -1),
            ("1 * 2;", 2),
            ("4 / 2;", 2),
            ("50 / 2 * 2 + 10 - 5;", 55),
            ("5 + 5 + 5 + 5 - 10;", 10),
            ("2 * 2 * 2 * 2 * 2;", 32),
            ("5 * 2 + 10;", 20),
            ("5 + 2 * 10;", 25),
            ("5 * (2 + 10);", 60),
            ("-5;", -5),
            ("-50 + 100 + -50;", 0),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10;", 50),
            ("-0;", 0),
        ]);
    }

    #[test]
    fn runs_boolean_expressions() {
        check_bool(&[
            ("true;", true),
            ("false;", false),
            ("1 < 2;", true),
            ("1 > 2;", false),
            ("1 < 1;", false),
            ("1 > 1;", false),
            ("1 == 1;", true),
            ("1 != 1;", false),
            ("1 == 2;", false),
            ("1 != 2;", true),
            ("true == true;", true),
            ("false == false;", true),
            ("true == false;", false),
            ("true != false;", true),
            ("(1 < 2) == true;", true),
            ("(1 < 2) == false;", false),
            ("(1 > 2) == true;", false),
            ("(1 > 2) == false;", true),
            ("!true;", false),
            ("!false;", true),
            ("!5;", false),
            ("!!true;", true),
            ("!!false;", false),
            ("!!5;", true),
            (r#""a" == "a";"#, true),
            (r#""a" != "b";"#, true),
            // Cross-kind comparison is false, never fatal.
            ("1 == \"1\";", false),
            ("1 != true;", true),
            ("-0 == 0;", true),
        ]);
    }

    #[test]
    fn runs_conditionals() {
        check_int(&[
            ("if (true) { 10 };", 10),
            ("if (true) { 10 } else { 20 };", 10),
            ("if (false) { 10 } else { 20 };", 20),
            ("if (1) { 10 };", 10),
            ("if (1 < 2) { 10 };", 10),
            ("if (1 < 2) { 10 } else { 20 };", 10),
            ("if (1 > 2) { 10 } else { 20 };", 20),
            ("if (if (false) { 10 }) { 10 } else { 20 };", 20),
        ]);
        assert_eq!(run("if (1 > 2) { 10 };"), Value::Null);
        assert_eq!(run("if (false) { 10 };"), Value::Null);
        assert_eq!(run("!(if (false) { 5 });"), Value::Boolean(true));
        assert_eq!(run("if (true) { let a = 1; };"), Value::Null);
    }

    #[test]
    fn runs_global_let_statements() {
        check_int(&[
            ("let one = 1; one;", 1),
            ("let one = 1; let two = 2; one + two;", 3),
            ("let one = 1; let two = one + one; one + two;", 3),
        ]);
    }

    #[test]
    fn runs_string_expressions() {
        assert_eq!(run(r#""mica";"#), Value::from_string("mica"));
        assert_eq!(run(r#""mi" + "ca";"#), Value::from_string("mica"));
        assert_eq!(
            run(r#""hello" + " " + "world";"#),
            Value::from_string("hello world")
        );
    }

    #[test]
    fn runs_array_literals() {
        assert_eq!(run("[];").inspect(), "[]");
        assert_eq!(run("[1, 2, 3];").inspect(), "[1, 2, 3]");
        assert_eq!(run("[1 + 2, 3 * 4, 5 + 6];").inspect(), "[3, 12, 11]");
    }

    #[test]
    fn runs_hash_literals() {
        assert_eq!(run("{};").inspect(), "{}");
        assert_eq!(run("{1: 2, 2: 3};").inspect(), "{1: 2, 2: 3}");
        assert_eq!(
            run("{1 + 1: 2 * 2, 3 + 3: 4 * 4};").inspect(),
            "{2: 4, 6: 16}"
        );
        assert_eq!(
            run(r#"{"a": 1, true: 2, 3: 4};"#).inspect(),
            "{a: 1, true: 2, 3: 4}"
        );
    }

    #[test]
    fn runs_index_expressions() {
        check_int(&[
            ("[1, 2, 3][1];", 2),
            ("[[1, 1, 1]][0][0];", 1),
            ("[1, 2, 3][0] + [1, 2, 3][1] + [1, 2, 3][2];", 6),
            ("let a = [1, 2, 3]; a[2];", 3),
            ("{1: 1, 2: 2}[1];", 1),
            ("{1: 1, 2: 2}[2];", 2),
        ]);
        assert_eq!(run("[1, 2, 3][3];"), Value::Null);
        assert_eq!(run("[1, 2, 3][-1];"), Value::Null);
        assert_eq!(run("[][0];"), Value::Null);
        assert_eq!(run("{1: 1}[0];"), Value::Null);
        assert_eq!(run("{}[0];"), Value::Null);
    }

    #[test]
    fn hash_lookup_with_mixed_key_types() {
        let source = r#"
            let h = {1: 10, "two": 20, true: 30};
            h[1] + h["two"] + h[true];
        "#;
        assert_eq!(run(source), Value::Integer(60));
    }

    #[test]
    fn calls_functions_without_arguments() {
        check_int(&[
            ("let fivePlusTen = fn() { 5 + 10; }; fivePlusTen();", 15),
            ("let one = fn() { 1; }; let two = fn() { 2; }; one() + two();", 3),
            (
                "let a = fn() { 1 }; let b = fn() { a() + 1 }; let c = fn() { b() + 1 }; c();",
                3,
            ),
            ("fn() { 24 }();", 24),
        ]);
    }

    #[test]
    fn early_returns_stop_execution() {
        check_int(&[
            ("let earlyExit = fn() { return 99; 100; }; earlyExit();", 99),
            ("let earlyExit = fn() { return 99; return 100; }; earlyExit();", 99),
        ]);
    }

    #[test]
    fn functions_without_return_values_yield_null() {
        assert_eq!(run("let noReturn = fn() { }; noReturn();"), Value::Null);
        assert_eq!(
            run("let noReturn = fn() { };
                 let noReturnTwo = fn() { noReturn(); };
                 noReturn();
                 noReturnTwo();"),
            Value::Null
        );
        assert_eq!(run("let bind = fn() { let a = 1; }; bind();"), Value::Null);
    }

    #[test]
    fn functions_are_first_class() {
        check_int(&[(
            "let returnsOne = fn() { 1; };
             let returnsOneReturner = fn() { returnsOne; };
             returnsOneReturner()();",
            1,
        )]);
    }

    #[test]
    fn calls_functions_with_local_bindings() {
        check_int(&[
            ("let one = fn() { let one = 1; one }; one();", 1),
            (
                "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; }; oneAndTwo();",
                3,
            ),
            (
                "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; };
                 let threeAndFour = fn() { let three = 3; let four = 4; three + four; };
                 oneAndTwo() + threeAndFour();",
                10,
            ),
            (
                "let firstFoobar = fn() { let foobar = 50; foobar; };
                 let secondFoobar = fn() { let foobar = 100; foobar; };
                 firstFoobar() + secondFoobar();",
                150,
            ),
            (
                "let globalSeed = 50;
                 let minusOne = fn() { let num = 1; globalSeed - num; };
                 let minusTwo = fn() { let num = 2; globalSeed - num; };
                 minusOne() + minusTwo();",
                97,
            ),
        ]);
    }

    #[test]
    fn calls_functions_with_arguments() {
        check_int(&[
            ("let identity = fn(a) { a; }; identity(4);", 4),
            ("let sum = fn(a, b) { a + b; }; sum(1, 2);", 3),
            ("let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2);", 3),
            (
                "let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2) + sum(3, 4);",
                10,
            ),
            (
                "let sum = fn(a, b) { let c = a + b; c; };
                 let outer = fn() { sum(1, 2) + sum(3, 4); };
                 outer();",
                10,
            ),
            (
                "let globalNum = 10;
                 let sum = fn(a, b) { let c = a + b; c + globalNum; };
                 let outer = fn() { sum(1, 2) + sum(3, 4) + globalNum; };
                 outer() + globalNum;",
                50,
            ),
        ]);
    }

    #[test]
    fn calling_with_wrong_arity_fails() {
        assert_eq!(
            run_err("fn() { 1; }(1);"),
            RuntimeError::WrongArity {
                expected: 0,
                got: 1,
            }
        );
        assert_eq!(
            run_err("fn(a) { a; }();"),
            RuntimeError::WrongArity {
                expected: 1,
                got: 0,
            }
        );
        assert_eq!(
            run_err("fn(a, b) { a + b; }(1);"),
            RuntimeError::WrongArity {
                expected: 2,
                got: 1,
            }
        );
    }

    #[test]
    fn runs_builtin_functions() {
        check_int(&[
            (r#"len("");"#, 0),
            (r#"len("four");"#, 4),
            (r#"len("hello world");"#, 11),
            ("len([1, 2, 3]);", 3),
            ("len([]);", 0),
            ("len(rest([1, 2, 3]));", 2),
            ("first([1, 2, 3]);", 1),
            ("last([1, 2, 3]);", 3),
        ]);
        assert_eq!(run("puts(\"hello\");"), Value::Null);
        assert_eq!(run("first([]);"), Value::Null);
        assert_eq!(run("last([]);"), Value::Null);
        assert_eq!(run("rest([]);"), Value::Null);
        assert_eq!(run("rest([1, 2, 3]);").inspect(), "[2, 3]");
        assert_eq!(run("push([], 1);").inspect(), "[1]");
        assert_eq!(
            run("let a = [1, 2]; push(a, 3); a;").inspect(),
            "[1, 2]",
            "push must not mutate its argument"
        );

        assert_eq!(
            run_err("len(1);"),
            RuntimeError::BadBuiltinArgument {
                builtin: "len",
                got: "Integer",
            }
        );
        assert_eq!(
            run_err(r#"len("one", "two");"#),
            RuntimeError::BuiltinArity {
                builtin: "len",
                expected: 1,
                got: 2,
            }
        );
        assert_eq!(
            run_err("first(1);"),
            RuntimeError::BadBuiltinArgument {
                builtin: "first",
                got: "Integer",
            }
        );
        assert_eq!(
            run_err("push(1, 1);"),
            RuntimeError::BadBuiltinArgument {
                builtin: "push",
                got: "Integer",
            }
        );
    }

    #[test]
    fn runs_closures() {
        check_int(&[
            (
                "let newClosure = fn(a) { fn() { a; }; };
                 let closure = newClosure(99);
                 closure();",
                99,
            ),
            (
                "let newAdder = fn(a) { fn(b) { a + b; }; };
                 let add3 = newAdder(3);
                 add3(4);",
                7,
            ),
            (
                "let newAdder = fn(a, b) { fn(c) { a + b + c }; };
                 let adder = newAdder(1, 2);
                 adder(8);",
                11,
            ),
            (
                "let newAdder = fn(a, b) { let c = a + b; fn(d) { c + d }; };
                 let adder = newAdder(1, 2);
                 adder(8);",
                11,
            ),
            (
                "let newAdderOuter = fn(a, b) {
                     let c = a + b;
                     fn(d) { let e = d + c; fn(f) { e + f; }; };
                 };
                 let newAdderInner = newAdderOuter(1, 2);
                 let adder = newAdderInner(3);
                 adder(8);",
                14,
            ),
            (
                "let a = 1;
                 let newAdderOuter = fn(b) { fn(c) { fn(d) { a + b + c + d }; }; };
                 let newAdderInner = newAdderOuter(2);
                 let adder = newAdderInner(3);
                 adder(8);",
                14,
            ),
            (
                "let newClosure = fn(a, b) {
                     let one = fn() { a; };
                     let two = fn() { b; };
                     fn() { one() + two(); };
                 };
                 let closure = newClosure(9, 90);
                 closure();",
                99,
            ),
        ]);
    }

    #[test]
    fn globals_pass_through_nested_functions_without_capture() {
        let source = "
            let a = 1;
            let f = fn() { let g = fn() { fn() { a; }; }; g()(); };
            f();
        ";
        assert_eq!(run(source), Value::Integer(1));
    }

    #[test]
    fn runs_recursive_functions() {
        check_int(&[
            (
                "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
                 countDown(1);",
                0,
            ),
            (
                "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
                 let wrapper = fn() { countDown(1); };
                 wrapper();",
                0,
            ),
            (
                "let wrapper = fn() {
                     let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
                     countDown(1);
                 };
                 wrapper();",
                0,
            ),
            (
                "let fib = fn(n) { if (n < 2) { n } else { fib(n - 1) + fib(n - 2) } };
                 fib(10);",
                55,
            ),
        ]);
    }

    #[test]
    fn runaway_recursion_overflows_the_frame_stack() {
        assert_eq!(
            run_err("let f = fn() { f(); }; f();"),
            RuntimeError::FrameOverflow
        );
    }

    #[test]
    fn type_errors_are_fatal() {
        assert_eq!(
            run_err("5 + true;"),
            RuntimeError::InvalidInfixOperands {
                operator: "+",
                left: "Integer",
                right: "Boolean",
            }
        );
        assert_eq!(
            run_err("5 + true; 5;"),
            RuntimeError::InvalidInfixOperands {
                operator: "+",
                left: "Integer",
                right: "Boolean",
            }
        );
        assert_eq!(
            run_err("-true;"),
            RuntimeError::InvalidPrefixOperand {
                operator: "-",
                operand: "Boolean",
            }
        );
        assert_eq!(run_err("1 / 0;"), RuntimeError::DivisionByZero);
        assert_eq!(run_err("1(2);"), RuntimeError::NotCallable("Integer"));
        assert_eq!(
            run_err(r#""str"[0];"#),
            RuntimeError::NotIndexable {
                left: "String",
                index: "Integer",
            }
        );
        assert_eq!(run_err("{[1]: 2};"), RuntimeError::UnhashableKey("Array"));
        assert_eq!(
            run_err("{1: 2}[fn() { 1 }];"),
            RuntimeError::UnhashableKey("Closure")
        );
    }

    #[test]
    fn top_level_return_cannot_tear_down_the_machine() {
        assert_eq!(run_err("return 5;"), RuntimeError::ReturnOutsideFunction);
    }

    #[test]
    fn stack_settles_after_every_statement() {
        let sources = [
            "1 + 2;",
            "let a = 1;",
            "let a = 1; a + 2;",
            "let f = fn(x) { x * 2 }; f(21);",
            "if (true) { 1 } else { 2 };",
        ];
        for source in sources {
            let mut vm = Vm::new(compile(source));
            vm.run().unwrap();
            assert_eq!(vm.sp, 0, "stack pointer after {:?}", source);
        }
    }

    #[test]
    fn globals_survive_across_runs_when_reused() {
        let symbol_table = SymbolTable::global();
        let mut compiler = Compiler::with_state(symbol_table.clone(), Vec::new());
        let tokens = Scanner::new("let a = 41;").scan_tokens();
        let program = Parser::new(tokens).parse().unwrap();
        let bytecode = compiler.compile(&program).unwrap();

        let mut vm = Vm::new(bytecode.clone());
        vm.run().unwrap();
        let globals = vm.into_globals();

        let mut compiler = Compiler::with_state(symbol_table, bytecode.constants);
        let tokens = Scanner::new("a + 1;").scan_tokens();
        let program = Parser::new(tokens).parse().unwrap();
        let bytecode = compiler.compile(&program).unwrap();

        let mut vm = Vm::with_globals(bytecode, globals);
        vm.run().unwrap();
        assert_eq!(vm.last_popped(), &Value::Integer(42));
    }

    #[test]
    fn closure_constant_mismatch_is_fatal() {
        use crate::bytecode::instruction::{make, OpCode};

        // Hand-built bytecode whose Closure operand points at an integer.
        let bytecode = Bytecode {
            instructions: make(OpCode::Closure, &[0, 0]),
            constants: vec![Value::Integer(7)],
        };
        let mut vm = Vm::new(bytecode);
        assert_eq!(vm.run(), Err(RuntimeError::NotAFunctionConstant(0)));
    }

    #[test]
    fn undefined_opcodes_are_fatal() {
        let bytecode = Bytecode {
            instructions: vec![0xfe],
            constants: vec![],
        };
        let mut vm = Vm::new(bytecode);
        assert_eq!(vm.run(), Err(RuntimeError::UnknownOpcode(0xfe)));
    }
}
