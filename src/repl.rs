//! Interactive shell for Mica.
//!
//! Keeps one live session per engine: the bytecode path persists its symbol
//! table, constant pool and globals array across lines, the tree-walk path
//! its environment, so bindings survive from line to line.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::bytecode::symbol::SymbolTable;
use crate::bytecode::vm::GLOBALS_SIZE;
use crate::bytecode::{Compiler, Vm};
use crate::interpreter::Interpreter;
use crate::lexer::Scanner;
use crate::parser::Parser;
use crate::runtime::Value;
use crate::ExecutionMode;

const HISTORY_FILE: &str = ".mica_history";
const PROMPT: &str = ">> ";

pub struct Repl {
    mode: ExecutionMode,
    history_file: PathBuf,
    // Bytecode session state
    symbol_table: Rc<RefCell<SymbolTable>>,
    constants: Vec<Value>,
    globals: Vec<Value>,
    // Tree-walk session state
    interpreter: Interpreter,
}

impl Repl {
    pub fn new() -> Self {
        Self {
            mode: ExecutionMode::default(),
            history_file: Self::history_path(),
            symbol_table: SymbolTable::global(),
            constants: Vec::new(),
            globals: vec![Value::Null; GLOBALS_SIZE],
            interpreter: Interpreter::new(),
        }
    }

    fn history_path() -> PathBuf {
        match dirs::home_dir() {
            Some(home) => home.join(HISTORY_FILE),
            None => PathBuf::from(HISTORY_FILE),
        }
    }

    pub fn run(&mut self) {
        println!("Mica {}", env!("CARGO_PKG_VERSION"));
        println!("Type .help for available commands.\n");

        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                eprintln!("{} failed to start line editor: {}", "error:".red(), e);
                return;
            }
        };
        let _ = editor.load_history(&self.history_file);

        loop {
            match editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = editor.add_history_entry(line);
                    if line == ".exit" || line == ".quit" || line == "exit" || line == "quit" {
                        break;
                    }
                    if line.starts_with('.') {
                        self.handle_command(line);
                    } else {
                        self.execute(line);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("{} {}", "error:".red(), e);
                    break;
                }
            }
        }
        let _ = editor.save_history(&self.history_file);
        println!("Goodbye!");
    }

    fn handle_command(&mut self, line: &str) {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some(".help") => {
                println!(".help         show this help");
                println!(".mode         show the active engine");
                println!(".mode vm      switch to the bytecode VM");
                println!(".mode walk    switch to the tree-walking interpreter");
                println!(".exit         leave the shell");
            }
            Some(".mode") => match parts.next() {
                None => println!("mode: {}", self.mode_name()),
                Some("vm") => {
                    self.mode = ExecutionMode::Bytecode;
                    println!("mode: {}", self.mode_name());
                }
                Some("walk") => {
                    self.mode = ExecutionMode::TreeWalk;
                    println!("mode: {}", self.mode_name());
                }
                Some(other) => {
                    eprintln!("{} unknown mode '{}', try vm or walk", "error:".red(), other)
                }
            },
            _ => eprintln!("{} unknown command '{}', try .help", "error:".red(), line),
        }
    }

    fn mode_name(&self) -> &'static str {
        match self.mode {
            ExecutionMode::Bytecode => "vm",
            ExecutionMode::TreeWalk => "walk",
        }
    }

    fn execute(&mut self, line: &str) {
        let tokens = Scanner::new(line).scan_tokens();
        let program = match Parser::new(tokens).parse() {
            Ok(program) => program,
            Err(e) => {
                eprintln!("{} {}", "parse error:".red(), e);
                return;
            }
        };

        match self.mode {
            ExecutionMode::Bytecode => {
                let mut compiler =
                    Compiler::with_state(self.symbol_table.clone(), self.constants.clone());
                let bytecode = match compiler.compile(&program) {
                    Ok(bytecode) => bytecode,
                    Err(e) => {
                        eprintln!("{} {}", "compile error:".red(), e);
                        return;
                    }
                };
                self.constants = bytecode.constants.clone();

                let mut vm = Vm::with_globals(bytecode, std::mem::take(&mut self.globals));
                let outcome = vm.run();
                let result = vm.last_popped().clone();
                self.globals = vm.into_globals();
                match outcome {
                    Ok(()) => println!("{}", result.inspect()),
                    Err(e) => eprintln!("{} {}", "runtime error:".red(), e),
                }
            }
            ExecutionMode::TreeWalk => match self.interpreter.interpret(&program) {
                Ok(result) => println!("{}", result.inspect()),
                Err(e) => eprintln!("{} {}", "runtime error:".red(), e),
            },
        }
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}
