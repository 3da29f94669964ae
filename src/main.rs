//! Mica CLI: run files, evaluate snippets, or start the REPL.

use std::env;
use std::fs;
use std::process;

use colored::Colorize;

use mica::repl::Repl;
use mica::{run_with_options, ExecutionMode};

enum Command {
    /// Run a script file
    Run {
        file: String,
        mode: ExecutionMode,
        disassemble: bool,
    },
    /// Evaluate a string and print its value
    Eval { code: String, mode: ExecutionMode },
    /// Start the interactive shell
    Repl,
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{} {}", "error:".red(), message);
            print_usage();
            process::exit(2);
        }
    };

    match command {
        Command::Repl => Repl::new().run(),
        Command::Run {
            file,
            mode,
            disassemble,
        } => {
            let source = match fs::read_to_string(&file) {
                Ok(source) => source,
                Err(e) => {
                    eprintln!("{} cannot read '{}': {}", "error:".red(), file, e);
                    process::exit(1);
                }
            };
            if let Err(e) = run_with_options(&source, mode, disassemble) {
                eprintln!("{} {}", "error:".red(), e);
                process::exit(1);
            }
        }
        Command::Eval { code, mode } => match run_with_options(&code, mode, false) {
            Ok(value) => println!("{}", value.inspect()),
            Err(e) => {
                eprintln!("{} {}", "error:".red(), e);
                process::exit(1);
            }
        },
    }
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut mode = ExecutionMode::default();
    let mut disassemble = false;
    let mut positional = Vec::new();
    let mut eval_code: Option<String> = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--vm" => mode = ExecutionMode::Bytecode,
            "--treewalk" => mode = ExecutionMode::TreeWalk,
            "--disassemble" => disassemble = true,
            "-e" | "--eval" => {
                let code = iter.next().ok_or("-e requires an argument")?;
                eval_code = Some(code.clone());
            }
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-V" | "--version" => {
                println!("mica {}", env!("CARGO_PKG_VERSION"));
                process::exit(0);
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown option '{}'", other));
            }
            other => positional.push(other.to_string()),
        }
    }

    if let Some(code) = eval_code {
        if !positional.is_empty() {
            return Err("cannot combine -e with a file argument".to_string());
        }
        return Ok(Command::Eval { code, mode });
    }

    match positional.as_slice() {
        [] => Ok(Command::Repl),
        [file] => Ok(Command::Run {
            file: file.clone(),
            mode,
            disassemble,
        }),
        [command, file] if command == "run" => Ok(Command::Run {
            file: file.clone(),
            mode,
            disassemble,
        }),
        _ => Err("too many arguments".to_string()),
    }
}

fn print_usage() {
    println!("Usage: mica [options] [file]");
    println!();
    println!("With no file, starts the interactive shell.");
    println!();
    println!("Options:");
    println!("  -e, --eval <code>   evaluate a snippet and print its value");
    println!("      --vm            execute with the bytecode VM (default)");
    println!("      --treewalk      execute with the tree-walking interpreter");
    println!("      --disassemble   print bytecode before executing");
    println!("  -h, --help          show this help");
    println!("  -V, --version       show the version");
}
