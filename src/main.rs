// File: src/main.rs
//
// Entry point: `ruff [PATH] [--trace] [--print-disassembly]`. With a path,
// runs that file and exits with a code reflecting how it went. Without
// one, drops into the REPL.

mod bytecode;
mod compiler;
mod debug;
mod errors;
mod lexer;
mod repl;
mod vm;

use clap::Parser as ClapParser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(ClapParser)]
#[command(name = "ruff", about = "Ruff: a small bytecode-compiled scripting language", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to a .ruff script. Omit to start the REPL.
    path: Option<PathBuf>,

    /// Print each instruction and the value stack as it executes.
    #[arg(long)]
    trace: bool,

    /// Print the compiled chunk's disassembly before running it.
    #[arg(long)]
    print_disassembly: bool,
}

const EX_USAGE: u8 = 64;
const EX_COMPILE_ERROR: u8 = 65;
const EX_RUNTIME_ERROR: u8 = 70;
const EX_IOERR: u8 = 74;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // `--help`/`--version` also surface as an "error" here; only a
            // genuine usage mistake should map to the usage exit code.
            return if err.exit_code() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EX_USAGE)
            };
        }
    };

    match cli.path {
        Some(path) => run_file(&path, cli.trace, cli.print_disassembly),
        None => {
            let mut vm = vm::Vm::new();
            vm.set_trace(cli.trace);
            match repl::run(&mut vm) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("{err}");
                    ExitCode::from(EX_IOERR)
                }
            }
        }
    }
}

fn run_file(path: &PathBuf, trace: bool, print_disassembly: bool) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read '{}': {err}", path.display());
            return ExitCode::from(EX_IOERR);
        }
    };

    let mut vm = vm::Vm::new();
    vm.set_trace(trace);

    if print_disassembly {
        let mut interner = bytecode::Interner::new();
        match compiler::Compiler::compile(&source, &mut interner) {
            Ok(function) => {
                print!("{}", debug::disassemble_chunk(&function.chunk, "script"));
            }
            Err(err) => {
                eprintln!("{err}");
                return ExitCode::from(EX_COMPILE_ERROR);
            }
        }
    }

    match vm.interpret_checked(&source) {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(runtime_err)) => {
            eprintln!("{runtime_err}");
            ExitCode::from(EX_RUNTIME_ERROR)
        }
        Err(compile_err) => {
            eprintln!("{compile_err}");
            ExitCode::from(EX_COMPILE_ERROR)
        }
    }
}
