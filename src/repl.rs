// File: src/repl.rs
//
// Interactive REPL: reads one line at a time, compiles and runs it against
// a persistent `Vm`, and prints whatever it printed. Globals and interned
// strings accumulate across lines, the way they would across statements in
// a single script.

use crate::vm::Vm;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Lines past this length are rejected rather than handed to the compiler.
const MAX_LINE_LEN: usize = 1024;

pub fn run(vm: &mut Vm) -> Result<(), Box<dyn std::error::Error>> {
    let mut editor = DefaultEditor::new()?;
    println!("{}", "ruff".bright_cyan().bold());

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());

                if line.trim().is_empty() {
                    continue;
                }
                if line.len() > MAX_LINE_LEN {
                    eprintln!("{}", "Line too long (max 1024 bytes).".red());
                    continue;
                }

                if let Err(compile_err) = vm.interpret(&line) {
                    eprint!("{compile_err}");
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(Box::new(err)),
        }
    }

    Ok(())
}
