// File: src/errors.rs
//
// Structured error types for compile-time and runtime failures, rendered
// with `colored` the way the rest of this crate's diagnostics are.

use colored::Colorize;
use std::fmt;

/// One compiler diagnostic: the line it was raised on and the rendered
/// "Error at '<lexeme>': <message>" text (built by the compiler, which
/// already knows whether it was at a token, at `<eof>`, or unattached).
#[derive(Debug, Clone)]
pub struct CompileDiagnostic {
    pub line: usize,
    pub text: String,
}

impl fmt::Display for CompileDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] {}", self.line, self.text)
    }
}

/// Raised when compilation fails. Carries every diagnostic the compiler
/// accumulated, not just the first -- panic-mode recovery lets the
/// compiler keep scanning for more errors after the first one.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub diagnostics: Vec<CompileDiagnostic>,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diag in &self.diagnostics {
            writeln!(f, "{}", diag.to_string().red().bold())?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Raised when the VM aborts mid-dispatch. Carries the message plus a
/// snapshot of the call stack at the point of failure, one entry per
/// live frame, innermost first.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub trace: Vec<String>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        RuntimeError { message: message.into(), trace: Vec::new() }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message.red().bold())?;
        for frame in &self.trace {
            writeln!(f, "{}", frame.dimmed())?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}
