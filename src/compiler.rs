// File: src/compiler.rs
//
// Single-pass Pratt-parsing bytecode compiler for the Ruff programming
// language. There is no intermediate AST: every handler below emits
// bytecode directly into the function currently being compiled while it
// parses, and lexical scope (locals, upvalues) is resolved in the same
// pass.

use std::rc::Rc;

use crate::bytecode::{Chunk, Interner, ObjFunction, ObjString, OpCode, UpvalueDesc, Value, MAX_ARITY};
use crate::errors::{CompileDiagnostic, CompileError};
use crate::lexer::{Scanner, Token, TokenKind};

const MAX_LOCALS: usize = 256;
const MAX_CONSTANT_INDEX: usize = 0xFFFFFF;
const MAX_JUMP: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            None => Assignment,
            Assignment => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Call,
            Call => Primary,
            Primary => Primary,
        }
    }
}

type ParseFn = for<'a> fn(&mut Compiler<'a>, bool);

#[derive(Clone, Copy)]
struct ParseRule {
    prefix: Option<ParseFn>,
    infix: Option<ParseFn>,
    precedence: Precedence,
}

fn rule_for(kind: TokenKind) -> ParseRule {
    use TokenKind::*;
    let (prefix, infix, precedence): (Option<ParseFn>, Option<ParseFn>, Precedence) = match kind {
        LeftParen => (Some(Compiler::grouping), Some(Compiler::call), Precedence::Call),
        Minus => (Some(Compiler::unary), Some(Compiler::binary), Precedence::Term),
        Plus => (None, Some(Compiler::binary), Precedence::Term),
        Slash => (None, Some(Compiler::binary), Precedence::Factor),
        Star => (None, Some(Compiler::binary), Precedence::Factor),
        Bang => (Some(Compiler::unary), None, Precedence::None),
        BangEqual => (None, Some(Compiler::binary), Precedence::Equality),
        EqualEqual => (None, Some(Compiler::binary), Precedence::Equality),
        Greater => (None, Some(Compiler::binary), Precedence::Comparison),
        GreaterEqual => (None, Some(Compiler::binary), Precedence::Comparison),
        Less => (None, Some(Compiler::binary), Precedence::Comparison),
        LessEqual => (None, Some(Compiler::binary), Precedence::Comparison),
        Identifier => (Some(Compiler::variable), None, Precedence::None),
        String => (Some(Compiler::string), None, Precedence::None),
        Number => (Some(Compiler::number), None, Precedence::None),
        And => (None, Some(Compiler::and_), Precedence::And),
        Or => (None, Some(Compiler::or_), Precedence::Or),
        False | True | Nil => (Some(Compiler::literal), None, Precedence::None),
        _ => (None, None, Precedence::None),
    };
    ParseRule { prefix, infix, precedence }
}

struct Local<'a> {
    name: Token<'a>,
    depth: i32,
    is_captured: bool,
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum FunctionType {
    Script,
    Function,
}

struct FunctionState<'a> {
    function: ObjFunction,
    function_type: FunctionType,
    locals: Vec<Local<'a>>,
    scope_depth: usize,
    upvalues: Vec<UpvalueDesc>,
}

impl<'a> FunctionState<'a> {
    fn new(function_type: FunctionType, name: Option<Rc<ObjString>>) -> Self {
        // Slot 0 is reserved for the callee itself (mirrored by the VM's
        // calling convention, which places the closure at that slot).
        let synthetic = Token { kind: TokenKind::Identifier, lexeme: "", line: 0 };
        FunctionState {
            function: ObjFunction::new(name),
            function_type,
            locals: vec![Local { name: synthetic, depth: 0, is_captured: false }],
            scope_depth: 0,
            upvalues: Vec::new(),
        }
    }
}

/// Single-pass compiler: owns the token stream and a stack of nested
/// function-compilation states, one per function currently being built.
pub struct Compiler<'a> {
    scanner: Scanner<'a>,
    previous: Token<'a>,
    current: Token<'a>,
    had_error: bool,
    panic_mode: bool,
    diagnostics: Vec<CompileDiagnostic>,
    states: Vec<FunctionState<'a>>,
    interner: &'a mut Interner,
}

impl<'a> Compiler<'a> {
    pub fn compile(source: &'a str, interner: &'a mut Interner) -> Result<ObjFunction, CompileError> {
        let mut compiler = Compiler {
            scanner: Scanner::new(source),
            previous: Token { kind: TokenKind::Eof, lexeme: "", line: 0 },
            current: Token { kind: TokenKind::Eof, lexeme: "", line: 0 },
            had_error: false,
            panic_mode: false,
            diagnostics: Vec::new(),
            states: vec![FunctionState::new(FunctionType::Script, None)],
            interner,
        };

        compiler.advance();
        while !compiler.matches(TokenKind::Eof) {
            compiler.declaration();
        }

        let function = compiler.end_compiler();

        if compiler.had_error {
            Err(CompileError { diagnostics: compiler.diagnostics })
        } else {
            Ok(function)
        }
    }

    // ---- token stream -------------------------------------------------

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let message = self.current.lexeme.to_string();
            self.error_at_current(&message);
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    // ---- error reporting ------------------------------------------------

    fn error_at_current(&mut self, message: &str) {
        let token = self.current;
        self.error_at(token, message);
    }

    fn error(&mut self, message: &str) {
        let token = self.previous;
        self.error_at(token, message);
    }

    fn error_at(&mut self, token: Token<'a>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;

        let mut text = String::from("Error");
        match token.kind {
            TokenKind::Eof => text.push_str(" at end"),
            TokenKind::Error => {}
            _ => text.push_str(&format!(" at '{}'", token.lexeme)),
        }
        text.push_str(&format!(": {message}"));

        self.diagnostics.push(CompileDiagnostic { line: token.line, text });
    }

    // ---- bytecode emission ---------------------------------------------

    fn current_chunk(&mut self) -> &mut Chunk {
        &mut self.states.last_mut().unwrap().function.chunk
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.current_chunk().write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op as u8);
    }

    fn emit_bytes(&mut self, op: OpCode, byte: u8) {
        self.emit_op(op);
        self.emit_byte(byte);
    }

    /// Emits the short or long form of a constant-pool-indexed opcode,
    /// depending on whether `index` fits in one byte.
    fn emit_indexed(&mut self, short: OpCode, long: OpCode, index: usize) {
        if index > MAX_CONSTANT_INDEX {
            self.error("Too many constants in one chunk.");
            return;
        }
        if index <= u8::MAX as usize {
            self.emit_bytes(short, index as u8);
        } else {
            self.emit_op(long);
            let bytes = (index as u32).to_le_bytes();
            self.emit_byte(bytes[0]);
            self.emit_byte(bytes[1]);
            self.emit_byte(bytes[2]);
        }
    }

    fn make_constant(&mut self, value: Value) -> usize {
        let index = self.current_chunk().add_constant(value);
        if index > MAX_CONSTANT_INDEX {
            self.error("Too many constants in one chunk.");
            return 0;
        }
        index
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_indexed(OpCode::Constant, OpCode::ConstantLong, index);
    }

    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.current_chunk().code_len() - 2
    }

    fn patch_jump(&mut self, offset: usize) {
        let jump = self.current_chunk().code_len() - offset - 2;
        if jump > MAX_JUMP {
            self.error("Too much code to jump over.");
            return;
        }
        let bytes = (jump as u16).to_le_bytes();
        self.current_chunk().code[offset] = bytes[0];
        self.current_chunk().code[offset + 1] = bytes[1];
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);
        let offset = self.current_chunk().code_len() - loop_start + 2;
        if offset > MAX_JUMP {
            self.error("Loop body too large.");
            return;
        }
        let bytes = (offset as u16).to_le_bytes();
        self.emit_byte(bytes[0]);
        self.emit_byte(bytes[1]);
    }

    fn end_compiler(&mut self) -> ObjFunction {
        self.emit_op(OpCode::Nil);
        self.emit_op(OpCode::Return);
        let state = self.states.pop().unwrap();
        state.function
    }

    // ---- scope & variables ----------------------------------------------

    fn begin_scope(&mut self) {
        self.states.last_mut().unwrap().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        let state = self.states.last_mut().unwrap();
        state.scope_depth -= 1;
        let depth = state.scope_depth as i32;

        let mut pending_pops: u32 = 0;
        while let Some(local) = state.locals.last() {
            if local.depth <= depth {
                break;
            }
            let captured = local.is_captured;
            state.locals.pop();
            if captured {
                if pending_pops > 0 {
                    self.emit_popn(pending_pops);
                    pending_pops = 0;
                }
                self.emit_op(OpCode::CloseUpvalue);
            } else {
                pending_pops += 1;
            }
        }
        if pending_pops > 0 {
            self.emit_popn(pending_pops);
        }
    }

    fn emit_popn(&mut self, n: u32) {
        if n == 1 {
            self.emit_op(OpCode::Pop);
        } else {
            self.emit_bytes(OpCode::PopN, n as u8);
        }
    }

    fn identifier_constant(&mut self, name: &str) -> usize {
        let interned = self.interner.intern(name.to_string());
        self.make_constant(Value::Obj(interned))
    }

    fn identifiers_equal(a: &Token<'a>, b: &Token<'a>) -> bool {
        a.lexeme == b.lexeme
    }

    fn resolve_local(state: &FunctionState<'a>, name: &Token<'a>) -> Option<(usize, bool)> {
        for (i, local) in state.locals.iter().enumerate().rev() {
            if Self::identifiers_equal(&local.name, name) {
                return Some((i, local.depth == -1));
            }
        }
        None
    }

    fn resolve_upvalue(&mut self, state_idx: usize, name: Token<'a>) -> Option<usize> {
        if state_idx == 0 {
            return None;
        }
        let enclosing_idx = state_idx - 1;

        if let Some((slot, uninitialized)) = Self::resolve_local(&self.states[enclosing_idx], &name) {
            if uninitialized {
                self.error("Can't read local variable in its own initializer.");
            }
            self.states[enclosing_idx].locals[slot].is_captured = true;
            return Some(self.add_upvalue(state_idx, slot, true));
        }

        if let Some(index) = self.resolve_upvalue(enclosing_idx, name) {
            return Some(self.add_upvalue(state_idx, index, false));
        }

        None
    }

    fn add_upvalue(&mut self, state_idx: usize, index: usize, is_local: bool) -> usize {
        let state = &mut self.states[state_idx];
        for (i, existing) in state.upvalues.iter().enumerate() {
            if existing.index == index && existing.is_local == is_local {
                return i;
            }
        }
        state.upvalues.push(UpvalueDesc { is_local, index });
        state.function.upvalue_count = state.upvalues.len();
        state.upvalues.len() - 1
    }

    fn declare_variable(&mut self) {
        let state = self.states.last().unwrap();
        if state.scope_depth == 0 {
            return;
        }
        let name = self.previous;
        let depth = state.scope_depth as i32;
        for local in state.locals.iter().rev() {
            if local.depth != -1 && local.depth < depth {
                break;
            }
            if Self::identifiers_equal(&local.name, &name) {
                self.error("Already a variable with this name in this scope.");
            }
        }
        self.add_local(name);
    }

    fn add_local(&mut self, name: Token<'a>) {
        let state = self.states.last_mut().unwrap();
        if state.locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        state.locals.push(Local { name, depth: -1, is_captured: false });
    }

    fn parse_variable(&mut self, message: &str) -> usize {
        self.consume(TokenKind::Identifier, message);
        self.declare_variable();
        if self.states.last().unwrap().scope_depth > 0 {
            return 0;
        }
        let name = self.previous.lexeme.to_string();
        self.identifier_constant(&name)
    }

    fn mark_initialized(&mut self) {
        let state = self.states.last_mut().unwrap();
        if state.scope_depth == 0 {
            return;
        }
        let depth = state.scope_depth as i32;
        state.locals.last_mut().unwrap().depth = depth;
    }

    fn define_variable(&mut self, global: usize) {
        if self.states.last().unwrap().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_indexed(OpCode::DefineGlobal, OpCode::DefineGlobalLong, global);
    }

    // ---- expressions ----------------------------------------------------

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let prefix = rule_for(self.previous.kind).prefix;
        let Some(prefix) = prefix else {
            self.error("Expect expression.");
            return;
        };

        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);

        while precedence <= rule_for(self.current.kind).precedence {
            self.advance();
            let infix = rule_for(self.previous.kind).infix.unwrap();
            infix(self, can_assign);
        }

        if can_assign && self.matches(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn number(&mut self, _can_assign: bool) {
        let value: f64 = self.previous.lexeme.parse().unwrap_or(0.0);
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self, _can_assign: bool) {
        let lexeme = self.previous.lexeme;
        let text = lexeme[1..lexeme.len() - 1].to_string();
        let interned = self.interner.intern(text);
        self.emit_constant(Value::Obj(interned));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::True => self.emit_op(OpCode::True),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            _ => unreachable!(),
        }
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self, _can_assign: bool) {
        let kind = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match kind {
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            TokenKind::Bang => self.emit_op(OpCode::Not),
            _ => unreachable!(),
        }
    }

    fn binary(&mut self, _can_assign: bool) {
        let kind = self.previous.kind;
        let rule = rule_for(kind);
        self.parse_precedence(rule.precedence.next());

        match kind {
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::BangEqual => {
                self.emit_op(OpCode::Equal);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => {
                self.emit_op(OpCode::Less);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => {
                self.emit_op(OpCode::Greater);
                self.emit_op(OpCode::Not);
            }
            _ => unreachable!(),
        }
    }

    fn and_(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or_(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous;
        self.named_variable(name, can_assign);
    }

    fn named_variable(&mut self, name: Token<'a>, can_assign: bool) {
        let state_idx = self.states.len() - 1;

        let (get_op, get_long, set_op, set_long, arg): (OpCode, Option<OpCode>, OpCode, Option<OpCode>, usize);

        if let Some((slot, uninitialized)) = Self::resolve_local(&self.states[state_idx], &name) {
            if uninitialized {
                self.error("Can't read local variable in its own initializer.");
            }
            get_op = OpCode::GetLocal;
            get_long = None;
            set_op = OpCode::SetLocal;
            set_long = None;
            arg = slot;
        } else if let Some(slot) = self.resolve_upvalue(state_idx, name) {
            get_op = OpCode::GetUpvalue;
            get_long = None;
            set_op = OpCode::SetUpvalue;
            set_long = None;
            arg = slot;
        } else {
            let text = name.lexeme.to_string();
            arg = self.identifier_constant(&text);
            get_op = OpCode::GetGlobal;
            get_long = Some(OpCode::GetGlobalLong);
            set_op = OpCode::SetGlobal;
            set_long = Some(OpCode::SetGlobalLong);
        }

        if can_assign && self.matches(TokenKind::Equal) {
            self.expression();
            match set_long {
                Some(long) => self.emit_indexed(set_op, long, arg),
                None => self.emit_bytes(set_op, arg as u8),
            }
        } else {
            match get_long {
                Some(long) => self.emit_indexed(get_op, long, arg),
                None => self.emit_bytes(get_op, arg as u8),
            }
        }
    }

    fn call(&mut self, _can_assign: bool) {
        let argc = self.argument_list();
        self.emit_bytes(OpCode::Call, argc);
    }

    fn argument_list(&mut self) -> u8 {
        let mut count: usize = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                // Declaration-side arity is capped at 8 (`MAX_ARITY`); the
                // call site enforces the same cap for consistency.
                if count == MAX_ARITY {
                    self.error("Can't have more than 8 arguments.");
                }
                count += 1;
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        count as u8
    }

    // ---- statements -----------------------------------------------------

    fn declaration(&mut self) {
        if self.matches(TokenKind::Fun) {
            self.fun_declaration();
        } else if self.matches(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.panic_mode {
            self.synchronize();
        }
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");

        if self.matches(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.");

        self.define_variable(global);
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        self.mark_initialized();
        self.function(FunctionType::Function);
        self.define_variable(global);
    }

    fn function(&mut self, function_type: FunctionType) {
        let name = self.interner.intern_string(self.previous.lexeme.to_string());
        self.states.push(FunctionState::new(function_type, Some(name)));
        self.begin_scope();

        self.consume(TokenKind::LeftParen, "Expect '(' after function name.");
        if !self.check(TokenKind::RightParen) {
            loop {
                {
                    let state = self.states.last_mut().unwrap();
                    state.function.arity += 1;
                    if state.function.arity > MAX_ARITY {
                        self.error_at_current("Can't have more than 8 parameters.");
                    }
                }
                let constant = self.parse_variable("Expect parameter name.");
                self.define_variable(constant);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.");
        self.block();

        let state = self.states.pop().unwrap();
        let mut function = state.function;
        function.upvalue_count = state.upvalues.len();
        // Implicit `nil; return;` for a fall-through function body.
        let end_line = self.previous.line;
        function.chunk.write_op(OpCode::Nil, end_line);
        function.chunk.write_op(OpCode::Return, end_line);

        let upvalues = state.upvalues;
        let const_index = self.make_constant(Value::Obj(Rc::new(crate::bytecode::Obj::Function(
            Rc::new(function),
        ))));
        // OP_CLOSURE always takes a single-byte constant index: no long
        // form is specified for it, unlike OP_CONSTANT/OP_*_GLOBAL.
        if const_index > u8::MAX as usize {
            self.error("Too many constants in one chunk.");
        }
        self.emit_bytes(OpCode::Closure, const_index as u8);
        for upvalue in &upvalues {
            self.emit_byte(upvalue.is_local as u8);
            self.emit_byte(upvalue.index as u8);
        }
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    fn statement(&mut self) {
        if self.matches(TokenKind::Print) {
            self.print_statement();
        } else if self.matches(TokenKind::If) {
            self.if_statement();
        } else if self.matches(TokenKind::While) {
            self.while_statement();
        } else if self.matches(TokenKind::For) {
            self.for_statement();
        } else if self.matches(TokenKind::Return) {
            self.return_statement();
        } else if self.matches(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();

        let else_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);

        if self.matches(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.current_chunk().code_len();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
    }

    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.");

        if self.matches(TokenKind::Semicolon) {
            // no initializer
        } else if self.matches(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.current_chunk().code_len();
        let mut exit_jump: Option<usize> = None;
        if !self.matches(TokenKind::Semicolon) {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.");
            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit_op(OpCode::Pop);
        }

        if !self.matches(TokenKind::RightParen) {
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.current_chunk().code_len();
            self.expression();
            self.emit_op(OpCode::Pop);
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit_op(OpCode::Pop);
        }

        self.end_scope();
    }

    fn return_statement(&mut self) {
        if self.states.last().unwrap().function_type == FunctionType::Script {
            self.error("Can't return from top-level code.");
        }

        if self.matches(TokenKind::Semicolon) {
            self.emit_op(OpCode::Nil);
            self.emit_op(OpCode::Return);
        } else {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.");
            self.emit_op(OpCode::Return);
        }
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;

        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_ok(src: &str) -> ObjFunction {
        let mut interner = Interner::new();
        Compiler::compile(src, &mut interner).expect("expected successful compile")
    }

    fn compile_err(src: &str) -> CompileError {
        let mut interner = Interner::new();
        Compiler::compile(src, &mut interner).unwrap_err()
    }

    #[test]
    fn simple_arithmetic_uses_short_constant_forms() {
        let func = compile_ok("print 1 + 2 * 3;");
        assert!(func.chunk.code.contains(&(OpCode::Multiply as u8)));
        assert!(func.chunk.code.contains(&(OpCode::Add as u8)));
        assert!(!func.chunk.code.contains(&(OpCode::ConstantLong as u8)));
    }

    #[test]
    fn more_than_256_constants_uses_long_form() {
        let mut src = String::new();
        for i in 0..300 {
            src.push_str(&format!("print {i};\n"));
        }
        let func = compile_ok(&src);
        assert!(func.chunk.code.contains(&(OpCode::ConstantLong as u8)));
    }

    #[test]
    fn reading_local_in_its_own_initializer_is_an_error() {
        let err = compile_err("{ var a = a; }");
        assert!(!err.diagnostics.is_empty());
    }

    #[test]
    fn return_at_top_level_is_an_error() {
        let err = compile_err("return 1;");
        assert!(err.diagnostics.iter().any(|d| d.text.contains("top-level")));
    }

    #[test]
    fn function_with_nine_parameters_errors() {
        let params: Vec<String> = (0..9).map(|i| format!("p{i}")).collect();
        let src = format!("fun f({}) {{ return 0; }}", params.join(", "));
        let err = compile_err(&src);
        assert!(err.diagnostics.iter().any(|d| d.text.contains("8 parameters")));
    }

    #[test]
    fn function_with_eight_parameters_compiles() {
        let params: Vec<String> = (0..8).map(|i| format!("p{i}")).collect();
        let src = format!("fun f({}) {{ return 0; }}", params.join(", "));
        compile_ok(&src);
    }

    #[test]
    fn declaring_256_locals_errors() {
        // Slot 0 of every local table is reserved for the active closure
        // (the calling convention's slot_base), and slot indices are a
        // single byte, so 255 is the largest number of user-declared
        // locals a function body can hold; the 256th is the one that errors.
        let mut src = String::from("{\n");
        for i in 0..256 {
            src.push_str(&format!("var v{i} = {i};\n"));
        }
        src.push_str("}\n");
        let err = compile_err(&src);
        assert!(err.diagnostics.iter().any(|d| d.text.contains("Too many local")));
    }

    #[test]
    fn declaring_255_locals_compiles() {
        let mut src = String::from("{\n");
        for i in 0..255 {
            src.push_str(&format!("var v{i} = {i};\n"));
        }
        src.push_str("}\n");
        compile_ok(&src);
    }
}
