// File: src/debug.rs
//
// Disassembler: turns a compiled chunk back into readable text. Read-only
// over a `&Chunk` -- used by `--print-disassembly` and by the `--trace`
// per-instruction dump, never by the dispatch loop itself.

use crate::bytecode::{Chunk, OpCode};

/// Renders every instruction in `chunk`, prefixed with a `== name ==`
/// banner, one line per instruction.
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = format!("== {name} ==\n");
    let mut offset = 0;
    while offset < chunk.code.len() {
        let (line, next) = disassemble_instruction(chunk, offset);
        out.push_str(&line);
        out.push('\n');
        offset = next;
    }
    out
}

/// Renders the single instruction at `offset`, returning the rendered
/// line and the offset of the next instruction.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> (String, usize) {
    let mut line = format!("{offset:04} ");

    if offset > 0 && chunk.lines[offset] == chunk.lines[offset - 1] {
        line.push_str("   | ");
    } else {
        line.push_str(&format!("{:4} ", chunk.lines[offset]));
    }

    let byte = chunk.code[offset];
    let Some(op) = OpCode::from_byte(byte) else {
        line.push_str(&format!("Unknown opcode {byte}"));
        return (line, offset + 1);
    };

    match op {
        OpCode::Constant => constant_instruction("OP_CONSTANT", chunk, offset),
        OpCode::ConstantLong => constant_long_instruction("OP_CONSTANT_LONG", chunk, offset),
        OpCode::Nil => simple_instruction("OP_NIL", &mut line, offset),
        OpCode::True => simple_instruction("OP_TRUE", &mut line, offset),
        OpCode::False => simple_instruction("OP_FALSE", &mut line, offset),
        OpCode::Pop => simple_instruction("OP_POP", &mut line, offset),
        OpCode::PopN => byte_instruction("OP_POPN", chunk, &mut line, offset),
        OpCode::GetLocal => byte_instruction("OP_GET_LOCAL", chunk, &mut line, offset),
        OpCode::SetLocal => byte_instruction("OP_SET_LOCAL", chunk, &mut line, offset),
        OpCode::GetGlobal => constant_instruction("OP_GET_GLOBAL", chunk, offset),
        OpCode::GetGlobalLong => constant_long_instruction("OP_GET_GLOBAL_LONG", chunk, offset),
        OpCode::SetGlobal => constant_instruction("OP_SET_GLOBAL", chunk, offset),
        OpCode::SetGlobalLong => constant_long_instruction("OP_SET_GLOBAL_LONG", chunk, offset),
        OpCode::DefineGlobal => constant_instruction("OP_DEFINE_GLOBAL", chunk, offset),
        OpCode::DefineGlobalLong => constant_long_instruction("OP_DEFINE_GLOBAL_LONG", chunk, offset),
        OpCode::GetUpvalue => byte_instruction("OP_GET_UPVALUE", chunk, &mut line, offset),
        OpCode::SetUpvalue => byte_instruction("OP_SET_UPVALUE", chunk, &mut line, offset),
        OpCode::Equal => simple_instruction("OP_EQUAL", &mut line, offset),
        OpCode::Greater => simple_instruction("OP_GREATER", &mut line, offset),
        OpCode::Less => simple_instruction("OP_LESS", &mut line, offset),
        OpCode::Add => simple_instruction("OP_ADD", &mut line, offset),
        OpCode::Subtract => simple_instruction("OP_SUBTRACT", &mut line, offset),
        OpCode::Multiply => simple_instruction("OP_MULTIPLY", &mut line, offset),
        OpCode::Divide => simple_instruction("OP_DIVIDE", &mut line, offset),
        OpCode::Not => simple_instruction("OP_NOT", &mut line, offset),
        OpCode::Negate => simple_instruction("OP_NEGATE", &mut line, offset),
        OpCode::Print => simple_instruction("OP_PRINT", &mut line, offset),
        OpCode::Jump => jump_instruction("OP_JUMP", 1, chunk, &mut line, offset),
        OpCode::JumpIfFalse => jump_instruction("OP_JUMP_IF_FALSE", 1, chunk, &mut line, offset),
        OpCode::Loop => jump_instruction("OP_LOOP", -1, chunk, &mut line, offset),
        OpCode::Call => byte_instruction("OP_CALL", chunk, &mut line, offset),
        OpCode::Closure => closure_instruction(chunk, &mut line, offset),
        OpCode::CloseUpvalue => simple_instruction("OP_CLOSE_UPVALUE", &mut line, offset),
        OpCode::Return => simple_instruction("OP_RETURN", &mut line, offset),
    }
}

fn simple_instruction(name: &str, line: &mut String, offset: usize) -> (String, usize) {
    line.push_str(name);
    (line.clone(), offset + 1)
}

fn byte_instruction(name: &str, chunk: &Chunk, line: &mut String, offset: usize) -> (String, usize) {
    let slot = chunk.code[offset + 1];
    line.push_str(&format!("{name:<18} {slot:4}"));
    (line.clone(), offset + 2)
}

fn jump_instruction(
    name: &str,
    sign: i32,
    chunk: &Chunk,
    line: &mut String,
    offset: usize,
) -> (String, usize) {
    let jump = u16::from_le_bytes([chunk.code[offset + 1], chunk.code[offset + 2]]) as i32;
    let target = offset as i32 + 3 + sign * jump;
    line.push_str(&format!("{name:<18} {offset:4} -> {target}"));
    (line.clone(), offset + 3)
}

fn constant_instruction(name: &str, chunk: &Chunk, offset: usize) -> (String, usize) {
    let index = chunk.code[offset + 1] as usize;
    let mut line = render_prefix(chunk, offset);
    line.push_str(&format!("{name:<18} {index:4} '{}'", chunk.constants[index]));
    (line, offset + 2)
}

fn constant_long_instruction(name: &str, chunk: &Chunk, offset: usize) -> (String, usize) {
    let bytes = [chunk.code[offset + 1], chunk.code[offset + 2], chunk.code[offset + 3], 0];
    let index = u32::from_le_bytes(bytes) as usize;
    let mut line = render_prefix(chunk, offset);
    line.push_str(&format!("{name:<18} {index:4} '{}'", chunk.constants[index]));
    (line, offset + 4)
}

fn closure_instruction(chunk: &Chunk, line: &mut String, offset: usize) -> (String, usize) {
    let index = chunk.code[offset + 1] as usize;
    line.push_str(&format!("{:<18} {index:4} '{}'", "OP_CLOSURE", chunk.constants[index]));

    let upvalue_count = match &chunk.constants[index] {
        crate::bytecode::Value::Obj(obj) => match obj.as_ref() {
            crate::bytecode::Obj::Function(f) => f.upvalue_count,
            _ => 0,
        },
        _ => 0,
    };

    let mut next = offset + 2;
    for _ in 0..upvalue_count {
        let is_local = chunk.code[next];
        let upvalue_index = chunk.code[next + 1];
        line.push_str(&format!(
            "\n{next:04}      |                     {} {upvalue_index}",
            if is_local != 0 { "local" } else { "upvalue" }
        ));
        next += 2;
    }

    (line.clone(), next)
}

/// `constant_instruction`/`constant_long_instruction` need the same
/// offset/line prefix that `disassemble_instruction` already rendered for
/// every other opcode; since they're called from inside the big `match`
/// (after that prefix was built into a local that isn't threaded through),
/// they rebuild it here. Kept deliberately redundant over plumbing a
/// prefix parameter through every helper.
fn render_prefix(chunk: &Chunk, offset: usize) -> String {
    let mut line = format!("{offset:04} ");
    if offset > 0 && chunk.lines[offset] == chunk.lines[offset - 1] {
        line.push_str("   | ");
    } else {
        line.push_str(&format!("{:4} ", chunk.lines[offset]));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::bytecode::Interner;

    #[test]
    fn disassembles_a_simple_chunk_without_panicking() {
        let mut interner = Interner::new();
        let function = Compiler::compile("print 1 + 2;", &mut interner).unwrap();
        let text = disassemble_chunk(&function.chunk, "script");
        assert!(text.contains("OP_ADD"));
        assert!(text.contains("OP_PRINT"));
        assert!(text.contains("OP_RETURN"));
    }

    #[test]
    fn constant_instruction_includes_the_value_text() {
        let mut interner = Interner::new();
        let function = Compiler::compile("print 42;", &mut interner).unwrap();
        let text = disassemble_chunk(&function.chunk, "script");
        assert!(text.contains("42"));
    }
}
