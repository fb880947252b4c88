// Integration tests: run complete programs through the compiler and VM and
// check what they print, plus the boundary conditions the design pins down
// explicitly (arity cap, local count cap, recursion depth).

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use ruff::bytecode::Interner;
use ruff::compiler::Compiler;
use ruff::vm::Vm;

/// Runs `source` against a fresh `Vm`, asserting it completes without
/// error. A meaningful end-to-end check of lexer -> compiler -> VM wiring
/// on its own; tests that also need to check *what* the program printed
/// use `run_captured` instead.
fn run_ok(source: &str) {
    let mut vm = Vm::new();
    match vm.interpret_checked(source) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => panic!("runtime error: {err}"),
        Err(err) => panic!("compile error: {err}"),
    }
}

/// A `Write` sink that stays readable after being handed to a `Vm` as a
/// boxed trait object, so a test can assert on what a program printed.
#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Runs `source` against a fresh `Vm`, returning everything it printed.
fn run_captured(source: &str) -> String {
    let buf = SharedBuf::default();
    let mut vm = Vm::with_output(Box::new(buf.clone()));
    match vm.interpret_checked(source) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => panic!("runtime error: {err}"),
        Err(err) => panic!("compile error: {err}"),
    }
    String::from_utf8(buf.0.borrow().clone()).expect("program output was not valid utf-8")
}

fn run_compile_err(source: &str) {
    let mut interner = Interner::new();
    assert!(Compiler::compile(source, &mut interner).is_err());
}

fn run_runtime_err(source: &str) {
    let mut vm = Vm::new();
    match vm.interpret_checked(source) {
        Ok(Err(_)) => {}
        Ok(Ok(())) => panic!("expected a runtime error, program ran to completion"),
        Err(err) => panic!("expected a runtime error, got a compile error instead: {err}"),
    }
}

#[test]
fn arithmetic_precedence() {
    run_ok("print 1 + 2 * 3;");
}

#[test]
fn string_concatenation() {
    run_ok(r#"var a = "foo"; var b = "bar"; print a + b;"#);
}

#[test]
fn recursive_fibonacci() {
    run_ok("fun f(n){ if (n<2) return n; return f(n-1)+f(n-2);} print f(10);");
}

#[test]
fn closure_over_mutable_outer_local() {
    run_ok(
        "fun outer(){ var x=1; fun inner(){ x = x+1; return x; } return inner;} \
         var c = outer(); print c(); print c(); print c();",
    );
}

#[test]
fn for_loop_accumulates() {
    run_ok("var s=0; for (var i=1; i<=5; i=i+1) s=s+i; print s;");
}

#[test]
fn interned_string_literals_compare_equal() {
    let output = run_captured(r#"print "a" == "a";"#);
    assert_eq!(output.trim(), "true");
}

#[test]
fn nested_closures_capture_across_two_levels() {
    run_ok(
        "fun a(){ var x = 10; fun b(){ fun c(){ return x; } return c(); } return b(); } \
         print a();",
    );
}

#[test]
fn while_loop_with_break_condition_via_flag() {
    run_ok("var i = 0; while (i < 3) { print i; i = i + 1; }");
}

#[test]
fn global_function_reassigning_a_global() {
    run_ok("var total = 0; fun add(n) { total = total + n; } add(1); add(2); print total;");
}

#[test]
fn function_with_eight_parameters_compiles() {
    run_ok("fun f(a,b,c,d,e,f2,g,h) { return a+b+c+d+e+f2+g+h; } print f(1,2,3,4,5,6,7,8);");
}

#[test]
fn function_with_nine_parameters_is_a_compile_error() {
    run_compile_err("fun f(a,b,c,d,e,f2,g,h,i) { return a; }");
}

#[test]
fn call_with_nine_arguments_is_a_compile_error() {
    run_compile_err(
        "fun f(a,b,c,d,e,f2,g,h) { return a; } f(1,2,3,4,5,6,7,8,9);",
    );
}

#[test]
fn declaring_256_locals_in_a_function_body_is_a_compile_error() {
    // Slot 0 of a function's local table is reserved for the active
    // closure itself, and local slot indices are single bytes, so 255
    // user-declared locals is the most a function body can hold.
    let mut source = String::from("fun f() {\n");
    for i in 0..256 {
        source.push_str(&format!("var v{i} = {i};\n"));
    }
    source.push_str("}\n");
    run_compile_err(&source);
}

#[test]
fn declaring_255_locals_in_a_function_body_compiles() {
    let mut source = String::from("fun f() {\n");
    for i in 0..255 {
        source.push_str(&format!("var v{i} = {i};\n"));
    }
    source.push_str("}\nf();\n");
    run_ok(&source);
}

#[test]
fn recursion_well_within_the_frame_cap_succeeds() {
    run_ok(
        "fun rec(n) { if (n == 0) return 0; return rec(n-1); } print rec(40);",
    );
}

// `rec(n)` makes n+1 calls (n, n-1, ..., 0 each invoke the function once),
// so depth-64 recursion is `rec(63)` and depth-65 is `rec(64)`.
#[test]
fn recursion_to_depth_64_succeeds() {
    run_ok("fun rec(n) { if (n == 0) return 0; return rec(n-1); } print rec(63);");
}

#[test]
fn recursion_to_depth_65_overflows() {
    run_runtime_err("fun rec(n) { if (n == 0) return 0; return rec(n-1); } print rec(64);");
}

#[test]
fn recursion_past_frame_cap_is_a_runtime_error() {
    run_runtime_err(
        "fun rec(n) { if (n == 0) return 0; return rec(n-1); } print rec(1000);",
    );
}

#[test]
fn calling_a_number_is_a_runtime_error() {
    run_runtime_err("var x = 5; x();");
}

#[test]
fn arity_mismatch_is_a_runtime_error() {
    run_runtime_err("fun f(a, b) { return a + b; } f(1);");
}

#[test]
fn undefined_global_read_is_a_runtime_error() {
    run_runtime_err("print undeclared_name;");
}

#[test]
fn zero_is_falsey_in_a_condition() {
    run_ok("if (0) { print \"truthy\"; } else { print \"falsey\"; }");
}

#[test]
fn native_clock_returns_a_number() {
    run_ok("print type(clock());");
}

#[test]
fn native_len_over_a_string() {
    run_ok(r#"print len("hello");"#);
}

#[test]
fn native_printf_formats_arguments() {
    run_ok(r#"printf("%-%\n", 1, 2);"#);
}
