use std::cell::RefCell;
use std::rc::Rc;
use std::str;

use loxide::errors::Error;
use loxide::interpreter::Interpreter;
use loxide::parser::Parser;
use loxide::resolver::Resolver;
use loxide::scanner::Scanner;
use loxide::token::Type;

enum Run {
    Output(String),
    Static(Vec<Error>),
    Runtime(Error),
}

fn run(src: &str) -> Run {
    let mut scanner = Scanner::new(src);
    let tokens = match scanner.scan_tokens() {
        Ok(tokens) => tokens,
        Err(errs) => return Run::Static(errs),
    };

    let mut parser = Parser::new(&tokens);
    let statements = match parser.parse() {
        Ok(statements) => statements,
        Err(errs) => return Run::Static(errs),
    };

    let output: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::new(output.clone());
    let mut resolver = Resolver::new(&mut interpreter);
    let resolved = match resolver.resolve(statements) {
        Ok(resolved) => resolved,
        Err(errs) => return Run::Static(errs),
    };

    match interpreter.interpret(&resolved) {
        Ok(()) => Run::Output(String::from(str::from_utf8(&output.borrow()).unwrap())),
        Err(err) => Run::Runtime(err),
    }
}

fn expect_output(src: &str, expected: &str) {
    match run(src) {
        Run::Output(out) => assert_eq!(out, expected, "source: {}", src),
        Run::Static(errs) => panic!("static errors for '{}': {:?}", src, errs),
        Run::Runtime(err) => panic!("runtime error for '{}': {}", src, err),
    }
}

fn expect_static(src: &str, rendered: &str) {
    match run(src) {
        Run::Static(errs) => {
            assert_eq!(errs[0].to_string(), rendered, "source: {}", src)
        }
        Run::Output(out) => panic!("expected a static error for '{}', got output {:?}", src, out),
        Run::Runtime(err) => panic!("expected a static error for '{}', got {}", src, err),
    }
}

fn expect_runtime(src: &str, rendered: &str) {
    match run(src) {
        Run::Runtime(err) => assert_eq!(err.to_string(), rendered, "source: {}", src),
        Run::Output(out) => {
            panic!("expected a runtime error for '{}', got output {:?}", src, out)
        }
        Run::Static(errs) => panic!("static errors for '{}': {:?}", src, errs),
    }
}

#[test]
fn test_arithmetic() {
    expect_output("print 1 + 2;", "3\n");
}

#[test]
fn test_block_shadowing() {
    expect_output(
        "var a = 1; { var a = 2; print a; } print a;",
        "2\n1\n",
    );
}

#[test]
fn test_counter_closure() {
    expect_output(
        "fun makeCounter() {\
           var i = 0;\
           fun count() { i = i + 1; print i; }\
           return count;\
         }\
         var c = makeCounter();\
         c(); c();",
        "1\n2\n",
    );
}

#[test]
fn test_method_call() {
    expect_output(
        "class Bacon { eat() { print \"Crunch\"; } } Bacon().eat();",
        "Crunch\n",
    );
}

#[test]
fn test_initializer_sets_fields() {
    expect_output("class A { init(x) { this.x = x; } } print A(7).x;", "7\n");
}

#[test]
fn test_add_type_error() {
    expect_runtime(
        "\"a\" + 1;",
        "Operands must be two numbers or two strings.\n[line 1]",
    );
}

#[test]
fn test_read_local_in_own_initializer() {
    expect_static(
        "{ var a = a; }",
        "[Line 1] error at 'a': Can't read local variable in its own initializer.",
    );
}

#[test]
fn test_top_level_return() {
    expect_static(
        "return 1;",
        "[Line 1] error at 'return': Can't return from top-level code.",
    );
}

#[test]
fn test_scan_error_rendering() {
    expect_static("var a = 1;\n@", "[Line 2] error : Unexpected character.");
}

#[test]
fn test_runtime_error_carries_line() {
    expect_runtime(
        "var a = 1;\nvar b = 2;\nprint a - \"x\";",
        "Operands must be numbers.\n[line 3]",
    );
}

#[test]
fn test_inheritance_and_super() {
    expect_output(
        "class Doughnut {\
           cook() { print \"Fry until golden brown.\"; }\
         }\
         class BostonCream < Doughnut {\
           cook() {\
             super.cook();\
             print \"Pipe full of custard.\";\
           }\
         }\
         BostonCream().cook();",
        "Fry until golden brown.\nPipe full of custard.\n",
    );
}

#[test]
fn test_scanner_emits_exactly_one_eof() {
    let mut scanner = Scanner::new("print 1;\n");
    let tokens = scanner.scan_tokens().unwrap();
    let eofs = tokens.iter().filter(|token| token.ty == Type::Eof).count();

    assert_eq!(eofs, 1);
    assert_eq!(tokens.last().unwrap().ty, Type::Eof);
}

// A driver feeding successive chunks into one interpreter (the REPL) keeps
// state: globals persist, and closures resolved in an earlier chunk keep
// their scope distances because token indices never collide across chunks.
#[test]
fn test_incremental_chunks_share_state() {
    let chunks = [
        "fun makeCounter() {\
           var i = 0;\
           fun count() { i = i + 1; print i; }\
           return count;\
         }\
         var c = makeCounter();",
        "c();",
        "c();",
    ];

    let output: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::new(output.clone());
    let mut offset = 0;

    for chunk in chunks {
        let mut scanner = Scanner::with_offset(chunk, offset);
        let tokens = scanner.scan_tokens().unwrap();
        offset += tokens.len();

        let parsed = Parser::new(&tokens).parse().unwrap();
        let mut resolver = Resolver::new(&mut interpreter);
        let resolved = resolver.resolve(parsed).unwrap();
        interpreter.interpret(&resolved).unwrap();
    }

    assert_eq!(str::from_utf8(&output.borrow()).unwrap(), "1\n2\n");
}
