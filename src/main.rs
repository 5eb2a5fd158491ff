use std::cell::RefCell;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser as ClapParser;
use log::info;

use loxide::errors::Error;
use loxide::interpreter::Interpreter;
use loxide::parser::Parser;
use loxide::resolver::Resolver;
use loxide::scanner::Scanner;

/// Tree-walking interpreter for the Lox language.
#[derive(ClapParser, Debug)]
#[command(version, about)]
struct Cli {
    /// Script to execute; omitting it starts an interactive session.
    script: Option<PathBuf>,
}

enum Outcome {
    Success,
    StaticError,
    RuntimeError,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Anything but zero or one operand is a usage error, exit code 64.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            process::exit(64);
        }
    };

    let stdout: Rc<RefCell<dyn Write>> = Rc::new(RefCell::new(io::stdout()));
    let mut interpreter = Interpreter::new(stdout);

    match cli.script {
        Some(path) => run_file(&mut interpreter, &path),
        None => run_prompt(&mut interpreter),
    }
}

fn run_file(interpreter: &mut Interpreter, path: &Path) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("could not read script '{}'", path.display()))?;

    info!("executing {}", path.display());
    match run(interpreter, &source, &mut 0) {
        Outcome::Success => Ok(()),
        Outcome::StaticError => process::exit(65),
        Outcome::RuntimeError => process::exit(70),
    }
}

fn run_prompt(interpreter: &mut Interpreter) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut token_offset = 0;
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF ends the session
            return Ok(());
        }

        // Each line stands alone; errors are reported and the prompt comes
        // back regardless.
        run(interpreter, &line, &mut token_offset);
    }
}

// One trip through the pipeline. The driver stops at the first phase that
// reported errors; the offset keeps token indices unique across successive
// REPL lines so the interpreter's scope-distance table stays consistent.
fn run(interpreter: &mut Interpreter, source: &str, token_offset: &mut usize) -> Outcome {
    let mut scanner = Scanner::with_offset(source, *token_offset);
    let tokens = match scanner.scan_tokens() {
        Ok(tokens) => tokens,
        Err(errs) => return report_static(&errs),
    };
    *token_offset += tokens.len();

    let mut parser = Parser::new(&tokens);
    let statements = match parser.parse() {
        Ok(statements) => statements,
        Err(errs) => return report_static(&errs),
    };

    let mut resolver = Resolver::new(interpreter);
    let resolved = match resolver.resolve(statements) {
        Ok(resolved) => resolved,
        Err(errs) => return report_static(&errs),
    };

    match interpreter.interpret(&resolved) {
        Ok(()) => Outcome::Success,
        Err(err) => {
            eprintln!("{}", err);
            Outcome::RuntimeError
        }
    }
}

fn report_static(errs: &[Error]) -> Outcome {
    for err in errs {
        eprintln!("{}", err);
    }
    Outcome::StaticError
}
