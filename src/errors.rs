use log::debug;
use thiserror::Error;

use crate::token::{Token, Type};
use crate::value::Value;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum Error {
    #[error("[Line {line}] error : {msg}")]
    ScanError { line: usize, msg: String },

    // The constructors take the offending token but only its line and
    // rendered location survive into the variant; thiserror format strings
    // cannot reach into token fields anyway.
    #[error("[Line {line}] error{location}: {msg}")]
    ParseError {
        line: usize,
        location: String,
        msg: String,
    },

    #[error("[Line {line}] error{location}: {msg}")]
    ResolveError {
        line: usize,
        location: String,
        msg: String,
    },

    #[error("{msg}\n[line {line}]")]
    RuntimeError { line: usize, msg: String },

    // Not an error at all: the unwind signal a `return` statement rides on,
    // intercepted by the innermost function-call frame.
    #[error("return value")]
    Return(ReturnValue),
}

#[derive(Debug, PartialEq, Clone)]
pub struct ReturnValue {
    pub(crate) value: Value,
}

// " at end" for errors at EOF, " at 'lexeme'" otherwise. Scan errors have no
// token to point at and use the bare form.
fn location(token: &Token) -> String {
    match token.ty {
        Type::Eof => String::from(" at end"),
        _ => format!(" at '{}'", token.lexeme),
    }
}

impl Error {
    pub(crate) fn scan_error(line: usize, msg: &str) -> Self {
        debug!("scan error: line={} msg={}", line, msg);
        Error::ScanError {
            line,
            msg: String::from(msg),
        }
    }

    pub(crate) fn parse_error(token: &Token, msg: &str) -> Self {
        debug!("parse error: line={} msg={}", token.line, msg);
        Error::ParseError {
            line: token.line,
            location: location(token),
            msg: String::from(msg),
        }
    }

    pub(crate) fn resolve_error(token: &Token, msg: &str) -> Self {
        debug!("resolve error: line={} msg={}", token.line, msg);
        Error::ResolveError {
            line: token.line,
            location: location(token),
            msg: String::from(msg),
        }
    }

    pub(crate) fn runtime_error(token: &Token, msg: &str) -> Self {
        debug!("runtime error: line={} msg={}", token.line, msg);
        Error::RuntimeError {
            line: token.line,
            msg: String::from(msg),
        }
    }

    pub(crate) fn return_value(value: Value) -> Self {
        Error::Return(ReturnValue { value })
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::Error;
    use crate::token::{Literal, Token, Type};

    #[test]
    fn test_diagnostic_formats() {
        let scan = Error::scan_error(3, "Unexpected character.");
        assert_eq!(scan.to_string(), "[Line 3] error : Unexpected character.");

        let semi = Token::new(Type::SemiColon, String::from(";"), 2, 7, Literal::Nil);
        let parse = Error::parse_error(&semi, "Expect expression.");
        assert_eq!(
            parse.to_string(),
            "[Line 2] error at ';': Expect expression."
        );

        let eof = Token::new(Type::Eof, String::new(), 5, 9, Literal::Nil);
        let at_end = Error::parse_error(&eof, "Expect '}' after block.");
        assert_eq!(
            at_end.to_string(),
            "[Line 5] error at end: Expect '}' after block."
        );

        let plus = Token::new(Type::Plus, String::from("+"), 4, 1, Literal::Nil);
        let runtime = Error::runtime_error(&plus, "Operands must be numbers.");
        assert_eq!(
            runtime.to_string(),
            "Operands must be numbers.\n[line 4]"
        );
    }
}
