use phf::{phf_map, Map};

use crate::errors::Error;
use crate::token::{Literal, Token, Type};

pub struct Scanner<'a> {
    start: usize,
    current: usize,
    line: usize,
    idx: usize,
    src: &'a str,
}

impl<'a> Scanner<'a> {
    const KEYWORDS: Map<&'static str, Type> = phf_map! {
        "and" => Type::And,
        "else" => Type::Else,
        "for" => Type::For,
        "if" => Type::If,
        "or" => Type::Or,
        "return" => Type::Return,
        "this" => Type::This,
        "var" => Type::Var,
        "class" => Type::Class,
        "false" => Type::False,
        "fun" => Type::Fun,
        "nil" => Type::Nil,
        "print" => Type::Print,
        "super" => Type::Super,
        "true" => Type::True,
        "while" => Type::While,
    };

    pub fn new(src: &'a str) -> Self {
        Self::with_offset(src, 0)
    }

    /// Token indices continue from `offset`. A driver that scans successive
    /// chunks against one interpreter (the REPL) passes the running total so
    /// indices stay unique across chunks and earlier resolutions are never
    /// clobbered.
    pub fn with_offset(src: &'a str, offset: usize) -> Self {
        Scanner {
            start: 0,
            current: 0,
            line: 1,
            idx: offset,
            src,
        }
    }

    /// Scans the whole source. A lexical error does not stop the scan; all
    /// errors of the pass are reported together.
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, Vec<Error>> {
        let mut tokens = vec![];
        let mut errs = vec![];

        while !self.is_at_end() {
            self.start = self.current;
            if let Err(err) = self.scan_token(&mut tokens) {
                errs.push(err);
            }
        }

        self.start = self.current;
        tokens.push(self.make_token(Type::Eof));

        if errs.is_empty() {
            Ok(tokens)
        } else {
            Err(errs)
        }
    }

    fn scan_token(&mut self, tokens: &mut Vec<Token>) -> Result<(), Error> {
        let c = self.advance();

        match c {
            '(' => tokens.push(self.make_token(Type::LeftParen)),
            ')' => tokens.push(self.make_token(Type::RightParen)),
            '{' => tokens.push(self.make_token(Type::LeftBrace)),
            '}' => tokens.push(self.make_token(Type::RightBrace)),
            ',' => tokens.push(self.make_token(Type::Comma)),
            '.' => tokens.push(self.make_token(Type::Dot)),
            '-' => tokens.push(self.make_token(Type::Minus)),
            '+' => tokens.push(self.make_token(Type::Plus)),
            ';' => tokens.push(self.make_token(Type::SemiColon)),
            '*' => tokens.push(self.make_token(Type::Star)),

            '!' => {
                if self.match_char('=') {
                    tokens.push(self.make_token(Type::BangEqual))
                } else {
                    tokens.push(self.make_token(Type::Bang))
                }
            }

            '=' => {
                if self.match_char('=') {
                    tokens.push(self.make_token(Type::EqualEqual))
                } else {
                    tokens.push(self.make_token(Type::Equal))
                }
            }

            '<' => {
                if self.match_char('=') {
                    tokens.push(self.make_token(Type::LessEqual))
                } else {
                    tokens.push(self.make_token(Type::Less))
                }
            }

            '>' => {
                if self.match_char('=') {
                    tokens.push(self.make_token(Type::GreaterEqual))
                } else {
                    tokens.push(self.make_token(Type::Greater))
                }
            }

            '/' => {
                if self.match_char('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else if self.match_char('*') {
                    let mut done = false;
                    while !self.is_at_end() && !done {
                        // Multi-line comments are allowed, so ensure to
                        // increment the line since `advance()` doesn't
                        // increment line number
                        if self.current() == '\n' {
                            self.line += 1;
                        }

                        let now = self.advance();
                        if now == '*' && self.peek() == '/' {
                            self.advance();
                            done = true;
                        }
                    }

                    if !done {
                        return Err(self.error("Unterminated block comment."));
                    }
                } else {
                    tokens.push(self.make_token(Type::Slash));
                }
            }

            '"' => tokens.push(self.string()?),

            // White spaces, do nothing
            ' ' | '\t' | '\r' => {}

            // Increment for new line
            '\n' => self.line += 1,

            _ => {
                if c.is_ascii_digit() {
                    tokens.push(self.number());
                } else if c.is_ascii_alphabetic() || c == '_' {
                    tokens.push(self.identifier());
                } else {
                    return Err(self.error("Unexpected character."));
                }
            }
        }

        Ok(())
    }

    fn string(&mut self) -> Result<Token, Error> {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }

            self.advance();
        }

        if self.is_at_end() {
            return Err(self.error("Unterminated string."));
        }

        // consume the closing "
        self.advance();
        Ok(self.make_token_with_val(
            Type::String,
            Literal::from(String::from(&self.src[self.start + 1..self.current - 1])),
        ))
    }

    fn number(&mut self) -> Token {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // A trailing '.' with no digit after it is not part of the number,
        // it will be scanned as a Dot token.
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        self.make_token_with_val(
            Type::Number,
            Literal::Num(self.src[self.start..self.current].parse::<f64>().unwrap()),
        )
    }

    fn identifier(&mut self) -> Token {
        while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text = String::from(&self.src[self.start..self.current]);

        match Self::KEYWORDS.get(&text) {
            None => self.make_token(Type::Identifier),
            Some(ty @ Type::True) | Some(ty @ Type::False) => {
                let val = match ty {
                    Type::True => Literal::Bool(true),
                    _ => Literal::Bool(false),
                };

                self.make_token_with_val(*ty, val)
            }
            Some(keyword) => self.make_token(*keyword),
        }
    }

    fn make_token(&mut self, ty: Type) -> Token {
        self.make_token_with_val(ty, Literal::Nil)
    }

    fn make_token_with_val(&mut self, ty: Type, val: Literal) -> Token {
        let lexeme = match ty {
            Type::Eof => String::new(),
            _ => String::from(&self.src[self.start..self.current]),
        };

        let idx = self.idx;
        self.idx += 1;
        Token::new(ty, lexeme, self.line, idx, val)
    }

    // `start` and `current` are byte offsets, always sitting on a char
    // boundary, so lexeme slices stay valid on multibyte sources.
    fn current(&self) -> char {
        self.src[self.current..].chars().next().unwrap()
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.current()
        }
    }

    fn peek_next(&self) -> char {
        let mut chars = self.src[self.current..].chars();
        chars.next();
        chars.next().unwrap_or('\0')
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.src.len()
    }

    fn advance(&mut self) -> char {
        let res = self.current();
        self.current += res.len_utf8();
        res
    }

    fn match_char(&mut self, c: char) -> bool {
        if self.is_at_end() || self.current() != c {
            false
        } else {
            self.current += c.len_utf8();
            true
        }
    }

    fn error(&self, msg: &str) -> Error {
        Error::scan_error(self.line, msg)
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::Error;
    use crate::scanner::Scanner;
    use crate::token::{Literal, Token, Type};

    #[test]
    fn test_basic_scanning() {
        let source = "class fun {} var foo _bar 12.45 \"hello\" true false nil // a comment";
        let mut scanner = Scanner::new(source);
        let tokens = scanner.scan_tokens().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::new(Type::Class, String::from("class"), 1, 0, Literal::Nil),
                Token::new(Type::Fun, String::from("fun"), 1, 1, Literal::Nil),
                Token::new(Type::LeftBrace, String::from("{"), 1, 2, Literal::Nil),
                Token::new(Type::RightBrace, String::from("}"), 1, 3, Literal::Nil),
                Token::new(Type::Var, String::from("var"), 1, 4, Literal::Nil),
                Token::new(Type::Identifier, String::from("foo"), 1, 5, Literal::Nil),
                Token::new(Type::Identifier, String::from("_bar"), 1, 6, Literal::Nil),
                Token::new(
                    Type::Number,
                    String::from("12.45"),
                    1,
                    7,
                    Literal::Num(12.45)
                ),
                Token::new(
                    Type::String,
                    String::from("\"hello\""),
                    1,
                    8,
                    Literal::from("hello")
                ),
                Token::new(Type::True, String::from("true"), 1, 9, Literal::Bool(true)),
                Token::new(
                    Type::False,
                    String::from("false"),
                    1,
                    10,
                    Literal::Bool(false)
                ),
                Token::new(Type::Nil, String::from("nil"), 1, 11, Literal::Nil),
                Token::new(Type::Eof, String::new(), 1, 12, Literal::Nil),
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        let source = "! != = == < <= > >=";
        let mut scanner = Scanner::new(source);
        let types: Vec<Type> = scanner
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|token| token.ty)
            .collect();

        assert_eq!(
            types,
            vec![
                Type::Bang,
                Type::BangEqual,
                Type::Equal,
                Type::EqualEqual,
                Type::Less,
                Type::LessEqual,
                Type::Greater,
                Type::GreaterEqual,
                Type::Eof,
            ]
        );
    }

    #[test]
    fn test_trailing_dot_is_not_part_of_number() {
        let source = "12.bar";
        let mut scanner = Scanner::new(source);
        let tokens = scanner.scan_tokens().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::new(Type::Number, String::from("12"), 1, 0, Literal::Num(12.0)),
                Token::new(Type::Dot, String::from("."), 1, 1, Literal::Nil),
                Token::new(Type::Identifier, String::from("bar"), 1, 2, Literal::Nil),
                Token::new(Type::Eof, String::new(), 1, 3, Literal::Nil),
            ]
        );
    }

    #[test]
    fn test_multiline_comment() {
        let source = "/*\n\
            this is a multiline comment \n\
        */";
        let mut scanner = Scanner::new(source);
        let tokens = scanner.scan_tokens().unwrap();

        assert_eq!(
            tokens,
            vec![Token::new(Type::Eof, String::new(), 3, 0, Literal::Nil)]
        );
    }

    #[test]
    fn test_unterminated_multiline_comment() {
        let source = "/*";
        let mut scanner = Scanner::new(source);
        assert_eq!(
            scanner.scan_tokens(),
            Err(vec![Error::ScanError {
                line: 1,
                msg: String::from("Unterminated block comment.")
            }])
        );
    }

    #[test]
    fn test_unterminated_string() {
        let source = "\"hello";
        let mut scanner = Scanner::new(source);
        assert_eq!(
            scanner.scan_tokens(),
            Err(vec![Error::ScanError {
                line: 1,
                msg: String::from("Unterminated string.")
            }])
        );
    }

    #[test]
    fn test_scanning_continues_past_errors() {
        let source = "var @ foo\n#";
        let mut scanner = Scanner::new(source);
        assert_eq!(
            scanner.scan_tokens(),
            Err(vec![
                Error::ScanError {
                    line: 1,
                    msg: String::from("Unexpected character.")
                },
                Error::ScanError {
                    line: 2,
                    msg: String::from("Unexpected character.")
                },
            ])
        );
    }

    #[test]
    fn test_multibyte_characters_in_strings_and_comments() {
        let source = "// héllo\n\"café\" + 1;";
        let mut scanner = Scanner::new(source);
        let tokens = scanner.scan_tokens().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::new(
                    Type::String,
                    String::from("\"café\""),
                    2,
                    0,
                    Literal::from("café")
                ),
                Token::new(Type::Plus, String::from("+"), 2, 1, Literal::Nil),
                Token::new(Type::Number, String::from("1"), 2, 2, Literal::Num(1.0)),
                Token::new(Type::SemiColon, String::from(";"), 2, 3, Literal::Nil),
                Token::new(Type::Eof, String::new(), 2, 4, Literal::Nil),
            ]
        );
    }

    #[test]
    fn test_unexpected_multibyte_character() {
        // A multibyte stray must not panic or desync the cursor.
        let source = "£;";
        let mut scanner = Scanner::new(source);
        assert_eq!(
            scanner.scan_tokens(),
            Err(vec![Error::ScanError {
                line: 1,
                msg: String::from("Unexpected character.")
            }])
        );
    }

    #[test]
    fn test_token_offset() {
        let mut scanner = Scanner::with_offset("x;", 10);
        let tokens = scanner.scan_tokens().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::new(Type::Identifier, String::from("x"), 1, 10, Literal::Nil),
                Token::new(Type::SemiColon, String::from(";"), 1, 11, Literal::Nil),
                Token::new(Type::Eof, String::new(), 1, 12, Literal::Nil),
            ]
        );
    }
}
