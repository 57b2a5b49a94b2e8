use crate::diag::Pos;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct LexError {
    pub pos: Pos,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // keywords
    KwFunc,
    KwLet,
    KwIf,
    KwElse,
    KwReturn,
    KwAssert,
    KwInt,
    KwString,
    KwBool,
    KwVoid,
    KwFuncType,

    Ident(String),
    Int(i32),
    /// Raw string content between the quotes; escape sequences are left
    /// untouched here and processed once when the AST is built.
    Str(String),
    Bool(bool),

    Arrow,
    FatArrow,
    EqEq,
    NotEq,
    LtEq,
    GtEq,
    Lt,
    Gt,
    AndAnd,
    OrOr,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Assign,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semi,
    Comma,
    Colon,
    Dot,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::KwFunc => f.write_str("'func'"),
            TokenKind::KwLet => f.write_str("'let'"),
            TokenKind::KwIf => f.write_str("'if'"),
            TokenKind::KwElse => f.write_str("'else'"),
            TokenKind::KwReturn => f.write_str("'return'"),
            TokenKind::KwAssert => f.write_str("'assert'"),
            TokenKind::KwInt => f.write_str("'Int'"),
            TokenKind::KwString => f.write_str("'String'"),
            TokenKind::KwBool => f.write_str("'Bool'"),
            TokenKind::KwVoid => f.write_str("'Void'"),
            TokenKind::KwFuncType => f.write_str("'Func'"),
            TokenKind::Ident(name) => write!(f, "identifier '{name}'"),
            TokenKind::Int(value) => write!(f, "integer literal {value}"),
            TokenKind::Str(_) => f.write_str("string literal"),
            TokenKind::Bool(value) => write!(f, "'{value}'"),
            TokenKind::Arrow => f.write_str("'->'"),
            TokenKind::FatArrow => f.write_str("'=>'"),
            TokenKind::EqEq => f.write_str("'=='"),
            TokenKind::NotEq => f.write_str("'!='"),
            TokenKind::LtEq => f.write_str("'<='"),
            TokenKind::GtEq => f.write_str("'>='"),
            TokenKind::Lt => f.write_str("'<'"),
            TokenKind::Gt => f.write_str("'>'"),
            TokenKind::AndAnd => f.write_str("'&&'"),
            TokenKind::OrOr => f.write_str("'||'"),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::Minus => f.write_str("'-'"),
            TokenKind::Star => f.write_str("'*'"),
            TokenKind::Slash => f.write_str("'/'"),
            TokenKind::Percent => f.write_str("'%'"),
            TokenKind::Bang => f.write_str("'!'"),
            TokenKind::Assign => f.write_str("'='"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::LBrace => f.write_str("'{'"),
            TokenKind::RBrace => f.write_str("'}'"),
            TokenKind::Semi => f.write_str("';'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Colon => f.write_str("':'"),
            TokenKind::Dot => f.write_str("'.'"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
    /// The original source text of the token (empty for end of input).
    pub text: String,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

/// Tokenize GP-λ source text. A leading UTF-8 BOM is skipped.
pub fn lex(src: &str) -> Result<Vec<Token>, LexError> {
    let src = src.strip_prefix('\u{feff}').unwrap_or(src);
    Lexer::new(src).run()
}

struct Lexer<'a> {
    src: &'a str,
    iter: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    col: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            src,
            iter: src.char_indices().peekable(),
            line: 1,
            col: 1,
            tokens: Vec::new(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.iter.peek().map(|&(_, c)| c)
    }

    fn peek_is(&mut self, expected: char) -> bool {
        self.peek() == Some(expected)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.iter.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn byte_pos(&mut self) -> usize {
        self.iter.peek().map(|&(i, _)| i).unwrap_or(self.src.len())
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.col)
    }

    fn push(&mut self, kind: TokenKind, pos: Pos, start: usize) {
        let end = self.byte_pos();
        self.tokens.push(Token {
            kind,
            pos,
            text: self.src[start..end].to_string(),
        });
    }

    fn error(&self, pos: Pos, message: impl Into<String>) -> LexError {
        LexError {
            pos,
            message: message.into(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(c) = self.peek() {
            let pos = self.pos();
            let start = self.byte_pos();

            if c.is_whitespace() {
                self.bump();
                continue;
            }

            match c {
                '/' => {
                    self.bump();
                    if self.peek_is('/') {
                        while let Some(c) = self.bump() {
                            if c == '\n' {
                                break;
                            }
                        }
                    } else if self.peek_is('*') {
                        self.bump();
                        self.skip_block_comment(pos)?;
                    } else {
                        self.push(TokenKind::Slash, pos, start);
                    }
                }
                '"' => self.lex_string(pos, start)?,
                '0'..='9' => self.lex_number(pos, start)?,
                c if is_ident_start(c) => self.lex_ident(pos, start),
                '-' => {
                    self.bump();
                    if self.peek_is('>') {
                        self.bump();
                        self.push(TokenKind::Arrow, pos, start);
                    } else {
                        self.push(TokenKind::Minus, pos, start);
                    }
                }
                '=' => {
                    self.bump();
                    if self.peek_is('=') {
                        self.bump();
                        self.push(TokenKind::EqEq, pos, start);
                    } else if self.peek_is('>') {
                        self.bump();
                        self.push(TokenKind::FatArrow, pos, start);
                    } else {
                        self.push(TokenKind::Assign, pos, start);
                    }
                }
                '!' => {
                    self.bump();
                    if self.peek_is('=') {
                        self.bump();
                        self.push(TokenKind::NotEq, pos, start);
                    } else {
                        self.push(TokenKind::Bang, pos, start);
                    }
                }
                '<' => {
                    self.bump();
                    if self.peek_is('=') {
                        self.bump();
                        self.push(TokenKind::LtEq, pos, start);
                    } else {
                        self.push(TokenKind::Lt, pos, start);
                    }
                }
                '>' => {
                    self.bump();
                    if self.peek_is('=') {
                        self.bump();
                        self.push(TokenKind::GtEq, pos, start);
                    } else {
                        self.push(TokenKind::Gt, pos, start);
                    }
                }
                '&' => {
                    self.bump();
                    if self.peek_is('&') {
                        self.bump();
                        self.push(TokenKind::AndAnd, pos, start);
                    } else {
                        return Err(self.error(pos, "unexpected '&'"));
                    }
                }
                '|' => {
                    self.bump();
                    if self.peek_is('|') {
                        self.bump();
                        self.push(TokenKind::OrOr, pos, start);
                    } else {
                        return Err(self.error(pos, "unexpected '|'"));
                    }
                }
                '+' => {
                    self.bump();
                    self.push(TokenKind::Plus, pos, start);
                }
                '*' => {
                    self.bump();
                    self.push(TokenKind::Star, pos, start);
                }
                '%' => {
                    self.bump();
                    self.push(TokenKind::Percent, pos, start);
                }
                '(' => {
                    self.bump();
                    self.push(TokenKind::LParen, pos, start);
                }
                ')' => {
                    self.bump();
                    self.push(TokenKind::RParen, pos, start);
                }
                '{' => {
                    self.bump();
                    self.push(TokenKind::LBrace, pos, start);
                }
                '}' => {
                    self.bump();
                    self.push(TokenKind::RBrace, pos, start);
                }
                ';' => {
                    self.bump();
                    self.push(TokenKind::Semi, pos, start);
                }
                ',' => {
                    self.bump();
                    self.push(TokenKind::Comma, pos, start);
                }
                ':' => {
                    self.bump();
                    self.push(TokenKind::Colon, pos, start);
                }
                '.' => {
                    self.bump();
                    self.push(TokenKind::Dot, pos, start);
                }
                other => {
                    return Err(self.error(pos, format!("unexpected character '{other}'")));
                }
            }
        }

        let end = self.pos();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            pos: end,
            text: String::new(),
        });
        Ok(self.tokens)
    }

    // Block comments do not nest; the first `*/` terminates.
    fn skip_block_comment(&mut self, open: Pos) -> Result<(), LexError> {
        loop {
            match self.bump() {
                Some('*') if self.peek_is('/') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => {}
                None => return Err(self.error(open, "unterminated block comment")),
            }
        }
    }

    fn lex_string(&mut self, pos: Pos, start: usize) -> Result<(), LexError> {
        self.bump(); // opening quote
        let mut raw = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error(pos, "unterminated string literal")),
                Some('\n') => {
                    return Err(self.error(self.pos(), "newline in string literal"));
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    // Keep the escape sequence raw; the AST builder decodes it.
                    self.bump();
                    raw.push('\\');
                    match self.peek() {
                        Some('\n') | None => {
                            return Err(self.error(pos, "unterminated string literal"));
                        }
                        Some(c) => {
                            self.bump();
                            raw.push(c);
                        }
                    }
                }
                Some(c) => {
                    self.bump();
                    raw.push(c);
                }
            }
        }
        self.push(TokenKind::Str(raw), pos, start);
        Ok(())
    }

    fn lex_number(&mut self, pos: Pos, start: usize) -> Result<(), LexError> {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let value: i32 = digits
            .parse()
            .map_err(|_| self.error(pos, format!("integer literal '{digits}' is out of range")))?;
        self.push(TokenKind::Int(value), pos, start);
        Ok(())
    }

    fn lex_ident(&mut self, pos: Pos, start: usize) {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let kind = match ident.as_str() {
            "func" => TokenKind::KwFunc,
            "let" => TokenKind::KwLet,
            "if" => TokenKind::KwIf,
            "else" => TokenKind::KwElse,
            "return" => TokenKind::KwReturn,
            "assert" => TokenKind::KwAssert,
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            "Int" => TokenKind::KwInt,
            "String" => TokenKind::KwString,
            "Bool" => TokenKind::KwBool,
            "Void" => TokenKind::KwVoid,
            "Func" => TokenKind::KwFuncType,
            _ => TokenKind::Ident(ident),
        };
        self.push(kind, pos, start);
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
