use crate::ast::*;
use crate::diag::{Diagnostic, Pos};
use crate::lexer::{lex, LexError, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: Token,
    },
    #[error("higher-order function calls are not yet supported")]
    HigherOrderCall { pos: Pos },
}

impl ParseError {
    pub fn pos(&self) -> Pos {
        match self {
            ParseError::Lex(e) => e.pos,
            ParseError::UnexpectedToken { found, .. } => found.pos,
            ParseError::HigherOrderCall { pos } => *pos,
        }
    }

    /// Lex and parse failures are syntax errors; the higher-order-call
    /// rejection is a semantic one even though it is detected while the
    /// call expression is being built.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ParseError::HigherOrderCall { .. } => {
                Diagnostic::semantic(self.pos(), self.to_string())
            }
            _ => Diagnostic::syntax(self.pos(), self.to_string()),
        }
    }
}

/// Decode the escape sequences of a raw string-literal body. Recognized
/// escapes are `\n`, `\r`, `\t`, `\"` and `\\`; any other escape is kept
/// verbatim, backslash included.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let tokens = lex(source)?;
        Ok(Self { tokens, pos: 0 })
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut decls = Vec::new();
        while !self.check(&TokenKind::Eof) {
            decls.push(self.parse_declaration()?);
        }
        Ok(Program { decls })
    }

    fn parse_declaration(&mut self) -> Result<Stmt, ParseError> {
        if self.check(&TokenKind::KwFunc) {
            self.parse_func_decl()
        } else {
            self.parse_statement()
        }
    }

    fn parse_func_decl(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.peek_pos();
        self.expect(&TokenKind::KwFunc, "'func'")?;
        let name = self.expect_ident("function name")?;
        self.expect(&TokenKind::LParen, "'(' after function name")?;
        let params = if self.check(&TokenKind::RParen) {
            Vec::new()
        } else {
            self.parse_params()?
        };
        self.expect(&TokenKind::RParen, "')' after parameters")?;
        let ret = if self.matches(&[TokenKind::Arrow]) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(Stmt::Func(FuncDecl {
            name,
            params,
            ret,
            body,
            pos,
        }))
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        loop {
            let pos = self.peek_pos();
            let name = self.expect_ident("parameter name")?;
            self.expect(&TokenKind::Colon, "':' after parameter name")?;
            let ty = self.parse_type()?;
            params.push(Param { name, ty, pos });
            if !self.matches(&[TokenKind::Comma]) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_type(&mut self) -> Result<Type, ParseError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::KwInt => Ok(Type::INT),
            TokenKind::KwString => Ok(Type::STRING),
            TokenKind::KwBool => Ok(Type::BOOL),
            TokenKind::KwVoid => Ok(Type::VOID),
            TokenKind::KwFuncType => {
                self.expect(&TokenKind::Lt, "'<' after 'Func'")?;
                // the last type in the list is the return type
                let mut params = Vec::new();
                let mut last = self.parse_type()?;
                while self.matches(&[TokenKind::Comma]) {
                    let next = self.parse_type()?;
                    params.push(std::mem::replace(&mut last, next));
                }
                self.expect(&TokenKind::Gt, "'>' to close function type")?;
                Ok(Type::function(params, last))
            }
            _ => Err(ParseError::UnexpectedToken {
                expected: "type",
                found: tok,
            }),
        }
    }

    fn parse_block(&mut self) -> Result<BlockStmt, ParseError> {
        let pos = self.peek_pos();
        self.expect(&TokenKind::LBrace, "'{' to start block")?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.unexpected("'}' to close block"));
            }
            stmts.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RBrace, "'}' to close block")?;
        Ok(BlockStmt { stmts, pos })
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek().kind {
            TokenKind::KwLet => self.parse_var_decl(),
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwReturn => self.parse_return(),
            TokenKind::KwAssert => self.parse_assert(),
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Ident(_) if self.peek_next_is(&TokenKind::Assign) => self.parse_assign(),
            _ => {
                let pos = self.peek_pos();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::Semi, "';' after expression")?;
                Ok(Stmt::Expr(ExprStmt { expr, pos }))
            }
        }
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.peek_pos();
        self.expect(&TokenKind::KwLet, "'let'")?;
        let name = self.expect_ident("variable name")?;
        let ty = if self.matches(&[TokenKind::Colon]) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.matches(&[TokenKind::Assign]) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(&TokenKind::Semi, "';' after variable declaration")?;
        Ok(Stmt::VarDecl(VarDeclStmt {
            name,
            ty,
            init,
            resolved_ty: None,
            pos,
        }))
    }

    fn parse_assign(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.peek_pos();
        let name = self.expect_ident("assignment target")?;
        self.expect(&TokenKind::Assign, "'='")?;
        let value = self.parse_expr()?;
        self.expect(&TokenKind::Semi, "';' after assignment")?;
        Ok(Stmt::Assign(AssignStmt { name, value, pos }))
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.peek_pos();
        self.expect(&TokenKind::KwIf, "'if'")?;
        self.expect(&TokenKind::LParen, "'(' after 'if'")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')' after condition")?;
        let then_block = self.parse_block()?;
        let else_block = if self.matches(&[TokenKind::KwElse]) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Stmt::If(IfStmt {
            cond,
            then_block,
            else_block,
            pos,
        }))
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.peek_pos();
        self.expect(&TokenKind::KwReturn, "'return'")?;
        let value = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::Semi, "';' after return statement")?;
        Ok(Stmt::Return(ReturnStmt { value, pos }))
    }

    fn parse_assert(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.peek_pos();
        self.expect(&TokenKind::KwAssert, "'assert'")?;
        self.expect(&TokenKind::LParen, "'(' after 'assert'")?;
        let cond = self.parse_expr()?;
        let message = if self.matches(&[TokenKind::Comma]) {
            let tok = self.advance();
            match tok.kind {
                TokenKind::Str(raw) => Some(unescape(&raw)),
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "string literal message",
                        found: tok,
                    })
                }
            }
        } else {
            None
        };
        self.expect(&TokenKind::RParen, "')' after assert condition")?;
        self.expect(&TokenKind::Semi, "';' after assert statement")?;
        Ok(Stmt::Assert(AssertStmt { cond, message, pos }))
    }

    // --- expressions, lowest precedence first ---

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_and()?;
        while self.matches(&[TokenKind::OrOr]) {
            let right = self.parse_and()?;
            expr = binary(expr, BinaryOp::Or, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_equality()?;
        while self.matches(&[TokenKind::AndAnd]) {
            let right = self.parse_equality()?;
            expr = binary(expr, BinaryOp::And, right);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_relational()?;
        loop {
            let op = if self.matches(&[TokenKind::EqEq]) {
                BinaryOp::Eq
            } else if self.matches(&[TokenKind::NotEq]) {
                BinaryOp::Ne
            } else {
                break;
            };
            let right = self.parse_relational()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_additive()?;
        loop {
            let op = if self.matches(&[TokenKind::Lt]) {
                BinaryOp::Lt
            } else if self.matches(&[TokenKind::Gt]) {
                BinaryOp::Gt
            } else if self.matches(&[TokenKind::LtEq]) {
                BinaryOp::Le
            } else if self.matches(&[TokenKind::GtEq]) {
                BinaryOp::Ge
            } else {
                break;
            };
            let right = self.parse_additive()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = if self.matches(&[TokenKind::Plus]) {
                BinaryOp::Add
            } else if self.matches(&[TokenKind::Minus]) {
                BinaryOp::Sub
            } else {
                break;
            };
            let right = self.parse_multiplicative()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = if self.matches(&[TokenKind::Star]) {
                BinaryOp::Mul
            } else if self.matches(&[TokenKind::Slash]) {
                BinaryOp::Div
            } else if self.matches(&[TokenKind::Percent]) {
                BinaryOp::Mod
            } else {
                break;
            };
            let right = self.parse_unary()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let pos = self.peek_pos();
        if self.matches(&[TokenKind::Minus]) {
            let expr = self.parse_unary()?;
            return Ok(unary(UnaryOp::Neg, expr, pos));
        }
        if self.matches(&[TokenKind::Bang]) {
            let expr = self.parse_unary()?;
            return Ok(unary(UnaryOp::Not, expr, pos));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(&[TokenKind::LParen]) {
                // calls apply to bare names only
                let callee = match expr {
                    Expr::Var(v) => v,
                    other => return Err(ParseError::HigherOrderCall { pos: other.pos() }),
                };
                let args = self.parse_call_args()?;
                expr = Expr::Call(CallExpr {
                    callee: callee.name,
                    args,
                    pos: callee.pos,
                });
            } else if self.matches(&[TokenKind::Dot]) {
                // e.m(a, b) lowers to m(e, a, b)
                let method = self.expect_ident("method name after '.'")?;
                self.expect(&TokenKind::LParen, "'(' after method name")?;
                let rest = self.parse_call_args()?;
                let pos = expr.pos();
                let mut args = vec![expr];
                args.extend(rest);
                expr = Expr::Call(CallExpr {
                    callee: method,
                    args,
                    pos,
                });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        if self.matches(&[TokenKind::RParen]) {
            return Ok(Vec::new());
        }
        let mut args = Vec::new();
        loop {
            args.push(self.parse_expr()?);
            if self.matches(&[TokenKind::Comma]) {
                continue;
            }
            self.expect(&TokenKind::RParen, "')' after call arguments")?;
            break;
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Int(value) => Ok(Expr::Int(IntLit {
                value,
                pos: tok.pos,
            })),
            TokenKind::Str(raw) => Ok(Expr::Str(StrLit {
                value: unescape(&raw),
                pos: tok.pos,
            })),
            TokenKind::Bool(value) => Ok(Expr::Bool(BoolLit {
                value,
                pos: tok.pos,
            })),
            TokenKind::Ident(name) => Ok(Expr::Var(VarExpr {
                name,
                pos: tok.pos,
            })),
            TokenKind::LParen => {
                if self.looks_like_lambda() {
                    self.parse_lambda(tok.pos)
                } else {
                    let expr = self.parse_expr()?;
                    self.expect(&TokenKind::RParen, "')' after expression")?;
                    Ok(expr)
                }
            }
            _ => Err(ParseError::UnexpectedToken {
                expected: "expression",
                found: tok,
            }),
        }
    }

    /// Called just after consuming a '('. A parenthesized parameter list
    /// followed by '=>' is a lambda; anything else is a grouped expression.
    fn looks_like_lambda(&self) -> bool {
        let mut depth = 1usize;
        let mut idx = self.pos;
        while let Some(tok) = self.tokens.get(idx) {
            match tok.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(
                            self.tokens.get(idx + 1),
                            Some(t) if t.kind == TokenKind::FatArrow
                        );
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            idx += 1;
        }
        false
    }

    fn parse_lambda(&mut self, pos: Pos) -> Result<Expr, ParseError> {
        let params = if self.check(&TokenKind::RParen) {
            Vec::new()
        } else {
            self.parse_params()?
        };
        self.expect(&TokenKind::RParen, "')' after lambda parameters")?;
        self.expect(&TokenKind::FatArrow, "'=>' after lambda parameters")?;
        let body = if self.check(&TokenKind::LBrace) {
            LambdaBody::Block(self.parse_block()?)
        } else {
            LambdaBody::Expr(Box::new(self.parse_expr()?))
        };
        Ok(Expr::Lambda(LambdaExpr { params, body, pos }))
    }

    // --- token helpers ---

    fn matches(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("token stream has EOF"))
    }

    fn peek_pos(&self) -> Pos {
        self.peek().pos
    }

    fn peek_next_is(&self, kind: &TokenKind) -> bool {
        self.tokens.get(self.pos + 1).map(|t| &t.kind) == Some(kind)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: &TokenKind, msg: &'static str) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(msg))
        }
    }

    fn expect_ident(&mut self, msg: &'static str) -> Result<String, ParseError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Ident(name) => Ok(name),
            _ => Err(ParseError::UnexpectedToken {
                expected: msg,
                found: tok,
            }),
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        ParseError::UnexpectedToken {
            expected,
            found: self.peek().clone(),
        }
    }
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    let pos = left.pos();
    Expr::Binary(BinaryExpr {
        left: Box::new(left),
        op,
        right: Box::new(right),
        pos,
    })
}

fn unary(op: UnaryOp, expr: Expr, pos: Pos) -> Expr {
    Expr::Unary(UnaryExpr {
        op,
        expr: Box::new(expr),
        pos,
    })
}
