//! Recursive-descent parser for the Aurora surface language.
//!
//! One token of lookahead, an explicit precedence ladder, and compound
//! assignments rewritten into plain assignments at parse time so the later
//! stages only ever see `=`.

use std::borrow::Cow;

use crate::ast::{BinOp, Expr, ExprKind, Function, Param, Program, Stmt, StmtKind, UnaryOp};
use crate::diagnostics::Diagnostic;
use crate::span::Span;
use crate::token::{Token, TokenKind};
use crate::types::Ty;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("expected {expected}, found {found} at {span}")]
    UnexpectedToken {
        expected: Cow<'static, str>,
        found: TokenKind,
        span: Span,
    },
    #[error("{message} at {span}")]
    Message {
        message: Cow<'static, str>,
        span: Span,
    },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. } | ParseError::Message { span, .. } => *span,
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        let span = self.span();
        Diagnostic::error(self.to_string()).with_label(span, "parse error")
    }
}

/// Parses a full token stream (as produced by [`crate::lexer::tokenize`])
/// into a program.
pub fn parse_program(tokens: Vec<Token>) -> Result<Program, ParseError> {
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        debug_assert!(matches!(tokens.last(), Some(token) if token.is_eof()));
        Self { tokens, pos: 0 }
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut functions = Vec::new();
        while !self.check(TokenKind::Eof) {
            functions.push(self.parse_function()?);
        }
        Ok(Program { functions })
    }

    fn parse_function(&mut self) -> Result<Function, ParseError> {
        let start = self.current_span();
        self.expect(TokenKind::KwFn)?;
        let name = self.expect_ident("function name")?;

        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let param_span = self.current_span();
                let name = self.expect_ident("parameter name")?;
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type()?;
                params.push(Param {
                    name,
                    ty,
                    span: param_span,
                });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Arrow)?;
        let return_type = self.parse_type()?;
        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());

        Ok(Function {
            name,
            params,
            return_type,
            body,
            span,
        })
    }

    /// A type is a base keyword or `ptr<T>`; a trailing `[N]` wraps the
    /// parsed type into a fixed-size array.
    fn parse_type(&mut self) -> Result<Ty, ParseError> {
        let base = if self.eat(TokenKind::KwI32) {
            Ty::I32
        } else if self.eat(TokenKind::KwI64) {
            Ty::I64
        } else if self.eat(TokenKind::KwBool) {
            Ty::Bool
        } else if self.eat(TokenKind::KwVoid) {
            Ty::Void
        } else if self.eat(TokenKind::KwPtr) {
            self.expect(TokenKind::Lt)?;
            let elem = self.parse_type()?;
            self.expect(TokenKind::Gt)?;
            if elem.is_void() {
                return Err(self.error_message("'ptr<void>' is not a valid type"));
            }
            Ty::ptr(elem)
        } else {
            return Err(self.error_expected("a type"));
        };

        if self.eat(TokenKind::LBracket) {
            if base.is_void() {
                return Err(self.error_message("'void' cannot be an array element type"));
            }
            let len = self.expect_int("array length")?;
            self.expect(TokenKind::RBracket)?;
            return Ok(Ty::array(base, len));
        }
        Ok(base)
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_span();

        if self.eat(TokenKind::KwLet) {
            let mut unique = false;
            if self.eat(TokenKind::KwUnique) {
                // `unique<T>` names a type syntactically, but the binding's
                // type still comes from the annotation or the initializer.
                self.expect(TokenKind::Lt)?;
                self.parse_type()?;
                self.expect(TokenKind::Gt)?;
                unique = true;
            }
            let name = self.expect_ident("identifier after 'let'")?;
            let annotation = if self.eat(TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            self.expect(TokenKind::Eq)?;
            let init = self.parse_expression()?;
            self.expect(TokenKind::Semicolon)?;
            let span = start.merge(self.previous_span());
            return Ok(Stmt::new(
                StmtKind::Let {
                    name,
                    annotation,
                    init,
                    unique,
                },
                span,
            ));
        }

        if self.eat(TokenKind::KwReturn) {
            let value = if self.check(TokenKind::Semicolon) {
                None
            } else {
                Some(self.parse_expression()?)
            };
            self.expect(TokenKind::Semicolon)?;
            let span = start.merge(self.previous_span());
            return Ok(Stmt::new(StmtKind::Return(value), span));
        }

        if self.eat(TokenKind::KwIf) {
            self.expect(TokenKind::LParen)?;
            let condition = self.parse_expression()?;
            self.expect(TokenKind::RParen)?;
            let then_body = self.parse_block()?;
            let else_body = if self.eat(TokenKind::KwElse) {
                self.parse_block()?
            } else {
                Vec::new()
            };
            let span = start.merge(self.previous_span());
            return Ok(Stmt::new(
                StmtKind::If {
                    condition,
                    then_body,
                    else_body,
                },
                span,
            ));
        }

        if self.eat(TokenKind::KwWhile) {
            self.expect(TokenKind::LParen)?;
            let condition = self.parse_expression()?;
            self.expect(TokenKind::RParen)?;
            let body = self.parse_block()?;
            let span = start.merge(self.previous_span());
            return Ok(Stmt::new(StmtKind::While { condition, body }, span));
        }

        if self.eat(TokenKind::KwDefer) {
            let expr = self.parse_expression()?;
            self.expect(TokenKind::Semicolon)?;
            let span = start.merge(self.previous_span());
            return Ok(Stmt::new(StmtKind::Defer(expr), span));
        }

        if self.eat(TokenKind::KwBreak) {
            self.expect(TokenKind::Semicolon)?;
            return Ok(Stmt::new(StmtKind::Break, start));
        }

        if self.eat(TokenKind::KwContinue) {
            self.expect(TokenKind::Semicolon)?;
            return Ok(Stmt::new(StmtKind::Continue, start));
        }

        let expr = self.parse_expression()?;
        self.expect(TokenKind::Semicolon)?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(StmtKind::Expr(expr), span))
    }

    // Expression precedence ladder, lowest first. Assignment recurses to the
    // right; every other level iterates to the left.

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_logic_or()?;

        if self.eat(TokenKind::Eq) {
            let rhs = self.parse_assignment()?;
            let span = lhs.span.merge(rhs.span);
            return Ok(Expr::new(
                ExprKind::Binary {
                    op: BinOp::Assign,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            ));
        }

        if let Some(op) = compound_op(self.peek_kind()) {
            // `x op= e` desugars to `x = x op e`. Restricted to plain
            // variable targets so no lvalue is evaluated twice.
            let name = match &lhs.kind {
                ExprKind::Var(name) => name.clone(),
                _ => {
                    return Err(ParseError::Message {
                        message: Cow::Borrowed(
                            "compound assignment requires a simple variable on the left side",
                        ),
                        span: lhs.span,
                    })
                }
            };
            self.advance();
            let rhs = self.parse_assignment()?;
            let span = lhs.span.merge(rhs.span);
            let read = Expr::new(ExprKind::Var(name), lhs.span);
            let value = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(read),
                    rhs: Box::new(rhs),
                },
                span,
            );
            return Ok(Expr::new(
                ExprKind::Binary {
                    op: BinOp::Assign,
                    lhs: Box::new(lhs),
                    rhs: Box::new(value),
                },
                span,
            ));
        }

        Ok(lhs)
    }

    fn parse_logic_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_logic_and()?;
        while self.eat(TokenKind::PipePipe) {
            let rhs = self.parse_logic_and()?;
            expr = make_binary(BinOp::Or, expr, rhs);
        }
        Ok(expr)
    }

    fn parse_logic_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_equality()?;
        while self.eat(TokenKind::AmpAmp) {
            let rhs = self.parse_equality()?;
            expr = make_binary(BinOp::And, expr, rhs);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_comparison()?;
        loop {
            if self.eat(TokenKind::EqEq) {
                let rhs = self.parse_comparison()?;
                expr = make_binary(BinOp::Eq, expr, rhs);
            } else if self.eat(TokenKind::BangEq) {
                let rhs = self.parse_comparison()?;
                expr = make_binary(BinOp::NotEq, expr, rhs);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_term()?;
        loop {
            if self.eat(TokenKind::Lt) {
                let rhs = self.parse_term()?;
                expr = make_binary(BinOp::Lt, expr, rhs);
            } else if self.eat(TokenKind::Le) {
                let rhs = self.parse_term()?;
                expr = make_binary(BinOp::Le, expr, rhs);
            } else if self.eat(TokenKind::Gt) {
                let rhs = self.parse_term()?;
                expr = make_binary(BinOp::Gt, expr, rhs);
            } else if self.eat(TokenKind::Ge) {
                let rhs = self.parse_term()?;
                expr = make_binary(BinOp::Ge, expr, rhs);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_factor()?;
        loop {
            if self.eat(TokenKind::Plus) {
                let rhs = self.parse_factor()?;
                expr = make_binary(BinOp::Add, expr, rhs);
            } else if self.eat(TokenKind::Minus) {
                let rhs = self.parse_factor()?;
                expr = make_binary(BinOp::Sub, expr, rhs);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_unary()?;
        loop {
            if self.eat(TokenKind::Star) {
                let rhs = self.parse_unary()?;
                expr = make_binary(BinOp::Mul, expr, rhs);
            } else if self.eat(TokenKind::Slash) {
                let rhs = self.parse_unary()?;
                expr = make_binary(BinOp::Div, expr, rhs);
            } else if self.eat(TokenKind::Percent) {
                let rhs = self.parse_unary()?;
                expr = make_binary(BinOp::Rem, expr, rhs);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_span();
        if self.eat(TokenKind::Minus) {
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        if self.eat(TokenKind::Bang) {
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.eat(TokenKind::LBracket) {
            let index = self.parse_expression()?;
            self.expect(TokenKind::RBracket)?;
            let span = expr.span.merge(self.previous_span());
            expr = Expr::new(
                ExprKind::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_span();

        if self.check(TokenKind::Ident) {
            let name = self.advance_token().lexeme;
            if self.eat(TokenKind::LParen) {
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    args.push(self.parse_expression()?);
                    while self.eat(TokenKind::Comma) {
                        args.push(self.parse_expression()?);
                    }
                }
                self.expect(TokenKind::RParen)?;
                let span = start.merge(self.previous_span());
                return Ok(Expr::new(ExprKind::Call { callee: name, args }, span));
            }
            return Ok(Expr::new(ExprKind::Var(name), start));
        }

        if self.check(TokenKind::Int) {
            let value = self.advance_token().value;
            return Ok(Expr::new(ExprKind::Int(value), start));
        }
        if self.eat(TokenKind::True) {
            return Ok(Expr::new(ExprKind::Bool(true), start));
        }
        if self.eat(TokenKind::False) {
            return Ok(Expr::new(ExprKind::Bool(false), start));
        }

        if self.eat(TokenKind::LBracket) {
            let mut elements = Vec::new();
            if !self.check(TokenKind::RBracket) {
                elements.push(self.parse_expression()?);
                while self.eat(TokenKind::Comma) {
                    elements.push(self.parse_expression()?);
                }
            }
            self.expect(TokenKind::RBracket)?;
            let span = start.merge(self.previous_span());
            return Ok(Expr::new(ExprKind::ArrayLit(elements), span));
        }

        if self.eat(TokenKind::LParen) {
            let expr = self.parse_expression()?;
            self.expect(TokenKind::RParen)?;
            return Ok(expr);
        }

        Err(self.error_expected("an expression"))
    }

    // Token-stream helpers.

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn current_span(&self) -> Span {
        self.peek().span()
    }

    fn previous_span(&self) -> Span {
        let idx = self.pos.saturating_sub(1);
        self.tokens[idx].span()
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn advance_token(&mut self) -> Token {
        let token = self.peek().clone();
        self.advance();
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error_expected_kind(kind))
        }
    }

    fn expect_ident(&mut self, expected: &'static str) -> Result<String, ParseError> {
        if self.check(TokenKind::Ident) {
            Ok(self.advance_token().lexeme)
        } else {
            Err(self.error_expected(expected))
        }
    }

    fn expect_int(&mut self, expected: &'static str) -> Result<i64, ParseError> {
        if self.check(TokenKind::Int) {
            Ok(self.advance_token().value)
        } else {
            Err(self.error_expected(expected))
        }
    }

    fn error_expected(&self, expected: &'static str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: Cow::Borrowed(expected),
            found: self.peek_kind(),
            span: self.current_span(),
        }
    }

    fn error_expected_kind(&self, kind: TokenKind) -> ParseError {
        ParseError::UnexpectedToken {
            expected: Cow::Borrowed(kind.describe()),
            found: self.peek_kind(),
            span: self.current_span(),
        }
    }

    fn error_message(&self, message: &'static str) -> ParseError {
        ParseError::Message {
            message: Cow::Borrowed(message),
            span: self.current_span(),
        }
    }
}

fn make_binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.merge(rhs.span);
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

fn compound_op(kind: TokenKind) -> Option<BinOp> {
    let op = match kind {
        TokenKind::PlusEq => BinOp::Add,
        TokenKind::MinusEq => BinOp::Sub,
        TokenKind::StarEq => BinOp::Mul,
        TokenKind::SlashEq => BinOp::Div,
        TokenKind::PercentEq => BinOp::Rem,
        _ => return None,
    };
    Some(op)
}
