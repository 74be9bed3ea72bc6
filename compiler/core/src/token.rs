//! Token data model for the Aurora surface language.

use std::fmt;

use crate::span::{Position, Span};

/// The closed set of token kinds the lexer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Ident,
    Int,
    True,
    False,

    KwLet,
    KwFn,
    KwIf,
    KwElse,
    KwWhile,
    KwReturn,
    KwDefer,
    KwBreak,
    KwContinue,
    KwI32,
    KwI64,
    KwBool,
    KwPtr,
    KwUnique,
    KwVoid,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Arrow,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    AmpAmp,
    PipePipe,

    Eq,
    EqEq,
    BangEq,
    Lt,
    Le,
    Gt,
    Ge,

    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
}

impl TokenKind {
    /// Human-readable rendering used in "expected ..." diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Eof => "end of input",
            TokenKind::Ident => "identifier",
            TokenKind::Int => "integer literal",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::KwLet => "'let'",
            TokenKind::KwFn => "'fn'",
            TokenKind::KwIf => "'if'",
            TokenKind::KwElse => "'else'",
            TokenKind::KwWhile => "'while'",
            TokenKind::KwReturn => "'return'",
            TokenKind::KwDefer => "'defer'",
            TokenKind::KwBreak => "'break'",
            TokenKind::KwContinue => "'continue'",
            TokenKind::KwI32 => "'i32'",
            TokenKind::KwI64 => "'i64'",
            TokenKind::KwBool => "'bool'",
            TokenKind::KwPtr => "'ptr'",
            TokenKind::KwUnique => "'unique'",
            TokenKind::KwVoid => "'void'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::Arrow => "'->'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Bang => "'!'",
            TokenKind::AmpAmp => "'&&'",
            TokenKind::PipePipe => "'||'",
            TokenKind::Eq => "'='",
            TokenKind::EqEq => "'=='",
            TokenKind::BangEq => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::Le => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::Ge => "'>='",
            TokenKind::PlusEq => "'+='",
            TokenKind::MinusEq => "'-='",
            TokenKind::StarEq => "'*='",
            TokenKind::SlashEq => "'/='",
            TokenKind::PercentEq => "'%='",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A single lexed token. `lexeme` is populated for identifiers, `value` for
/// integer literals; both are empty/zero otherwise. Positions are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub value: i64,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize) -> Self {
        Self {
            kind,
            lexeme: String::new(),
            value: 0,
            line,
            column,
        }
    }

    pub fn ident(lexeme: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind: TokenKind::Ident,
            lexeme: lexeme.into(),
            value: 0,
            line,
            column,
        }
    }

    pub fn int(value: i64, line: usize, column: usize) -> Self {
        Self {
            kind: TokenKind::Int,
            lexeme: String::new(),
            value,
            line,
            column,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    pub fn span(&self) -> Span {
        Span::point(self.line, self.column)
    }
}
