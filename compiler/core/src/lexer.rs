//! Streaming tokenizer for Aurora source text.
//!
//! The lexer walks the input once, tracking 1-based line/column positions,
//! skipping whitespace and `//` / `/* */` comments (block comments do not
//! nest), and emitting a terminating [`TokenKind::Eof`] token.

use std::str::Chars;

use crate::diagnostics::Diagnostic;
use crate::span::Span;
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("unrecognized character {ch:?} at {line}:{column}")]
    UnrecognizedCharacter { ch: char, line: usize, column: usize },
    #[error("integer literal '{literal}' does not fit in 64 bits at {line}:{column}")]
    IntegerOverflow {
        literal: String,
        line: usize,
        column: usize,
    },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnrecognizedCharacter { line, column, .. }
            | LexError::IntegerOverflow { line, column, .. } => Span::point(*line, *column),
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        let span = self.span();
        Diagnostic::error(self.to_string()).with_label(span, "lexed here")
    }
}

pub struct Lexer<'a> {
    iter: Chars<'a>,
    current: Option<char>,
    peeked: Option<char>,
    line: usize,
    column: usize,
}

/// Lexes the entire input, producing a token sequence terminated by exactly
/// one EOF token.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let eof = token.is_eof();
        tokens.push(token);
        if eof {
            break;
        }
    }
    Ok(tokens)
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut iter = input.chars();
        let current = iter.next();
        let peeked = iter.clone().next();
        Lexer {
            iter,
            current,
            peeked,
            line: 1,
            column: 1,
        }
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.current = self.iter.next();
        self.peeked = self.iter.clone().next();
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments();
        let line = self.line;
        let column = self.column;

        let ch = match self.current {
            Some(ch) => ch,
            None => return Ok(Token::new(TokenKind::Eof, line, column)),
        };

        if ch.is_ascii_alphabetic() || ch == '_' {
            let ident = self.consume_identifier();
            return Ok(match keyword_kind(&ident) {
                Some(kind) => Token::new(kind, line, column),
                None => Token::ident(ident, line, column),
            });
        }

        if ch.is_ascii_digit() {
            let literal = self.consume_number();
            let value = literal
                .parse::<i64>()
                .map_err(|_| LexError::IntegerOverflow {
                    literal,
                    line,
                    column,
                })?;
            return Ok(Token::int(value, line, column));
        }

        let kind = self.consume_operator(ch, line, column)?;
        Ok(Token::new(kind, line, column))
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while matches!(self.current, Some(ch) if ch.is_whitespace()) {
                self.advance();
            }
            if self.current == Some('/') && self.peeked == Some('/') {
                while self.current.is_some() && self.current != Some('\n') {
                    self.advance();
                }
                continue;
            }
            if self.current == Some('/') && self.peeked == Some('*') {
                self.advance();
                self.advance();
                // Block comments do not nest.
                loop {
                    match (self.current, self.peeked) {
                        (Some('*'), Some('/')) => {
                            self.advance();
                            self.advance();
                            break;
                        }
                        (None, _) => break,
                        _ => self.advance(),
                    }
                }
                continue;
            }
            break;
        }
    }

    fn consume_identifier(&mut self) -> String {
        let mut ident = String::new();
        while matches!(self.current, Some(ch) if ch.is_ascii_alphanumeric() || ch == '_') {
            ident.push(self.current.unwrap());
            self.advance();
        }
        ident
    }

    fn consume_number(&mut self) -> String {
        let mut literal = String::new();
        while matches!(self.current, Some(ch) if ch.is_ascii_digit()) {
            literal.push(self.current.unwrap());
            self.advance();
        }
        literal
    }

    /// Longest-match operator and punctuation recognition: every two-character
    /// operator wins over its one-character prefix.
    fn consume_operator(
        &mut self,
        ch: char,
        line: usize,
        column: usize,
    ) -> Result<TokenKind, LexError> {
        let two = |lexer: &mut Self, kind: TokenKind| {
            lexer.advance();
            lexer.advance();
            kind
        };
        let one = |lexer: &mut Self, kind: TokenKind| {
            lexer.advance();
            kind
        };

        let kind = match (ch, self.peeked) {
            ('(', _) => one(self, TokenKind::LParen),
            (')', _) => one(self, TokenKind::RParen),
            ('{', _) => one(self, TokenKind::LBrace),
            ('}', _) => one(self, TokenKind::RBrace),
            ('[', _) => one(self, TokenKind::LBracket),
            (']', _) => one(self, TokenKind::RBracket),
            (',', _) => one(self, TokenKind::Comma),
            (':', _) => one(self, TokenKind::Colon),
            (';', _) => one(self, TokenKind::Semicolon),

            ('-', Some('>')) => two(self, TokenKind::Arrow),
            ('-', Some('=')) => two(self, TokenKind::MinusEq),
            ('-', _) => one(self, TokenKind::Minus),
            ('+', Some('=')) => two(self, TokenKind::PlusEq),
            ('+', _) => one(self, TokenKind::Plus),
            ('*', Some('=')) => two(self, TokenKind::StarEq),
            ('*', _) => one(self, TokenKind::Star),
            ('/', Some('=')) => two(self, TokenKind::SlashEq),
            ('/', _) => one(self, TokenKind::Slash),
            ('%', Some('=')) => two(self, TokenKind::PercentEq),
            ('%', _) => one(self, TokenKind::Percent),

            ('!', Some('=')) => two(self, TokenKind::BangEq),
            ('!', _) => one(self, TokenKind::Bang),
            ('&', Some('&')) => two(self, TokenKind::AmpAmp),
            ('|', Some('|')) => two(self, TokenKind::PipePipe),
            ('=', Some('=')) => two(self, TokenKind::EqEq),
            ('=', _) => one(self, TokenKind::Eq),
            ('<', Some('=')) => two(self, TokenKind::Le),
            ('<', _) => one(self, TokenKind::Lt),
            ('>', Some('=')) => two(self, TokenKind::Ge),
            ('>', _) => one(self, TokenKind::Gt),

            (other, _) => {
                return Err(LexError::UnrecognizedCharacter {
                    ch: other,
                    line,
                    column,
                })
            }
        };
        Ok(kind)
    }
}

fn keyword_kind(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "let" => TokenKind::KwLet,
        "fn" => TokenKind::KwFn,
        "if" => TokenKind::KwIf,
        "else" => TokenKind::KwElse,
        "while" => TokenKind::KwWhile,
        "return" => TokenKind::KwReturn,
        "defer" => TokenKind::KwDefer,
        "break" => TokenKind::KwBreak,
        "continue" => TokenKind::KwContinue,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "i32" => TokenKind::KwI32,
        "i64" => TokenKind::KwI64,
        "bool" => TokenKind::KwBool,
        "void" => TokenKind::KwVoid,
        "ptr" => TokenKind::KwPtr,
        "unique" => TokenKind::KwUnique,
        _ => return None,
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("lex")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lex_simple_function() {
        let kinds = kinds("fn main() -> i64 { return 0; }");
        assert_eq!(
            kinds,
            vec![
                TokenKind::KwFn,
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Arrow,
                TokenKind::KwI64,
                TokenKind::LBrace,
                TokenKind::KwReturn,
                TokenKind::Int,
                TokenKind::Semicolon,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn ends_with_exactly_one_eof() {
        for source in ["", "   ", "// only a comment\n", "let x = 1;"] {
            let tokens = tokenize(source).expect("lex");
            assert_eq!(
                tokens.iter().filter(|token| token.is_eof()).count(),
                1,
                "source {source:?}"
            );
            assert!(tokens.last().unwrap().is_eof());
        }
    }

    #[test]
    fn longest_match_operators() {
        assert_eq!(
            kinds("== = != ! <= < >= > -> - += +"),
            vec![
                TokenKind::EqEq,
                TokenKind::Eq,
                TokenKind::BangEq,
                TokenKind::Bang,
                TokenKind::Le,
                TokenKind::Lt,
                TokenKind::Ge,
                TokenKind::Gt,
                TokenKind::Arrow,
                TokenKind::Minus,
                TokenKind::PlusEq,
                TokenKind::Plus,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn compound_assignment_operators() {
        assert_eq!(
            kinds("+= -= *= /= %="),
            vec![
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::StarEq,
                TokenKind::SlashEq,
                TokenKind::PercentEq,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let source = "1 // trailing\n/* block\n comment */ 2";
        let tokens = tokenize(source).expect("lex");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].value, 1);
        assert_eq!(tokens[1].value, 2);
        // The block comment advanced the line counter.
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn tracks_line_and_column() {
        let tokens = tokenize("let x = 1;\n  x = 2;").expect("lex");
        let x2 = tokens
            .iter()
            .filter(|token| token.kind == TokenKind::Ident)
            .nth(1)
            .unwrap();
        assert_eq!((x2.line, x2.column), (2, 3));
    }

    #[test]
    fn keywords_versus_identifiers() {
        let tokens = tokenize("while whilex unique uniquely").expect("lex");
        assert_eq!(tokens[0].kind, TokenKind::KwWhile);
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[1].lexeme, "whilex");
        assert_eq!(tokens[2].kind, TokenKind::KwUnique);
        assert_eq!(tokens[3].kind, TokenKind::Ident);
    }

    #[test]
    fn unrecognized_character_is_an_error() {
        let err = tokenize("let $ = 1;").unwrap_err();
        assert_eq!(
            err,
            LexError::UnrecognizedCharacter {
                ch: '$',
                line: 1,
                column: 5
            }
        );
    }

    #[test]
    fn integer_overflow_is_an_error() {
        let err = tokenize("99999999999999999999").unwrap_err();
        assert!(matches!(err, LexError::IntegerOverflow { .. }));
    }
}
