//! Lexer for the source language
//!
//! Every token records the byte span it was lexed from, so later stages can
//! report positions in the source text.

use std::num::ParseIntError;
use std::ops::Range;
use thiserror::Error;
use winnow::ascii::{digit1, multispace1, till_line_ending};
use winnow::combinator::{alt, not, repeat, terminated};
use winnow::error::{ContextError, ErrMode, FromExternalError, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::stream::{LocatingSlice, Stream};
use winnow::token::{any, one_of, take_while};
use winnow::ModalResult;

pub type Identifier = String;

#[derive(Debug, PartialEq, Error)]
#[error("{message}")]
pub struct LexerError {
    pub message: String,
    pub offset: usize,
}

#[derive(Debug, PartialEq, Clone)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Range<usize>,
}

#[derive(Debug, PartialEq, Clone)]
pub(crate) enum TokenKind {
    Keyword(Keyword),
    Identifier(Identifier),
    IntConstant(u64),
    FloatConstant(f64),
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    Semicolon,
    Comma,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub(crate) enum Keyword {
    Int,
    Float,
    Void,
    Return,
}

type Input<'i> = LocatingSlice<&'i str>;

pub(crate) fn lex(input: &str) -> Result<Vec<Token>, LexerError> {
    tokens.parse(LocatingSlice::new(input)).map_err(|e| {
        let offset = e.offset();
        let rest = input.get(offset..).unwrap_or_default();

        if e.inner()
            .cause()
            .is_some_and(|cause| cause.is::<ParseIntError>())
        {
            let digits = rest
                .split(|c: char| !c.is_ascii_digit())
                .next()
                .unwrap_or_default();
            return LexerError {
                message: format!(
                    "Lexer error: integer constant {digits} out of range at offset {offset}"
                ),
                offset,
            };
        }

        let found = rest
            .chars()
            .next()
            .map(|c| format!("{c:?}"))
            .unwrap_or("EOF".into());
        LexerError {
            message: format!("Lexer error: unexpected {found} at offset {offset}"),
            offset,
        }
    })
}

fn tokens(input: &mut Input<'_>) -> ModalResult<Vec<Token>> {
    trivia.parse_next(input)?;
    repeat(0.., terminated(token, trivia)).parse_next(input)
}

// Whitespace and line comments between tokens
fn trivia(input: &mut Input<'_>) -> ModalResult<()> {
    repeat(0.., alt((multispace1.void(), comment))).parse_next(input)
}

fn comment(input: &mut Input<'_>) -> ModalResult<()> {
    ("//", till_line_ending).void().parse_next(input)
}

fn token(input: &mut Input<'_>) -> ModalResult<Token> {
    alt((constant, word, punctuation))
        .with_span()
        .map(|(kind, span)| Token { kind, span })
        .parse_next(input)
}

// A numeric constant must end on a word boundary: `123;` is fine, `123abc` is not.
fn constant(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    terminated(
        alt((
            (digit1, '.', digit1)
                .take()
                .parse_to::<f64>()
                .map(TokenKind::FloatConstant),
            integer,
        )),
        not(one_of(|c: char| c.is_alphanumeric() || c == '_')),
    )
    .context(StrContext::Label("constant"))
    .parse_next(input)
}

// Digits that don't fit a u64 stop lexing outright rather than backtracking
// into the other token kinds.
fn integer(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    let start = input.checkpoint();
    let digits = digit1.parse_next(input)?;
    digits.parse::<u64>().map(TokenKind::IntConstant).map_err(|e| {
        input.reset(&start);
        ErrMode::Cut(ContextError::from_external_error(input, e))
    })
}

fn word(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .map(|word: &str| match word {
            "int" => TokenKind::Keyword(Keyword::Int),
            "float" => TokenKind::Keyword(Keyword::Float),
            "void" => TokenKind::Keyword(Keyword::Void),
            "return" => TokenKind::Keyword(Keyword::Return),
            _ => TokenKind::Identifier(word.to_string()),
        })
        .context(StrContext::Label("word"))
        .parse_next(input)
}

fn punctuation(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    any.verify_map(|c: char| match c {
        '(' => Some(TokenKind::OpenParen),
        ')' => Some(TokenKind::CloseParen),
        '{' => Some(TokenKind::OpenBrace),
        '}' => Some(TokenKind::CloseBrace),
        ';' => Some(TokenKind::Semicolon),
        ',' => Some(TokenKind::Comma),
        '=' => Some(TokenKind::Assign),
        '+' => Some(TokenKind::Plus),
        '-' => Some(TokenKind::Minus),
        '*' => Some(TokenKind::Star),
        '/' => Some(TokenKind::Slash),
        _ => None,
    })
    .context(StrContext::Label("punctuation"))
    .context(StrContext::Expected(StrContextValue::Description("token")))
    .parse_next(input)
}
