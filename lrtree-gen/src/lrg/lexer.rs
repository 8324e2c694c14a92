//! Tokenizer for `.lrg` grammar files.
//!
//! The lexer is built on the [`logos`] crate. Whitespace and `//` comments are
//! skipped; string literals are unescaped and regex delimiters are stripped
//! before tokens reach the [`parser`](super::parser).

use anyhow::{Result, bail};
use logos::Logos;
use smartstring::alias::String;
use std::fmt;
use std::ops::Range;

/// Tokens of the grammar text format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// A directive name without its `%` (e.g. `start`).
    Directive(String),
    /// A rule, token or field name.
    Ident(String),
    Int(i32),
    /// An unescaped string literal.
    Str(String),
    /// Regex source between the slashes.
    Regex(String),
    Arrow,
    Pipe,
    Semi,
    Colon,
    Comma,
    LParen,
    RParen,
    Star,
    Plus,
    Question,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Directive(name) => write!(f, "%{name}"),
            Token::Ident(name) => f.write_str(name),
            Token::Int(n) => write!(f, "{n}"),
            Token::Str(text) => write!(f, "{:?}", text.as_str()),
            Token::Regex(pattern) => write!(f, "/{pattern}/"),
            Token::Arrow => f.write_str("->"),
            Token::Pipe => f.write_str("|"),
            Token::Semi => f.write_str(";"),
            Token::Colon => f.write_str(":"),
            Token::Comma => f.write_str(","),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Star => f.write_str("*"),
            Token::Plus => f.write_str("+"),
            Token::Question => f.write_str("?"),
        }
    }
}

/// Raw tokens recognized by the `logos`-based lexer.
#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
enum LogosToken {
    #[regex(r"%[a-z_]+")]
    Directive,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[regex(r"-?[0-9]+")]
    Int,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    Str,

    #[regex(r"/([^/\\\n]|\\.)+/")]
    Regex,

    #[token("->")]
    Arrow,
    #[token("|")]
    Pipe,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("?")]
    Question,
}

/// Splits `input` into tokens with their byte ranges.
///
/// # Parameters
/// - `input`: Grammar source text.
///
/// # Returns
/// The tokens in order, or an error naming the line and column of the first
/// unrecognized character.
pub fn tokenize(input: &str) -> Result<Vec<(Token, Range<usize>)>> {
    let mut lexer = LogosToken::lexer(input);
    let mut out = Vec::new();
    while let Some(kind) = lexer.next() {
        let slice = lexer.slice();
        let span = lexer.span();
        let token = match kind {
            Ok(LogosToken::Directive) => Token::Directive(slice[1..].into()),
            Ok(LogosToken::Ident) => Token::Ident(slice.into()),
            Ok(LogosToken::Int) => match slice.parse() {
                Ok(n) => Token::Int(n),
                Err(_) => {
                    let (line, column) = line_col(input, span.start);
                    bail!("{line}:{column}: integer {slice} out of range");
                }
            },
            Ok(LogosToken::Str) => Token::Str(unescape(&slice[1..slice.len() - 1])),
            Ok(LogosToken::Regex) => Token::Regex(slice[1..slice.len() - 1].replace("\\/", "/").into()),
            Ok(LogosToken::Arrow) => Token::Arrow,
            Ok(LogosToken::Pipe) => Token::Pipe,
            Ok(LogosToken::Semi) => Token::Semi,
            Ok(LogosToken::Colon) => Token::Colon,
            Ok(LogosToken::Comma) => Token::Comma,
            Ok(LogosToken::LParen) => Token::LParen,
            Ok(LogosToken::RParen) => Token::RParen,
            Ok(LogosToken::Star) => Token::Star,
            Ok(LogosToken::Plus) => Token::Plus,
            Ok(LogosToken::Question) => Token::Question,
            Err(()) => {
                let (line, column) = line_col(input, span.start);
                bail!("{line}:{column}: unexpected character {slice:?}");
            }
        };
        log::trace!("lrg token {token} at {span:?}");
        out.push((token, span));
    }
    Ok(out)
}

/// 1-based line and column of a byte offset.
pub fn line_col(input: &str, offset: usize) -> (usize, usize) {
    let before = &input[..offset.min(input.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.len() - before.rfind('\n').map_or(0, |i| i + 1) + 1;
    (line, column)
}

fn unescape(text: &str) -> String {
    let mut out = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_tokens() {
        let input = "%start program;\n// a comment\nsum -> left:expr \"+\\\"\" /[0-9]+\\/x/ | prec_left(-2, x)* ;";
        let tokens: Vec<Token> = tokenize(input).unwrap().into_iter().map(|(t, _)| t).collect();
        assert_eq!(tokens.len(), 19);
        assert_eq!(tokens[0], Token::Directive("start".into()));
        assert_eq!(tokens[8], Token::Str("+\"".into()));
        assert_eq!(tokens[9], Token::Regex("[0-9]+/x".into()));
        assert_eq!(tokens[13], Token::Int(-2));
    }

    #[test]
    fn unknown_character_is_located() {
        let err = tokenize("a -> b;\n  @").unwrap_err();
        assert_eq!(err.to_string(), "2:3: unexpected character \"@\"");
    }
}
