//! Lexer for nginx configuration text
//!
//! Tokenizes nginx's directive syntax.
//!
//! Key features:
//! - Whitespace (newlines included) only separates words
//! - `;` ends a directive, `{ }` delimit blocks
//! - `"..."` and `'...'` are single words, quotes stripped, no escapes
//! - `${var}` stays inside its word
//! - `#` comments run to end of line
//!
//! The lexer never fails: anything it cannot classify becomes word text.

use logos::{Logos, Span};
use std::fmt;

/// Source location for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub start: usize,
    pub end: usize,
}

impl From<Span> for Location {
    fn from(span: Span) -> Self {
        Self {
            start: span.start,
            end: span.end,
        }
    }
}

/// A token with its location in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Location,
    /// 1-based line of `span.start`
    pub line: usize,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: impl Into<Location>, line: usize) -> Self {
        Self {
            value,
            span: span.into(),
            line,
        }
    }
}

/// Token types for nginx configuration text
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A bare or quoted word; `quote` remembers the quote character
    Word { value: String, quote: Option<char> },
    Semicolon,
    BlockStart,
    BlockEnd,
    /// Comment text after `#`
    Comment(String),
}

impl Token {
    pub fn word(value: impl Into<String>) -> Self {
        Token::Word {
            value: value.into(),
            quote: None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word { value, quote: Some(q) } => write!(f, "{q}{value}{q}"),
            Token::Word { value, quote: None } => write!(f, "{}", value),
            Token::Semicolon => write!(f, ";"),
            Token::BlockStart => write!(f, "{{"),
            Token::BlockEnd => write!(f, "}}"),
            Token::Comment(text) => write!(f, "#{}", text),
        }
    }
}

/// Raw token classes recognised by logos
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum RawToken {
    #[token(";")]
    Semicolon,

    #[token("{")]
    BlockStart,

    #[token("}")]
    BlockEnd,

    #[regex(r"#[^\n]*")]
    Comment,

    #[regex(r#""[^"]*""#)]
    DoubleQuoted,

    #[regex(r"'[^']*'")]
    SingleQuoted,

    /// Anything up to whitespace, `;`, or a brace that is not part of `${name}`
    #[regex(r#"(?:[^ \t\r\n\f;{}#"'$]|\$\{[A-Za-z0-9_]+\}|\$)(?:[^ \t\r\n\f;{}$]|\$\{[A-Za-z0-9_]+\}|\$)*"#)]
    Bare,
}

/// Byte offsets of line starts, for offset to line lookups
struct LineStarts(Vec<usize>);

impl LineStarts {
    fn new(text: &str) -> Self {
        let mut starts = vec![0usize];
        starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self(starts)
    }

    /// 1-based line containing `offset`
    fn line_of(&self, offset: usize) -> usize {
        match self.0.binary_search(&offset) {
            Ok(exact) => exact + 1,
            Err(next) => next,
        }
    }
}

/// Tokenize nginx configuration text
pub fn tokenize(source: &str) -> Vec<Spanned<Token>> {
    let lines = LineStarts::new(source);
    let mut tokens = Vec::new();

    for (result, span) in RawToken::lexer(source).spanned() {
        let slice = &source[span.clone()];
        let token = match result {
            Ok(RawToken::Semicolon) => Token::Semicolon,
            Ok(RawToken::BlockStart) => Token::BlockStart,
            Ok(RawToken::BlockEnd) => Token::BlockEnd,
            Ok(RawToken::Comment) => Token::Comment(slice[1..].to_string()),
            Ok(RawToken::DoubleQuoted) => Token::Word {
                value: slice[1..slice.len() - 1].to_string(),
                quote: Some('"'),
            },
            Ok(RawToken::SingleQuoted) => Token::Word {
                value: slice[1..slice.len() - 1].to_string(),
                quote: Some('\''),
            },
            Ok(RawToken::Bare) => Token::word(slice),
            // Unterminated quotes and stray `$`/`{` pieces end up here
            Err(()) => {
                let text = slice.trim();
                if text.is_empty() {
                    continue;
                }
                Token::word(text)
            }
        };
        tokens.push(Spanned::new(token, span.clone(), lines.line_of(span.start)));
    }

    tokens
}
