//! Error types for WAT parsing.

use super::token::Span;
use serde::Serialize;
use thiserror::Error;

/// An error encountered during lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{span}: {message}")]
#[must_use]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

impl LexError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// The class of a recorded [`ParseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A malformed token (bad escape, unterminated string or comment).
    Lex,
    /// A stray `)` or an unclosed `(`.
    Unbalanced,
    /// A token or list where the grammar required something else.
    Syntax,
}

/// A recoverable error recorded while parsing.
///
/// Parsing continues after these; they are collected in source order on the
/// [`Parse`](crate::Parse) result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{span}: {message}")]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    /// What the grammar would have accepted at this point, if known.
    pub expected: Vec<String>,
    /// A short rendering of the offending token or list, if there was one.
    pub found: Option<String>,
    pub span: Span,
}

impl ParseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            expected: Vec::new(),
            found: None,
            span,
        }
    }

    /// A syntax error with a free-form message.
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Syntax, message, span)
    }

    /// An "expected X, found Y" syntax error.
    pub fn expected(expected: &[&str], found: impl Into<String>, span: Span) -> Self {
        let found = found.into();
        let message = match expected {
            [] => format!("unexpected {}", found),
            [one] => format!("expected {}, found {}", one, found),
            many => format!("expected one of {}, found {}", many.join(", "), found),
        };
        Self {
            kind: ErrorKind::Syntax,
            message,
            expected: expected.iter().map(|s| s.to_string()).collect(),
            found: Some(found),
            span,
        }
    }

    /// Byte offset of the error in the source.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.span.start
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError::new(ErrorKind::Lex, e.message, e.span)
    }
}

/// A failure that ends the parse call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    /// Parentheses or blocks nest deeper than the configured limit.
    #[error("{span}: nesting depth exceeds the limit of {limit}")]
    NestingTooDeep { limit: usize, span: Span },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_display() {
        let err = LexError::new("unexpected character", Span::new(10, 11, 3, 5));
        assert_eq!(format!("{}", err), "3:5: unexpected character");
    }

    #[test]
    fn expected_message_forms() {
        let span = Span::new(4, 9, 1, 5);
        assert_eq!(ParseError::expected(&[], "')'", span).message, "unexpected ')'");
        assert_eq!(
            ParseError::expected(&["index"], "\"x\"", span).message,
            "expected index, found \"x\""
        );
        let err = ParseError::expected(&["func", "table"], "'foo'", span);
        assert_eq!(err.message, "expected one of func, table, found 'foo'");
        assert_eq!(err.expected, vec!["func", "table"]);
        assert_eq!(err.found.as_deref(), Some("'foo'"));
        assert_eq!(err.offset(), 4);
    }

    #[test]
    fn lex_error_converts_to_lex_kind() {
        let err: ParseError = LexError::new("unterminated string literal", Span::ZERO).into();
        assert_eq!(err.kind, ErrorKind::Lex);
        assert!(err.expected.is_empty());
    }

    #[test]
    fn fatal_display() {
        let err = FatalError::NestingTooDeep {
            limit: 8,
            span: Span::new(0, 1, 2, 3),
        };
        assert_eq!(format!("{}", err), "2:3: nesting depth exceeds the limit of 8");
    }
}
