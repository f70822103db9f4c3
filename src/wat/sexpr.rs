//! S-expression reader for WAT.
//!
//! WAT is an S-expression language, so parsing happens in two phases:
//!
//! 1. **Tokens -> S-expression tree**: parentheses are matched and tokens are
//!    grouped into lists. Lexical errors and unbalanced parentheses are
//!    recorded here and the tree is patched so the second phase always sees
//!    balanced lists.
//!
//! 2. **S-expression tree -> syntax tree**: the grammar in
//!    [`parser`](super::parser) walks the lists. Because every list already
//!    knows where it ends, abandoning a production after an error means
//!    skipping exactly that list.
//!
//! The reader is iterative, so hostile nesting cannot exhaust the stack; it
//! stops with [`FatalError::NestingTooDeep`] past the configured depth.
//!
//! # Example
//!
//! ```
//! use watparse::wat::sexpr::read;
//!
//! let read = read("(module (func $add (param i32 i32) (result i32)))", 64).unwrap();
//! let list = read.forms[0].as_list().unwrap();
//! assert_eq!(list.head_keyword(), Some("module"));
//! assert_eq!(list.len(), 2); // "module" and "(func ...)"
//! assert!(read.errors.is_empty());
//! ```

use super::error::{ErrorKind, FatalError, LexError, ParseError};
use super::lexer::Lexer;
use super::token::{Span, Token, TokenKind};
use std::fmt;

// ============================================================================
// S-Expression Types
// ============================================================================

/// An S-expression: an atom, a parenthesised list, or a token that failed to
/// lex.
#[derive(Debug, Clone)]
pub enum SExpr {
    /// A single token: keyword, number, string, or identifier.
    Atom(Token),

    /// A parenthesised list of S-expressions.
    ///
    /// The span covers the list including its parentheses. A list that was
    /// still open at end of input has `close: None` and a span ending at its
    /// last item. `end` is the zero-length point just before the `)`, or the
    /// end of input for an unclosed list.
    List {
        span: Span,
        items: Vec<SExpr>,
        close: Option<Span>,
        end: Span,
    },

    /// A malformed token. The error has already been recorded.
    Invalid(LexError),
}

impl SExpr {
    pub fn span(&self) -> Span {
        match self {
            SExpr::Atom(token) => token.span,
            SExpr::List { span, .. } => *span,
            SExpr::Invalid(e) => e.span,
        }
    }

    pub fn as_atom(&self) -> Option<&Token> {
        match self {
            SExpr::Atom(token) => Some(token),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<SExprList<'_>> {
        match self {
            SExpr::List { span, items, close, end } => Some(SExprList {
                span: *span,
                items,
                close: *close,
                end: *end,
            }),
            _ => None,
        }
    }

    /// Returns the keyword string if this is an atom containing a keyword.
    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            SExpr::Atom(Token {
                kind: TokenKind::Keyword(kw),
                ..
            }) => Some(kw),
            _ => None,
        }
    }

    /// Returns the identifier string if this is an atom containing an id.
    pub fn as_id(&self) -> Option<&str> {
        match self {
            SExpr::Atom(Token {
                kind: TokenKind::Id(id),
                ..
            }) => Some(id),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, SExpr::Invalid(_))
    }

    /// Returns true if this is a list starting with the given keyword.
    pub fn is_list_headed_by(&self, keyword: &str) -> bool {
        self.as_list()
            .map(|list| list.head_keyword() == Some(keyword))
            .unwrap_or(false)
    }

    /// A short rendering for "found ..." in error messages.
    pub fn describe(&self) -> String {
        match self {
            SExpr::Atom(token) => format!("'{}'", token.kind),
            SExpr::List { .. } => self.as_list().map(|l| l.describe()).unwrap_or_default(),
            SExpr::Invalid(_) => "invalid token".to_string(),
        }
    }
}

// ============================================================================
// List View
// ============================================================================

/// A borrowed view of an S-expression list.
#[derive(Debug, Clone, Copy)]
pub struct SExprList<'a> {
    pub span: Span,
    pub items: &'a [SExpr],
    /// Span of the closing `)`, absent when the list was never closed.
    pub close: Option<Span>,
    pub end: Span,
}

impl<'a> SExprList<'a> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the first item (the "head") of this list.
    pub fn head(&self) -> Option<&'a SExpr> {
        self.items.first()
    }

    /// Returns all items after the head.
    pub fn tail(&self) -> &'a [SExpr] {
        self.items.get(1..).unwrap_or(&[])
    }

    pub fn get(&self, index: usize) -> Option<&'a SExpr> {
        self.items.get(index)
    }

    /// Returns the keyword if the head is a keyword atom.
    ///
    /// This is the most common pattern in WAT: `(keyword ...)`.
    pub fn head_keyword(&self) -> Option<&'a str> {
        self.head().and_then(|s| s.as_keyword())
    }

    pub fn describe(&self) -> String {
        match self.items.first() {
            Some(SExpr::Atom(token)) => format!("'({} ...)'", token.kind),
            Some(_) => "'(...)'".to_string(),
            None => "'()'".to_string(),
        }
    }

    /// A zero-length span where a missing item would go: just before the
    /// closing paren, or at the end of an unclosed list.
    pub fn end_point(&self) -> Span {
        self.end
    }
}

// ============================================================================
// Reader
// ============================================================================

/// The result of reading a source file into S-expressions.
#[derive(Debug, Clone)]
pub struct Read {
    /// Top-level forms in source order.
    pub forms: Vec<SExpr>,
    /// Lexical and paren-balance errors, in the order they were found.
    pub errors: Vec<ParseError>,
    /// Comment tokens in source order.
    pub comments: Vec<Token>,
}

struct OpenList {
    open: Span,
    items: Vec<SExpr>,
}

impl OpenList {
    fn close(self, close: Span) -> SExpr {
        SExpr::List {
            span: self.open.to(close),
            items: self.items,
            close: Some(close),
            end: close.at_start(),
        }
    }

    fn unclosed(self, eof: Span) -> SExpr {
        let last = self.items.last().map(SExpr::span).unwrap_or(self.open);
        SExpr::List {
            span: self.open.to(last),
            items: self.items,
            close: None,
            end: eof,
        }
    }
}

/// Read every top-level S-expression in `source`.
///
/// Lists may nest at most `max_depth` deep.
///
/// # Errors
///
/// Returns [`FatalError::NestingTooDeep`] if a `(` would open a list deeper
/// than `max_depth`. Every other problem is recorded in [`Read::errors`].
pub fn read(source: &str, max_depth: usize) -> Result<Read, FatalError> {
    let mut forms = Vec::new();
    let mut errors = Vec::new();
    let mut comments = Vec::new();
    let mut open: Vec<OpenList> = Vec::new();

    for result in Lexer::new(source).with_comments() {
        let item = match result {
            Ok(token) => match token.kind {
                TokenKind::Comment(_) => {
                    comments.push(token);
                    continue;
                }
                TokenKind::LeftParen => {
                    if open.len() >= max_depth {
                        return Err(FatalError::NestingTooDeep {
                            limit: max_depth,
                            span: token.span,
                        });
                    }
                    open.push(OpenList {
                        open: token.span,
                        items: Vec::new(),
                    });
                    continue;
                }
                TokenKind::RightParen => match open.pop() {
                    Some(list) => list.close(token.span),
                    None => {
                        errors.push(ParseError::new(ErrorKind::Unbalanced, "unexpected ')'", token.span));
                        continue;
                    }
                },
                _ => SExpr::Atom(token),
            },
            Err(e) => {
                errors.push(ParseError::from(e.clone()));
                SExpr::Invalid(e)
            }
        };

        match open.last_mut() {
            Some(parent) => parent.items.push(item),
            None => forms.push(item),
        }
    }

    let eof = Span::end_of(source);
    while let Some(list) = open.pop() {
        errors.push(ParseError::new(ErrorKind::Unbalanced, "unclosed '('", list.open));
        let item = list.unclosed(eof);
        match open.last_mut() {
            Some(parent) => parent.items.push(item),
            None => forms.push(item),
        }
    }

    Ok(Read {
        forms,
        errors,
        comments,
    })
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExpr::Atom(token) => write!(f, "{}", token.kind),
            SExpr::List { items, .. } => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            SExpr::Invalid(_) => write!(f, "<invalid>"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn read_ok(source: &str) -> Vec<SExpr> {
        let read = read(source, 64).unwrap();
        assert!(read.errors.is_empty(), "unexpected errors: {:?}", read.errors);
        read.forms
    }

    // ------------------------------------------------------------------------
    // Basic Structure
    // ------------------------------------------------------------------------

    #[test]
    fn read_atoms() {
        let forms = read_ok("module $main 42");
        assert_eq!(forms[0].as_keyword(), Some("module"));
        assert_eq!(forms[1].as_id(), Some("main"));
        assert!(matches!(forms[2].as_atom().unwrap().kind, TokenKind::Num(_)));
    }

    #[test]
    fn read_empty_list() {
        let forms = read_ok("()");
        let list = forms[0].as_list().unwrap();
        assert!(list.is_empty());
        assert_eq!(list.close, Some(Span::new(1, 2, 1, 2)));
    }

    #[test]
    fn read_nested_list() {
        let forms = read_ok("(module (func) (memory 1))");
        let list = forms[0].as_list().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.head_keyword(), Some("module"));
        assert!(list.get(1).unwrap().is_list_headed_by("func"));
        assert!(list.get(2).unwrap().is_list_headed_by("memory"));
        assert_eq!(list.tail().len(), 2);
    }

    #[test]
    fn read_multiple_forms() {
        let forms = read_ok("(a) (b) (c)");
        assert_eq!(forms.len(), 3);
        assert!(forms[2].is_list_headed_by("c"));
    }

    #[test]
    fn comments_are_collected() {
        let read = read("(module ;; line\n (; block ;) )", 64).unwrap();
        assert_eq!(read.forms.len(), 1);
        assert_eq!(read.comments.len(), 2);
        assert_eq!(read.forms[0].as_list().unwrap().len(), 1);
    }

    // ------------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------------

    #[test]
    fn stray_close_paren_is_skipped() {
        let read = read("(module)) (func)", 64).unwrap();
        assert_eq!(read.forms.len(), 2);
        assert_eq!(read.errors.len(), 1);
        assert_eq!(read.errors[0].kind, ErrorKind::Unbalanced);
        assert_eq!(read.errors[0].span.start, 8);
    }

    #[test]
    fn unclosed_lists_are_closed_at_eof() {
        let read = read("(module (func", 64).unwrap();
        assert_eq!(read.errors.len(), 2);
        assert!(read.errors.iter().all(|e| e.kind == ErrorKind::Unbalanced));

        let module = read.forms[0].as_list().unwrap();
        assert_eq!(module.close, None);
        assert_eq!(module.span, Span::new(0, 13, 1, 1));
        let func = module.get(1).unwrap().as_list().unwrap();
        assert_eq!(func.close, None);
        assert_eq!(func.span, Span::new(8, 13, 1, 9));
    }

    #[test]
    fn lex_errors_become_invalid_atoms() {
        let read = read(r#"(data "\q" "ok")"#, 64).unwrap();
        assert_eq!(read.errors.len(), 1);
        assert_eq!(read.errors[0].kind, ErrorKind::Lex);

        let list = read.forms[0].as_list().unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.get(1).unwrap().is_invalid());
        assert!(list.get(2).unwrap().as_atom().is_some());
    }

    #[test]
    fn nesting_limit() {
        assert!(read("((()))", 3).is_ok());
        let err = read("(((())))", 3).unwrap_err();
        assert_eq!(
            err,
            FatalError::NestingTooDeep {
                limit: 3,
                span: Span::new(3, 4, 1, 4)
            }
        );
    }

    #[test]
    fn very_deep_nesting_is_fatal_not_a_crash() {
        let source = "(".repeat(100_000);
        assert!(matches!(read(&source, 256), Err(FatalError::NestingTooDeep { .. })));
    }

    // ------------------------------------------------------------------------
    // Spans and rendering
    // ------------------------------------------------------------------------

    #[test]
    fn nested_spans() {
        let forms = read_ok("(a (b c))");
        let outer = forms[0].as_list().unwrap();
        assert_eq!((outer.span.start, outer.span.end), (0, 9));

        let inner = outer.get(1).unwrap().as_list().unwrap();
        assert_eq!((inner.span.start, inner.span.end), (3, 8));
        assert_eq!(inner.end_point(), Span::new(7, 7, 1, 8));
    }

    #[test]
    fn unclosed_list_ends_at_end_of_input() {
        let forms = read("(a\n  (b c", 64).unwrap().forms;
        let outer = forms[0].as_list().unwrap();
        let inner = outer.get(1).unwrap().as_list().unwrap();
        assert_eq!(inner.close, None);
        assert_eq!(inner.end_point(), Span::new(9, 9, 2, 7));
        assert_eq!(outer.end_point(), Span::new(9, 9, 2, 7));

        let forms = read("(\u{e9}", 64).unwrap().forms;
        assert_eq!(forms[0].as_list().unwrap().end_point(), Span::new(3, 3, 1, 3));
    }

    #[test]
    fn describe_and_display() {
        let forms = read_ok("(garbage 1) foo ()");
        assert_eq!(forms[0].describe(), "'(garbage ...)'");
        assert_eq!(forms[1].describe(), "'foo'");
        assert_eq!(forms[2].describe(), "'()'");
        assert_eq!(forms[0].to_string(), "(garbage 1)");
    }
}
