//! WebAssembly Text Format (WAT) front end.
//!
//! Source text goes through three stages:
//!
//! 1. [`Lexer`] turns text into tokens.
//! 2. [`sexpr::read`] groups tokens into balanced S-expression lists.
//! 3. The grammar turns those lists into a [`crate::syntax`] tree.
//!
//! # Example
//!
//! ```
//! use watparse::wat::{Lexer, TokenKind};
//!
//! let source = "(module (func $main (result i32) (i32.const 42)))";
//! let tokens: Vec<_> = Lexer::new(source).collect::<Result<_, _>>().unwrap();
//!
//! assert!(matches!(tokens[0].kind, TokenKind::LeftParen));
//! assert!(matches!(tokens[1].kind, TokenKind::Keyword(ref k) if k == "module"));
//! ```
//!
//! # Error Handling
//!
//! The lexer yields `Result<Token, LexError>` for each token and keeps going
//! after a bad one. The parser collects every recoverable error on the
//! [`Parse`] result and only fails outright when nesting is too deep:
//!
//! ```
//! use watparse::wat::parse;
//!
//! let parse = parse("(module (func \"unterminated))").unwrap();
//! assert!(!parse.errors.is_empty());
//! assert!(parse.root.is_some());
//! ```

mod cursor;
mod error;
mod instr;
mod keywords;
mod lexer;
mod parser;
pub mod sexpr;
mod token;

pub use error::{ErrorKind, FatalError, LexError, ParseError};
pub use lexer::Lexer;
pub use parser::{parse, Parse, Parser, DEFAULT_MAX_DEPTH};
pub use token::{CommentKind, FloatLit, SignedValue, Span, Token, TokenKind};
