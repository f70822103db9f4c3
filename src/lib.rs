//! A syntactic front end for the WebAssembly Text Format.
//!
//! watparse turns WAT source into a concrete syntax tree that keeps every
//! optional field and the source span of every node. It does no validation:
//! names are not resolved, types are not checked, and `end $label` is not
//! matched against its block.
//!
//! # Modules
//!
//! - [`wat`] -- Lexer, S-expression reader, and grammar.
//! - [`syntax`] -- The tree: modules, fields, types, instructions, and
//!   span-based lookup.
//!
//! # Example
//!
//! Parse a module and find the node under a byte offset:
//!
//! ```
//! use watparse::syntax::NodeKind;
//!
//! let source = r#"
//!     (module
//!         (func $add (export "add") (param i32 i32) (result i32)
//!             local.get 0
//!             local.get 1
//!             i32.add))
//! "#;
//! let parse = watparse::parse(source).unwrap();
//! assert!(parse.errors.is_empty());
//!
//! let root = parse.root.unwrap();
//! let offset = source.find("i32.add").unwrap();
//! assert_eq!(root.node_at(offset).unwrap().kind(), NodeKind::PlainInstr);
//! ```
//!
//! # Errors
//!
//! Parsing recovers from malformed fields and folded instructions, so one
//! call reports every problem it can find. Only nesting past
//! [`wat::DEFAULT_MAX_DEPTH`] (or the configured limit) aborts the parse.

pub mod syntax;
pub mod wat;

pub use wat::{parse, ErrorKind, FatalError, Parse, ParseError, Parser};
