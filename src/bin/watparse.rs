//! Parse a WAT file and dump the result.
//!
//! ```text
//! watparse [--tokens] [--at OFFSET] [--max-depth N] FILE
//! ```
//!
//! Prints the syntax tree as JSON by default. Diagnostics go to stderr. Exits
//! with 1 when the source had errors and 2 when it could not be parsed at all.

use serde::Serialize;
use std::env;
use std::fs;
use std::process;
use watparse::syntax::{NodeKind, Root};
use watparse::wat::{Lexer, Span};
use watparse::{ParseError, Parser};

const USAGE: &str = "usage: watparse [--tokens] [--at OFFSET] [--max-depth N] FILE";

#[derive(Default)]
struct Options {
    path: Option<String>,
    tokens: bool,
    at: Option<usize>,
    max_depth: Option<usize>,
}

#[derive(Serialize)]
struct Report<'a> {
    root: Option<&'a Root>,
    errors: &'a [ParseError],
}

#[derive(Serialize)]
struct NodeReport {
    kind: NodeKind,
    span: Span,
    text: String,
}

fn parse_args() -> Result<Options, String> {
    let mut options = Options::default();
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--tokens" => options.tokens = true,
            "--at" => {
                let value = args.next().ok_or("--at needs an offset")?;
                options.at = Some(value.parse().map_err(|_| format!("invalid offset: {}", value))?);
            }
            "--max-depth" => {
                let value = args.next().ok_or("--max-depth needs a number")?;
                options.max_depth = Some(value.parse().map_err(|_| format!("invalid depth: {}", value))?);
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            _ if arg.starts_with("--") => return Err(format!("unknown option: {}", arg)),
            _ if options.path.is_some() => return Err(format!("unexpected argument: {}", arg)),
            _ => options.path = Some(arg),
        }
    }

    if options.path.is_none() {
        return Err(USAGE.to_string());
    }
    Ok(options)
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    }
}

/// Print the token stream, one token per line. Returns whether any token
/// failed to lex.
fn dump_tokens(path: &str, source: &str) -> bool {
    let mut failed = false;
    for result in Lexer::new(source).with_comments() {
        match result {
            Ok(token) => println!("{}\t{}", token.span, token.text(source)),
            Err(e) => {
                eprintln!("{}:{}", path, e);
                failed = true;
            }
        }
    }
    failed
}

fn main() {
    let options = match parse_args() {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", message);
            process::exit(2);
        }
    };
    let path = options.path.unwrap_or_default();

    let source = match fs::read_to_string(&path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{}: {}", path, e);
            process::exit(2);
        }
    };

    if options.tokens {
        let failed = dump_tokens(&path, &source);
        process::exit(if failed { 1 } else { 0 });
    }

    let mut parser = Parser::new();
    if let Some(depth) = options.max_depth {
        parser = parser.max_depth(depth);
    }
    let parse = match parser.parse(&source) {
        Ok(parse) => parse,
        Err(e) => {
            eprintln!("{}:{}", path, e);
            process::exit(2);
        }
    };

    for error in &parse.errors {
        eprintln!("{}:{}", path, error);
    }

    match options.at {
        Some(offset) => {
            let node = parse.root.as_ref().and_then(|root| root.node_at(offset));
            match node {
                Some(node) => {
                    let span = node.span();
                    print_json(&NodeReport {
                        kind: node.kind(),
                        span,
                        text: source[span.start..span.end].to_string(),
                    });
                }
                None => println!("null"),
            }
        }
        None => print_json(&Report {
            root: parse.root.as_ref(),
            errors: &parse.errors,
        }),
    }

    if !parse.errors.is_empty() {
        process::exit(1);
    }
}
