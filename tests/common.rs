//! Common test utilities shared between integration tests

#![allow(dead_code)]

use watparse::syntax::{Module, NodeRef, Root};
use watparse::wat::{Lexer, TokenKind};
use watparse::Parse;

/// Parse `source` and return its module, failing on any reported error.
pub fn clean_module(source: &str) -> Module {
    let parse = watparse::parse(source).expect("parse should not be fatal");
    assert!(parse.errors.is_empty(), "unexpected errors: {:#?}", parse.errors);
    match parse.root {
        Some(Root::Module(module)) => module,
        other => panic!("expected a module, got {:?}", other),
    }
}

/// `n` flat blocks nested inside one function.
pub fn nested_flat_blocks(n: usize) -> String {
    format!("(module (func {}{}))", "block ".repeat(n), "end ".repeat(n))
}

/// `n` folded blocks nested inside one function.
pub fn nested_folded_blocks(n: usize) -> String {
    format!("(module (func {}{}))", "(block ".repeat(n), ")".repeat(n))
}

/// Check that every node's children lie inside it, in source order, without
/// overlapping.
pub fn assert_spans_nest(node: NodeRef<'_>) {
    let span = node.span();
    assert!(span.start <= span.end, "{:?} has an inverted span", node.kind());

    let children = node.children();
    for child in &children {
        let c = child.span();
        assert!(
            span.start <= c.start && c.end <= span.end,
            "{:?} {:?} is not inside {:?} {:?}",
            child.kind(),
            c,
            node.kind(),
            span
        );
    }
    for pair in children.windows(2) {
        assert!(
            pair[0].span().end <= pair[1].span().start,
            "{:?} and {:?} overlap or are out of order",
            pair[0].kind(),
            pair[1].kind()
        );
    }
    for child in children {
        assert_spans_nest(child);
    }
}

/// Check that `node`'s source text is its children's text in order, with
/// only keywords, literals, parens and trivia between them. Identifiers and
/// strings always belong to a child node.
pub fn assert_round_trip(node: NodeRef<'_>, source: &str) {
    let span = node.span();
    let mut rebuilt = String::new();
    let mut gaps = Vec::new();
    let mut at = span.start;
    for child in node.children() {
        let c = child.span();
        gaps.push(&source[at..c.start]);
        rebuilt.push_str(&source[at..c.end]);
        at = c.end;
    }
    gaps.push(&source[at..span.end]);
    rebuilt.push_str(&source[at..span.end]);
    assert_eq!(rebuilt, &source[span.start..span.end], "{:?} does not rebuild", node.kind());

    let mut open = 0i32;
    for gap in gaps {
        for token in Lexer::new(gap).with_comments() {
            let token = token.unwrap_or_else(|e| panic!("{:?} gap {:?} does not lex: {}", node.kind(), gap, e));
            match token.kind {
                TokenKind::LeftParen => open += 1,
                TokenKind::RightParen => open -= 1,
                TokenKind::Id(_) | TokenKind::String(_) => {
                    panic!("{:?} has {} outside its children", node.kind(), token.kind)
                }
                _ => {}
            }
        }
    }
    assert_eq!(open, 0, "{:?} has unbalanced parens between its children", node.kind());
}

/// Error messages of a parse, for compact assertions.
pub fn messages(parse: &Parse) -> Vec<&str> {
    parse.errors.iter().map(|e| e.message.as_str()).collect()
}
