mod common;

#[cfg(test)]
mod tests {
    use super::common::*;
    use rstest::rstest;
    use std::collections::HashSet;
    use watparse::syntax::{ElemItems, Idx, Instr, ModuleField, NodeKind, Operands, Root};
    use watparse::wat::{ErrorKind, Lexer, SignedValue, TokenKind};
    use watparse::{FatalError, Parser};

    const KITCHEN_SINK: &str = include_str!("modules/kitchen_sink.wat");

    fn single_token(source: &str) -> TokenKind {
        let tokens = Lexer::tokenise(source).expect("source should lex");
        assert_eq!(tokens.len(), 1, "expected one token in {:?}", source);
        tokens.into_iter().next().map(|t| t.kind).unwrap()
    }

    // ------------------------------------------------------------------------
    // Lexical forms
    // ------------------------------------------------------------------------

    #[rstest]
    #[case(r#""\41""#, b"A".to_vec())]
    #[case(r#""\x41""#, b"A".to_vec())]
    #[case(r#""\u{48}\u{49}""#, b"HI".to_vec())]
    #[case(r#""\t\n\r\"\'\\""#, vec![9, 10, 13, 34, 39, 92])]
    #[case(r#""\u{1F600}""#, vec![0xF0, 0x9F, 0x98, 0x80])]
    #[case(r#""""#, vec![])]
    fn string_escapes(#[case] source: &str, #[case] bytes: Vec<u8>) {
        assert_eq!(single_token(source), TokenKind::String(bytes));
    }

    #[rstest]
    #[case(r#""\q""#)]
    #[case(r#""\u{110000}""#)]
    #[case(r#""unterminated"#)]
    fn bad_strings(#[case] source: &str) {
        assert!(Lexer::tokenise(source).is_err());
    }

    #[rstest]
    #[case("1_000", TokenKind::Num(SignedValue::unsigned(1000)))]
    #[case("0x_FF", TokenKind::HexNum(SignedValue::unsigned(255)))]
    #[case("0xff", TokenKind::HexNum(SignedValue::unsigned(255)))]
    #[case("-0x10", TokenKind::HexNum(SignedValue::signed(16, true)))]
    #[case("+5", TokenKind::Num(SignedValue::signed(5, false)))]
    #[case("18446744073709551615", TokenKind::Num(SignedValue::unsigned(u64::MAX)))]
    fn integer_literals(#[case] source: &str, #[case] kind: TokenKind) {
        assert_eq!(single_token(source), kind);
    }

    #[rstest]
    #[case("1_")]
    #[case("1__0")]
    #[case("0x")]
    #[case("12abc")]
    fn malformed_numbers(#[case] source: &str) {
        assert!(Lexer::tokenise(source).is_err());
    }

    #[test]
    fn all_comment_forms_are_trivia() {
        let source = "(module ;; line\n // slashes\n (; block (; nested ;) ;) )";
        let parse = watparse::parse(source).unwrap();
        assert!(parse.is_clean());
        assert_eq!(parse.comments.len(), 3);
    }

    // ------------------------------------------------------------------------
    // Whole modules
    // ------------------------------------------------------------------------

    #[test]
    fn kitchen_sink_parses_cleanly() {
        let module = clean_module(KITCHEN_SINK);
        assert_eq!(module.id.as_ref().map(|id| id.name.as_str()), Some("kitchen_sink"));

        let count = |pred: fn(&ModuleField) -> bool| module.fields.iter().filter(|f| pred(f)).count();
        assert_eq!(count(|f| matches!(f, ModuleField::Type(_))), 2);
        assert_eq!(count(|f| matches!(f, ModuleField::Import(_))), 4);
        assert_eq!(count(|f| matches!(f, ModuleField::Func(_))), 5);
        assert_eq!(count(|f| matches!(f, ModuleField::Table(_))), 2);
        assert_eq!(count(|f| matches!(f, ModuleField::Memory(_))), 1);
        assert_eq!(count(|f| matches!(f, ModuleField::Global(_))), 2);
        assert_eq!(count(|f| matches!(f, ModuleField::Export(_))), 1);
        assert_eq!(count(|f| matches!(f, ModuleField::Start(_))), 1);
        assert_eq!(count(|f| matches!(f, ModuleField::Elem(_))), 4);
        assert_eq!(count(|f| matches!(f, ModuleField::Data(_))), 2);
    }

    #[test]
    fn kitchen_sink_spans_nest() {
        let parse = watparse::parse(KITCHEN_SINK).unwrap();
        let root = parse.root.expect("root");
        assert_spans_nest(root.node());
    }

    #[test]
    fn parsing_is_idempotent() {
        let first = watparse::parse(KITCHEN_SINK).unwrap();
        let second = watparse::parse(KITCHEN_SINK).unwrap();
        assert_eq!(first, second);

        let broken = "(module (func (i32.const x)) (garbage) (memory -1)";
        assert_eq!(watparse::parse(broken).unwrap(), watparse::parse(broken).unwrap());
    }

    #[test]
    fn tree_serializes_to_json() {
        let parse = watparse::parse("(module (func $f (result i32) (i32.const 7)))").unwrap();
        let json = serde_json::to_value(parse.root.as_ref().unwrap()).unwrap();
        let func = &json["Module"]["fields"][0]["Func"];
        assert_eq!(func["id"]["name"], "f");
        assert_eq!(func["body"]["instrs"][0]["Plain"]["op"], "i32.const");
        assert_eq!(func["body"]["instrs"][0]["Plain"]["operands"]["I32"], 7);
    }

    #[test]
    fn component_root() {
        let parse = watparse::parse("(component (core module $a) (core module $b (memory 1)))").unwrap();
        assert!(parse.errors.is_empty());
        let Some(Root::Component(component)) = parse.root else {
            panic!("expected a component");
        };
        assert_eq!(component.modules.len(), 2);
        assert_eq!(component.modules[1].fields.len(), 1);
    }

    // ------------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------------

    #[test]
    fn garbage_field_is_skipped() {
        let source = "(module (func) (garbage) (func))";
        let parse = watparse::parse(source).unwrap();
        let module = parse.module().unwrap();
        assert_eq!(module.fields.len(), 2);
        assert_eq!(parse.errors.len(), 1);

        let error = &parse.errors[0];
        assert_eq!(error.kind, ErrorKind::Syntax);
        assert_eq!(&source[error.span.start..error.span.end], "(garbage)");
    }

    #[rstest]
    #[case("(module (func (i32.const x)) (func))", 2, 1)]
    #[case("(module (memory) (memory 1))", 1, 1)]
    #[case("(module (type (func (param $x))) (type (func)))", 1, 1)]
    #[case(r#"(module (import "m" (func)) (func))"#, 1, 1)]
    #[case("(module foo (func))", 1, 1)]
    #[case("(module (func) (func) (func))", 3, 0)]
    fn errors_are_local(#[case] source: &str, #[case] fields: usize, #[case] errors: usize) {
        let parse = watparse::parse(source).unwrap();
        assert_eq!(parse.module().unwrap().fields.len(), fields, "{:?}", parse);
        assert_eq!(parse.errors.len(), errors, "{:?}", parse.errors);
    }

    #[test]
    fn errors_are_ordered_by_offset() {
        let parse = watparse::parse("(module (data \"\\q\") (bad) (func (i32.const y))").unwrap();
        let offsets: Vec<_> = parse.errors.iter().map(|e| e.offset()).collect();
        let mut sorted = offsets.clone();
        sorted.sort_unstable();
        assert_eq!(offsets, sorted);
        assert_eq!(parse.errors.len(), 4);
        assert_eq!(parse.errors[0].kind, ErrorKind::Unbalanced);
        assert_eq!(parse.errors[1].kind, ErrorKind::Lex);
    }

    #[test]
    fn unbalanced_parens() {
        let parse = watparse::parse("(module (func)))").unwrap();
        assert_eq!(messages(&parse), vec!["unexpected ')'"]);
        assert_eq!(parse.module().unwrap().fields.len(), 1);
    }

    // ------------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------------

    #[test]
    fn block_matching() {
        let module = clean_module("(module (func (block $L (loop (br $L)) end)))");
        let ModuleField::Func(func) = &module.fields[0] else {
            panic!("expected func");
        };
        let Instr::Block(block) = &func.body.instrs[0] else {
            panic!("expected block");
        };
        assert_eq!(block.label.as_ref().unwrap().name, "L");
    }

    #[test]
    fn mismatched_end_label_is_not_a_parse_error() {
        let module = clean_module("(module (func block $L nop end $other))");
        let ModuleField::Func(func) = &module.fields[0] else {
            panic!("expected func");
        };
        let Instr::Block(block) = &func.body.instrs[0] else {
            panic!("expected block");
        };
        assert_eq!(block.end_label.as_ref().unwrap().name, "other");
    }

    #[test]
    fn flat_and_folded_blocks_agree() {
        let shape = |source: &str| {
            let module = clean_module(source);
            let ModuleField::Func(func) = &module.fields[0] else {
                panic!("expected func");
            };
            fn describe(instr: &Instr) -> String {
                match instr {
                    Instr::Block(b) => {
                        let body: Vec<_> = b.body.iter().map(describe).collect();
                        format!("{}[{}]", instr.mnemonic(), body.join(","))
                    }
                    _ => instr.mnemonic().to_string(),
                }
            }
            func.body.instrs.iter().map(describe).collect::<Vec<_>>()
        };
        assert_eq!(
            shape("(module (func block loop nop end end))"),
            shape("(module (func (block (loop (nop)))))")
        );
    }

    // ------------------------------------------------------------------------
    // Depth guard
    // ------------------------------------------------------------------------

    #[test]
    fn deep_flat_blocks_are_fatal() {
        let result = watparse::parse(&nested_flat_blocks(100_000));
        assert!(matches!(result, Err(FatalError::NestingTooDeep { limit: 256, .. })));
    }

    #[test]
    fn deep_folded_blocks_are_fatal() {
        let result = watparse::parse(&nested_folded_blocks(100_000));
        assert!(matches!(result, Err(FatalError::NestingTooDeep { .. })));
    }

    #[test]
    fn deep_parens_are_fatal() {
        let source = "(".repeat(100_000);
        assert!(matches!(watparse::parse(&source), Err(FatalError::NestingTooDeep { .. })));
    }

    #[test]
    fn nesting_within_the_limit_parses() {
        assert!(watparse::parse(&nested_flat_blocks(200)).unwrap().is_clean());
        assert!(watparse::parse(&nested_folded_blocks(250)).unwrap().is_clean());

        let parse = Parser::new().max_depth(1000).parse(&nested_flat_blocks(300));
        assert!(parse.unwrap().is_clean());
    }

    #[test]
    fn mixed_nesting_near_the_limit_parses() {
        // Alternating folded and flat blocks, 250 levels in all.
        let source = format!(
            "(module (func {}{}))",
            "(block block ".repeat(125),
            "end)".repeat(125)
        );
        let module = clean_module(&source);
        let ModuleField::Func(func) = &module.fields[0] else {
            panic!("expected func");
        };

        let mut depth = 0;
        let mut body = &func.body.instrs;
        while let Some(Instr::Block(block)) = body.first() {
            depth += 1;
            body = &block.body;
        }
        assert_eq!(depth, 250);
    }

    // ------------------------------------------------------------------------
    // Span lookup
    // ------------------------------------------------------------------------

    #[rstest]
    #[case("$counter (mut", NodeKind::Ident)]
    #[case("(mut i64)", NodeKind::GlobalType)]
    #[case("i32.add)", NodeKind::PlainInstr)]
    #[case("loop $top", NodeKind::BlockInstr)]
    #[case("\"hello", NodeKind::DataString)]
    #[case("(data $bytes", NodeKind::Data)]
    #[case("(elem $passive", NodeKind::Elem)]
    #[case("\"log\"", NodeKind::Name)]
    #[case("4 16", NodeKind::Limits)]
    fn node_at_finds_the_smallest_node(#[case] needle: &str, #[case] kind: NodeKind) {
        let parse = watparse::parse(KITCHEN_SINK).unwrap();
        let root = parse.root.unwrap();
        let offset = KITCHEN_SINK.find(needle).expect("needle in fixture");
        let node = root.node_at(offset).expect("a node at the offset");
        assert_eq!(node.kind(), kind);
        assert!(node.span().contains(offset));
    }

    #[test]
    fn node_at_outside_the_root() {
        let source = "  (module)  ";
        let parse = watparse::parse(source).unwrap();
        let root = parse.root.unwrap();
        assert!(root.node_at(0).is_none());
        assert!(root.node_at(source.len() - 1).is_none());
        assert_eq!(root.node_at(2).map(|n| n.kind()), Some(NodeKind::Module));
    }

    #[test]
    fn kitchen_sink_rebuilds_from_child_spans() {
        let parse = watparse::parse(KITCHEN_SINK).unwrap();
        let root = parse.root.unwrap();
        let mut kinds = HashSet::new();
        for node in root.walk() {
            assert_round_trip(node, KITCHEN_SINK);
            kinds.insert(node.kind());
        }
        for kind in [NodeKind::InlineExport, NodeKind::InlineImport, NodeKind::ElemItems, NodeKind::DataString] {
            assert!(kinds.contains(&kind), "fixture has no {:?}", kind);
        }
    }

    #[test]
    fn data_strings_are_nodes() {
        let source = r#"(module (memory (data "ab" "c")) (data "xy"))"#;
        let parse = watparse::parse(source).unwrap();
        let root = parse.root.unwrap();
        let kinds: Vec<_> = root.walk().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Module,
                NodeKind::Memory,
                NodeKind::InlineData,
                NodeKind::DataString,
                NodeKind::DataString,
                NodeKind::Data,
                NodeKind::DataString,
            ]
        );

        let c = source.find("\"c\"").unwrap();
        let node = root.node_at(c).unwrap();
        assert_eq!(node.kind(), NodeKind::DataString);
        assert_eq!((node.span().start, node.span().end), (c, c + 3));
        let in_list = source.find("data \"ab").unwrap();
        assert_eq!(root.node_at(in_list).map(|n| n.kind()), Some(NodeKind::InlineData));
    }

    #[test]
    fn walk_visits_parents_first() {
        let module_source = "(module (func $f (call $g)))";
        let parse = watparse::parse(module_source).unwrap();
        let root = parse.root.unwrap();
        let kinds: Vec<_> = root.walk().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Module,
                NodeKind::Func,
                NodeKind::Ident,
                NodeKind::TypeUse,
                NodeKind::Expr,
                NodeKind::PlainInstr,
                NodeKind::Idx,
                NodeKind::Ident,
            ]
        );
    }

    #[test]
    fn elem_items_and_operands() {
        let module = clean_module(KITCHEN_SINK);
        let elems: Vec<_> = module
            .fields
            .iter()
            .filter_map(|f| match f {
                ModuleField::Elem(e) => Some(e),
                _ => None,
            })
            .collect();
        assert!(matches!(&elems[0].items, ElemItems::Funcs { indices, .. } if indices.len() == 2));
        assert!(matches!(&elems[3].items, ElemItems::Exprs { exprs, .. } if exprs.len() == 2));

        let ModuleField::Export(export) = module.fields.iter().find(|f| matches!(f, ModuleField::Export(_))).unwrap()
        else {
            panic!("expected export");
        };
        assert!(matches!(&export.desc.index, Idx::Id(id) if id.name == "sub"));

        let call = module
            .fields
            .iter()
            .filter_map(|f| match f {
                ModuleField::Func(func) => Some(func),
                _ => None,
            })
            .flat_map(|func| func.body.instrs.iter())
            .find_map(|i| match i {
                Instr::Plain(p) if p.op == "call" => Some(p),
                _ => None,
            })
            .expect("a call instruction");
        assert!(matches!(&call.operands, Operands::Index { index: Idx::Id(id), .. } if id.name == "log"));
    }
}
