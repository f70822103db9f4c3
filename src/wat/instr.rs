//! Instruction grammar.
//!
//! Instructions come in two syntaxes that can be mixed freely:
//!
//! - **Flat**: `local.get 0 local.get 1 i32.add`, with `block ... end` and
//!   `if ... else ... end` delimiting structured control.
//! - **Folded**: `(i32.add (local.get 0) (local.get 1))`, one list per
//!   instruction.
//!
//! Nested instructions are read with an explicit stack of [`Frame`]s rather
//! than by recursion, so nesting depth is bounded only by the configured
//! limit and never by the native stack. A flat block reads from its parent's
//! cursor and hands it back when it closes; a folded instruction reads its
//! own list. Each folded instruction in a sequence is a recovery point.

use super::error::ParseError;
use super::keywords::{self, Shape};
use super::lexer::parse_u64;
use super::parser::{func_result, out_of_range, unexpected, u32_literal, Failure, Items, PResult, ParseContext};
use super::sexpr::{SExpr, SExprList};
use super::token::{FloatLit, Span, TokenKind};
use crate::syntax::{
    BlockInstr, BlockKind, IfInstr, Ident, IndexSpace, Instr, MemArg, Operands, PlainInstr, TypeUse,
};
use std::mem;

const LANE_SHAPES: &[&str] = &["i8x16", "i16x8", "i32x4", "i64x2", "f32x4", "f64x2"];

// ============================================================================
// Frames
// ============================================================================

/// Where a sequence of instructions stops.
#[derive(Debug, Clone, Copy)]
enum Until {
    /// Any instruction, up to one of these keywords or the end of the list.
    Keyword(&'static [&'static str]),
    /// Folded instructions up to `(then ...)`.
    Then,
    /// Folded instructions up to the end of the list.
    Close,
}

/// Instructions read so far, and the cursor they are read from.
struct Seq<'a> {
    items: Items<'a>,
    until: Until,
    instrs: Vec<Instr>,
}

impl<'a> Seq<'a> {
    fn new(items: Items<'a>, until: Until) -> Self {
        Self {
            items,
            until,
            instrs: Vec::new(),
        }
    }
}

/// An instruction whose body is still being read.
enum Open<'a> {
    FlatBlock {
        head: Span,
        from: usize,
        kind: BlockKind,
        label: Option<Ident>,
        block_type: TypeUse,
    },
    FlatIf {
        head: Span,
        from: usize,
        label: Option<Ident>,
        block_type: TypeUse,
        /// Set once `else` has been passed.
        then_body: Option<Vec<Instr>>,
        else_label: Option<Ident>,
    },
    FoldedBlock {
        span: Span,
        kind: BlockKind,
        label: Option<Ident>,
        block_type: TypeUse,
    },
    FoldedIf {
        span: Span,
        label: Option<Ident>,
        block_type: TypeUse,
        clause: Clause<'a>,
    },
    FoldedPlain {
        span: Span,
        op: &'static str,
        operands: Operands,
    },
}

/// Which part of a folded `if` is being read. `rest` is the cursor over the
/// `if` list itself while a clause list is read.
enum Clause<'a> {
    Condition,
    Then {
        condition: Vec<Instr>,
        rest: Items<'a>,
    },
    Else {
        condition: Vec<Instr>,
        then_body: Vec<Instr>,
        rest: Items<'a>,
    },
}

struct Frame<'a> {
    seq: Seq<'a>,
    open: Open<'a>,
}

impl Frame<'_> {
    fn is_folded(&self) -> bool {
        !matches!(self.open, Open::FlatBlock { .. } | Open::FlatIf { .. })
    }
}

enum Step<'a> {
    /// An item was consumed.
    Next,
    /// A nested instruction was opened.
    Open(Frame<'a>),
    /// The sequence reached its end.
    End,
}

enum Closed<'a> {
    /// The instruction is complete. A flat one returns the cursor to hand
    /// back to its parent.
    Instr(Instr, Option<Items<'a>>),
    /// The frame moved on to its next clause.
    Reopen(Frame<'a>),
}

// ============================================================================
// Sequences
// ============================================================================

impl ParseContext {
    /// instr* up to one of `terminators` or the end of the list.
    ///
    /// The terminator itself is left for the caller.
    pub(super) fn instrs(&mut self, items: &mut Items<'_>, terminators: &'static [&'static str]) -> PResult<Vec<Instr>> {
        let mut seq = Seq::new(*items, Until::Keyword(terminators));
        self.run(&mut seq, 0)?;
        *items = seq.items;
        Ok(seq.instrs)
    }

    /// A single folded instruction whose failure belongs to the caller.
    pub(super) fn folded(&mut self, list: SExprList<'_>) -> PResult<Instr> {
        let mut frame = self.open_folded(list, 0)?;
        loop {
            self.run(&mut frame.seq, 1)?;
            match close(frame)? {
                Closed::Instr(instr, _) => return Ok(instr),
                Closed::Reopen(next) => frame = next,
            }
        }
    }

    /// Read `bottom` to its end. Instructions nested in it are opened on a
    /// local stack of frames, `base` levels below the caller.
    ///
    /// A failure abandons open frames up to and including the innermost
    /// folded instruction, where it is recorded. Without one it belongs to
    /// the caller.
    fn run<'a>(&mut self, bottom: &mut Seq<'a>, base: usize) -> PResult<()> {
        let mut open: Vec<Frame<'a>> = Vec::new();

        loop {
            let depth = base + open.len();
            let seq = match open.last_mut() {
                Some(frame) => &mut frame.seq,
                None => &mut *bottom,
            };
            let failure = match self.step(seq, depth) {
                Ok(Step::Next) => continue,
                Ok(Step::Open(frame)) => {
                    open.push(frame);
                    continue;
                }
                Ok(Step::End) => {
                    let Some(frame) = open.pop() else {
                        return Ok(());
                    };
                    let folded = frame.is_folded();
                    match close(frame) {
                        Ok(Closed::Reopen(frame)) => {
                            open.push(frame);
                            continue;
                        }
                        Ok(Closed::Instr(instr, rest)) => {
                            let parent = match open.last_mut() {
                                Some(frame) => &mut frame.seq,
                                None => &mut *bottom,
                            };
                            if let Some(rest) = rest {
                                parent.items = rest;
                            }
                            parent.instrs.push(instr);
                            continue;
                        }
                        Err(failure) if folded => {
                            self.recover::<()>(Err(failure))?;
                            continue;
                        }
                        Err(failure) => failure,
                    }
                }
                Err(failure) => failure,
            };

            if matches!(failure, Failure::Fatal(_)) {
                return Err(failure);
            }
            loop {
                match open.pop() {
                    Some(frame) if frame.is_folded() => {
                        self.recover::<()>(Err(failure))?;
                        break;
                    }
                    Some(_) => {}
                    None => return Err(failure),
                }
            }
        }
    }

    /// Advance `seq` by one item.
    fn step<'a>(&mut self, seq: &mut Seq<'a>, depth: usize) -> PResult<Step<'a>> {
        let Some(item) = seq.items.peek() else {
            return match seq.until {
                Until::Then => Err(seq.items.missing(&["'(then ...)'"])),
                _ => Ok(Step::End),
            };
        };

        if let Some(list) = item.as_list() {
            if matches!(seq.until, Until::Then) && list.head_keyword() == Some("then") {
                return Ok(Step::End);
            }
            seq.items.next();
            return match self.open_folded(list, depth) {
                Ok(frame) => Ok(Step::Open(frame)),
                Err(failure) => {
                    self.recover::<()>(Err(failure))?;
                    Ok(Step::Next)
                }
            };
        }

        let keyword = match (seq.until, item.as_keyword()) {
            (Until::Keyword(terminators), Some(kw)) if terminators.iter().any(|t| *t == kw) => {
                return Ok(Step::End)
            }
            (Until::Keyword(_), Some(kw)) => kw,
            (Until::Keyword(_), None) => return Err(unexpected(item, &["instruction"])),
            (Until::Then, _) => return Err(unexpected(item, &["folded instruction", "'(then ...)'"])),
            (Until::Close, _) => return Err(unexpected(item, &["folded instruction", "')'"])),
        };
        seq.items.next();

        match keyword {
            "block" => self.open_flat(&mut seq.items, item, Some(BlockKind::Block), depth).map(Step::Open),
            "loop" => self.open_flat(&mut seq.items, item, Some(BlockKind::Loop), depth).map(Step::Open),
            "if" => self.open_flat(&mut seq.items, item, None, depth).map(Step::Open),
            _ => {
                let instr = self.flat_plain(&mut seq.items, item, keyword)?;
                seq.instrs.push(instr);
                Ok(Step::Next)
            }
        }
    }

    // ========================================================================
    // Flat
    // ========================================================================

    /// block ::= 'block' label blocktype instr* 'end' id?
    /// loop  ::= 'loop' label blocktype instr* 'end' id?
    /// if    ::= 'if' label blocktype instr* ('else' id? instr*)? 'end' id?
    ///
    /// `kind` is `None` for `if`.
    fn open_flat<'a>(
        &mut self,
        items: &mut Items<'a>,
        head: &SExpr,
        kind: Option<BlockKind>,
        depth: usize,
    ) -> PResult<Frame<'a>> {
        let from = items.position();
        let label = items.take_id();
        let block_type = self.type_use(items)?;
        self.enter(depth, head.span())?;

        let head = head.span();
        let (until, open) = match kind {
            Some(kind) => (
                Until::Keyword(&["end"]),
                Open::FlatBlock {
                    head,
                    from,
                    kind,
                    label,
                    block_type,
                },
            ),
            None => (
                Until::Keyword(&["else", "end"]),
                Open::FlatIf {
                    head,
                    from,
                    label,
                    block_type,
                    then_body: None,
                    else_label: None,
                },
            ),
        };
        Ok(Frame {
            seq: Seq::new(*items, until),
            open,
        })
    }

    fn flat_plain(&mut self, items: &mut Items<'_>, head: &SExpr, keyword: &str) -> PResult<Instr> {
        let from = items.position();
        let (op, shape) = keywords::instruction(keyword).ok_or_else(|| unexpected(head, &["instruction"]))?;
        let operands = self.operands(items, shape)?;

        Ok(Instr::Plain(PlainInstr {
            span: items.span_since(from, head.span()),
            op,
            operands,
            children: Vec::new(),
            folded: false,
        }))
    }

    // ========================================================================
    // Folded
    // ========================================================================

    /// foldedinstr ::= '(' plaininstr foldedinstr* ')'
    ///               | '(' 'block' label blocktype instr* ')'
    ///               | '(' 'loop' label blocktype instr* ')'
    ///               | '(' 'if' label blocktype foldedinstr* '(' 'then' instr* ')' ('(' 'else' instr* ')')? ')'
    fn open_folded<'a>(&mut self, list: SExprList<'a>, depth: usize) -> PResult<Frame<'a>> {
        self.enter(depth, list.span)?;
        let head = list
            .head()
            .ok_or_else(|| Failure::Syntax(ParseError::expected(&["instruction"], "'()'", list.span)))?;
        let keyword = head.as_keyword().ok_or_else(|| unexpected(head, &["instruction"]))?;
        let mut items = Items::after_head(list);
        let span = list.span;

        let (until, open) = match keyword {
            "block" | "loop" => {
                let kind = if keyword == "block" { BlockKind::Block } else { BlockKind::Loop };
                let label = items.take_id();
                let block_type = self.type_use(&mut items)?;
                (
                    Until::Keyword(&["end"]),
                    Open::FoldedBlock {
                        span,
                        kind,
                        label,
                        block_type,
                    },
                )
            }
            "if" => {
                let label = items.take_id();
                let block_type = self.type_use(&mut items)?;
                (
                    Until::Then,
                    Open::FoldedIf {
                        span,
                        label,
                        block_type,
                        clause: Clause::Condition,
                    },
                )
            }
            _ => {
                let (op, shape) = keywords::instruction(keyword).ok_or_else(|| unexpected(head, &["instruction"]))?;
                let operands = self.operands(&mut items, shape)?;
                (Until::Close, Open::FoldedPlain { span, op, operands })
            }
        };

        Ok(Frame {
            seq: Seq::new(items, until),
            open,
        })
    }
}

/// Finish a frame whose sequence has ended.
fn close(frame: Frame<'_>) -> PResult<Closed<'_>> {
    let Frame { mut seq, open } = frame;

    let instr = match open {
        Open::FlatBlock {
            head,
            from,
            kind,
            label,
            block_type,
        } => {
            expect_end(&mut seq.items)?;
            let end_label = seq.items.take_id();
            let instr = Instr::Block(BlockInstr {
                span: seq.items.span_since(from, head),
                kind,
                label,
                block_type,
                body: seq.instrs,
                end_label,
                folded: false,
            });
            return Ok(Closed::Instr(instr, Some(seq.items)));
        }
        Open::FlatIf {
            head,
            from,
            label,
            block_type,
            then_body: None,
            ..
        } if seq.items.peek_keyword() == Some("else") => {
            seq.items.next();
            let else_label = seq.items.take_id();
            let then_body = mem::take(&mut seq.instrs);
            seq.until = Until::Keyword(&["end"]);
            return Ok(Closed::Reopen(Frame {
                seq,
                open: Open::FlatIf {
                    head,
                    from,
                    label,
                    block_type,
                    then_body: Some(then_body),
                    else_label,
                },
            }));
        }
        Open::FlatIf {
            head,
            from,
            label,
            block_type,
            then_body,
            else_label,
        } => {
            expect_end(&mut seq.items)?;
            let end_label = seq.items.take_id();
            let (then_body, else_body) = match then_body {
                Some(then_body) => (then_body, Some(seq.instrs)),
                None => (seq.instrs, None),
            };
            let instr = Instr::If(IfInstr {
                span: seq.items.span_since(from, head),
                label,
                block_type,
                condition: Vec::new(),
                then_body,
                else_label,
                else_body,
                end_label,
                folded: false,
            });
            return Ok(Closed::Instr(instr, Some(seq.items)));
        }
        Open::FoldedBlock {
            span,
            kind,
            label,
            block_type,
        } => {
            // A trailing `end $id` is tolerated in the folded form.
            let end_label = if seq.items.peek_keyword() == Some("end") {
                seq.items.next();
                seq.items.take_id()
            } else {
                None
            };
            seq.items.finish()?;
            Instr::Block(BlockInstr {
                span,
                kind,
                label,
                block_type,
                body: seq.instrs,
                end_label,
                folded: true,
            })
        }
        Open::FoldedIf {
            span,
            label,
            block_type,
            clause,
        } => {
            let (condition, then_body, else_body, rest) = match clause {
                Clause::Condition => {
                    let then_list = seq
                        .items
                        .next_list("then")
                        .ok_or_else(|| seq.items.missing(&["'(then ...)'"]))?;
                    let clause = Clause::Then {
                        condition: seq.instrs,
                        rest: seq.items,
                    };
                    return Ok(Closed::Reopen(Frame {
                        seq: Seq::new(Items::after_head(then_list), Until::Keyword(&[])),
                        open: Open::FoldedIf {
                            span,
                            label,
                            block_type,
                            clause,
                        },
                    }));
                }
                Clause::Then { condition, mut rest } => match rest.next_list("else") {
                    Some(else_list) => {
                        let clause = Clause::Else {
                            condition,
                            then_body: seq.instrs,
                            rest,
                        };
                        return Ok(Closed::Reopen(Frame {
                            seq: Seq::new(Items::after_head(else_list), Until::Keyword(&[])),
                            open: Open::FoldedIf {
                                span,
                                label,
                                block_type,
                                clause,
                            },
                        }));
                    }
                    None => (condition, seq.instrs, None, rest),
                },
                Clause::Else {
                    condition,
                    then_body,
                    rest,
                } => (condition, then_body, Some(seq.instrs), rest),
            };
            rest.finish()?;
            Instr::If(IfInstr {
                span,
                label,
                block_type,
                condition,
                then_body,
                else_label: None,
                else_body,
                end_label: None,
                folded: true,
            })
        }
        Open::FoldedPlain { span, op, operands } => Instr::Plain(PlainInstr {
            span,
            op,
            operands,
            children: seq.instrs,
            folded: true,
        }),
    };

    Ok(Closed::Instr(instr, None))
}

impl ParseContext {
    // ========================================================================
    // Operands
    // ========================================================================

    fn operands(&mut self, items: &mut Items<'_>, shape: Shape) -> PResult<Operands> {
        Ok(match shape {
            Shape::Nullary => Operands::None,
            Shape::Label => Operands::Label(items.index("label")?),
            Shape::BrTable => {
                let mut labels = Vec::new();
                while let Some(label) = items.take_index()? {
                    labels.push(label);
                }
                let default = labels.pop().ok_or_else(|| match items.peek() {
                    Some(item) => unexpected(item, &["label"]),
                    None => items.missing(&["label"]),
                })?;
                Operands::BrTable { labels, default }
            }
            Shape::Index(space) => Operands::Index {
                space,
                index: items.index(index_name(space))?,
            },
            Shape::OptIndex(space) => Operands::OptIndex {
                space,
                index: items.take_index()?,
            },
            // Both tables or neither.
            Shape::TableCopy => match items.take_index()? {
                Some(dst) => Operands::TableCopy(Some((dst, items.index("table index")?))),
                None => Operands::TableCopy(None),
            },
            Shape::TableInit => {
                let first = items.index("element segment index")?;
                match items.take_index()? {
                    Some(elem) => Operands::TableInit {
                        table: Some(first),
                        elem,
                    },
                    None => Operands::TableInit {
                        table: None,
                        elem: first,
                    },
                }
            }
            Shape::CallIndirect => Operands::CallIndirect {
                table: items.take_index()?,
                type_use: self.type_use(items)?,
            },
            Shape::MemArg(natural_align) => Operands::MemArg(mem_arg(items, natural_align)?),
            Shape::MemLane(natural_align) => Operands::MemLane {
                memarg: mem_arg(items, natural_align)?,
                lane: lane_index(items)?,
            },
            Shape::Lane => Operands::Lane(lane_index(items)?),
            Shape::Shuffle => {
                let mut lanes = [0u8; 16];
                for lane in lanes.iter_mut() {
                    *lane = lane_index(items)?;
                }
                Operands::Shuffle(lanes)
            }
            Shape::I32 => Operands::I32(int_literal(items.expect(&["i32 literal"])?, I32_RANGE)? as i32),
            Shape::I64 => Operands::I64(int_literal(items.expect(&["i64 literal"])?, I64_RANGE)? as i64),
            Shape::F32 => Operands::F32(f32_bits(items.expect(&["f32 literal"])?)?),
            Shape::F64 => Operands::F64(f64_bits(items.expect(&["f64 literal"])?)?),
            Shape::V128 => Operands::V128(v128_const(items)?),
            Shape::RefNull => {
                let item = items.expect(&["heap type"])?;
                let heap_type = item
                    .as_keyword()
                    .and_then(keywords::heap_type)
                    .ok_or_else(|| unexpected(item, &["func", "extern"]))?;
                Operands::RefNull(heap_type)
            }
            Shape::Select => {
                let mut results = Vec::new();
                while let Some(list) = items.next_list("result") {
                    results.push(func_result(list)?);
                }
                Operands::Select(results)
            }
        })
    }
}

fn index_name(space: IndexSpace) -> &'static str {
    match space {
        IndexSpace::Func => "function index",
        IndexSpace::Local => "local index",
        IndexSpace::Global => "global index",
        IndexSpace::Table => "table index",
        IndexSpace::Elem => "element segment index",
        IndexSpace::Data => "data segment index",
    }
}

fn expect_end(items: &mut Items<'_>) -> PResult<()> {
    match items.peek() {
        Some(item) if item.as_keyword() == Some("end") => {
            items.next();
            Ok(())
        }
        Some(item) => Err(unexpected(item, &["end"])),
        None => Err(items.missing(&["end"])),
    }
}

/// Consume a `prefix=value` keyword such as `offset=8`.
fn keyword_arg<'a>(items: &mut Items<'a>, prefix: &str) -> Option<(&'a SExpr, &'a str)> {
    let item = items.peek()?;
    let value = item.as_keyword()?.strip_prefix(prefix)?;
    items.next();
    Some((item, value))
}

/// memarg ::= ('offset=' u64)? ('align=' u32)?
///
/// Alignment is written in bytes and must be a power of two.
fn mem_arg(items: &mut Items<'_>, natural_align: u32) -> PResult<MemArg> {
    let mut memarg = MemArg {
        offset: None,
        align: None,
        natural_align,
    };

    if let Some((item, value)) = keyword_arg(items, "offset=") {
        let offset =
            parse_u64(value).ok_or_else(|| Failure::Syntax(ParseError::syntax("invalid memory offset", item.span())))?;
        memarg.offset = Some(offset);
    }
    if let Some((item, value)) = keyword_arg(items, "align=") {
        let align = parse_u64(value)
            .and_then(|a| u32::try_from(a).ok())
            .ok_or_else(|| Failure::Syntax(ParseError::syntax("invalid alignment", item.span())))?;
        if !align.is_power_of_two() {
            return Err(Failure::Syntax(ParseError::syntax(
                "alignment must be a power of two",
                item.span(),
            )));
        }
        memarg.align = Some(align);
    }

    Ok(memarg)
}

fn lane_index(items: &mut Items<'_>) -> PResult<u8> {
    let item = items.expect(&["lane index"])?;
    let value = u32_literal(item)?;
    u8::try_from(value).map_err(|_| out_of_range(item.span()))
}

// ============================================================================
// Constants
// ============================================================================

/// Accepted values for an integer of each width: the signed minimum up to
/// the unsigned maximum. Values above the signed maximum wrap.
type IntRange = (i128, i128);

const I8_RANGE: IntRange = (i8::MIN as i128, u8::MAX as i128);
const I16_RANGE: IntRange = (i16::MIN as i128, u16::MAX as i128);
const I32_RANGE: IntRange = (i32::MIN as i128, u32::MAX as i128);
const I64_RANGE: IntRange = (i64::MIN as i128, u64::MAX as i128);

/// An integer literal within `range`. Truncate the result to the target
/// width with `as`.
fn int_literal(item: &SExpr, (min, max): IntRange) -> PResult<i128> {
    let token = item.as_atom().ok_or_else(|| unexpected(item, &["integer"]))?;
    let sv = token
        .kind
        .as_integer()
        .ok_or_else(|| unexpected(item, &["integer"]))?;

    let value = if sv.negative {
        -(sv.value as i128)
    } else {
        sv.value as i128
    };
    if value < min || value > max {
        return Err(out_of_range(token.span));
    }
    Ok(value)
}

/// Generates a function returning the IEEE 754 bits of an f32 or f64 literal.
///
/// Parameters: function name, float type, bits type, label string,
/// max NaN payload, exponent-only bits, canonical NaN bits, sign bit, to_fN method.
macro_rules! float_bits {
    ($name:ident, $fty:ty, $uty:ty, $label:expr,
     $max_payload:expr, $exp_bits:expr, $canon_nan:expr, $sign_bit:expr,
     $to_float:ident) => {
        fn $name(item: &SExpr) -> PResult<$uty> {
            let token = item.as_atom().ok_or_else(|| unexpected(item, &[$label]))?;
            let value: $fty = match &token.kind {
                TokenKind::Float(FloatLit::Nan { negative, payload }) => {
                    let mut bits: $uty = match payload {
                        Some(p) if *p == 0 || *p > $max_payload => return Err(out_of_range(token.span)),
                        Some(p) => $exp_bits | (*p as $uty),
                        None => $canon_nan,
                    };
                    if *negative {
                        bits |= $sign_bit;
                    }
                    return Ok(bits);
                }
                TokenKind::Float(lit) => {
                    let value = lit
                        .$to_float()
                        .ok_or_else(|| Failure::Syntax(ParseError::syntax("invalid float literal", token.span)))?;
                    if value.is_infinite() && !matches!(lit, FloatLit::Inf { .. }) {
                        return Err(out_of_range(token.span));
                    }
                    value
                }
                // Converted straight from the integer so it rounds once.
                TokenKind::Num(sv) | TokenKind::HexNum(sv) => {
                    let magnitude = sv.value as $fty;
                    if sv.negative {
                        -magnitude
                    } else {
                        magnitude
                    }
                }
                _ => return Err(unexpected(item, &[$label])),
            };
            Ok(value.to_bits())
        }
    };
}

float_bits!(
    f32_bits,
    f32,
    u32,
    "f32 literal",
    0x7FFFFFu64,
    0x7F800000u32,
    0x7FC00000u32,
    0x80000000u32,
    to_f32
);
float_bits!(
    f64_bits,
    f64,
    u64,
    "f64 literal",
    0xFFFFFFFFFFFFFu64,
    0x7FF0000000000000u64,
    0x7FF8000000000000u64,
    0x8000000000000000u64,
    to_f64
);

/// v128.const ::= 'v128.const' shape lane+
///
/// Lanes are stored little-endian, lane 0 first.
fn v128_const(items: &mut Items<'_>) -> PResult<[u8; 16]> {
    let shape_item = items.expect(LANE_SHAPES)?;
    let mut bytes = [0u8; 16];

    match shape_item.as_keyword() {
        Some("i8x16") => lanes(items, &mut bytes, |item| Ok([int_literal(item, I8_RANGE)? as u8]))?,
        Some("i16x8") => lanes(items, &mut bytes, |item| {
            Ok((int_literal(item, I16_RANGE)? as u16).to_le_bytes())
        })?,
        Some("i32x4") => lanes(items, &mut bytes, |item| {
            Ok((int_literal(item, I32_RANGE)? as u32).to_le_bytes())
        })?,
        Some("i64x2") => lanes(items, &mut bytes, |item| {
            Ok((int_literal(item, I64_RANGE)? as u64).to_le_bytes())
        })?,
        Some("f32x4") => lanes(items, &mut bytes, |item| Ok(f32_bits(item)?.to_le_bytes()))?,
        Some("f64x2") => lanes(items, &mut bytes, |item| Ok(f64_bits(item)?.to_le_bytes()))?,
        _ => return Err(unexpected(shape_item, LANE_SHAPES)),
    }

    Ok(bytes)
}

/// Fill `bytes` with `16 / N` lanes of `N` bytes each.
fn lanes<const N: usize>(
    items: &mut Items<'_>,
    bytes: &mut [u8; 16],
    lane: impl Fn(&SExpr) -> PResult<[u8; N]>,
) -> PResult<()> {
    for chunk in bytes.chunks_exact_mut(N) {
        let item = items.expect(&["lane value"])?;
        chunk.copy_from_slice(&lane(item)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{f32_bits, f64_bits, Failure, FloatLit, SExpr, Span, TokenKind};
    use crate::syntax::{BlockKind, HeapType, Idx, Instr, ModuleField, Operands};
    use crate::wat::token::Token;
    use crate::wat::{parse, FatalError, Parser};

    fn parse_body(body: &str) -> (Vec<Instr>, Vec<String>) {
        let source = format!("(module (func {}))", body);
        let parse = parse(&source).unwrap();
        let errors = parse.errors.iter().map(|e| e.message.clone()).collect();
        let instrs = match parse.module().and_then(|m| m.fields.first()) {
            Some(ModuleField::Func(f)) => f.body.instrs.clone(),
            _ => Vec::new(),
        };
        (instrs, errors)
    }

    fn body(body: &str) -> Vec<Instr> {
        let (instrs, errors) = parse_body(body);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        instrs
    }

    fn error(body: &str) -> String {
        let (_, errors) = parse_body(body);
        assert_eq!(errors.len(), 1, "expected one error, got {:?}", errors);
        errors[0].clone()
    }

    fn operands(source: &str) -> Operands {
        match body(source).remove(0) {
            Instr::Plain(p) => p.operands,
            other => panic!("expected plain instruction, got {:?}", other),
        }
    }

    // ------------------------------------------------------------------------
    // Sequences
    // ------------------------------------------------------------------------

    #[test]
    fn flat_and_folded_mix() {
        let instrs = body("local.get 0 (local.get 1) i32.add");
        assert_eq!(instrs.len(), 3);
        assert!(matches!(&instrs[0], Instr::Plain(p) if !p.folded && p.op == "local.get"));
        assert!(matches!(&instrs[1], Instr::Plain(p) if p.folded));
        assert_eq!(instrs[2].mnemonic(), "i32.add");
    }

    #[test]
    fn folded_children() {
        let instrs = body("(i32.add (local.get 0) (i32.const 1))");
        let Instr::Plain(add) = &instrs[0] else {
            panic!("expected plain instruction");
        };
        assert_eq!(add.children.len(), 2);
        assert_eq!(add.children[1].mnemonic(), "i32.const");
    }

    #[test]
    fn flat_span_covers_operands() {
        // "(module (func " is 14 bytes.
        let instrs = body("i32.load offset=4 nop");
        assert_eq!((instrs[0].span().start, instrs[0].span().end), (14, 31));
        assert_eq!((instrs[1].span().start, instrs[1].span().end), (32, 35));
    }

    #[test]
    fn unknown_instruction() {
        assert_eq!(error("i32.frobnicate"), "expected instruction, found 'i32.frobnicate'");
        assert_eq!(error("(i32.frobnicate)"), "expected instruction, found 'i32.frobnicate'");
    }

    #[test]
    fn stray_end_and_else() {
        assert_eq!(error("nop end"), "expected instruction, found 'end'");
        assert_eq!(error("block else end"), "expected instruction, found 'else'");
    }

    #[test]
    fn atom_operand_in_folded_form() {
        assert_eq!(error("(i32.add 1 2)"), "expected one of folded instruction, ')', found '1'");
    }

    #[test]
    fn folded_instruction_is_a_recovery_point() {
        let (instrs, errors) = parse_body("(i32.const x) (nop) (drop (i32.const y) (nop))");
        assert_eq!(errors.len(), 2);
        assert_eq!(instrs.len(), 2);
        let Instr::Plain(drop) = &instrs[1] else {
            panic!("expected plain instruction");
        };
        assert_eq!(drop.children.len(), 1);
    }

    #[test]
    fn empty_folded_list() {
        assert_eq!(error("()"), "expected instruction, found '()'");
    }

    // ------------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------------

    #[test]
    fn flat_block_with_labels() {
        let instrs = body("block $L (result i32) i32.const 1 end $L");
        let Instr::Block(b) = &instrs[0] else {
            panic!("expected block");
        };
        assert_eq!(b.kind, BlockKind::Block);
        assert_eq!(b.label.as_ref().unwrap().name, "L");
        assert_eq!(b.block_type.results.len(), 1);
        assert_eq!(b.body.len(), 1);
        assert_eq!(b.end_label.as_ref().unwrap().name, "L");
        assert!(!b.folded);
    }

    #[test]
    fn end_label_is_not_checked() {
        let instrs = body("loop $a end $other");
        let Instr::Block(b) = &instrs[0] else {
            panic!("expected block");
        };
        assert_eq!(b.label.as_ref().unwrap().name, "a");
        assert_eq!(b.end_label.as_ref().unwrap().name, "other");
    }

    #[test]
    fn folded_block_with_trailing_end() {
        let instrs = body("(block $L (loop (br $L)) end)");
        let Instr::Block(b) = &instrs[0] else {
            panic!("expected block");
        };
        assert!(b.folded);
        assert!(b.end_label.is_none());
        let Instr::Block(inner) = &b.body[0] else {
            panic!("expected loop");
        };
        assert_eq!(inner.kind, BlockKind::Loop);
        assert!(matches!(&inner.body[0], Instr::Plain(p) if matches!(&p.operands, Operands::Label(Idx::Id(id)) if id.name == "L")));
    }

    #[test]
    fn missing_end() {
        assert_eq!(error("block nop"), "expected end, found ')'");
    }

    #[test]
    fn flat_if_else() {
        let instrs = body("if $c (result i32) i32.const 1 else $c i32.const 2 end $c");
        let Instr::If(i) = &instrs[0] else {
            panic!("expected if");
        };
        assert_eq!(i.then_body.len(), 1);
        assert_eq!(i.else_label.as_ref().unwrap().name, "c");
        assert_eq!(i.else_body.as_ref().unwrap().len(), 1);
        assert!(i.condition.is_empty());
    }

    #[test]
    fn flat_if_without_else() {
        let instrs = body("if end");
        let Instr::If(i) = &instrs[0] else {
            panic!("expected if");
        };
        assert!(i.else_body.is_none());
    }

    #[test]
    fn folded_if() {
        let instrs = body("(if (result i32) (local.get 0) (then (i32.const 1)) (else (i32.const 2)))");
        let Instr::If(i) = &instrs[0] else {
            panic!("expected if");
        };
        assert!(i.folded);
        assert_eq!(i.condition.len(), 1);
        assert_eq!(i.then_body.len(), 1);
        assert_eq!(i.else_body.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn folded_if_requires_then() {
        assert_eq!(error("(if (local.get 0))"), "expected '(then ...)', found ')'");
    }

    #[test]
    fn nesting_limit_applies_to_flat_blocks() {
        let nested = |n: usize| format!("(module (func {}{}))", "block ".repeat(n), "end ".repeat(n));
        assert!(Parser::new().max_depth(16).parse(&nested(10)).unwrap().is_clean());
        assert!(matches!(
            Parser::new().max_depth(16).parse(&nested(20)),
            Err(FatalError::NestingTooDeep { limit: 16, .. })
        ));
    }

    // ------------------------------------------------------------------------
    // Operands
    // ------------------------------------------------------------------------

    #[test]
    fn br_table() {
        let Operands::BrTable { labels, default } = operands("br_table 0 1 $done") else {
            panic!("expected br_table operands");
        };
        assert_eq!(labels.len(), 2);
        assert_eq!(default.to_string(), "$done");

        assert_eq!(error("br_table"), "expected label, found ')'");
    }

    #[test]
    fn call_indirect() {
        let Operands::CallIndirect { table, type_use } = operands("call_indirect $t (type $sig) (param i32)") else {
            panic!("expected call_indirect operands");
        };
        assert!(table.is_some());
        assert!(type_use.index.is_some());
        assert_eq!(type_use.params.len(), 1);
    }

    #[test]
    fn table_operands() {
        assert!(matches!(operands("table.init 1 $e"), Operands::TableInit { table: Some(_), .. }));
        assert!(matches!(operands("table.init $e"), Operands::TableInit { table: None, .. }));
        assert!(matches!(operands("table.get $t"), Operands::OptIndex { index: Some(_), .. }));
    }

    #[test]
    fn table_copy_takes_both_tables_or_neither() {
        assert!(matches!(operands("table.copy"), Operands::TableCopy(None)));
        assert!(matches!(
            operands("table.copy 0 1"),
            Operands::TableCopy(Some((Idx::Num { value: 0, .. }, Idx::Num { value: 1, .. })))
        ));
        assert_eq!(error("table.copy $a"), "expected table index, found ')'");
    }

    #[test]
    fn select_with_result() {
        let instrs = body("(select (result i32) (local.get 0) (local.get 1) (local.get 2))");
        let Instr::Plain(p) = &instrs[0] else {
            panic!("expected plain instruction");
        };
        assert!(matches!(&p.operands, Operands::Select(r) if r.len() == 1));
        assert_eq!(p.children.len(), 3);
    }

    #[test]
    fn ref_null() {
        assert_eq!(operands("ref.null extern"), Operands::RefNull(HeapType::Extern));
        assert_eq!(error("ref.null any"), "expected one of func, extern, found 'any'");
    }

    #[test]
    fn memarg() {
        let Operands::MemArg(m) = operands("i32.load offset=8 align=4") else {
            panic!("expected memarg");
        };
        assert_eq!((m.offset, m.align, m.natural_align), (Some(8), Some(4), 4));

        let Operands::MemArg(m) = operands("i64.load16_u offset=0x10") else {
            panic!("expected memarg");
        };
        assert_eq!(m.offset, Some(16));
        assert_eq!(m.align(), 2);

        assert_eq!(error("i32.load align=3"), "alignment must be a power of two");
    }

    #[test]
    fn lane_operands() {
        assert_eq!(operands("i8x16.extract_lane_s 15"), Operands::Lane(15));
        assert!(matches!(
            operands("v128.load8_lane offset=1 7"),
            Operands::MemLane { lane: 7, memarg } if memarg.offset == Some(1)
        ));
        assert_eq!(error("i8x16.replace_lane 256"), "constant out of range");

        let Operands::Shuffle(lanes) = operands("i8x16.shuffle 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 31") else {
            panic!("expected shuffle");
        };
        assert_eq!(lanes[15], 31);
    }

    // ------------------------------------------------------------------------
    // Constants
    // ------------------------------------------------------------------------

    #[test]
    fn integer_constants() {
        assert_eq!(operands("i32.const 0xFFFFFFFF"), Operands::I32(-1));
        assert_eq!(operands("i32.const -0x80000000"), Operands::I32(i32::MIN));
        assert_eq!(operands("i32.const 1_000"), Operands::I32(1000));
        assert_eq!(operands("i64.const 0xFFFF_FFFF_FFFF_FFFF"), Operands::I64(-1));
        assert_eq!(operands("i64.const -9223372036854775808"), Operands::I64(i64::MIN));
        assert_eq!(error("i32.const 4294967296"), "constant out of range");
        assert_eq!(error("i32.const -2147483649"), "constant out of range");
        assert_eq!(error("i32.const"), "expected i32 literal, found ')'");
        assert_eq!(error("i32.const 1.5"), "expected integer, found '1.5'");
    }

    #[test]
    fn float_constants() {
        assert_eq!(operands("f32.const 1.5"), Operands::F32(1.5f32.to_bits()));
        assert_eq!(operands("f64.const -0"), Operands::F64(0x8000_0000_0000_0000));
        assert_eq!(operands("f64.const 0x1.8p1"), Operands::F64(3.0f64.to_bits()));
        assert_eq!(operands("f32.const 16777217"), Operands::F32(16777216f32.to_bits()));
        assert_eq!(operands("f32.const inf"), Operands::F32(0x7F80_0000));
        assert_eq!(operands("f64.const -inf"), Operands::F64(f64::NEG_INFINITY.to_bits()));
        assert_eq!(error("f32.const 1e39"), "constant out of range");
    }

    #[test]
    fn wide_hex_integer_float_constants() {
        // Rounds to 2^65.
        assert_eq!(operands("f64.const 0x1FFFFFFFFFFFFFFFF"), Operands::F64((1023 + 65) << 52));
        assert_eq!(operands("f32.const 0x1FFFFFFFFFFFFFFFF"), Operands::F32((127 + 65) << 23));
    }

    #[test]
    fn unconvertible_float_literal_is_an_error() {
        let atom = |lit| SExpr::Atom(Token::new(TokenKind::Float(lit), Span::new(3, 7, 1, 4)));
        let hex = atom(FloatLit::Hex {
            negative: false,
            hex_str: "0xzz".into(),
        });
        let decimal = atom(FloatLit::Decimal {
            negative: false,
            decimal_str: "1.2.3".into(),
        });
        for item in [&hex, &decimal] {
            let Err(Failure::Syntax(e)) = f64_bits(item) else {
                panic!("expected a syntax error");
            };
            assert_eq!(e.message, "invalid float literal");
            assert_eq!(e.span, Span::new(3, 7, 1, 4));
            assert!(matches!(f32_bits(item), Err(Failure::Syntax(_))));
        }
    }

    #[test]
    fn nan_constants() {
        assert_eq!(operands("f32.const nan"), Operands::F32(0x7FC0_0000));
        assert_eq!(operands("f32.const -nan:0x1"), Operands::F32(0xFF80_0001));
        assert_eq!(operands("f64.const nan:0x4"), Operands::F64(0x7FF0_0000_0000_0004));
        assert_eq!(error("f32.const nan:0x800000"), "constant out of range");
        assert_eq!(error("f32.const nan:0x0"), "constant out of range");
    }

    #[test]
    fn v128_constants() {
        let Operands::V128(bytes) = operands("v128.const i32x4 1 2 3 -1") else {
            panic!("expected v128");
        };
        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[0xFF, 0xFF, 0xFF, 0xFF]);

        let Operands::V128(bytes) = operands("v128.const i8x16 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 0xFF") else {
            panic!("expected v128");
        };
        assert_eq!(bytes[15], 0xFF);

        let Operands::V128(bytes) = operands("v128.const f64x2 1 -0") else {
            panic!("expected v128");
        };
        assert_eq!(&bytes[0..8], &1.0f64.to_le_bytes());
        assert_eq!(bytes[15], 0x80);

        assert_eq!(error("v128.const i16x8 1 2 3"), "expected lane value, found ')'");
        assert_eq!(error("v128.const i8x16 256 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0"), "constant out of range");
        assert_eq!(
            error("v128.const i128 0"),
            "expected one of i8x16, i16x8, i32x4, i64x2, f32x4, f64x2, found 'i128'"
        );
    }
}
