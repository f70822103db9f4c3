//! Instruction nodes.
//!
//! Flat (`local.get 0`) and folded (`(local.get 0)`) instructions share one
//! representation; `folded` records which syntax was used. A folded plain
//! instruction keeps its nested operand instructions in `children`, in
//! source order.

use super::{FuncResult, HeapType, Ident, Idx, TypeUse};
use crate::wat::Span;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Instr {
    Plain(PlainInstr),
    Block(BlockInstr),
    If(IfInstr),
}

impl Instr {
    pub fn span(&self) -> Span {
        match self {
            Instr::Plain(i) => i.span,
            Instr::Block(i) => i.span,
            Instr::If(i) => i.span,
        }
    }

    /// The mnemonic this instruction starts with.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instr::Plain(i) => i.op,
            Instr::Block(i) => match i.kind {
                BlockKind::Block => "block",
                BlockKind::Loop => "loop",
            },
            Instr::If(_) => "if",
        }
    }
}

/// Any instruction that is not `block`, `loop` or `if`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlainInstr {
    pub span: Span,
    pub op: &'static str,
    pub operands: Operands,
    /// Nested instructions of the folded form, e.g. the two operands of
    /// `(i32.add (local.get 0) (local.get 1))`.
    pub children: Vec<Instr>,
    pub folded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Block,
    Loop,
}

/// `block`/`loop label blocktype instr* end id?`, flat or folded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockInstr {
    pub span: Span,
    pub kind: BlockKind,
    pub label: Option<Ident>,
    pub block_type: TypeUse,
    pub body: Vec<Instr>,
    /// The identifier after `end`. Not checked against `label`.
    pub end_label: Option<Ident>,
    pub folded: bool,
}

/// `if label blocktype instr* (else id? instr*)? end id?`, or the folded
/// `(if label blocktype foldedinstr* (then instr*) (else instr*)?)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfInstr {
    pub span: Span,
    pub label: Option<Ident>,
    pub block_type: TypeUse,
    /// Folded condition instructions. Always empty for the flat form.
    pub condition: Vec<Instr>,
    pub then_body: Vec<Instr>,
    pub else_label: Option<Ident>,
    /// `None` when there is no `else` clause at all.
    pub else_body: Option<Vec<Instr>>,
    pub end_label: Option<Ident>,
    pub folded: bool,
}

/// What an index operand refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSpace {
    Func,
    Local,
    Global,
    Table,
    Elem,
    Data,
}

/// `offset=N align=N`, both optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemArg {
    pub offset: Option<u64>,
    /// Alignment in bytes, as written.
    pub align: Option<u32>,
    /// The access width in bytes, which is the alignment when none is given.
    pub natural_align: u32,
}

impl MemArg {
    /// The effective alignment in bytes.
    pub fn align(&self) -> u32 {
        self.align.unwrap_or(self.natural_align)
    }
}

/// Immediate operands of a plain instruction.
///
/// Float constants are stored as their IEEE 754 bit patterns so NaN payloads
/// survive and trees compare structurally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Operands {
    None,
    Label(Idx),
    BrTable { labels: Vec<Idx>, default: Idx },
    Index { space: IndexSpace, index: Idx },
    OptIndex { space: IndexSpace, index: Option<Idx> },
    /// Destination then source, or neither.
    TableCopy(Option<(Idx, Idx)>),
    TableInit { table: Option<Idx>, elem: Idx },
    CallIndirect { table: Option<Idx>, type_use: TypeUse },
    MemArg(MemArg),
    MemLane { memarg: MemArg, lane: u8 },
    Lane(u8),
    Shuffle([u8; 16]),
    I32(i32),
    I64(i64),
    F32(u32),
    F64(u64),
    V128([u8; 16]),
    RefNull(HeapType),
    Select(Vec<FuncResult>),
}

impl Operands {
    /// The indices among the operands, in source order.
    pub fn indices(&self) -> Vec<&Idx> {
        match self {
            Operands::Label(i) | Operands::Index { index: i, .. } => vec![i],
            Operands::BrTable { labels, default } => labels.iter().chain(std::iter::once(default)).collect(),
            Operands::OptIndex { index, .. } => index.iter().collect(),
            Operands::TableCopy(Some((dst, src))) => vec![dst, src],
            Operands::TableCopy(None) => Vec::new(),
            Operands::TableInit { table, elem } => table.iter().chain(std::iter::once(elem)).collect(),
            Operands::CallIndirect { table, .. } => table.iter().collect(),
            _ => Vec::new(),
        }
    }
}
