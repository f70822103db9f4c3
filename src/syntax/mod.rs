//! Concrete syntax tree for WAT.
//!
//! One type per grammar production. Every node keeps the [`Span`] of the
//! source it was parsed from, and optional pieces of syntax stay optional
//! (`Option<_>`) rather than being filled with defaults. Identifiers are kept
//! as written; nothing is resolved to an index.
//!
//! The tree is immutable once built. [`NodeRef`] gives a uniform view over
//! all node types for traversal and offset lookup.

mod instr;
mod node;

pub use instr::{BlockInstr, BlockKind, IfInstr, IndexSpace, Instr, MemArg, Operands, PlainInstr};
pub use node::{NodeKind, NodeRef, Walk};

use crate::wat::Span;
use serde::Serialize;
use std::fmt;

// ============================================================================
// Root
// ============================================================================

/// The root of a parsed source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Root {
    Module(Module),
    Component(Component),
}

impl Root {
    pub fn span(&self) -> Span {
        match self {
            Root::Module(m) => m.span,
            Root::Component(c) => c.span,
        }
    }

    /// The root as a generic node.
    pub fn node(&self) -> NodeRef<'_> {
        match self {
            Root::Module(m) => NodeRef::Module(m),
            Root::Component(c) => NodeRef::Component(c),
        }
    }

    /// Iterate over every node in the tree, depth-first, parents before
    /// children.
    pub fn walk(&self) -> Walk<'_> {
        self.node().walk()
    }

    /// The smallest node whose span contains the byte at `offset`.
    ///
    /// Returns `None` if the offset is outside the root's span. Nodes with
    /// zero-length spans are never returned.
    ///
    /// ```
    /// use watparse::syntax::NodeKind;
    ///
    /// let source = "(module (func $f))";
    /// let parse = watparse::parse(source).unwrap();
    /// let root = parse.root.unwrap();
    /// assert_eq!(root.node_at(14).map(|n| n.kind()), Some(NodeKind::Ident));
    /// assert_eq!(root.node_at(9).map(|n| n.kind()), Some(NodeKind::Func));
    /// ```
    pub fn node_at(&self, offset: usize) -> Option<NodeRef<'_>> {
        self.node().node_at(offset)
    }
}

/// `(module id? field*)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Module {
    pub span: Span,
    pub id: Option<Ident>,
    pub fields: Vec<ModuleField>,
}

/// `(component id? (core module ...)*)`
///
/// Only embedded core modules are understood; the span of each module covers
/// its `(core module ...)` list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    pub span: Span,
    pub id: Option<Ident>,
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ModuleField {
    Type(TypeDef),
    Import(Import),
    Func(Func),
    Table(Table),
    Memory(Memory),
    Global(Global),
    Export(Export),
    Start(Start),
    Elem(Elem),
    Data(Data),
}

impl ModuleField {
    pub fn span(&self) -> Span {
        self.node().span()
    }

    pub fn node(&self) -> NodeRef<'_> {
        match self {
            ModuleField::Type(n) => NodeRef::TypeDef(n),
            ModuleField::Import(n) => NodeRef::Import(n),
            ModuleField::Func(n) => NodeRef::Func(n),
            ModuleField::Table(n) => NodeRef::Table(n),
            ModuleField::Memory(n) => NodeRef::Memory(n),
            ModuleField::Global(n) => NodeRef::Global(n),
            ModuleField::Export(n) => NodeRef::Export(n),
            ModuleField::Start(n) => NodeRef::Start(n),
            ModuleField::Elem(n) => NodeRef::Elem(n),
            ModuleField::Data(n) => NodeRef::Data(n),
        }
    }
}

// ============================================================================
// Leaves
// ============================================================================

/// A symbolic identifier, without its `$`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ident {
    pub span: Span,
    pub name: String,
}

/// A reference to something by number or by name. Never resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Idx {
    Num { span: Span, value: u32 },
    Id(Ident),
}

impl Idx {
    pub fn span(&self) -> Span {
        match self {
            Idx::Num { span, .. } => *span,
            Idx::Id(id) => id.span,
        }
    }
}

impl fmt::Display for Idx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Idx::Num { value, .. } => write!(f, "{}", value),
            Idx::Id(id) => write!(f, "${}", id.name),
        }
    }
}

/// A string literal that must be valid UTF-8, used for import and export
/// names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Name {
    pub span: Span,
    pub value: String,
}

/// A string literal kept as raw bytes, used for data segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataString {
    pub span: Span,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    // Number types
    I32,
    I64,
    F32,
    F64,
    // Vector types
    V128,
    // Reference types
    FuncRef,
    ExternRef,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::V128 => "v128",
            ValueType::FuncRef => "funcref",
            ValueType::ExternRef => "externref",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefType {
    FuncRef,
    ExternRef,
}

/// The operand of `ref.null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeapType {
    Func,
    Extern,
}

// ============================================================================
// Types
// ============================================================================

/// `(type id? (func param* result*))`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDef {
    pub span: Span,
    pub id: Option<Ident>,
    pub func_type: FuncType,
}

/// `(func param* result*)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuncType {
    pub span: Span,
    pub params: Vec<Param>,
    pub results: Vec<FuncResult>,
}

/// `(param id valtype)` or `(param valtype*)`.
///
/// When `id` is present, `types` holds exactly one entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub span: Span,
    pub id: Option<Ident>,
    pub types: Vec<ValueType>,
}

/// `(result valtype*)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuncResult {
    pub span: Span,
    pub types: Vec<ValueType>,
}

/// `(type idx)? param* result*`
///
/// All parts are optional. An empty type use has a zero-length span where it
/// would have started.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeUse {
    pub span: Span,
    pub index: Option<Idx>,
    pub params: Vec<Param>,
    pub results: Vec<FuncResult>,
}

impl TypeUse {
    pub fn is_empty(&self) -> bool {
        self.index.is_none() && self.params.is_empty() && self.results.is_empty()
    }
}

/// `min max?`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Limits {
    pub span: Span,
    pub min: u32,
    pub max: Option<u32>,
}

/// `limits reftype`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableType {
    pub span: Span,
    pub limits: Limits,
    pub ref_type: RefType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemType {
    pub span: Span,
    pub limits: Limits,
}

/// `valtype` or `(mut valtype)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GlobalType {
    pub span: Span,
    pub mutable: bool,
    pub value_type: ValueType,
}

// ============================================================================
// Imports and exports
// ============================================================================

/// `(import "module" "name" importdesc)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Import {
    pub span: Span,
    pub module: Name,
    pub name: Name,
    pub desc: ImportDesc,
}

/// `(func id? typeuse)`, `(table id? tabletype)`, `(memory id? memtype)` or
/// `(global id? globaltype)` inside an import.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportDesc {
    pub span: Span,
    pub id: Option<Ident>,
    pub kind: ImportKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ImportKind {
    Func(TypeUse),
    Table(TableType),
    Memory(MemType),
    Global(GlobalType),
}

/// The `(import "module" "name")` abbreviation inside a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineImport {
    pub span: Span,
    pub module: Name,
    pub name: Name,
}

/// The `(export "name")` abbreviation inside a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineExport {
    pub span: Span,
    pub name: Name,
}

/// `(export "name" exportdesc)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Export {
    pub span: Span,
    pub name: Name,
    pub desc: ExportDesc,
}

/// `(func idx)`, `(table idx)`, `(memory idx)` or `(global idx)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportDesc {
    pub span: Span,
    pub kind: ExternKind,
    pub index: Idx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternKind {
    Func,
    Table,
    Memory,
    Global,
}

// ============================================================================
// Definitions
// ============================================================================

/// `(func id? export* import? typeuse local* instr*)`
///
/// An imported function has no locals and an empty body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Func {
    pub span: Span,
    pub id: Option<Ident>,
    pub exports: Vec<InlineExport>,
    pub import: Option<InlineImport>,
    pub type_use: TypeUse,
    pub locals: Vec<Local>,
    pub body: Expr,
}

/// `(local id valtype)` or `(local valtype*)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Local {
    pub span: Span,
    pub id: Option<Ident>,
    pub types: Vec<ValueType>,
}

/// `(table id? export* import? tabletype)` or
/// `(table id? export* reftype (elem ...))`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub span: Span,
    pub id: Option<Ident>,
    pub exports: Vec<InlineExport>,
    pub import: Option<InlineImport>,
    pub def: TableDef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TableDef {
    Type(TableType),
    /// A table sized by its inline element list.
    Elem { ref_type: RefType, items: ElemItems },
}

/// `(memory id? export* import? memtype)` or
/// `(memory id? export* (data string*))`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Memory {
    pub span: Span,
    pub id: Option<Ident>,
    pub exports: Vec<InlineExport>,
    pub import: Option<InlineImport>,
    pub def: MemoryDef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MemoryDef {
    Type(MemType),
    /// A memory sized by its inline data.
    Data(InlineData),
}

/// `(data string*)` inside a memory definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineData {
    pub span: Span,
    pub strings: Vec<DataString>,
}

/// `(global id? export* import? globaltype expr)`
///
/// An imported global has an empty `init`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Global {
    pub span: Span,
    pub id: Option<Ident>,
    pub exports: Vec<InlineExport>,
    pub import: Option<InlineImport>,
    pub global_type: GlobalType,
    pub init: Expr,
}

/// `(start idx)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Start {
    pub span: Span,
    pub func: Idx,
}

/// `(elem id? mode elemitems)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Elem {
    pub span: Span,
    pub id: Option<Ident>,
    pub mode: ElemMode,
    pub items: ElemItems,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ElemMode {
    Passive,
    Declare,
    Active { table: Option<Idx>, offset: Expr },
}

/// The contents of an element segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ElemItems {
    /// `func idx*`, or bare `idx*` after an offset.
    Funcs { span: Span, indices: Vec<Idx> },
    /// `reftype elemexpr*`
    Exprs {
        span: Span,
        ref_type: RefType,
        exprs: Vec<Expr>,
    },
}

impl ElemItems {
    pub fn span(&self) -> Span {
        match self {
            ElemItems::Funcs { span, .. } | ElemItems::Exprs { span, .. } => *span,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ElemItems::Funcs { indices, .. } => indices.len(),
            ElemItems::Exprs { exprs, .. } => exprs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `(data id? mode string*)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Data {
    pub span: Span,
    pub id: Option<Ident>,
    pub mode: DataMode,
    pub strings: Vec<DataString>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DataMode {
    Passive,
    Active { memory: Option<Idx>, offset: Expr },
}

/// A sequence of instructions.
///
/// The span covers the instructions, or the enclosing `(offset ...)` or
/// `(item ...)` list when there is one. An empty sequence has a zero-length
/// span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    pub span: Span,
    pub instrs: Vec<Instr>,
}

impl Expr {
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }
}
