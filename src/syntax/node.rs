//! A uniform view over syntax nodes.
//!
//! [`NodeRef`] borrows any node in the tree and exposes its kind, span and
//! children, so tools can traverse the tree without matching on every type.
//! Traversal is iterative; deep trees do not grow the call stack.

use super::*;
use serde::Serialize;

/// A borrowed reference to any syntax node.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Module(&'a Module),
    Component(&'a Component),
    TypeDef(&'a TypeDef),
    FuncType(&'a FuncType),
    Param(&'a Param),
    FuncResult(&'a FuncResult),
    TypeUse(&'a TypeUse),
    Import(&'a Import),
    ImportDesc(&'a ImportDesc),
    InlineImport(&'a InlineImport),
    InlineExport(&'a InlineExport),
    Func(&'a Func),
    Local(&'a Local),
    Table(&'a Table),
    TableType(&'a TableType),
    Memory(&'a Memory),
    InlineData(&'a InlineData),
    MemType(&'a MemType),
    Limits(&'a Limits),
    Global(&'a Global),
    GlobalType(&'a GlobalType),
    Export(&'a Export),
    ExportDesc(&'a ExportDesc),
    Start(&'a Start),
    Elem(&'a Elem),
    ElemItems(&'a ElemItems),
    Data(&'a Data),
    DataString(&'a DataString),
    Expr(&'a Expr),
    Name(&'a Name),
    Ident(&'a Ident),
    Idx(&'a Idx),
    Instr(&'a Instr),
}

/// The kind of a [`NodeRef`], without the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Module,
    Component,
    TypeDef,
    FuncType,
    Param,
    FuncResult,
    TypeUse,
    Import,
    ImportDesc,
    InlineImport,
    InlineExport,
    Func,
    Local,
    Table,
    TableType,
    Memory,
    InlineData,
    MemType,
    Limits,
    Global,
    GlobalType,
    Export,
    ExportDesc,
    Start,
    Elem,
    ElemItems,
    Data,
    DataString,
    Expr,
    Name,
    Ident,
    Idx,
    PlainInstr,
    BlockInstr,
    IfInstr,
}

impl<'a> NodeRef<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRef::Module(_) => NodeKind::Module,
            NodeRef::Component(_) => NodeKind::Component,
            NodeRef::TypeDef(_) => NodeKind::TypeDef,
            NodeRef::FuncType(_) => NodeKind::FuncType,
            NodeRef::Param(_) => NodeKind::Param,
            NodeRef::FuncResult(_) => NodeKind::FuncResult,
            NodeRef::TypeUse(_) => NodeKind::TypeUse,
            NodeRef::Import(_) => NodeKind::Import,
            NodeRef::ImportDesc(_) => NodeKind::ImportDesc,
            NodeRef::InlineImport(_) => NodeKind::InlineImport,
            NodeRef::InlineExport(_) => NodeKind::InlineExport,
            NodeRef::Func(_) => NodeKind::Func,
            NodeRef::Local(_) => NodeKind::Local,
            NodeRef::Table(_) => NodeKind::Table,
            NodeRef::TableType(_) => NodeKind::TableType,
            NodeRef::Memory(_) => NodeKind::Memory,
            NodeRef::InlineData(_) => NodeKind::InlineData,
            NodeRef::MemType(_) => NodeKind::MemType,
            NodeRef::Limits(_) => NodeKind::Limits,
            NodeRef::Global(_) => NodeKind::Global,
            NodeRef::GlobalType(_) => NodeKind::GlobalType,
            NodeRef::Export(_) => NodeKind::Export,
            NodeRef::ExportDesc(_) => NodeKind::ExportDesc,
            NodeRef::Start(_) => NodeKind::Start,
            NodeRef::Elem(_) => NodeKind::Elem,
            NodeRef::ElemItems(_) => NodeKind::ElemItems,
            NodeRef::Data(_) => NodeKind::Data,
            NodeRef::DataString(_) => NodeKind::DataString,
            NodeRef::Expr(_) => NodeKind::Expr,
            NodeRef::Name(_) => NodeKind::Name,
            NodeRef::Ident(_) => NodeKind::Ident,
            NodeRef::Idx(_) => NodeKind::Idx,
            NodeRef::Instr(Instr::Plain(_)) => NodeKind::PlainInstr,
            NodeRef::Instr(Instr::Block(_)) => NodeKind::BlockInstr,
            NodeRef::Instr(Instr::If(_)) => NodeKind::IfInstr,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            NodeRef::Module(n) => n.span,
            NodeRef::Component(n) => n.span,
            NodeRef::TypeDef(n) => n.span,
            NodeRef::FuncType(n) => n.span,
            NodeRef::Param(n) => n.span,
            NodeRef::FuncResult(n) => n.span,
            NodeRef::TypeUse(n) => n.span,
            NodeRef::Import(n) => n.span,
            NodeRef::ImportDesc(n) => n.span,
            NodeRef::InlineImport(n) => n.span,
            NodeRef::InlineExport(n) => n.span,
            NodeRef::Func(n) => n.span,
            NodeRef::Local(n) => n.span,
            NodeRef::Table(n) => n.span,
            NodeRef::TableType(n) => n.span,
            NodeRef::Memory(n) => n.span,
            NodeRef::InlineData(n) => n.span,
            NodeRef::MemType(n) => n.span,
            NodeRef::Limits(n) => n.span,
            NodeRef::Global(n) => n.span,
            NodeRef::GlobalType(n) => n.span,
            NodeRef::Export(n) => n.span,
            NodeRef::ExportDesc(n) => n.span,
            NodeRef::Start(n) => n.span,
            NodeRef::Elem(n) => n.span,
            NodeRef::ElemItems(n) => n.span(),
            NodeRef::Data(n) => n.span,
            NodeRef::DataString(n) => n.span,
            NodeRef::Expr(n) => n.span,
            NodeRef::Name(n) => n.span,
            NodeRef::Ident(n) => n.span,
            NodeRef::Idx(n) => n.span(),
            NodeRef::Instr(n) => n.span(),
        }
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        match *self {
            NodeRef::Module(m) => {
                push_ident(&mut out, &m.id);
                out.extend(m.fields.iter().map(ModuleField::node));
            }
            NodeRef::Component(c) => {
                push_ident(&mut out, &c.id);
                out.extend(c.modules.iter().map(NodeRef::Module));
            }
            NodeRef::TypeDef(t) => {
                push_ident(&mut out, &t.id);
                out.push(NodeRef::FuncType(&t.func_type));
            }
            NodeRef::FuncType(ft) => {
                out.extend(ft.params.iter().map(NodeRef::Param));
                out.extend(ft.results.iter().map(NodeRef::FuncResult));
            }
            NodeRef::Param(p) => push_ident(&mut out, &p.id),
            NodeRef::Local(l) => push_ident(&mut out, &l.id),
            NodeRef::TypeUse(tu) => {
                out.extend(tu.index.iter().map(NodeRef::Idx));
                out.extend(tu.params.iter().map(NodeRef::Param));
                out.extend(tu.results.iter().map(NodeRef::FuncResult));
            }
            NodeRef::Import(i) => {
                out.push(NodeRef::Name(&i.module));
                out.push(NodeRef::Name(&i.name));
                out.push(NodeRef::ImportDesc(&i.desc));
            }
            NodeRef::ImportDesc(d) => {
                push_ident(&mut out, &d.id);
                out.push(match &d.kind {
                    ImportKind::Func(tu) => NodeRef::TypeUse(tu),
                    ImportKind::Table(tt) => NodeRef::TableType(tt),
                    ImportKind::Memory(mt) => NodeRef::MemType(mt),
                    ImportKind::Global(gt) => NodeRef::GlobalType(gt),
                });
            }
            NodeRef::InlineImport(i) => {
                out.push(NodeRef::Name(&i.module));
                out.push(NodeRef::Name(&i.name));
            }
            NodeRef::InlineExport(e) => out.push(NodeRef::Name(&e.name)),
            NodeRef::Func(f) => {
                push_header(&mut out, &f.id, &f.exports, &f.import);
                out.push(NodeRef::TypeUse(&f.type_use));
                out.extend(f.locals.iter().map(NodeRef::Local));
                out.push(NodeRef::Expr(&f.body));
            }
            NodeRef::Table(t) => {
                push_header(&mut out, &t.id, &t.exports, &t.import);
                out.push(match &t.def {
                    TableDef::Type(tt) => NodeRef::TableType(tt),
                    TableDef::Elem { items, .. } => NodeRef::ElemItems(items),
                });
            }
            NodeRef::TableType(tt) => out.push(NodeRef::Limits(&tt.limits)),
            NodeRef::Memory(m) => {
                push_header(&mut out, &m.id, &m.exports, &m.import);
                out.push(match &m.def {
                    MemoryDef::Type(mt) => NodeRef::MemType(mt),
                    MemoryDef::Data(data) => NodeRef::InlineData(data),
                });
            }
            NodeRef::InlineData(d) => out.extend(d.strings.iter().map(NodeRef::DataString)),
            NodeRef::MemType(mt) => out.push(NodeRef::Limits(&mt.limits)),
            NodeRef::Global(g) => {
                push_header(&mut out, &g.id, &g.exports, &g.import);
                out.push(NodeRef::GlobalType(&g.global_type));
                out.push(NodeRef::Expr(&g.init));
            }
            NodeRef::Export(e) => {
                out.push(NodeRef::Name(&e.name));
                out.push(NodeRef::ExportDesc(&e.desc));
            }
            NodeRef::ExportDesc(d) => out.push(NodeRef::Idx(&d.index)),
            NodeRef::Start(s) => out.push(NodeRef::Idx(&s.func)),
            NodeRef::Elem(e) => {
                push_ident(&mut out, &e.id);
                if let ElemMode::Active { table, offset } = &e.mode {
                    out.extend(table.iter().map(NodeRef::Idx));
                    out.push(NodeRef::Expr(offset));
                }
                out.push(NodeRef::ElemItems(&e.items));
            }
            NodeRef::ElemItems(items) => match items {
                ElemItems::Funcs { indices, .. } => out.extend(indices.iter().map(NodeRef::Idx)),
                ElemItems::Exprs { exprs, .. } => out.extend(exprs.iter().map(NodeRef::Expr)),
            },
            NodeRef::Data(d) => {
                push_ident(&mut out, &d.id);
                if let DataMode::Active { memory, offset } = &d.mode {
                    out.extend(memory.iter().map(NodeRef::Idx));
                    out.push(NodeRef::Expr(offset));
                }
                out.extend(d.strings.iter().map(NodeRef::DataString));
            }
            NodeRef::Expr(e) => out.extend(e.instrs.iter().map(NodeRef::Instr)),
            NodeRef::Idx(Idx::Id(id)) => out.push(NodeRef::Ident(id)),
            NodeRef::Instr(instr) => push_instr_children(&mut out, instr),
            NodeRef::FuncResult(_)
            | NodeRef::Limits(_)
            | NodeRef::GlobalType(_)
            | NodeRef::Name(_)
            | NodeRef::DataString(_)
            | NodeRef::Ident(_)
            | NodeRef::Idx(Idx::Num { .. }) => {}
        }
        out
    }

    /// Iterate over this node and its descendants, parents first.
    pub fn walk(self) -> Walk<'a> {
        Walk { stack: vec![self] }
    }

    /// The smallest node within this one whose span contains `offset`.
    pub fn node_at(self, offset: usize) -> Option<NodeRef<'a>> {
        if !self.span().contains(offset) {
            return None;
        }
        let mut current = self;
        // Children never overlap, so at most one contains the offset.
        while let Some(child) = current
            .children()
            .into_iter()
            .find(|c| c.span().contains(offset))
        {
            current = child;
        }
        Some(current)
    }
}

fn push_ident<'a>(out: &mut Vec<NodeRef<'a>>, id: &'a Option<Ident>) {
    out.extend(id.iter().map(NodeRef::Ident));
}

fn push_header<'a>(
    out: &mut Vec<NodeRef<'a>>,
    id: &'a Option<Ident>,
    exports: &'a [InlineExport],
    import: &'a Option<InlineImport>,
) {
    push_ident(out, id);
    out.extend(exports.iter().map(NodeRef::InlineExport));
    out.extend(import.iter().map(NodeRef::InlineImport));
}

fn push_instr_children<'a>(out: &mut Vec<NodeRef<'a>>, instr: &'a Instr) {
    match instr {
        Instr::Plain(p) => {
            match &p.operands {
                Operands::CallIndirect { table, type_use } => {
                    out.extend(table.iter().map(NodeRef::Idx));
                    out.push(NodeRef::TypeUse(type_use));
                }
                Operands::Select(results) => out.extend(results.iter().map(NodeRef::FuncResult)),
                operands => out.extend(operands.indices().into_iter().map(NodeRef::Idx)),
            }
            out.extend(p.children.iter().map(NodeRef::Instr));
        }
        Instr::Block(b) => {
            push_ident(out, &b.label);
            out.push(NodeRef::TypeUse(&b.block_type));
            out.extend(b.body.iter().map(NodeRef::Instr));
            push_ident(out, &b.end_label);
        }
        Instr::If(i) => {
            push_ident(out, &i.label);
            out.push(NodeRef::TypeUse(&i.block_type));
            out.extend(i.condition.iter().map(NodeRef::Instr));
            out.extend(i.then_body.iter().map(NodeRef::Instr));
            push_ident(out, &i.else_label);
            if let Some(body) = &i.else_body {
                out.extend(body.iter().map(NodeRef::Instr));
            }
            push_ident(out, &i.end_label);
        }
    }
}

/// Pre-order iterator returned by [`NodeRef::walk`] and
/// [`Root::walk`](super::Root::walk).
pub struct Walk<'a> {
    stack: Vec<NodeRef<'a>>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().into_iter().rev());
        Some(node)
    }
}
