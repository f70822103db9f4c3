//! WAT grammar: S-expression tree -> syntax tree.
//!
//! Walks the tree from [`sexpr::read`] and builds the nodes in
//! [`crate::syntax`].
//!
//! # Design Principles
//!
//! 1. **Grammar Correspondence**: Each parsing function corresponds to a grammar
//!    production. Comments show the grammar rule being implemented.
//!
//! 2. **No Lookahead**: Because we work on a tree, not a token stream, we can
//!    always see all children of a node. No speculative parsing needed.
//!
//! 3. **Local Recovery**: A production that fails is abandoned up to the end
//!    of its own list. The error is recorded and the parent carries on with
//!    its next item. Module fields and folded instructions are the recovery
//!    points; the reader has already balanced every list, so skipping one
//!    never disturbs its siblings.
//!
//! 4. **Bounded Nesting**: Nested blocks and folded instructions live on an
//!    explicit stack, never the native one, and count against a depth limit.
//!    Exceeding it ends the parse with a [`FatalError`].
//!
//! # Grammar Reference
//!
//! Based on the WebAssembly Text Format specification:
//! <https://webassembly.github.io/spec/core/text/index.html>

use super::error::{FatalError, ParseError};
use super::keywords;
use super::sexpr::{self, SExpr, SExprList};
use super::token::{Span, Token, TokenKind};
use crate::syntax::*;

/// Default limit on nesting of lists, blocks and folded instructions.
pub const DEFAULT_MAX_DEPTH: usize = 256;

const MODULE_FIELDS: &[&str] = &[
    "type", "import", "func", "table", "memory", "global", "export", "start", "elem", "data",
];

// ============================================================================
// Results
// ============================================================================

/// The outcome of parsing a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Parse {
    /// The module or component, if the source contained one.
    pub root: Option<Root>,
    /// Every recoverable error, ordered by source offset.
    pub errors: Vec<ParseError>,
    /// Comment tokens in source order.
    pub comments: Vec<Token>,
}

impl Parse {
    /// True when a root was found and nothing was reported.
    pub fn is_clean(&self) -> bool {
        self.root.is_some() && self.errors.is_empty()
    }

    pub fn module(&self) -> Option<&Module> {
        match &self.root {
            Some(Root::Module(m)) => Some(m),
            _ => None,
        }
    }
}

/// Why a production did not produce a node.
pub(crate) enum Failure {
    /// A grammar mismatch, to be recorded at the nearest recovery point.
    Syntax(ParseError),
    /// The production ran into a token that already failed to lex. Nothing
    /// more is recorded.
    Abandoned,
    /// The parse cannot continue.
    Fatal(FatalError),
}

impl From<ParseError> for Failure {
    fn from(e: ParseError) -> Self {
        Failure::Syntax(e)
    }
}

impl From<FatalError> for Failure {
    fn from(e: FatalError) -> Self {
        Failure::Fatal(e)
    }
}

pub(crate) type PResult<T> = Result<T, Failure>;

/// The failure for finding `item` where one of `expected` was required.
pub(crate) fn unexpected(item: &SExpr, expected: &[&str]) -> Failure {
    if item.is_invalid() {
        Failure::Abandoned
    } else {
        Failure::Syntax(ParseError::expected(expected, item.describe(), item.span()))
    }
}

pub(crate) fn out_of_range(span: Span) -> Failure {
    Failure::Syntax(ParseError::syntax("constant out of range", span))
}

// ============================================================================
// Entry points
// ============================================================================

/// Parser configuration.
///
/// ```
/// use watparse::Parser;
///
/// let parse = Parser::new().max_depth(32).parse("(module)").unwrap();
/// assert!(parse.is_clean());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Parser {
    max_depth: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit nesting of lists, blocks and folded instructions.
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Parse a WAT source file.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError::NestingTooDeep`] when the source nests deeper
    /// than the configured limit. All other problems are reported in
    /// [`Parse::errors`] alongside a best-effort tree.
    pub fn parse(&self, source: &str) -> Result<Parse, FatalError> {
        let read = sexpr::read(source, self.max_depth)?;

        let mut ctx = ParseContext {
            errors: read.errors,
            max_depth: self.max_depth,
        };
        let root = ctx.root(&read.forms, source)?;

        let mut errors = ctx.errors;
        errors.sort_by_key(|e| e.span.start);

        Ok(Parse {
            root,
            errors,
            comments: read.comments,
        })
    }
}

/// Parse a WAT source file with the default configuration.
///
/// # Example
///
/// ```
/// let parse = watparse::parse("(module (func) (garbage) (func))").unwrap();
/// let module = parse.module().unwrap();
/// assert_eq!(module.fields.len(), 2);
/// assert_eq!(parse.errors.len(), 1);
/// ```
///
/// # Errors
///
/// See [`Parser::parse`].
pub fn parse(source: &str) -> Result<Parse, FatalError> {
    Parser::new().parse(source)
}

// ============================================================================
// Parse Context
// ============================================================================

/// State threaded through the grammar.
pub(crate) struct ParseContext {
    errors: Vec<ParseError>,
    max_depth: usize,
}

impl ParseContext {
    /// Turn a failed production into a recorded error.
    pub(super) fn recover<T>(&mut self, result: PResult<T>) -> Result<Option<T>, FatalError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(Failure::Syntax(e)) => {
                self.errors.push(e);
                Ok(None)
            }
            Err(Failure::Abandoned) => Ok(None),
            Err(Failure::Fatal(e)) => Err(e),
        }
    }

    /// Fail when opening a level at `depth` would pass the limit.
    pub(super) fn enter(&self, depth: usize, span: Span) -> PResult<()> {
        if depth >= self.max_depth {
            return Err(Failure::Fatal(FatalError::NestingTooDeep {
                limit: self.max_depth,
                span,
            }));
        }
        Ok(())
    }
}

// ============================================================================
// List cursor
// ============================================================================

/// A cursor over the items of one list.
#[derive(Clone, Copy)]
pub(crate) struct Items<'a> {
    list: SExprList<'a>,
    pos: usize,
}

impl<'a> Items<'a> {
    pub(super) fn new(list: SExprList<'a>) -> Self {
        Self { list, pos: 0 }
    }

    /// A cursor positioned after the head keyword.
    pub(super) fn after_head(list: SExprList<'a>) -> Self {
        Self { list, pos: 1 }
    }

    pub(super) fn peek(&self) -> Option<&'a SExpr> {
        self.list.get(self.pos)
    }

    pub(super) fn peek_keyword(&self) -> Option<&'a str> {
        self.peek().and_then(SExpr::as_keyword)
    }

    /// Whether the next item is a list headed by `keyword`.
    pub(super) fn peek_list(&self, keyword: &str) -> bool {
        self.peek().map_or(false, |s| s.is_list_headed_by(keyword))
    }

    pub(super) fn next(&mut self) -> Option<&'a SExpr> {
        let item = self.list.get(self.pos)?;
        self.pos += 1;
        Some(item)
    }

    /// The next item, which must be a list headed by `keyword`.
    pub(super) fn next_list(&mut self, keyword: &str) -> Option<SExprList<'a>> {
        if self.peek_list(keyword) {
            self.next().and_then(SExpr::as_list)
        } else {
            None
        }
    }

    /// The next item, or an error naming what was expected.
    pub(super) fn expect(&mut self, expected: &[&str]) -> PResult<&'a SExpr> {
        self.next().ok_or_else(|| self.missing(expected))
    }

    /// The failure for running out of items where one of `expected` was
    /// required.
    pub(super) fn missing(&self, expected: &[&str]) -> Failure {
        let found = if self.list.close.is_some() {
            "')'"
        } else {
            "end of input"
        };
        Failure::Syntax(ParseError::expected(expected, found, self.here()))
    }

    /// Require that every item has been consumed.
    pub(super) fn finish(&self) -> PResult<()> {
        match self.peek() {
            Some(item) => Err(unexpected(item, &["')'"])),
            None => Ok(()),
        }
    }

    pub(super) fn position(&self) -> usize {
        self.pos
    }

    /// A zero-length span where the next item starts, or before the closing
    /// paren when there is none.
    pub(super) fn here(&self) -> Span {
        match self.peek() {
            Some(item) => item.span().at_start(),
            None => self.list.end_point(),
        }
    }

    /// The span from `start` to the end of the last consumed item, or
    /// `start` itself if nothing was consumed since position `from`.
    pub(super) fn span_since(&self, from: usize, start: Span) -> Span {
        if self.pos > from {
            match self.list.get(self.pos - 1) {
                Some(last) => start.to(last.span()),
                None => start,
            }
        } else {
            start
        }
    }

    /// Consume an optional `$id`.
    pub(super) fn take_id(&mut self) -> Option<Ident> {
        let ident = ident(self.peek()?)?;
        self.pos += 1;
        Some(ident)
    }

    /// Consume an optional index.
    pub(super) fn take_index(&mut self) -> PResult<Option<Idx>> {
        match self.peek() {
            Some(item) if is_index(item) => {
                self.pos += 1;
                index(item).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Consume a required index.
    pub(super) fn index(&mut self, what: &str) -> PResult<Idx> {
        let item = self.expect(&[what])?;
        if is_index(item) {
            index(item)
        } else {
            Err(unexpected(item, &[what]))
        }
    }
}

// ============================================================================
// Top level
// ============================================================================

impl ParseContext {
    fn root(&mut self, forms: &[SExpr], source: &str) -> Result<Option<Root>, FatalError> {
        let mut root = None;

        for form in forms {
            if form.is_invalid() {
                continue;
            }
            if root.is_some() {
                self.errors
                    .push(ParseError::expected(&[], form.describe(), form.span()));
                continue;
            }
            let list = match form.as_list() {
                Some(list) if matches!(list.head_keyword(), Some("module") | Some("component")) => list,
                _ => {
                    self.errors.push(ParseError::expected(
                        &["'(module ...)'", "'(component ...)'"],
                        form.describe(),
                        form.span(),
                    ));
                    continue;
                }
            };
            root = Some(if list.head_keyword() == Some("module") {
                Root::Module(self.module_body(list, Items::after_head(list))?)
            } else {
                Root::Component(self.component(list)?)
            });
        }

        if forms.is_empty() {
            self.errors.push(ParseError::expected(
                &["'(module ...)'", "'(component ...)'"],
                "end of input",
                Span::end_of(source),
            ));
        }

        Ok(root)
    }

    /// module ::= '(' 'module' id? field* ')'
    fn module_body(&mut self, list: SExprList<'_>, mut items: Items<'_>) -> Result<Module, FatalError> {
        let id = items.take_id();
        let mut fields = Vec::new();

        while let Some(item) = items.next() {
            let result = match item.as_list() {
                Some(field) => self.field(field),
                None => Err(unexpected(item, &["module field"])),
            };
            if let Some(field) = self.recover(result)? {
                fields.push(field);
            }
        }

        Ok(Module {
            span: list.span,
            id,
            fields,
        })
    }

    /// component ::= '(' 'component' id? ('(' 'core' 'module' id? field* ')')* ')'
    fn component(&mut self, list: SExprList<'_>) -> Result<Component, FatalError> {
        let mut items = Items::after_head(list);
        let id = items.take_id();
        let mut modules = Vec::new();

        while let Some(item) = items.next() {
            let result = self.core_module(item);
            if let Some(module) = self.recover(result)? {
                modules.push(module);
            }
        }

        Ok(Component {
            span: list.span,
            id,
            modules,
        })
    }

    fn core_module(&mut self, item: &SExpr) -> PResult<Module> {
        let list = match item.as_list() {
            Some(list) if list.head_keyword() == Some("core") => list,
            _ => return Err(unexpected(item, &["'(core module ...)'"])),
        };
        let mut items = Items::after_head(list);
        match items.next() {
            Some(kw) if kw.as_keyword() == Some("module") => {}
            Some(other) => return Err(unexpected(other, &["module"])),
            None => return Err(items.missing(&["module"])),
        }
        Ok(self.module_body(list, items)?)
    }

    fn field(&mut self, list: SExprList<'_>) -> PResult<ModuleField> {
        match list.head_keyword() {
            Some("type") => self.type_def(list).map(ModuleField::Type),
            Some("import") => self.import(list).map(ModuleField::Import),
            Some("func") => self.func(list).map(ModuleField::Func),
            Some("table") => self.table(list).map(ModuleField::Table),
            Some("memory") => self.memory(list).map(ModuleField::Memory),
            Some("global") => self.global(list).map(ModuleField::Global),
            Some("export") => self.export(list).map(ModuleField::Export),
            Some("start") => self.start(list).map(ModuleField::Start),
            Some("elem") => self.elem(list).map(ModuleField::Elem),
            Some("data") => self.data(list).map(ModuleField::Data),
            _ => match list.head() {
                Some(head) if head.is_invalid() => Err(Failure::Abandoned),
                _ => Err(Failure::Syntax(ParseError::expected(
                    MODULE_FIELDS,
                    list.describe(),
                    list.span,
                ))),
            },
        }
    }
}

// ============================================================================
// Types
// ============================================================================

impl ParseContext {
    /// type ::= '(' 'type' id? functype ')'
    fn type_def(&mut self, list: SExprList<'_>) -> PResult<TypeDef> {
        let mut items = Items::after_head(list);
        let id = items.take_id();
        let func_type = match items.next_list("func") {
            Some(ft) => func_type(ft)?,
            None => {
                return Err(match items.peek() {
                    Some(item) => unexpected(item, &["'(func ...)'"]),
                    None => items.missing(&["'(func ...)'"]),
                })
            }
        };
        items.finish()?;

        Ok(TypeDef {
            span: list.span,
            id,
            func_type,
        })
    }

    /// typeuse ::= ('(' 'type' idx ')')? param* result*
    pub(super) fn type_use(&mut self, items: &mut Items<'_>) -> PResult<TypeUse> {
        let start = items.here();
        let from = items.position();

        let index = match items.next_list("type") {
            Some(list) => {
                let mut inner = Items::after_head(list);
                let idx = inner.index("type index")?;
                inner.finish()?;
                Some(idx)
            }
            None => None,
        };
        let (params, results) = params_and_results(items)?;

        Ok(TypeUse {
            span: items.span_since(from, start),
            index,
            params,
            results,
        })
    }
}

/// functype ::= '(' 'func' param* result* ')'
fn func_type(list: SExprList<'_>) -> PResult<FuncType> {
    let mut items = Items::after_head(list);
    let (params, results) = params_and_results(&mut items)?;
    items.finish()?;
    Ok(FuncType {
        span: list.span,
        params,
        results,
    })
}

fn params_and_results(items: &mut Items<'_>) -> PResult<(Vec<Param>, Vec<FuncResult>)> {
    let mut params = Vec::new();
    while let Some(list) = items.next_list("param") {
        params.push(param(list)?);
    }
    let mut results = Vec::new();
    while let Some(list) = items.next_list("result") {
        results.push(func_result(list)?);
    }
    Ok((params, results))
}

/// param ::= '(' 'param' id valtype ')' | '(' 'param' valtype* ')'
fn param(list: SExprList<'_>) -> PResult<Param> {
    let (id, types) = declaration(list)?;
    Ok(Param {
        span: list.span,
        id,
        types,
    })
}

/// local ::= '(' 'local' id valtype ')' | '(' 'local' valtype* ')'
fn local(list: SExprList<'_>) -> PResult<Local> {
    let (id, types) = declaration(list)?;
    Ok(Local {
        span: list.span,
        id,
        types,
    })
}

/// The body shared by `param` and `local`: a named declaration has exactly
/// one type, an anonymous one any number.
fn declaration(list: SExprList<'_>) -> PResult<(Option<Ident>, Vec<ValueType>)> {
    let mut items = Items::after_head(list);
    let id = items.take_id();

    let mut types = Vec::new();
    if id.is_some() {
        types.push(value_type(items.expect(&["value type"])?)?);
        items.finish()?;
    } else {
        while let Some(item) = items.next() {
            types.push(value_type(item)?);
        }
    }

    Ok((id, types))
}

/// result ::= '(' 'result' valtype* ')'
pub(super) fn func_result(list: SExprList<'_>) -> PResult<FuncResult> {
    let mut items = Items::after_head(list);
    let mut types = Vec::new();
    while let Some(item) = items.next() {
        types.push(value_type(item)?);
    }
    Ok(FuncResult {
        span: list.span,
        types,
    })
}

fn value_type(item: &SExpr) -> PResult<ValueType> {
    item.as_keyword()
        .and_then(keywords::value_type)
        .ok_or_else(|| unexpected(item, &["value type"]))
}

fn ref_type(item: &SExpr) -> PResult<RefType> {
    item.as_keyword()
        .and_then(keywords::ref_type)
        .ok_or_else(|| unexpected(item, &["reference type"]))
}

/// limits ::= u32 u32?
fn limits(items: &mut Items<'_>) -> PResult<Limits> {
    let first = items.expect(&["limit"])?;
    let min = u32_literal(first)?;
    let mut span = first.span();

    let max = match items.peek() {
        Some(item) if is_integer(item) => {
            items.next();
            span = span.to(item.span());
            Some(u32_literal(item)?)
        }
        _ => None,
    };

    Ok(Limits { span, min, max })
}

/// tabletype ::= limits reftype
fn table_type(items: &mut Items<'_>) -> PResult<TableType> {
    let limits = limits(items)?;
    let item = items.expect(&["reference type"])?;
    let ref_type = ref_type(item)?;
    Ok(TableType {
        span: limits.span.to(item.span()),
        limits,
        ref_type,
    })
}

/// memtype ::= limits
fn mem_type(items: &mut Items<'_>) -> PResult<MemType> {
    let limits = limits(items)?;
    Ok(MemType {
        span: limits.span,
        limits,
    })
}

/// globaltype ::= valtype | '(' 'mut' valtype ')'
fn global_type(items: &mut Items<'_>) -> PResult<GlobalType> {
    if let Some(list) = items.next_list("mut") {
        let mut inner = Items::after_head(list);
        let value_type = value_type(inner.expect(&["value type"])?)?;
        inner.finish()?;
        return Ok(GlobalType {
            span: list.span,
            mutable: true,
            value_type,
        });
    }

    let item = items.expect(&["global type"])?;
    if item.as_list().is_some() {
        return Err(unexpected(item, &["value type", "'(mut ...)'"]));
    }
    Ok(GlobalType {
        span: item.span(),
        mutable: false,
        value_type: value_type(item)?,
    })
}

// ============================================================================
// Imports and exports
// ============================================================================

impl ParseContext {
    /// import ::= '(' 'import' name name importdesc ')'
    fn import(&mut self, list: SExprList<'_>) -> PResult<Import> {
        let mut items = Items::after_head(list);
        let module = name(items.expect(&["module name"])?)?;
        let field = name(items.expect(&["import name"])?)?;

        let desc_item = items.expect(&["import description"])?;
        let desc = match desc_item.as_list() {
            Some(desc) => self.import_desc(desc)?,
            None => return Err(unexpected(desc_item, &["import description"])),
        };
        items.finish()?;

        Ok(Import {
            span: list.span,
            module,
            name: field,
            desc,
        })
    }

    /// importdesc ::= '(' 'func' id? typeuse ')'
    ///              | '(' 'table' id? tabletype ')'
    ///              | '(' 'memory' id? memtype ')'
    ///              | '(' 'global' id? globaltype ')'
    fn import_desc(&mut self, list: SExprList<'_>) -> PResult<ImportDesc> {
        let mut items = Items::after_head(list);
        let id = items.take_id();

        let kind = match list.head_keyword() {
            Some("func") => ImportKind::Func(self.type_use(&mut items)?),
            Some("table") => ImportKind::Table(table_type(&mut items)?),
            Some("memory") => ImportKind::Memory(mem_type(&mut items)?),
            Some("global") => ImportKind::Global(global_type(&mut items)?),
            _ => {
                let expected = &["func", "table", "memory", "global"];
                return Err(match list.head() {
                    Some(head) => unexpected(head, expected),
                    None => Items::new(list).missing(expected),
                });
            }
        };
        items.finish()?;

        Ok(ImportDesc {
            span: list.span,
            id,
            kind,
        })
    }

    /// export ::= '(' 'export' name exportdesc ')'
    fn export(&mut self, list: SExprList<'_>) -> PResult<Export> {
        let mut items = Items::after_head(list);
        let name = name(items.expect(&["export name"])?)?;

        let expected = &["'(func ...)'", "'(table ...)'", "'(memory ...)'", "'(global ...)'"];
        let desc_item = items.expect(expected)?;
        let desc_list = desc_item.as_list().ok_or_else(|| unexpected(desc_item, expected))?;
        let kind = match desc_list.head_keyword() {
            Some("func") => ExternKind::Func,
            Some("table") => ExternKind::Table,
            Some("memory") => ExternKind::Memory,
            Some("global") => ExternKind::Global,
            _ => return Err(unexpected(desc_item, expected)),
        };
        let mut inner = Items::after_head(desc_list);
        let index = inner.index("index")?;
        inner.finish()?;
        items.finish()?;

        Ok(Export {
            span: list.span,
            name,
            desc: ExportDesc {
                span: desc_list.span,
                kind,
                index,
            },
        })
    }
}

/// The `(export "name")*` abbreviations at the start of a definition.
fn inline_exports(items: &mut Items<'_>) -> PResult<Vec<InlineExport>> {
    let mut exports = Vec::new();
    while let Some(list) = items.next_list("export") {
        let mut inner = Items::after_head(list);
        let name = name(inner.expect(&["export name"])?)?;
        inner.finish()?;
        exports.push(InlineExport { span: list.span, name });
    }
    Ok(exports)
}

/// The optional `(import "module" "name")` abbreviation.
fn inline_import(items: &mut Items<'_>) -> PResult<Option<InlineImport>> {
    let Some(list) = items.next_list("import") else {
        return Ok(None);
    };
    let mut inner = Items::after_head(list);
    let module = name(inner.expect(&["module name"])?)?;
    let field = name(inner.expect(&["import name"])?)?;
    inner.finish()?;
    Ok(Some(InlineImport {
        span: list.span,
        module,
        name: field,
    }))
}

// ============================================================================
// Definitions
// ============================================================================

impl ParseContext {
    /// func ::= '(' 'func' id? export* import? typeuse local* instr* ')'
    fn func(&mut self, list: SExprList<'_>) -> PResult<Func> {
        let mut items = Items::after_head(list);
        let id = items.take_id();
        let exports = inline_exports(&mut items)?;
        let import = inline_import(&mut items)?;
        let type_use = self.type_use(&mut items)?;

        let mut locals = Vec::new();
        let body = if import.is_some() {
            items.finish()?;
            empty_expr(&items)
        } else {
            while let Some(local_list) = items.next_list("local") {
                locals.push(local(local_list)?);
            }
            self.instr_expr(&mut items)?
        };

        Ok(Func {
            span: list.span,
            id,
            exports,
            import,
            type_use,
            locals,
            body,
        })
    }

    /// table ::= '(' 'table' id? export* import? tabletype ')'
    ///         | '(' 'table' id? export* reftype '(' 'elem' elemitems ')' ')'
    fn table(&mut self, list: SExprList<'_>) -> PResult<Table> {
        let mut items = Items::after_head(list);
        let id = items.take_id();
        let exports = inline_exports(&mut items)?;
        let import = inline_import(&mut items)?;

        let inline_elem = import.is_none()
            && items.peek_keyword().and_then(keywords::ref_type).is_some()
            && items.list.get(items.pos + 1).map_or(false, |s| s.is_list_headed_by("elem"));

        let def = if inline_elem {
            let ref_type = ref_type(items.expect(&["reference type"])?)?;
            let elem_list = items.next_list("elem").ok_or_else(|| items.missing(&["'(elem ...)'"]))?;
            let mut inner = Items::after_head(elem_list);
            let mut elems = if matches!(inner.peek(), Some(SExpr::List { .. })) {
                self.elem_exprs(&mut inner, ref_type)?
            } else {
                elem_funcs(&mut inner)?
            };
            inner.finish()?;
            set_elem_span(&mut elems, elem_list.span);
            TableDef::Elem { ref_type, items: elems }
        } else {
            TableDef::Type(table_type(&mut items)?)
        };
        items.finish()?;

        Ok(Table {
            span: list.span,
            id,
            exports,
            import,
            def,
        })
    }

    /// memory ::= '(' 'memory' id? export* import? memtype ')'
    ///          | '(' 'memory' id? export* '(' 'data' string* ')' ')'
    fn memory(&mut self, list: SExprList<'_>) -> PResult<Memory> {
        let mut items = Items::after_head(list);
        let id = items.take_id();
        let exports = inline_exports(&mut items)?;
        let import = inline_import(&mut items)?;

        let def = match items.next_list("data") {
            Some(data_list) if import.is_none() => {
                let mut inner = Items::after_head(data_list);
                MemoryDef::Data(InlineData {
                    span: data_list.span,
                    strings: data_strings(&mut inner)?,
                })
            }
            Some(_) => return Err(out_of_place(list, "inline data in an imported memory")),
            None => MemoryDef::Type(mem_type(&mut items)?),
        };
        items.finish()?;

        Ok(Memory {
            span: list.span,
            id,
            exports,
            import,
            def,
        })
    }

    /// global ::= '(' 'global' id? export* import? globaltype expr ')'
    fn global(&mut self, list: SExprList<'_>) -> PResult<Global> {
        let mut items = Items::after_head(list);
        let id = items.take_id();
        let exports = inline_exports(&mut items)?;
        let import = inline_import(&mut items)?;
        let global_type = global_type(&mut items)?;

        let init = if import.is_some() {
            items.finish()?;
            empty_expr(&items)
        } else {
            self.instr_expr(&mut items)?
        };

        Ok(Global {
            span: list.span,
            id,
            exports,
            import,
            global_type,
            init,
        })
    }

    /// start ::= '(' 'start' idx ')'
    fn start(&mut self, list: SExprList<'_>) -> PResult<Start> {
        let mut items = Items::after_head(list);
        let func = items.index("function index")?;
        items.finish()?;
        Ok(Start { span: list.span, func })
    }

    /// elem ::= '(' 'elem' id? elemlist ')'
    ///        | '(' 'elem' id? 'declare' elemlist ')'
    ///        | '(' 'elem' id? ('(' 'table' idx ')')? offset elemlist ')'
    ///        | '(' 'elem' id? offset idx* ')'
    fn elem(&mut self, list: SExprList<'_>) -> PResult<Elem> {
        let mut items = Items::after_head(list);
        let id = items.take_id();

        let mode = if items.peek_keyword() == Some("declare") {
            items.next();
            ElemMode::Declare
        } else if let Some(table_list) = items.next_list("table") {
            let mut inner = Items::after_head(table_list);
            let table = inner.index("table index")?;
            inner.finish()?;
            ElemMode::Active {
                table: Some(table),
                offset: self.offset(&mut items)?,
            }
        } else if matches!(items.peek(), Some(SExpr::List { .. })) {
            ElemMode::Active {
                table: None,
                offset: self.offset(&mut items)?,
            }
        } else {
            ElemMode::Passive
        };

        let start = items.here();
        let from = items.position();
        let mut elem_items = match items.peek_keyword() {
            Some("func") => {
                items.next();
                elem_funcs(&mut items)?
            }
            Some(kw) if keywords::ref_type(kw).is_some() => {
                let ref_type = ref_type(items.expect(&["reference type"])?)?;
                self.elem_exprs(&mut items, ref_type)?
            }
            _ if matches!(mode, ElemMode::Active { .. }) => elem_funcs(&mut items)?,
            _ => {
                return Err(match items.peek() {
                    Some(item) => unexpected(item, &["func", "funcref", "externref"]),
                    None => items.missing(&["func", "funcref", "externref"]),
                })
            }
        };
        set_elem_span(&mut elem_items, items.span_since(from, start));
        items.finish()?;

        Ok(Elem {
            span: list.span,
            id,
            mode,
            items: elem_items,
        })
    }

    /// elemexpr ::= '(' 'item' instr* ')' | foldedinstr
    fn elem_exprs(&mut self, items: &mut Items<'_>, ref_type: RefType) -> PResult<ElemItems> {
        let mut exprs = Vec::new();
        while let Some(item) = items.next() {
            let list = item.as_list().ok_or_else(|| unexpected(item, &["element expression"]))?;
            exprs.push(self.wrapped_expr(list, "item")?);
        }
        Ok(ElemItems::Exprs {
            span: Span::ZERO,
            ref_type,
            exprs,
        })
    }

    /// data ::= '(' 'data' id? string* ')'
    ///        | '(' 'data' id? ('(' 'memory' idx ')')? offset string* ')'
    fn data(&mut self, list: SExprList<'_>) -> PResult<Data> {
        let mut items = Items::after_head(list);
        let id = items.take_id();

        let mode = if let Some(memory_list) = items.next_list("memory") {
            let mut inner = Items::after_head(memory_list);
            let memory = inner.index("memory index")?;
            inner.finish()?;
            DataMode::Active {
                memory: Some(memory),
                offset: self.offset(&mut items)?,
            }
        } else if matches!(items.peek(), Some(SExpr::List { .. })) {
            DataMode::Active {
                memory: None,
                offset: self.offset(&mut items)?,
            }
        } else {
            DataMode::Passive
        };

        let strings = data_strings(&mut items)?;

        Ok(Data {
            span: list.span,
            id,
            mode,
            strings,
        })
    }

    /// offset ::= '(' 'offset' instr* ')' | foldedinstr
    fn offset(&mut self, items: &mut Items<'_>) -> PResult<Expr> {
        let item = items.expect(&["offset expression"])?;
        let list = item.as_list().ok_or_else(|| unexpected(item, &["offset expression"]))?;
        self.wrapped_expr(list, "offset")
    }

    /// Either `(keyword instr*)` or a single folded instruction standing in
    /// for it.
    fn wrapped_expr(&mut self, list: SExprList<'_>, keyword: &str) -> PResult<Expr> {
        if list.head_keyword() == Some(keyword) {
            let mut inner = Items::after_head(list);
            let instrs = self.instrs(&mut inner, &[])?;
            Ok(Expr {
                span: list.span,
                instrs,
            })
        } else {
            let instr = self.folded(list)?;
            Ok(Expr {
                span: list.span,
                instrs: vec![instr],
            })
        }
    }

    /// The instructions filling the rest of a list.
    fn instr_expr(&mut self, items: &mut Items<'_>) -> PResult<Expr> {
        let start = items.here();
        let from = items.position();
        let instrs = self.instrs(items, &[])?;
        Ok(Expr {
            span: items.span_since(from, start),
            instrs,
        })
    }
}

fn empty_expr(items: &Items<'_>) -> Expr {
    Expr {
        span: items.here(),
        instrs: Vec::new(),
    }
}

fn elem_funcs(items: &mut Items<'_>) -> PResult<ElemItems> {
    let mut indices = Vec::new();
    while let Some(item) = items.next() {
        if !is_index(item) {
            return Err(unexpected(item, &["function index", "')'"]));
        }
        indices.push(index(item)?);
    }
    Ok(ElemItems::Funcs {
        span: Span::ZERO,
        indices,
    })
}

fn set_elem_span(items: &mut ElemItems, new_span: Span) {
    match items {
        ElemItems::Funcs { span, .. } | ElemItems::Exprs { span, .. } => *span = new_span,
    }
}

fn data_strings(items: &mut Items<'_>) -> PResult<Vec<DataString>> {
    let mut strings = Vec::new();
    while let Some(item) = items.next() {
        match item.as_atom() {
            Some(Token {
                kind: TokenKind::String(bytes),
                span,
            }) => strings.push(DataString {
                span: *span,
                bytes: bytes.clone(),
            }),
            _ => return Err(unexpected(item, &["string", "')'"])),
        }
    }
    Ok(strings)
}

fn out_of_place(list: SExprList<'_>, what: &str) -> Failure {
    Failure::Syntax(ParseError::syntax(format!("unexpected {}", what), list.span))
}

// ============================================================================
// Atoms
// ============================================================================

fn ident(item: &SExpr) -> Option<Ident> {
    match item {
        SExpr::Atom(Token {
            kind: TokenKind::Id(name),
            span,
        }) => Some(Ident {
            span: *span,
            name: name.clone(),
        }),
        _ => None,
    }
}

/// An unsigned integer or an identifier.
pub(super) fn is_index(item: &SExpr) -> bool {
    match item.as_atom().map(|t| &t.kind) {
        Some(TokenKind::Id(_)) => true,
        Some(kind) => kind.as_integer().map_or(false, |sv| !sv.has_sign),
        None => false,
    }
}

fn is_integer(item: &SExpr) -> bool {
    item.as_atom().map_or(false, |t| t.kind.as_integer().is_some())
}

/// idx ::= u32 | id
pub(super) fn index(item: &SExpr) -> PResult<Idx> {
    if let Some(ident) = ident(item) {
        return Ok(Idx::Id(ident));
    }
    let value = u32_literal(item).map_err(|e| match e {
        Failure::Syntax(err) if err.found.is_some() => unexpected(item, &["index"]),
        other => other,
    })?;
    Ok(Idx::Num {
        span: item.span(),
        value,
    })
}

/// An unsigned 32-bit integer literal.
pub(super) fn u32_literal(item: &SExpr) -> PResult<u32> {
    let token = item.as_atom().ok_or_else(|| unexpected(item, &["integer"]))?;
    match token.kind.as_integer() {
        Some(sv) if !sv.has_sign => u32::try_from(sv.value).map_err(|_| out_of_range(token.span)),
        _ => Err(unexpected(item, &["integer"])),
    }
}

/// name ::= string, which must be valid UTF-8.
fn name(item: &SExpr) -> PResult<Name> {
    match item.as_atom() {
        Some(Token {
            kind: TokenKind::String(bytes),
            span,
        }) => String::from_utf8(bytes.clone())
            .map(|value| Name { span: *span, value })
            .map_err(|_| Failure::Syntax(ParseError::syntax("malformed UTF-8 encoding", *span))),
        _ => Err(unexpected(item, &["string"])),
    }
}

// ============================================================================
// Tests
// ============================================================================


// ============================================================================
// Property-based tests
// ============================================================================
