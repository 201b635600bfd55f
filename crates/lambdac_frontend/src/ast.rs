//! Surface AST (spec §3, §6): the grammar the lexer/parser collaborator
//! produces and the first tier the compiler core consumes.

use crate::error::Span;

/// A single segment of a relative path expression
/// `(crate|self|super|NAME)(::NAME)*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Crate,
    SelfMod,
    Super,
    Name(String),
}

/// `(crate|self|super|NAME)(::NAME)*`, unresolved.
///
/// The resolver (C3) interprets the leading segment(s) per spec §4.2's
/// rules and absolutizes the whole thing into an HLIR `Absolute` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativePath {
    pub segments: Vec<PathSegment>,
    pub span: Span,
}

/// Macro literal forms (spec §3, §4.3): desugared away before HLIR by C4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Macro {
    /// `!"..."`: a decoded byte string.
    String(Vec<u8>),
    /// `!'x'`: a single byte.
    Char(u8),
    /// `!N`: an unbounded decimal numeral, kept as its digit string so
    /// arbitrarily large literals can still be desugared into `std::dec_k`
    /// chains without truncation.
    Number(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Paren(Box<Expr>),
    Call(Box<Expr>, Box<Expr>),
    Lambda { param: String, body: Box<Expr>, span: Span },
    Ident(String, Span),
    RelPath(RelativePath),
    Macro(Macro, Span),
    /// `...`: a stub body, only legal in a `.hlis` interface file (spec
    /// §4.1). The loader rejects it anywhere else once a crate has been
    /// fully linked.
    Ellipsis(Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Paren(inner) => inner.span(),
            Expr::Call(fn_, _) => fn_.span(),
            Expr::Lambda { span, .. } => span.clone(),
            Expr::Ident(_, span) => span.clone(),
            Expr::RelPath(p) => p.span.clone(),
            Expr::Macro(_, span) => span.clone(),
            Expr::Ellipsis(span) => span.clone(),
        }
    }
}

/// A top-level surface declaration (spec §3, §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    ExternCrate { name: String, span: Span },
    /// `extern impure NAME ;` — a symbol supplied by the C runtime/ABI,
    /// only referenceable from impure contexts (spec §4.2's purity rule).
    Extern { name: String, span: Span },
    Mod { name: String, is_public: bool, span: Span },
    /// `use PATH (as NAME)? ;` or the wildcard form `use PATH::* ;`.
    Import {
        path: RelativePath,
        /// `Some(name)` for a single-name import (optionally renamed via
        /// `as`); `None` for a wildcard import.
        name: Option<String>,
        is_wildcard: bool,
        is_public: bool,
        span: Span,
    },
    Assignment {
        name: String,
        value: Expr,
        is_public: bool,
        is_impure: bool,
        span: Span,
    },
}

impl Statement {
    pub fn span(&self) -> &Span {
        match self {
            Statement::ExternCrate { span, .. }
            | Statement::Extern { span, .. }
            | Statement::Mod { span, .. }
            | Statement::Import { span, .. }
            | Statement::Assignment { span, .. } => span,
        }
    }
}

/// A parsed source file: all statements in file order.
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    pub statements: Vec<Statement>,
}
