//! High-level IR (spec §3, §4.2): the output of name resolution (C3).
//!
//! Every path here is absolute (crate name first); all `self`/`super`/`crate`
//! relative forms and import aliasing from the surface AST have already been
//! resolved away. Lambdas at this tier carry no capture information — that is
//! only computed during CPS/closure conversion's continuation pass (C5).

use crate::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Placeholder body of a stub declaration loaded from a `.hlis`
    /// interface file (spec §4.1); never appears in a fully linked program.
    Ellipsis,
    Paren(Box<Expr>),
    Call(Box<Expr>, Box<Expr>),
    /// A lambda still in surface shape: one parameter, one body expression.
    Lambda { name: String, body: Box<Expr> },
    /// A reference to a lambda parameter or other local binder.
    Ident(String),
    /// A reference to a top-level definition or extern, by absolute path.
    Absolute(Path),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    ExternCrate { name: String },
    /// An impure symbol supplied by the runtime, keyed by its absolute path.
    Extern { name: String },
    Assignment {
        path: Path,
        value: Expr,
        is_public: bool,
        is_impure: bool,
    },
    /// A re-export: `path` now also resolves to whatever `target` resolves
    /// to. Only emitted for aliases of definitions that are themselves
    /// publicly reachable (spec §4.2's re-export rule).
    Alias {
        path: Path,
        target: Path,
        is_public: bool,
    },
}

impl Statement {
    pub fn is_public(&self) -> bool {
        match self {
            Statement::ExternCrate { .. } => false,
            Statement::Extern { .. } => false,
            Statement::Assignment { is_public, .. } => *is_public,
            Statement::Alias { is_public, .. } => *is_public,
        }
    }
}

/// A fully resolved crate: every statement it contributes, in dependency-
/// respecting traversal order (spec §4.2, §5's ordering guarantee).
#[derive(Debug, Clone, Default)]
pub struct Crate {
    pub name: String,
    pub statements: Vec<Statement>,
}

impl Crate {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), statements: Vec::new() }
    }

    pub fn definitions(&self) -> impl Iterator<Item = (&Path, &Expr, bool, bool)> {
        self.statements.iter().filter_map(|stmt| match stmt {
            Statement::Assignment { path, value, is_public, is_impure } => {
                Some((path, value, *is_public, *is_impure))
            }
            _ => None,
        })
    }
}

/// A whole resolved program: every crate the entry crate transitively
/// depends on, plus the entry crate itself. `crates` is in incidental
/// discovery order, not necessarily dependency order — callers that need
/// a true topological order should derive it from each crate's
/// [`Statement::ExternCrate`] entries (component C9).
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub entry_crate: String,
    pub crates: Vec<Crate>,
}
