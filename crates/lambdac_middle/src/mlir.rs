//! Mid-level IR (spec §4, components C5-C7).
//!
//! A definition's value is split into flat `Implementation`s: single-step
//! function bodies of shape `Return`/`TailCall`/`ContinueCall`, each
//! closing over a dense, index-addressed capture list (argument always at
//! index 0). `Instance`s are materialized closures — an `Implementation`
//! paired with concrete capture values.

use lambdac_frontend::path::{ImplementationPath, InstancePath, Path};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueLiteral {
    /// The value captured at index `id` of the enclosing implementation
    /// (index 0 is always the implementation's own argument).
    Capture(u32),
    /// A symbol supplied by the C runtime, only valid in impure bodies.
    Extern(String),
    /// A reference to another top-level definition, by absolute path.
    Definition(Path),
    /// A reference to an already-materialized closure.
    Instance(InstancePath),
    /// A not-yet-materialized closure: the flat body to run plus which
    /// captures (by index into the *current* scope) it needs copied in.
    Implementation { path: ImplementationPath, captures: Vec<u32> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Implementation {
    Return { path: ImplementationPath, captures: u32, value: ValueLiteral },
    TailCall { path: ImplementationPath, captures: u32, fn_: ValueLiteral, arg: ValueLiteral },
    ContinueCall { path: ImplementationPath, captures: u32, fn_: ValueLiteral, arg: ValueLiteral, next: ValueLiteral },
}

impl Implementation {
    pub fn path(&self) -> &ImplementationPath {
        match self {
            Implementation::Return { path, .. }
            | Implementation::TailCall { path, .. }
            | Implementation::ContinueCall { path, .. } => path,
        }
    }

    pub fn capture_count(&self) -> u32 {
        match self {
            Implementation::Return { captures, .. }
            | Implementation::TailCall { captures, .. }
            | Implementation::ContinueCall { captures, .. } => *captures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub path: InstancePath,
    pub implementation: ImplementationPath,
    pub captures: Vec<InstancePath>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub path: Path,
    pub inst: InstancePath,
    pub needs_init: bool,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    ExternCrate(String),
    Extern(String),
    Definition(Definition),
    Instance(Instance),
    Implementation(Implementation),
}

/// One crate's worth of compiled MLIR, grouped the way the textual MLIR
/// form and codegen both expect: crates, externs, definitions,
/// implementations, instances (spec §4.4).
#[derive(Debug, Clone, Default)]
pub struct Crate {
    pub name: String,
    pub extern_crates: Vec<String>,
    pub externs: Vec<String>,
    pub definitions: Vec<Definition>,
    pub implementations: Vec<Implementation>,
    pub instances: Vec<Instance>,
}

impl Crate {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn into_statements(self) -> Vec<Statement> {
        let mut out = Vec::new();
        out.extend(self.extern_crates.into_iter().map(Statement::ExternCrate));
        out.extend(self.externs.into_iter().map(Statement::Extern));
        out.extend(self.definitions.into_iter().map(Statement::Definition));
        out.extend(self.implementations.into_iter().map(Statement::Implementation));
        out.extend(self.instances.into_iter().map(Statement::Instance));
        out
    }

    pub fn from_statements(name: impl Into<String>, statements: Vec<Statement>) -> Self {
        let mut out = Crate::new(name);
        for stmt in statements {
            match stmt {
                Statement::ExternCrate(n) => out.extern_crates.push(n),
                Statement::Extern(n) => out.externs.push(n),
                Statement::Definition(d) => out.definitions.push(d),
                Statement::Implementation(i) => out.implementations.push(i),
                Statement::Instance(i) => out.instances.push(i),
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub entry_crate: String,
    pub crates: Vec<Crate>,
}
