//! The middle-end error taxonomy (spec §7): the failure kinds raised by
//! closure conversion, partial evaluation, and dedup/tree-shaking.

use lambdac_frontend::path::{ImplementationPath, Path};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Closure conversion's flattening invariant was violated: either a
    /// chain's result literal wasn't the last continuation's anonymous
    /// slot, or a zero-continuation body unexpectedly reported captures.
    #[error("flatten invariant violated for '{path}': {detail}")]
    FlattenInvariant { path: Path, detail: String },

    /// The partial evaluator hit a reference it cannot resolve at compile
    /// time. Not fatal: the caller marks the definition `needs_init = true`
    /// and moves on (spec §4.5/§7).
    #[error("cannot evaluate '{path}' at compile time: depends on an unresolved reference")]
    CannotEvaluate { path: Path },

    /// The abstract machine exceeded its configured step budget (spec
    /// §4.5's non-termination guard); treated the same as `CannotEvaluate`.
    #[error("evaluation of '{path}' exceeded the step budget")]
    StepBudgetExceeded { path: Path },

    /// An `Implementation`/`Instance` was referenced by path before the
    /// pass that defines it ran; indicates a malformed or out-of-order MLIR
    /// program rather than a user-facing error.
    #[error("unresolved implementation reference: {0}")]
    UnresolvedImplementation(ImplementationPath),
}

pub type Result<T> = std::result::Result<T, Error>;
