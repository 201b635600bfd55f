//! Closure conversion, partial evaluation, structural dedup, and
//! tree-shaking: linked [`hlir::Program`] in, fully reduced [`mlir::Program`]
//! out (spec §4.4-§4.6).

pub mod cps;
pub mod dedup;
pub mod error;
pub mod eval;
pub mod mlir;

pub use error::{Error, Result};
pub use eval::EvalOptions;

/// Run the full middle-end pipeline over a resolved program: CPS/closure
/// conversion, partial evaluation, then dedup and tree-shaking.
pub fn lower_program(prog: &lambdac_frontend::hlir::Program, opts: EvalOptions) -> Result<mlir::Program> {
    let converted = cps::convert_program(prog)?;
    let evaluated = eval::evaluate_program(&converted, opts);
    Ok(dedup::dedup_program(&evaluated))
}
