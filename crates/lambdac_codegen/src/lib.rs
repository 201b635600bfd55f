//! LLVM IR emission (component C8): lowers a crate's MLIR into one LLVM
//! module per crate, plus a separate whole-program driver module, targeting
//! the closure ABI described in spec §4.7 (`lambda_header`/`lambda`/
//! `lambda_cont`, declared not defined — the runtime itself is out of
//! scope).

pub mod error;
pub mod mangle;
pub mod program;
pub mod runtime;
pub mod target;
pub mod types;
pub mod uses;

mod body;
mod emitter;
mod instance;

pub use error::{Error, Result};
pub use emitter::CrateEmitter;
pub use program::emit_program_driver;
pub use target::Architecture;

use inkwell::context::Context;
use inkwell::module::Module;

use lambdac_middle::mlir;

/// Emit one crate's MLIR into a fresh LLVM module named after the crate.
pub fn emit_crate<'ctx>(context: &'ctx Context, crate_: &mlir::Crate, arch: &Architecture) -> Result<Module<'ctx>> {
    let mut emitter = CrateEmitter::new(context, &crate_.name, *arch);
    emitter.emit_crate(crate_)?;
    Ok(emitter.into_module())
}
