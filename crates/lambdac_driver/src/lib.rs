//! Driver glue (component C10) and the dependency orderer (component C9):
//! the glue crate that ties [`lambdac_frontend`], [`lambdac_middle`], and
//! [`lambdac_codegen`] into one invocation, mirroring the teacher's
//! `llts_driver` crate one stage for one stage.

pub mod error;
pub mod linker;
pub mod options;
pub mod order;
pub mod pipeline;
pub mod text;

pub use error::{CompileError, Result};
pub use options::CompileOptions;
pub use pipeline::compile;
