//! Top-level compile error, composing each stage's own error type the way
//! the teacher composes `CompileError::{Io,Parse,Semantic,Analysis,Codegen,
//! Link}`.

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Frontend(#[from] lambdac_frontend::Error),

    #[error(transparent)]
    Middle(#[from] lambdac_middle::Error),

    #[error(transparent)]
    Codegen(#[from] lambdac_codegen::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown target architecture '{0}'")]
    UnknownTarget(String),

    #[error("failed to create target machine for '{0}'")]
    TargetMachine(String),

    #[error("linker invocation failed: {0}")]
    Link(String),
}

pub type Result<T> = std::result::Result<T, CompileError>;
