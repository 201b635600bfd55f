//! Codegen's error taxonomy (spec §7).

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested target triple isn't in [`crate::target::TARGETS`].
    #[error("unsupported target: '{0}'")]
    EmitUnsupportedTarget(String),

    /// The emitted module failed LLVM's own verifier; indicates a bug in
    /// the emitter rather than a user-facing error.
    #[error("generated module failed verification: {0}")]
    VerificationFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
