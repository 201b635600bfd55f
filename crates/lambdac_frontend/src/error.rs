//! Source locations and the frontend error taxonomy (spec §7).

use std::fmt;
use std::path::PathBuf;

use crate::path::Path;

/// A `(file, line, column)` source location. `file` is `None` for
/// synthesized nodes (e.g. macro-desugared expressions before they are
/// re-attached to their originating span).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Span {
    pub file: Option<PathBuf>,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(file: PathBuf, line: u32, column: u32) -> Self {
        Self { file: Some(file), line, column }
    }

    pub fn synthetic() -> Self {
        Self::default()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file.display(), self.line, self.column),
            None => write!(f, "<synthesized>"),
        }
    }
}

/// Errors raised by the lexer, parser, loader, and name resolver.
///
/// This is the frontend slice of spec §7's fail-fast taxonomy; all variants
/// carry a [`Span`] and a human-readable message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{span}: tokenize error: {message}")]
    TokenizeError { span: Span, message: String },

    #[error("{span}: parse error: {message}")]
    ParseError { span: Span, message: String },

    #[error("could not resolve crate '{name}' in the search path")]
    UnresolvedCrate { name: String },

    #[error("{span}: could not resolve module '{path}'")]
    UnresolvedModule { span: Span, path: Path },

    #[error("cyclic crate dependency: {0}")]
    CyclicDependency(String),

    #[error("{span}: '{name}' is already defined in this namespace")]
    Redefinition { span: Span, name: String },

    #[error("{span}: undefined name '{name}'")]
    UndefinedName { span: Span, name: String },

    #[error("{span}: '{path}' is private")]
    PrivateAccess { span: Span, path: Path },

    #[error("{span}: impure name '{name}' referenced from a pure context")]
    ImpureInPure { span: Span, name: String },

    #[error("{span}: '{path}' is not a module")]
    NonModuleMember { span: Span, path: Path },

    #[error("{span}: 'super' walked past the crate root")]
    SuperAtRoot { span: Span },
}

pub type Result<T> = std::result::Result<T, Error>;
