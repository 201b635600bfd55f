//! Lexing, parsing, module loading, macro desugaring, and name resolution:
//! surface text in, linked [`hlir::Program`] out (spec §3, §4.1-§4.3).

pub mod ast;
pub mod demacro;
pub mod error;
pub mod hlir;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod path;
pub mod resolve;

pub use error::{Error, Result, Span};
pub use loader::{FileListLoader, FileSystemLoader, Loader};
pub use resolve::Resolver;

/// Parse and resolve a whole program starting from `entry_path`, using
/// `search_path` to find `extern crate`d dependencies. When `stub_only` is
/// set, every `extern crate`d dependency must resolve from a `.hlis` stub
/// (spec §4.1's mode flag) rather than falling back to `.hlir`/`.lambda`.
pub fn compile_to_hlir(entry_path: &std::path::Path, search_path: Vec<std::path::PathBuf>, stub_only: bool) -> Result<hlir::Program> {
    let loader = FileSystemLoader::with_stub_only(search_path, stub_only);
    Resolver::new(&loader).resolve_program(entry_path)
}
