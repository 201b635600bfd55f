//! Crate/module source discovery (spec §4.1, component C2).
//!
//! A [`Loader`] only answers "where is this crate/module's source text and
//! what directory do its own children search from" — the recursive walk
//! that turns `extern crate`/`mod` declarations into a linked program
//! (including cycle detection) lives in [`crate::resolve`], which drives a
//! `Loader` while it builds the namespace.

use std::fs;
use std::path::{Path as FsPath, PathBuf};

use crate::ast::SourceFile;
use crate::error::Error;
use crate::parser::Parser;

/// A parsed file plus the filesystem context its own `mod` children search
/// from (spec §4.1's directory-ownership rule).
pub struct LoadedFile {
    pub name: String,
    pub dir: PathBuf,
    /// `true` when this file is a `mod.lambda` that owns a directory of its
    /// own submodules; `false` when it is a standalone `name.lambda` whose
    /// submodules (if any) live under a `name/` subdirectory instead.
    pub owns_dir: bool,
    pub file: SourceFile,
}

/// Supplies crate and module source to the resolver.
///
/// Implemented by [`FileSystemLoader`] for real compilation and by
/// [`FileListLoader`] for tests that want to avoid touching disk.
pub trait Loader {
    /// Load the entry-point crate from the path given on the command line.
    /// The crate name is inferred the same way `mod`/standalone files are
    /// told apart elsewhere: a `mod.lambda` names its crate after its
    /// parent directory, any other file names it after its own stem.
    fn load_initial(&self, entry_path: &FsPath) -> Result<LoadedFile, Error>;

    fn load_crate(&self, name: &str) -> Result<LoadedFile, Error>;

    fn load_mod(&self, parent: &LoadedFile, name: &str) -> Result<LoadedFile, Error>;
}

fn parse_file(path: &FsPath) -> Result<SourceFile, Error> {
    let text = fs::read_to_string(path).map_err(|e| Error::ParseError {
        span: crate::error::Span::synthetic(),
        message: format!("could not read {}: {e}", path.display()),
    })?;
    Parser::parse_source(&text, Some(path))
}

/// Resolves crates and modules against the real filesystem, preferring
/// `C.hlis`, then `C.hlir`, then a crate-root `C.lambda` file, then a
/// `C/mod.lambda` directory, across each directory of the search path in
/// order (spec §4.1). `.hlis`/`.hlir` files use the same surface grammar as
/// `.lambda` (their bodies may use `...` in place of an expression, per
/// [`crate::ast::Expr::Ellipsis`]) and so need no separate parser; a
/// definition whose body is still `...` once it reaches closure conversion
/// reports [`lambdac_middle::Error::FlattenInvariant`] rather than silently
/// emitting nothing, since this is a whole-program compiler with no
/// separate-object-file linking model for a stub it never saw a body for.
pub struct FileSystemLoader {
    pub search_path: Vec<PathBuf>,
    /// When set, crate resolution only accepts `.hlis` stubs (spec §4.1's
    /// mode flag), erroring rather than falling back to `.hlir`/`.lambda`.
    pub stub_only: bool,
}

impl FileSystemLoader {
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        Self { search_path, stub_only: false }
    }

    pub fn with_stub_only(search_path: Vec<PathBuf>, stub_only: bool) -> Self {
        Self { search_path, stub_only }
    }

    /// Candidate `(dir, relative_file_name)` pairs for crate `name` within
    /// one search directory, in preference order.
    fn crate_candidates(&self, name: &str) -> Vec<String> {
        if self.stub_only {
            vec![format!("{name}.hlis")]
        } else {
            vec![format!("{name}.hlis"), format!("{name}.hlir"), format!("{name}.lambda")]
        }
    }
}

impl Loader for FileSystemLoader {
    fn load_initial(&self, entry_path: &FsPath) -> Result<LoadedFile, Error> {
        let file_name = entry_path.file_name().and_then(|s| s.to_str()).unwrap_or("");
        let file = parse_file(entry_path)?;

        if file_name == "mod.lambda" {
            let dir = entry_path.parent().unwrap_or_else(|| FsPath::new("."));
            let name = dir
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("main")
                .to_string();
            return Ok(LoadedFile { name, dir: dir.to_path_buf(), owns_dir: true, file });
        }

        let name = entry_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("main")
            .to_string();
        let dir = entry_path.parent().unwrap_or_else(|| FsPath::new(".")).to_path_buf();
        Ok(LoadedFile { name, dir, owns_dir: false, file })
    }

    fn load_crate(&self, name: &str) -> Result<LoadedFile, Error> {
        for dir in &self.search_path {
            for candidate in self.crate_candidates(name) {
                let direct = dir.join(&candidate);
                if direct.is_file() {
                    log::trace!("resolved crate '{name}' to {}", direct.display());
                    let file = parse_file(&direct)?;
                    return Ok(LoadedFile { name: name.to_string(), dir: dir.clone(), owns_dir: false, file });
                }
            }

            if !self.stub_only {
                let owned_dir = dir.join(name);
                let owned = owned_dir.join("mod.lambda");
                if owned.is_file() {
                    log::trace!("resolved crate '{name}' to {}", owned.display());
                    let file = parse_file(&owned)?;
                    return Ok(LoadedFile { name: name.to_string(), dir: owned_dir, owns_dir: true, file });
                }
            }
        }

        Err(Error::UnresolvedCrate { name: name.to_string() })
    }

    fn load_mod(&self, parent: &LoadedFile, name: &str) -> Result<LoadedFile, Error> {
        let (search_dir, owned_dir) = if parent.owns_dir {
            (parent.dir.clone(), parent.dir.join(name))
        } else {
            let base = parent.dir.join(&parent.name);
            (base.clone(), base.join(name))
        };

        let direct = search_dir.join(format!("{name}.lambda"));
        if direct.is_file() {
            let file = parse_file(&direct)?;
            return Ok(LoadedFile { name: name.to_string(), dir: search_dir, owns_dir: false, file });
        }

        let owned = owned_dir.join("mod.lambda");
        if owned.is_file() {
            let file = parse_file(&owned)?;
            return Ok(LoadedFile { name: name.to_string(), dir: owned_dir, owns_dir: true, file });
        }

        Err(Error::UnresolvedModule {
            span: crate::error::Span::synthetic(),
            path: crate::path::Path::single(name.to_string()),
        })
    }
}

/// An in-memory stand-in for [`FileSystemLoader`] used by unit and
/// integration tests: `files` maps a crate or module name to its raw
/// source text, with no directory structure to speak of.
pub struct FileListLoader {
    pub files: Vec<(String, String)>,
}

impl FileListLoader {
    pub fn new(files: Vec<(String, String)>) -> Self {
        Self { files }
    }

    fn find(&self, name: &str) -> Result<&str, Error> {
        self.files
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, src)| src.as_str())
            .ok_or_else(|| Error::UnresolvedCrate { name: name.to_string() })
    }
}

impl Loader for FileListLoader {
    fn load_initial(&self, entry_path: &FsPath) -> Result<LoadedFile, Error> {
        let name = entry_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("main")
            .to_string();
        let src = self.find(&name)?;
        let file = Parser::parse_source(src, None)?;
        Ok(LoadedFile { name, dir: PathBuf::new(), owns_dir: false, file })
    }

    fn load_crate(&self, name: &str) -> Result<LoadedFile, Error> {
        let src = self.find(name)?;
        let file = Parser::parse_source(src, None)?;
        Ok(LoadedFile { name: name.to_string(), dir: PathBuf::new(), owns_dir: false, file })
    }

    fn load_mod(&self, _parent: &LoadedFile, name: &str) -> Result<LoadedFile, Error> {
        let src = self.find(name)?;
        let file = Parser::parse_source(src, None)?;
        Ok(LoadedFile { name: name.to_string(), dir: PathBuf::new(), owns_dir: false, file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_list_loader_resolves_extern_crate_by_name() {
        let loader = FileListLoader::new(vec![
            ("main".into(), "extern crate std; pub f = std::ident;".into()),
            ("std".into(), "pub ident = a -> a;".into()),
        ]);
        let entry = loader.load_initial(FsPath::new("main.lambda")).unwrap();
        assert_eq!(entry.name, "main");
        let std_crate = loader.load_crate("std").unwrap();
        assert_eq!(std_crate.file.statements.len(), 1);
    }

    #[test]
    fn file_list_loader_errors_on_missing_crate() {
        let loader = FileListLoader::new(vec![("main".into(), "pub f = a -> a;".into())]);
        let err = loader.load_crate("missing").unwrap_err();
        assert!(matches!(err, Error::UnresolvedCrate { .. }));
    }

    fn write(dir: &FsPath, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    /// Search order prefers `.hlis` over `.hlir` over `.lambda` within the
    /// same directory (spec §4.1).
    #[test]
    fn file_system_loader_prefers_hlis_over_hlir_over_lambda() {
        let dir = std::env::temp_dir().join(format!("lambdac_loader_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        write(&dir, "std.lambda", "pub ident = a -> a; secret = a -> a;");
        write(&dir, "std.hlir", "pub ident = a -> a;");
        write(&dir, "std.hlis", "pub ident = ...;");

        let loader = FileSystemLoader::new(vec![dir.clone()]);
        let loaded = loader.load_crate("std").unwrap();
        assert!(matches!(loaded.file.statements[0], crate::ast::Statement::Assignment { .. }));
        assert_eq!(loaded.file.statements.len(), 1);

        fs::remove_dir_all(&dir).unwrap();
    }

    /// `stub_only` restricts resolution to `.hlis`, never falling back to
    /// `.hlir`/`.lambda` even when they exist alongside it.
    #[test]
    fn stub_only_rejects_crates_without_a_hlis_file() {
        let dir = std::env::temp_dir().join(format!("lambdac_loader_test_stub_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        write(&dir, "std.lambda", "pub ident = a -> a;");

        let loader = FileSystemLoader::with_stub_only(vec![dir.clone()], true);
        let err = loader.load_crate("std").unwrap_err();
        assert!(matches!(err, Error::UnresolvedCrate { .. }));

        fs::remove_dir_all(&dir).unwrap();
    }
}
