//! Name resolution (spec §4.2, component C3): surface AST → HLIR.
//!
//! This pass is fused with crate/module discovery: as it walks `extern
//! crate`/`mod` declarations it drives a [`Loader`] to fetch the
//! referenced source, recursing into it immediately rather than building a
//! separate linked-AST tree first. A per-branch crate blacklist catches
//! cyclic `extern crate` dependencies; already-loaded crates are memoized
//! so diamond dependencies are parsed once.

use std::collections::{HashMap, HashSet};

use crate::ast::{self, Expr as SExpr, PathSegment, RelativePath, Statement as SStmt};
use crate::error::{Error, Span};
use crate::hlir::{self, Expr as HExpr, Statement as HStmt};
use crate::loader::{LoadedFile, Loader};
use crate::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ModuleId(usize);

#[derive(Debug, Clone)]
enum NamespaceEntry {
    Module { id: ModuleId, path: Path, is_public: bool },
    Alias { path: Path, target: Path, is_public: bool },
    Extern { path: Path, is_public: bool },
    Definition { path: Path, is_public: bool, is_impure: bool },
}

impl NamespaceEntry {
    fn is_public(&self) -> bool {
        match self {
            NamespaceEntry::Module { is_public, .. }
            | NamespaceEntry::Alias { is_public, .. }
            | NamespaceEntry::Extern { is_public, .. }
            | NamespaceEntry::Definition { is_public, .. } => *is_public,
        }
    }

    fn path(&self) -> &Path {
        match self {
            NamespaceEntry::Module { path, .. }
            | NamespaceEntry::Alias { path, .. }
            | NamespaceEntry::Extern { path, .. }
            | NamespaceEntry::Definition { path, .. } => path,
        }
    }
}

struct ModuleNode {
    parent: Option<ModuleId>,
    path: Path,
    entries: HashMap<String, NamespaceEntry>,
}

#[derive(Clone)]
struct ResolveCtx {
    is_impure: bool,
    locals: HashSet<String>,
}

/// Produces a fully-resolved multi-crate program from an entry-point path.
pub struct Resolver<'a> {
    loader: &'a dyn Loader,
    modules: Vec<ModuleNode>,
    crates: HashMap<String, ModuleId>,
    resolved: Vec<hlir::Crate>,
}

impl<'a> Resolver<'a> {
    pub fn new(loader: &'a dyn Loader) -> Self {
        Self { loader, modules: Vec::new(), crates: HashMap::new(), resolved: Vec::new() }
    }

    /// Resolve the entry-point crate (and everything it transitively
    /// depends on) into an [`hlir::Program`].
    pub fn resolve_program(mut self, entry_path: &std::path::Path) -> Result<hlir::Program, Error> {
        let loaded = self.loader.load_initial(entry_path)?;
        let entry_name = loaded.name.clone();
        let root = self.new_module(None, Path::single(entry_name.clone()));
        self.crates.insert(entry_name.clone(), root);

        let blacklist: HashSet<String> = [entry_name.clone()].into_iter().collect();
        let statements = self.visit_file(&loaded, root, &blacklist)?;
        self.resolved.push(hlir::Crate { name: entry_name.clone(), statements });

        Ok(hlir::Program { entry_crate: entry_name, crates: self.resolved })
    }

    fn new_module(&mut self, parent: Option<ModuleId>, path: Path) -> ModuleId {
        let id = ModuleId(self.modules.len());
        self.modules.push(ModuleNode { parent, path, entries: HashMap::new() });
        id
    }

    fn module(&self, id: ModuleId) -> &ModuleNode {
        &self.modules[id.0]
    }

    fn insert_entry(&mut self, id: ModuleId, name: String, entry: NamespaceEntry, span: &Span) -> Result<(), Error> {
        if self.modules[id.0].entries.contains_key(&name) {
            return Err(Error::Redefinition { span: span.clone(), name });
        }
        self.modules[id.0].entries.insert(name, entry);
        Ok(())
    }

    fn get_entry(&self, id: ModuleId, name: &str, span: &Span) -> Result<NamespaceEntry, Error> {
        self.module(id)
            .entries
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UndefinedName { span: span.clone(), name: name.to_string() })
    }

    fn resolve_absolute(&self, path: &Path, allow_private: bool) -> Result<NamespaceEntry, Error> {
        let crate_name = path.crate_name();
        let crate_mod = *self
            .crates
            .get(crate_name)
            .ok_or_else(|| Error::UnresolvedCrate { name: crate_name.to_string() })?;

        let rest = &path.components()[1..];
        self.resolve_segments(crate_mod, &to_name_segments(rest), allow_private, &Span::synthetic())
    }

    fn resolve_segments(
        &self,
        mod_id: ModuleId,
        segments: &[String],
        allow_private: bool,
        span: &Span,
    ) -> Result<NamespaceEntry, Error> {
        if segments.is_empty() {
            let node = self.module(mod_id);
            let is_public = match node.parent {
                None => true,
                Some(parent_id) => {
                    let name = node.path.components().last().unwrap();
                    self.module(parent_id).entries.get(name).map(|e| e.is_public()).unwrap_or(true)
                }
            };
            return Ok(NamespaceEntry::Module { id: mod_id, path: node.path.clone(), is_public });
        }

        let name = &segments[0];
        let rest = &segments[1..];
        let entry = self.get_entry(mod_id, name, span)?;

        if !allow_private && !entry.is_public() {
            return Err(Error::PrivateAccess { span: span.clone(), path: entry.path().clone() });
        }

        let entry = match &entry {
            NamespaceEntry::Alias { target, .. } => self.resolve_absolute(target, true)?,
            _ => entry,
        };

        if rest.is_empty() {
            return Ok(entry);
        }

        match entry {
            NamespaceEntry::Module { id: sub_id, .. } => self.resolve_segments(sub_id, rest, false, span),
            other => Err(Error::NonModuleMember { span: span.clone(), path: other.path().clone() }),
        }
    }

    fn resolve_relative(&self, rel: &RelativePath, mod_id: ModuleId) -> Result<NamespaceEntry, Error> {
        let first = rel.segments.first().expect("relative path always has a first segment");
        match first {
            PathSegment::SelfMod => {
                self.resolve_segments(mod_id, &to_name_segments_ast(&rel.segments[1..])?, true, &rel.span)
            }
            PathSegment::Crate => {
                let crate_name = self.module(mod_id).path.crate_name().to_string();
                let crate_mod = self.crates[&crate_name];
                self.resolve_segments(crate_mod, &to_name_segments_ast(&rel.segments[1..])?, true, &rel.span)
            }
            PathSegment::Super => {
                let mut cur = mod_id;
                let mut rest = &rel.segments[1..];
                loop {
                    let parent = self
                        .module(cur)
                        .parent
                        .ok_or_else(|| Error::SuperAtRoot { span: rel.span.clone() })?;
                    cur = parent;
                    if matches!(rest.first(), Some(PathSegment::Super)) {
                        rest = &rest[1..];
                        continue;
                    }
                    break;
                }
                self.resolve_segments(cur, &to_name_segments_ast(rest)?, true, &rel.span)
            }
            PathSegment::Name(_) => {
                let segs = to_name_segments_ast(&rel.segments)?;
                let crate_name = &segs[0];
                let crate_mod = *self
                    .crates
                    .get(crate_name)
                    .ok_or_else(|| Error::UnresolvedCrate { name: crate_name.clone() })?;
                self.resolve_segments(crate_mod, &segs[1..], true, &rel.span)
            }
        }
    }

    fn visit_file(&mut self, loaded: &LoadedFile, mod_id: ModuleId, blacklist: &HashSet<String>) -> Result<Vec<HStmt>, Error> {
        let desugared = crate::demacro::desugar_source_file(&loaded.file);
        let mut out = Vec::new();
        for stmt in &desugared.statements {
            out.extend(self.visit_statement(stmt, mod_id, loaded, blacklist)?);
        }
        Ok(out)
    }

    fn visit_statement(
        &mut self,
        stmt: &SStmt,
        mod_id: ModuleId,
        cur_file: &LoadedFile,
        blacklist: &HashSet<String>,
    ) -> Result<Vec<HStmt>, Error> {
        match stmt {
            SStmt::ExternCrate { name, span } => Ok(vec![self.visit_extern_crate(name, span, blacklist)?]),
            SStmt::Extern { name, span } => Ok(vec![self.visit_extern(name, span, mod_id)?]),
            SStmt::Mod { name, is_public, span } => self.visit_mod(name, *is_public, span, mod_id, cur_file, blacklist),
            SStmt::Import { path, name, is_wildcard, is_public, span } => {
                if *is_wildcard {
                    self.visit_import_all(path, *is_public, span, mod_id)
                } else {
                    let name = name.as_ref().expect("non-wildcard import always has a name");
                    self.visit_import(path, name, *is_public, span, mod_id)
                }
            }
            SStmt::Assignment { name, value, is_public, is_impure, span } => {
                Ok(vec![self.visit_assignment(name, value, *is_public, *is_impure, span, mod_id)?])
            }
        }
    }

    fn visit_extern_crate(&mut self, name: &str, span: &Span, blacklist: &HashSet<String>) -> Result<HStmt, Error> {
        if self.crates.contains_key(name) {
            return Ok(HStmt::ExternCrate { name: name.to_string() });
        }
        if blacklist.contains(name) {
            return Err(Error::CyclicDependency(name.to_string()));
        }

        let loaded = self.loader.load_crate(name)?;
        let crate_mod = self.new_module(None, Path::single(name.to_string()));
        self.crates.insert(name.to_string(), crate_mod);

        let mut sub_blacklist = blacklist.clone();
        sub_blacklist.insert(name.to_string());
        let _ = span;
        let statements = self.visit_file(&loaded, crate_mod, &sub_blacklist)?;
        self.resolved.push(hlir::Crate { name: name.to_string(), statements });

        Ok(HStmt::ExternCrate { name: name.to_string() })
    }

    fn visit_extern(&mut self, name: &str, span: &Span, mod_id: ModuleId) -> Result<HStmt, Error> {
        let path = self.module(mod_id).path.join(name.to_string());
        self.insert_entry(mod_id, name.to_string(), NamespaceEntry::Extern { path, is_public: false }, span)?;
        Ok(HStmt::Extern { name: name.to_string() })
    }

    fn visit_mod(
        &mut self,
        name: &str,
        is_public: bool,
        span: &Span,
        mod_id: ModuleId,
        cur_file: &LoadedFile,
        blacklist: &HashSet<String>,
    ) -> Result<Vec<HStmt>, Error> {
        let loaded = self.loader.load_mod(cur_file, name)?;
        let child_path = self.module(mod_id).path.join(name.to_string());
        let child_mod = self.new_module(Some(mod_id), child_path.clone());
        self.insert_entry(mod_id, name.to_string(), NamespaceEntry::Module { id: child_mod, path: child_path, is_public }, span)?;
        self.visit_file(&loaded, child_mod, blacklist)
    }

    fn visit_import(&mut self, path: &RelativePath, name: &str, is_public: bool, span: &Span, mod_id: ModuleId) -> Result<Vec<HStmt>, Error> {
        let target = self.resolve_relative(path, mod_id)?;
        let full_path = self.module(mod_id).path.join(name.to_string());
        self.insert_entry(
            mod_id,
            name.to_string(),
            NamespaceEntry::Alias { path: full_path.clone(), target: target.path().clone(), is_public },
            span,
        )?;

        match &target {
            NamespaceEntry::Definition { path: target_path, is_public: target_pub, .. } => {
                if !is_public {
                    return Ok(vec![]);
                }
                if !target_pub {
                    return Err(Error::PrivateAccess { span: span.clone(), path: target_path.clone() });
                }
                Ok(vec![HStmt::Alias { path: full_path, target: target_path.clone(), is_public }])
            }
            _ => Ok(vec![]),
        }
    }

    fn visit_import_all(&mut self, path: &RelativePath, is_public: bool, span: &Span, mod_id: ModuleId) -> Result<Vec<HStmt>, Error> {
        let target = self.resolve_relative(path, mod_id)?;
        let NamespaceEntry::Module { id: sub_id, path: sub_path, .. } = target else {
            return Err(Error::NonModuleMember { span: span.clone(), path: target.path().clone() });
        };

        let allow_private = self.module(mod_id).path.is_inside(&sub_path);
        let entries: Vec<(String, NamespaceEntry)> =
            self.module(sub_id).entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let mut out = Vec::new();
        for (name, entry) in entries {
            if !entry.is_public() && !allow_private {
                continue;
            }
            if !entry.is_public() && is_public {
                continue;
            }

            let entry = match &entry {
                NamespaceEntry::Alias { target, .. } => self.resolve_absolute(target, true)?,
                _ => entry,
            };

            let full_path = self.module(mod_id).path.join(name.clone());
            self.insert_entry(
                mod_id,
                name,
                NamespaceEntry::Alias { path: full_path.clone(), target: entry.path().clone(), is_public },
                span,
            )?;

            if let NamespaceEntry::Definition { path: def_path, is_public: true, .. } = &entry {
                if is_public {
                    out.push(HStmt::Alias { path: full_path, target: def_path.clone(), is_public });
                }
            }
        }

        Ok(out)
    }

    fn visit_assignment(
        &mut self,
        name: &str,
        value: &SExpr,
        is_public: bool,
        is_impure: bool,
        span: &Span,
        mod_id: ModuleId,
    ) -> Result<HStmt, Error> {
        let ctx = ResolveCtx { is_impure, locals: HashSet::new() };
        let hvalue = self.visit_expr(value, mod_id, &ctx)?;

        let path = self.module(mod_id).path.join(name.to_string());
        self.insert_entry(mod_id, name.to_string(), NamespaceEntry::Definition { path: path.clone(), is_public, is_impure }, span)?;
        Ok(HStmt::Assignment { path, value: hvalue, is_public, is_impure })
    }

    fn visit_expr(&self, expr: &SExpr, mod_id: ModuleId, ctx: &ResolveCtx) -> Result<HExpr, Error> {
        match expr {
            SExpr::Ellipsis(_) => Ok(HExpr::Ellipsis),
            SExpr::Paren(inner) => Ok(HExpr::Paren(Box::new(self.visit_expr(inner, mod_id, ctx)?))),
            SExpr::Call(f, a) => Ok(HExpr::Call(
                Box::new(self.visit_expr(f, mod_id, ctx)?),
                Box::new(self.visit_expr(a, mod_id, ctx)?),
            )),
            SExpr::Lambda { param, body, .. } => {
                let mut sub = ctx.clone();
                sub.locals.insert(param.clone());
                Ok(HExpr::Lambda { name: param.clone(), body: Box::new(self.visit_expr(body, mod_id, &sub)?) })
            }
            SExpr::Ident(name, span) => self.visit_ident(name, span, mod_id, ctx),
            SExpr::RelPath(rel) => self.visit_rel_path_expr(rel, mod_id, ctx),
            SExpr::Macro(_, span) => Err(Error::ParseError {
                span: span.clone(),
                message: "macro literals must be desugared before name resolution".into(),
            }),
        }
    }

    fn visit_ident(&self, name: &str, span: &Span, mod_id: ModuleId, ctx: &ResolveCtx) -> Result<HExpr, Error> {
        if ctx.locals.contains(name) {
            return Ok(HExpr::Ident(name.to_string()));
        }

        let entry = self.get_entry(mod_id, name, span)?;
        let entry = match &entry {
            NamespaceEntry::Alias { target, .. } => self.resolve_absolute(target, true)?,
            _ => entry,
        };

        match entry {
            NamespaceEntry::Extern { .. } => {
                if !ctx.is_impure {
                    return Err(Error::ImpureInPure { span: span.clone(), name: name.to_string() });
                }
                Ok(HExpr::Ident(name.to_string()))
            }
            NamespaceEntry::Definition { path, is_impure, .. } => {
                if is_impure && !ctx.is_impure {
                    return Err(Error::ImpureInPure { span: span.clone(), name: path.to_string() });
                }
                Ok(HExpr::Absolute(path))
            }
            other => Err(Error::NonModuleMember { span: span.clone(), path: other.path().clone() }),
        }
    }

    fn visit_rel_path_expr(&self, rel: &RelativePath, mod_id: ModuleId, ctx: &ResolveCtx) -> Result<HExpr, Error> {
        let target = self.resolve_relative(rel, mod_id)?;
        match target {
            NamespaceEntry::Definition { path, is_impure, .. } => {
                if is_impure && !ctx.is_impure {
                    return Err(Error::ImpureInPure { span: rel.span.clone(), name: path.to_string() });
                }
                Ok(HExpr::Absolute(path))
            }
            other => Err(Error::NonModuleMember { span: rel.span.clone(), path: other.path().clone() }),
        }
    }
}

fn to_name_segments(components: &[String]) -> Vec<String> {
    components.to_vec()
}

fn to_name_segments_ast(segments: &[PathSegment]) -> Result<Vec<String>, Error> {
    segments
        .iter()
        .map(|seg| match seg {
            PathSegment::Name(n) => Ok(n.clone()),
            PathSegment::Crate | PathSegment::SelfMod | PathSegment::Super => Err(Error::ParseError {
                span: Span::synthetic(),
                message: "'crate'/'self'/'super' may only appear as the first segment of a path".into(),
            }),
        })
        .collect()
}

/// Resolve a single already-loaded entry-point file without a `Loader`,
/// for programs that are known to need no `extern crate`/`mod` at all.
pub fn resolve_standalone(file: ast::SourceFile, crate_name: &str) -> Result<hlir::Program, Error> {
    struct Empty;
    impl Loader for Empty {
        fn load_initial(&self, _entry_path: &std::path::Path) -> Result<LoadedFile, Error> {
            unreachable!("resolve_standalone supplies its file directly")
        }
        fn load_crate(&self, name: &str) -> Result<LoadedFile, Error> {
            Err(Error::UnresolvedCrate { name: name.to_string() })
        }
        fn load_mod(&self, _parent: &LoadedFile, name: &str) -> Result<LoadedFile, Error> {
            Err(Error::UnresolvedModule { span: Span::synthetic(), path: Path::single(name.to_string()) })
        }
    }

    let loader = Empty;
    let mut resolver = Resolver::new(&loader);
    let root = resolver.new_module(None, Path::single(crate_name.to_string()));
    resolver.crates.insert(crate_name.to_string(), root);

    let loaded = LoadedFile { name: crate_name.to_string(), dir: std::path::PathBuf::new(), owns_dir: false, file };
    let blacklist: HashSet<String> = [crate_name.to_string()].into_iter().collect();
    let statements = resolver.visit_file(&loaded, root, &blacklist)?;
    resolver.resolved.push(hlir::Crate { name: crate_name.to_string(), statements });

    Ok(hlir::Program { entry_crate: crate_name.to_string(), crates: resolver.resolved })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::FileListLoader;

    fn resolve(files: Vec<(&str, &str)>, entry: &str) -> hlir::Program {
        let files: Vec<(String, String)> = files.into_iter().map(|(n, s)| (n.to_string(), s.to_string())).collect();
        let loader = FileListLoader::new(files);
        let resolver = Resolver::new(&loader);
        resolver.resolve_program(std::path::Path::new(&format!("{entry}.lambda"))).expect("resolve should succeed")
    }

    #[test]
    fn resolves_simple_definition() {
        let prog = resolve(vec![("main", "pub ident = a -> a;")], "main");
        assert_eq!(prog.crates.len(), 1);
        assert!(matches!(&prog.crates[0].statements[0], HStmt::Assignment { .. }));
    }

    #[test]
    fn resolves_cross_crate_absolute_reference() {
        let prog = resolve(
            vec![
                ("main", "extern crate std; pub f = std::ident;"),
                ("std", "pub ident = a -> a;"),
            ],
            "main",
        );
        assert_eq!(prog.crates.len(), 2);
        assert_eq!(prog.crates[1].name, "main");
        match &prog.crates[1].statements[1] {
            HStmt::Assignment { value: HExpr::Absolute(path), .. } => {
                assert_eq!(path.to_string(), "std::ident");
            }
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn rejects_private_definition_access() {
        let files: Vec<(String, String)> = vec![
            ("main".into(), "extern crate std; pub f = std::secret;".into()),
            ("std".into(), "secret = a -> a;".into()),
        ];
        let loader = FileListLoader::new(files);
        let resolver = Resolver::new(&loader);
        let err = resolver.resolve_program(std::path::Path::new("main.lambda")).unwrap_err();
        assert!(matches!(err, Error::PrivateAccess { .. }));
    }

    #[test]
    fn rejects_impure_reference_from_pure_context() {
        let files: Vec<(String, String)> = vec![("main".into(), "extern impure print; pub f = print;".into())];
        let loader = FileListLoader::new(files);
        let resolver = Resolver::new(&loader);
        let err = resolver.resolve_program(std::path::Path::new("main.lambda")).unwrap_err();
        assert!(matches!(err, Error::ImpureInPure { .. }));
    }

    #[test]
    fn cyclic_crate_dependency_is_rejected() {
        let files: Vec<(String, String)> = vec![
            ("a".into(), "extern crate b; pub x = a -> a;".into()),
            ("b".into(), "extern crate a; pub y = a -> a;".into()),
        ];
        let loader = FileListLoader::new(files);
        let resolver = Resolver::new(&loader);
        let err = resolver.resolve_program(std::path::Path::new("a.lambda")).unwrap_err();
        assert!(matches!(err, Error::CyclicDependency(_)));
    }
}
