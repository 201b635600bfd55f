//! Structural deduplication & tree-shaking (spec §4.6, component C7).
//!
//! Runs after partial evaluation. Computes a bottom-up structural
//! fingerprint for every `Implementation`/`Instance`/`Definition`; nodes
//! that hash equal to an already-canonicalized node are discarded in
//! favor of it and every reference is rewired. Because a parent's
//! fingerprint needs its children's fingerprints first, this proceeds as
//! a work queue rather than a topological sort (spec §9): each pass
//! attempts every pending node, and a node whose children aren't yet
//! canonicalized is simply retried on the next pass.

use std::collections::{HashMap, HashSet};

use lambdac_frontend::path::{ImplementationPath, InstancePath, Path};

use crate::mlir;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Fp {
    Ret(Box<Fp>),
    Tail(Box<Fp>, Box<Fp>),
    Cont(Box<Fp>, Box<Fp>, Box<Fp>),
    Capture(u32),
    Extern(String),
    Definition(Path),
    InstLit(Box<Fp>),
    ImplLit(Box<Fp>, Vec<u32>),
    Inst(Box<Fp>, Vec<Fp>),
}

enum Item {
    Impl(mlir::Implementation),
    Inst(mlir::Instance),
    Def(mlir::Definition),
}

#[derive(Default)]
struct Deduper {
    impl_hash: HashMap<ImplementationPath, Fp>,
    inst_hash: HashMap<InstancePath, Fp>,
    impl_canon: HashMap<Fp, ImplementationPath>,
    inst_canon: HashMap<Fp, InstancePath>,
    implementations: Vec<mlir::Implementation>,
    instances: Vec<mlir::Instance>,
}

impl Deduper {
    fn canon_impl_path(&self, path: &ImplementationPath) -> Option<ImplementationPath> {
        let fp = self.impl_hash.get(path)?;
        self.impl_canon.get(fp).cloned()
    }

    /// Computes a literal's fingerprint and, for an `Implementation`
    /// literal, rewrites its `path` to the canonical surviving
    /// implementation (the literal's own non-canonical sibling may already
    /// have been dropped in favor of a structurally-identical one).
    fn canon_literal(&self, lit: &mlir::ValueLiteral) -> Option<(Fp, mlir::ValueLiteral)> {
        match lit {
            mlir::ValueLiteral::Capture(id) => Some((Fp::Capture(*id), lit.clone())),
            mlir::ValueLiteral::Extern(name) => Some((Fp::Extern(name.clone()), lit.clone())),
            mlir::ValueLiteral::Definition(path) => Some((Fp::Definition(path.clone()), lit.clone())),
            mlir::ValueLiteral::Instance(inst_path) => {
                let fp = self.inst_hash.get(inst_path).cloned()?;
                Some((Fp::InstLit(Box::new(fp)), lit.clone()))
            }
            mlir::ValueLiteral::Implementation { path, captures } => {
                let impl_fp = self.impl_hash.get(path)?.clone();
                let canon_path = self.canon_impl_path(path)?;
                Some((
                    Fp::ImplLit(Box::new(impl_fp), captures.clone()),
                    mlir::ValueLiteral::Implementation { path: canon_path, captures: captures.clone() },
                ))
            }
        }
    }

    fn canon_impl(&self, imp: &mlir::Implementation) -> Option<(Fp, mlir::Implementation)> {
        match imp {
            mlir::Implementation::Return { path, captures, value } => {
                let (fp, value) = self.canon_literal(value)?;
                Some((
                    Fp::Ret(Box::new(fp)),
                    mlir::Implementation::Return { path: path.clone(), captures: *captures, value },
                ))
            }
            mlir::Implementation::TailCall { path, captures, fn_, arg } => {
                let (fn_fp, fn_) = self.canon_literal(fn_)?;
                let (arg_fp, arg) = self.canon_literal(arg)?;
                Some((
                    Fp::Tail(Box::new(fn_fp), Box::new(arg_fp)),
                    mlir::Implementation::TailCall { path: path.clone(), captures: *captures, fn_, arg },
                ))
            }
            mlir::Implementation::ContinueCall { path, captures, fn_, arg, next } => {
                let (fn_fp, fn_) = self.canon_literal(fn_)?;
                let (arg_fp, arg) = self.canon_literal(arg)?;
                let (next_fp, next) = self.canon_literal(next)?;
                Some((
                    Fp::Cont(Box::new(fn_fp), Box::new(arg_fp), Box::new(next_fp)),
                    mlir::Implementation::ContinueCall { path: path.clone(), captures: *captures, fn_, arg, next },
                ))
            }
        }
    }

    fn hash_inst(&self, inst: &mlir::Instance) -> Option<Fp> {
        let impl_fp = self.impl_hash.get(&inst.implementation)?.clone();
        let mut caps = Vec::with_capacity(inst.captures.len());
        for cap in &inst.captures {
            caps.push(self.inst_hash.get(cap)?.clone());
        }
        Some(Fp::Inst(Box::new(impl_fp), caps))
    }

    fn insert_impl(&mut self, path: ImplementationPath, imp: mlir::Implementation, fp: Fp) {
        self.impl_hash.insert(path, fp.clone());
        if !self.impl_canon.contains_key(&fp) {
            self.impl_canon.insert(fp, imp.path().clone());
            self.implementations.push(imp);
        }
    }

    fn insert_inst(&mut self, path: InstancePath, inst: mlir::Instance, fp: Fp) {
        self.inst_hash.insert(path, fp.clone());
        if !self.inst_canon.contains_key(&fp) {
            self.inst_canon.insert(fp, inst.path.clone());
            self.instances.push(inst);
        }
    }

    /// The work-queue retry loop (spec §4.6/§9). Returns the deduplicated
    /// definitions; `self.implementations`/`self.instances` hold the
    /// canonical (first-seen) node set.
    fn run(&mut self, items: Vec<Item>) -> Vec<mlir::Definition> {
        let mut queue = items;
        let mut definitions = Vec::new();

        while !queue.is_empty() {
            let mut next_queue = Vec::new();
            let mut progressed = false;

            for item in queue {
                match item {
                    Item::Impl(imp) => match self.canon_impl(&imp) {
                        Some((fp, imp)) => {
                            self.insert_impl(imp.path().clone(), imp, fp);
                            progressed = true;
                        }
                        None => next_queue.push(Item::Impl(imp)),
                    },
                    Item::Inst(inst) => match self.hash_inst(&inst) {
                        Some(fp) => {
                            // Rewire to the canonical implementation: a
                            // structurally-identical sibling implementation
                            // may have been the one kept by `insert_impl`,
                            // in which case this instance's original
                            // `implementation` path no longer survives.
                            let canon_impl = self
                                .canon_impl_path(&inst.implementation)
                                .expect("hash_inst only succeeds once the impl is hashed");
                            let inst = mlir::Instance { implementation: canon_impl, ..inst };
                            self.insert_inst(inst.path.clone(), inst, fp);
                            progressed = true;
                        }
                        None => next_queue.push(Item::Inst(inst)),
                    },
                    Item::Def(defi) => match self.inst_hash.get(&defi.inst).cloned() {
                        Some(fp) => {
                            let canon = self.inst_canon.get(&fp).cloned().expect("fp was just inserted");
                            definitions.push(mlir::Definition { inst: canon, ..defi });
                            progressed = true;
                        }
                        None => next_queue.push(Item::Def(defi)),
                    },
                }
            }

            if !progressed {
                // The IR is a DAG by construction (spec §5/§9); a stalled
                // queue means a reference pointed at a node this crate
                // never defined. Drop the stragglers rather than loop
                // forever.
                break;
            }
            queue = next_queue;
        }

        definitions
    }
}

/// Deduplicates one crate's MLIR (spec §4.6).
pub fn dedup_crate(crate_: &mlir::Crate) -> mlir::Crate {
    let mut dd = Deduper::default();
    let mut items = Vec::with_capacity(crate_.implementations.len() + crate_.instances.len() + crate_.definitions.len());
    items.extend(crate_.implementations.iter().cloned().map(Item::Impl));
    items.extend(crate_.instances.iter().cloned().map(Item::Inst));
    items.extend(crate_.definitions.iter().cloned().map(Item::Def));

    let definitions = dd.run(items);

    tree_shake(mlir::Crate {
        name: crate_.name.clone(),
        extern_crates: crate_.extern_crates.clone(),
        externs: crate_.externs.clone(),
        definitions,
        implementations: dd.implementations,
        instances: dd.instances,
    })
}

pub fn dedup_program(prog: &mlir::Program) -> mlir::Program {
    mlir::Program { entry_crate: prog.entry_crate.clone(), crates: prog.crates.iter().map(dedup_crate).collect() }
}

/// Marks everything reachable from the public surface (plus definitions
/// that run at init time, since those may have observable side effects)
/// and drops the rest, renumbering surviving instances densely per path
/// (spec §4.6).
fn tree_shake(crate_: mlir::Crate) -> mlir::Crate {
    let impls: HashMap<&ImplementationPath, &mlir::Implementation> =
        crate_.implementations.iter().map(|i| (i.path(), i)).collect();
    let insts: HashMap<&InstancePath, &mlir::Instance> = crate_.instances.iter().map(|i| (&i.path, i)).collect();
    let defs: HashMap<&Path, &mlir::Definition> = crate_.definitions.iter().map(|d| (&d.path, d)).collect();

    let mut reach_impls: HashSet<ImplementationPath> = HashSet::new();
    let mut reach_insts: HashSet<InstancePath> = HashSet::new();
    let mut reach_defs: HashSet<Path> = HashSet::new();
    let mut reach_externs: HashSet<String> = HashSet::new();

    fn visit_def<'a>(
        path: &Path,
        defs: &HashMap<&'a Path, &'a mlir::Definition>,
        insts: &HashMap<&'a InstancePath, &'a mlir::Instance>,
        impls: &HashMap<&'a ImplementationPath, &'a mlir::Implementation>,
        reach_defs: &mut HashSet<Path>,
        reach_insts: &mut HashSet<InstancePath>,
        reach_impls: &mut HashSet<ImplementationPath>,
        reach_externs: &mut HashSet<String>,
    ) {
        if !reach_defs.insert(path.clone()) {
            return;
        }
        if let Some(defi) = defs.get(path) {
            visit_inst(&defi.inst, defs, insts, impls, reach_defs, reach_insts, reach_impls, reach_externs);
        }
    }

    fn visit_inst<'a>(
        path: &InstancePath,
        defs: &HashMap<&'a Path, &'a mlir::Definition>,
        insts: &HashMap<&'a InstancePath, &'a mlir::Instance>,
        impls: &HashMap<&'a ImplementationPath, &'a mlir::Implementation>,
        reach_defs: &mut HashSet<Path>,
        reach_insts: &mut HashSet<InstancePath>,
        reach_impls: &mut HashSet<ImplementationPath>,
        reach_externs: &mut HashSet<String>,
    ) {
        if !reach_insts.insert(path.clone()) {
            return;
        }
        if let Some(inst) = insts.get(path) {
            visit_impl(&inst.implementation, defs, insts, impls, reach_defs, reach_insts, reach_impls, reach_externs);
            for cap in &inst.captures {
                visit_inst(cap, defs, insts, impls, reach_defs, reach_insts, reach_impls, reach_externs);
            }
        }
    }

    fn visit_impl<'a>(
        path: &ImplementationPath,
        defs: &HashMap<&'a Path, &'a mlir::Definition>,
        insts: &HashMap<&'a InstancePath, &'a mlir::Instance>,
        impls: &HashMap<&'a ImplementationPath, &'a mlir::Implementation>,
        reach_defs: &mut HashSet<Path>,
        reach_insts: &mut HashSet<InstancePath>,
        reach_impls: &mut HashSet<ImplementationPath>,
        reach_externs: &mut HashSet<String>,
    ) {
        if !reach_impls.insert(path.clone()) {
            return;
        }
        if let Some(imp) = impls.get(path) {
            let mut lits = Vec::new();
            match imp {
                mlir::Implementation::Return { value, .. } => lits.push(value),
                mlir::Implementation::TailCall { fn_, arg, .. } => {
                    lits.push(fn_);
                    lits.push(arg);
                }
                mlir::Implementation::ContinueCall { fn_, arg, next, .. } => {
                    lits.push(fn_);
                    lits.push(arg);
                    lits.push(next);
                }
            }
            for lit in lits {
                visit_lit(lit, defs, insts, impls, reach_defs, reach_insts, reach_impls, reach_externs);
            }
        }
    }

    fn visit_lit<'a>(
        lit: &mlir::ValueLiteral,
        defs: &HashMap<&'a Path, &'a mlir::Definition>,
        insts: &HashMap<&'a InstancePath, &'a mlir::Instance>,
        impls: &HashMap<&'a ImplementationPath, &'a mlir::Implementation>,
        reach_defs: &mut HashSet<Path>,
        reach_insts: &mut HashSet<InstancePath>,
        reach_impls: &mut HashSet<ImplementationPath>,
        reach_externs: &mut HashSet<String>,
    ) {
        match lit {
            mlir::ValueLiteral::Capture(_) => {}
            mlir::ValueLiteral::Extern(name) => {
                reach_externs.insert(name.clone());
            }
            mlir::ValueLiteral::Definition(path) => {
                visit_def(path, defs, insts, impls, reach_defs, reach_insts, reach_impls, reach_externs);
            }
            mlir::ValueLiteral::Instance(path) => {
                visit_inst(path, defs, insts, impls, reach_defs, reach_insts, reach_impls, reach_externs);
            }
            mlir::ValueLiteral::Implementation { path, .. } => {
                visit_impl(path, defs, insts, impls, reach_defs, reach_insts, reach_impls, reach_externs);
            }
        }
    }

    for defi in &crate_.definitions {
        if defi.is_public || defi.needs_init {
            visit_def(
                &defi.path,
                &defs,
                &insts,
                &impls,
                &mut reach_defs,
                &mut reach_insts,
                &mut reach_impls,
                &mut reach_externs,
            );
        }
    }

    let mut definitions: Vec<mlir::Definition> =
        crate_.definitions.into_iter().filter(|d| reach_defs.contains(&d.path)).collect();
    let mut instances: Vec<mlir::Instance> =
        crate_.instances.into_iter().filter(|i| reach_insts.contains(&i.path)).collect();
    let implementations: Vec<mlir::Implementation> =
        crate_.implementations.into_iter().filter(|i| reach_impls.contains(i.path())).collect();
    let externs: Vec<String> = crate_.externs.into_iter().filter(|e| reach_externs.contains(e)).collect();

    // Renumber surviving instances densely per path, starting at 0, and
    // rewrite every reference (Definition.inst, Instance.captures,
    // InstanceLiteral) to match.
    let mut next_id: HashMap<Path, u32> = HashMap::new();
    let mut renumbered: HashMap<InstancePath, InstancePath> = HashMap::new();
    for inst in &instances {
        let counter = next_id.entry(inst.path.path.clone()).or_insert(0);
        let new_path = InstancePath { path: inst.path.path.clone(), id: *counter };
        *counter += 1;
        renumbered.insert(inst.path.clone(), new_path);
    }

    let remap = |p: &InstancePath| renumbered.get(p).cloned().unwrap_or_else(|| p.clone());

    for inst in &mut instances {
        inst.path = remap(&inst.path);
        for cap in &mut inst.captures {
            *cap = remap(cap);
        }
    }
    for defi in &mut definitions {
        defi.inst = remap(&defi.inst);
    }

    fn remap_lit(lit: &mut mlir::ValueLiteral, renumbered: &HashMap<InstancePath, InstancePath>) {
        if let mlir::ValueLiteral::Instance(p) = lit {
            if let Some(new_p) = renumbered.get(p) {
                *p = new_p.clone();
            }
        }
    }
    let mut implementations = implementations;
    for imp in &mut implementations {
        match imp {
            mlir::Implementation::Return { value, .. } => remap_lit(value, &renumbered),
            mlir::Implementation::TailCall { fn_, arg, .. } => {
                remap_lit(fn_, &renumbered);
                remap_lit(arg, &renumbered);
            }
            mlir::Implementation::ContinueCall { fn_, arg, next, .. } => {
                remap_lit(fn_, &renumbered);
                remap_lit(arg, &renumbered);
                remap_lit(next, &renumbered);
            }
        }
    }

    mlir::Crate { name: crate_.name, extern_crates: crate_.extern_crates, externs, definitions, implementations, instances }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambdac_frontend::path::Path as LPath;

    fn path(s: &str) -> LPath {
        LPath::parse(s).unwrap()
    }

    #[test]
    fn identical_implementations_deduplicate_to_one() {
        let p1 = ImplementationPath { path: path("main::a"), lambda_id: 0, continuation_id: 0 };
        let p2 = ImplementationPath { path: path("main::b"), lambda_id: 0, continuation_id: 0 };

        let crate_ = mlir::Crate {
            name: "main".into(),
            extern_crates: vec![],
            externs: vec![],
            definitions: vec![
                mlir::Definition {
                    path: path("main::a"),
                    inst: InstancePath { path: path("main::a"), id: 0 },
                    needs_init: false,
                    is_public: true,
                },
                mlir::Definition {
                    path: path("main::b"),
                    inst: InstancePath { path: path("main::b"), id: 0 },
                    needs_init: false,
                    is_public: true,
                },
            ],
            implementations: vec![
                mlir::Implementation::Return { path: p1.clone(), captures: 0, value: mlir::ValueLiteral::Capture(0) },
                mlir::Implementation::Return { path: p2.clone(), captures: 0, value: mlir::ValueLiteral::Capture(0) },
            ],
            instances: vec![
                mlir::Instance { path: InstancePath { path: path("main::a"), id: 0 }, implementation: p1, captures: vec![] },
                mlir::Instance { path: InstancePath { path: path("main::b"), id: 0 }, implementation: p2, captures: vec![] },
            ],
        };

        let out = dedup_crate(&crate_);
        assert_eq!(out.implementations.len(), 1, "structurally identical impls should collapse to one");
        assert_eq!(out.instances.len(), 2, "each path keeps its own instance, just sharing one implementation");
    }

    #[test]
    fn unreachable_private_definition_is_shaken_out() {
        let p_live = ImplementationPath { path: path("main::live"), lambda_id: 0, continuation_id: 0 };
        let p_dead = ImplementationPath { path: path("main::dead"), lambda_id: 0, continuation_id: 0 };

        let crate_ = mlir::Crate {
            name: "main".into(),
            extern_crates: vec![],
            externs: vec![],
            definitions: vec![
                mlir::Definition {
                    path: path("main::live"),
                    inst: InstancePath { path: path("main::live"), id: 0 },
                    needs_init: false,
                    is_public: true,
                },
                mlir::Definition {
                    path: path("main::dead"),
                    inst: InstancePath { path: path("main::dead"), id: 0 },
                    needs_init: false,
                    is_public: false,
                },
            ],
            implementations: vec![
                mlir::Implementation::Return { path: p_live.clone(), captures: 0, value: mlir::ValueLiteral::Capture(0) },
                mlir::Implementation::Return { path: p_dead.clone(), captures: 0, value: mlir::ValueLiteral::Capture(0) },
            ],
            instances: vec![
                mlir::Instance { path: InstancePath { path: path("main::live"), id: 0 }, implementation: p_live, captures: vec![] },
                mlir::Instance { path: InstancePath { path: path("main::dead"), id: 0 }, implementation: p_dead, captures: vec![] },
            ],
        };

        let out = dedup_crate(&crate_);
        assert_eq!(out.definitions.len(), 1);
        assert_eq!(out.definitions[0].path, path("main::live"));
    }
}
