//! Dependency orderer (spec §4.8, component C9).
//!
//! The resolver (C3) already walks each crate's own module tree in
//! post-order and leaves the result on [`lambdac_frontend::hlir::Crate::statements`]
//! (see that type's own doc comment); what remains for this module is the
//! *crate*-level half of §4.8: sorting the crates themselves so
//! dependencies come before dependents. The same order drives both init/
//! fini emission and the `.d`-style build dependency file (spec §6).

use std::collections::{HashMap, HashSet};

use lambdac_frontend::hlir;
use lambdac_middle::mlir;

use crate::error::{CompileError, Result};

/// Topologically sort a [`hlir::Program`]'s crates by their `extern crate`
/// declarations (deps first). Used before lowering, so diagnostics about a
/// bad dependency graph surface before the expensive passes run.
pub fn order_hlir_crates(program: &hlir::Program) -> Result<Vec<String>> {
    let mut deps: HashMap<&str, Vec<&str>> = HashMap::new();
    for crate_ in &program.crates {
        let extern_crates = crate_
            .statements
            .iter()
            .filter_map(|stmt| match stmt {
                hlir::Statement::ExternCrate { name } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        deps.insert(crate_.name.as_str(), extern_crates);
    }
    let all = program.crates.iter().map(|c| c.name.as_str());
    topo_sort(&deps, all)
}

/// The same sort over an already-lowered [`mlir::Program`]; used to decide
/// the order [`lambdac_codegen::emit_program_driver`] wires crate init/fini
/// into `llvm.global_ctors`/`llvm.global_dtors`, and which crate's `main`
/// the whole-program driver calls (the last one, by convention the entry
/// crate).
pub fn order_mlir_crates(program: &mlir::Program) -> Result<Vec<String>> {
    let mut deps: HashMap<&str, Vec<&str>> = HashMap::new();
    for crate_ in &program.crates {
        deps.insert(
            crate_.name.as_str(),
            crate_.extern_crates.iter().map(String::as_str).collect(),
        );
    }
    let all = program.crates.iter().map(|c| c.name.as_str());
    topo_sort(&deps, all)
}

/// Depth-first post-order topological sort: a crate is emitted only after
/// everything it depends on. `Temp`-marked nodes revisited mid-walk signal
/// a cycle (the loader should already reject these, but the orderer does
/// not trust that and re-checks).
fn topo_sort<'a>(deps: &HashMap<&'a str, Vec<&'a str>>, all: impl Iterator<Item = &'a str>) -> Result<Vec<String>> {
    #[derive(PartialEq, Eq, Clone, Copy)]
    enum Mark {
        Temp,
        Done,
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    fn visit<'a>(
        name: &'a str,
        deps: &HashMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Temp) => return Err(CompileError::Frontend(lambdac_frontend::Error::CyclicDependency(name.to_string()))),
            None => {}
        }
        marks.insert(name, Mark::Temp);
        if let Some(children) = deps.get(name) {
            for child in children {
                visit(child, deps, marks, order)?;
            }
        }
        marks.insert(name, Mark::Done);
        order.push(name.to_string());
        Ok(())
    }

    for name in all {
        visit(name, deps, &mut marks, &mut order)?;
    }
    Ok(order)
}

/// Render a Make-compatible dependency rule chain for one crate's build
/// artifacts (spec §6): `.lambda` -> `.hlir` -> `.hlis` -> `.mlir` ->
/// `.opt.mlir` -> `.ll`, with `.mlir` additionally depending on every
/// `extern crate`d dependency's `.hlis`, terminating with a phony rule for
/// the `.lambda` source itself.
pub fn build_dep_file(crate_name: &str, extern_crates: &[String]) -> String {
    let lambda = format!("{crate_name}.lambda");
    let hlir = format!("{crate_name}.hlir");
    let hlis = format!("{crate_name}.hlis");
    let mlir = format!("{crate_name}.mlir");
    let opt_mlir = format!("{crate_name}.opt.mlir");
    let ll = format!("{crate_name}.ll");

    let mut out = String::new();
    out.push_str(&format!("{hlir}: {lambda}\n"));
    out.push_str(&format!("{hlis}: {hlir}\n"));
    out.push_str(&format!("{mlir}: {hlir}"));
    for dep in extern_crates {
        out.push_str(&format!(" {dep}.hlis"));
    }
    out.push('\n');
    out.push_str(&format!("{opt_mlir}: {mlir}\n"));
    out.push_str(&format!("{ll}: {opt_mlir}\n"));
    out.push_str(&format!("{lambda}:\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crate_with_deps(name: &str, deps: &[&str]) -> hlir::Crate {
        let mut c = hlir::Crate::new(name);
        for d in deps {
            c.statements.push(hlir::Statement::ExternCrate { name: d.to_string() });
        }
        c
    }

    #[test]
    fn deps_emitted_before_dependents() {
        let program = hlir::Program {
            entry_crate: "main".to_string(),
            crates: vec![crate_with_deps("main", &["std"]), crate_with_deps("std", &[])],
        };
        let order = order_hlir_crates(&program).unwrap();
        assert_eq!(order, vec!["std".to_string(), "main".to_string()]);
    }

    #[test]
    fn diamond_dependency_each_emitted_once() {
        let program = hlir::Program {
            entry_crate: "main".to_string(),
            crates: vec![
                crate_with_deps("main", &["a", "b"]),
                crate_with_deps("a", &["std"]),
                crate_with_deps("b", &["std"]),
                crate_with_deps("std", &[]),
            ],
        };
        let order = order_hlir_crates(&program).unwrap();
        assert_eq!(order.len(), 4);
        assert_eq!(order.last(), Some(&"main".to_string()));
        let std_pos = order.iter().position(|n| n == "std").unwrap();
        let a_pos = order.iter().position(|n| n == "a").unwrap();
        let b_pos = order.iter().position(|n| n == "b").unwrap();
        assert!(std_pos < a_pos);
        assert!(std_pos < b_pos);
    }

    #[test]
    fn cyclic_dependency_is_rejected() {
        let program = hlir::Program {
            entry_crate: "a".to_string(),
            crates: vec![crate_with_deps("a", &["b"]), crate_with_deps("b", &["a"])],
        };
        assert!(order_hlir_crates(&program).is_err());
    }

    #[test]
    fn dep_file_lists_extern_crate_hlis() {
        let text = build_dep_file("foo", &["std".to_string()]);
        assert!(text.contains("foo.mlir: foo.hlir std.hlis"));
        assert!(text.contains("foo.lambda:\n"));
    }
}
