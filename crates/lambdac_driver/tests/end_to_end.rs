//! End-to-end pipeline scenarios from spec.md §8: surface text in, reduced
//! MLIR out, exercised through the same stages [`lambdac_driver::compile`]
//! runs (resolve → CPS/closure-convert → partial-evaluate → dedup), minus
//! codegen/linking which needs a real target toolchain.

use std::path::Path;

use lambdac_frontend::loader::FileListLoader;
use lambdac_frontend::resolve::Resolver;
use lambdac_middle::mlir;
use lambdac_middle::{eval::EvalOptions, lower_program};

fn lower(files: &[(&str, &str)]) -> mlir::Program {
    let loader = FileListLoader::new(files.iter().map(|(n, s)| (n.to_string(), s.to_string())).collect());
    let hlir_program = Resolver::new(&loader).resolve_program(Path::new("main.lambda")).expect("resolve");
    lower_program(&hlir_program, EvalOptions::default()).expect("lower")
}

fn only_crate(program: &mlir::Program, name: &str) -> &mlir::Crate {
    program.crates.iter().find(|c| c.name == name).unwrap_or_else(|| panic!("no crate named {name}"))
}

/// Scenario 1: identity. One implementation, one instance, one public
/// Definition each for `main` and `ident`; neither needs init.
#[test]
fn identity_scenario() {
    let program = lower(&[("main", "pub main = _ -> ident; pub ident = a -> a;")]);
    let main = only_crate(&program, "main");

    assert_eq!(main.definitions.len(), 2);
    for defi in &main.definitions {
        assert!(!defi.needs_init, "{} should be a compile-time constant", defi.path);
        assert!(defi.is_public);
    }
}

/// Scenario 2: Church booleans. Three Definitions; `not`'s body tail-calls
/// without needing a ContinueCall frame (the chain has only one call).
#[test]
fn church_booleans_scenario() {
    let program = lower(&[(
        "main",
        "pub true = a -> b -> a; pub false = a -> b -> b; pub not = a -> a false true;",
    )]);
    let main = only_crate(&program, "main");

    assert_eq!(main.definitions.len(), 3);

    let not_impls: Vec<&mlir::Implementation> = main
        .implementations
        .iter()
        .filter(|i| i.path().path == lambdac_frontend::path::Path::parse("main::not").unwrap())
        .collect();
    assert!(
        not_impls.iter().any(|i| matches!(i, mlir::Implementation::TailCall { .. })),
        "not's single call should tail-call, not chain through a continuation"
    );
    assert!(!not_impls.iter().any(|i| matches!(i, mlir::Implementation::ContinueCall { .. })));
}

/// Scenario 4: nested closure. The inner lambda captures the outer
/// argument as upvalue index 1 and is born inside `k`'s entry point.
#[test]
fn nested_closure_captures_outer_argument() {
    let program = lower(&[("main", "pub k = a -> b -> a;")]);
    let main = only_crate(&program, "main");

    let inner_return = main.implementations.iter().find(|i| {
        matches!(i, mlir::Implementation::Return { captures: 1, value: mlir::ValueLiteral::Capture(1), .. })
    });
    assert!(inner_return.is_some(), "expected a one-capture Return reading its sole upvalue");
}

/// Scenario 5: CPS chain. `apply2 = f -> x -> f (f x)` has two calls in
/// its body: the first becomes a ContinueCall, the second (closing the
/// chain) a TailCall.
#[test]
fn cps_chain_scenario() {
    let program = lower(&[("main", "pub apply2 = f -> x -> f (f x);")]);
    let main = only_crate(&program, "main");

    let tail_calls =
        main.implementations.iter().filter(|i| matches!(i, mlir::Implementation::TailCall { .. })).count();
    let continue_calls =
        main.implementations.iter().filter(|i| matches!(i, mlir::Implementation::ContinueCall { .. })).count();
    assert_eq!(tail_calls, 1);
    assert_eq!(continue_calls, 1);
}

/// Scenario 6: cross-crate reference. `foo::x` aliases into `std::ident`
/// by definition, and `std` survives tree-shaking because `foo` is the
/// (sole, thus entry) crate depending on it.
#[test]
fn cross_crate_reference_scenario() {
    let program = lower(&[
        ("main", "extern crate std; pub x = std::ident;"),
        ("std", "pub ident = a -> a;"),
    ]);

    let main = only_crate(&program, "main");
    assert_eq!(main.extern_crates, vec!["std".to_string()]);

    let std_crate = only_crate(&program, "std");
    assert!(
        std_crate.definitions.iter().any(|d| d.path == lambdac_frontend::path::Path::parse("std::ident").unwrap()),
        "std::ident is itself public, so it survives its own crate's tree-shake"
    );
}

/// A pure body that only ever touches locals and other pure definitions
/// needs no runtime initialization (dedup soundness / purity propagation,
/// spec.md §8's universal properties, exercised at the MLIR boundary).
#[test]
fn pure_definitions_need_no_init() {
    let program = lower(&[("main", "pub main = _ -> ident; pub ident = a -> a;")]);
    let main = only_crate(&program, "main");
    assert!(main.definitions.iter().all(|d| !d.needs_init));
}

/// An impure definition touching an extern must be marked `needs_init` so
/// the program driver initializes it at startup rather than at link time.
#[test]
fn impure_extern_definition_needs_init() {
    let program = lower(&[("main", "extern impure putchar; pub impure main = a -> putchar;")]);
    let main = only_crate(&program, "main");
    let main_def = main
        .definitions
        .iter()
        .find(|d| d.path == lambdac_frontend::path::Path::parse("main::main").unwrap())
        .expect("main::main survives tree-shake as the public entry point");
    assert!(main_def.needs_init);
}
