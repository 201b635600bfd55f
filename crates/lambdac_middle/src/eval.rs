//! Partial evaluator / instantiator (spec §4.5, component C6).
//!
//! Drives an explicit-stack abstract machine over MLIR to fold every
//! compile-time-known definition down to a concrete `Instance`, and
//! specializes call sites whose operands are already fully known. Per
//! spec §9's explicit warning, the machine never recurses on the host
//! call stack — `evaluate_stack` loops with its own continuation stack,
//! so a long chain of compile-time reductions (e.g. deeply Church-encoded
//! numerals) cannot overflow it.

use std::collections::HashMap;

use lambdac_frontend::path::{ImplementationPath, InstancePath, Path};

use crate::error::{Error, Result};
use crate::mlir;

/// Tunables for one evaluation run (spec §4.5's non-termination guard).
#[derive(Debug, Clone, Copy)]
pub struct EvalOptions {
    pub step_budget: u64,
}

impl Default for EvalOptions {
    fn default() -> Self {
        // matches the step-budget default recorded in SPEC_FULL.md
        Self { step_budget: 1_000_000 }
    }
}

struct Evaluator {
    opts: EvalOptions,
    impl_table: HashMap<ImplementationPath, mlir::Implementation>,
    inst_table: HashMap<InstancePath, mlir::Instance>,
    /// The instance produced the last time this impl path was
    /// zero-capture-instantiated; used to recover a usable (thunk) value
    /// for definitions the machine couldn't fully reduce.
    impl_inst_table: HashMap<ImplementationPath, InstancePath>,
    inst_id_counter: HashMap<Path, u32>,
    def_table: HashMap<Path, mlir::Definition>,
    instances: Vec<mlir::Instance>,
    definitions: Vec<mlir::Definition>,
    steps: u64,
}

impl Evaluator {
    fn new(opts: EvalOptions) -> Self {
        Self {
            opts,
            impl_table: HashMap::new(),
            inst_table: HashMap::new(),
            impl_inst_table: HashMap::new(),
            inst_id_counter: HashMap::new(),
            def_table: HashMap::new(),
            instances: Vec::new(),
            definitions: Vec::new(),
            steps: 0,
        }
    }

    fn next_inst_id(&mut self, path: &Path) -> u32 {
        let counter = self.inst_id_counter.entry(path.clone()).or_insert(0);
        let id = *counter;
        *counter += 1;
        id
    }

    fn instantiate(&mut self, impl_path: &ImplementationPath, selected: Vec<InstancePath>) -> InstancePath {
        let id = self.next_inst_id(&impl_path.path);
        let inst_path = InstancePath { path: impl_path.path.clone(), id };
        let inst = mlir::Instance { path: inst_path.clone(), implementation: impl_path.clone(), captures: selected };
        self.inst_table.insert(inst_path.clone(), inst.clone());
        self.impl_inst_table.insert(impl_path.clone(), inst_path.clone());
        self.instances.push(inst);
        inst_path
    }

    fn step(&mut self, path: &Path) -> Result<()> {
        self.steps += 1;
        if self.steps > self.opts.step_budget {
            return Err(Error::StepBudgetExceeded { path: path.clone() });
        }
        Ok(())
    }

    /// The driving loop: spec §4.5's `(fn, arg)` register pair plus an
    /// explicit continuation stack, looped until both drain.
    fn evaluate_stack(&mut self, path: &Path, entry: &ImplementationPath) -> Result<InstancePath> {
        let mut stack: Vec<InstancePath> = Vec::new();
        let (mut fn_reg, mut arg) = self.evaluate_impl(path, entry, &[], &mut stack)?;

        loop {
            if fn_reg.is_none() && stack.is_empty() {
                return Ok(arg);
            }
            self.step(path)?;

            let callee = match fn_reg.take() {
                Some(f) => f,
                None => stack.pop().expect("checked non-empty above"),
            };
            let (next_fn, next_arg) = self.evaluate_inst(path, &callee, &arg, &mut stack)?;
            fn_reg = next_fn;
            arg = next_arg;
        }
    }

    fn evaluate_inst(
        &mut self,
        path: &Path,
        callee: &InstancePath,
        arg: &InstancePath,
        stack: &mut Vec<InstancePath>,
    ) -> Result<(Option<InstancePath>, InstancePath)> {
        let inst = self
            .inst_table
            .get(callee)
            .cloned()
            .ok_or_else(|| Error::CannotEvaluate { path: path.clone() })?;

        let mut captures = Vec::with_capacity(1 + inst.captures.len());
        captures.push(arg.clone());
        captures.extend(inst.captures);
        self.evaluate_impl(path, &inst.implementation, &captures, stack)
    }

    fn evaluate_impl(
        &mut self,
        path: &Path,
        impl_path: &ImplementationPath,
        captures: &[InstancePath],
        stack: &mut Vec<InstancePath>,
    ) -> Result<(Option<InstancePath>, InstancePath)> {
        let imp = self
            .impl_table
            .get(impl_path)
            .cloned()
            .ok_or_else(|| Error::UnresolvedImplementation(impl_path.clone()))?;

        match imp {
            mlir::Implementation::Return { value, .. } => {
                let v = self.evaluate_literal(path, &value, captures)?;
                Ok((None, v))
            }
            mlir::Implementation::TailCall { fn_, arg, .. } => {
                let f = self.evaluate_literal(path, &fn_, captures)?;
                let a = self.evaluate_literal(path, &arg, captures)?;
                Ok((Some(f), a))
            }
            mlir::Implementation::ContinueCall { fn_, arg, next, .. } => {
                let f = self.evaluate_literal(path, &fn_, captures)?;
                let a = self.evaluate_literal(path, &arg, captures)?;
                let n = self.evaluate_literal(path, &next, captures)?;
                stack.push(n);
                Ok((Some(f), a))
            }
        }
    }

    /// Reduces one literal operand to a concrete instance. `Extern`
    /// operands and references to a not-yet-evaluated definition both
    /// surface `CannotEvaluate` (spec §4.5/§7's `InstantiateCannotEvaluate`,
    /// not fatal — the caller marks the owning definition `needs_init`).
    fn evaluate_literal(
        &mut self,
        path: &Path,
        lit: &mlir::ValueLiteral,
        captures: &[InstancePath],
    ) -> Result<InstancePath> {
        match lit {
            mlir::ValueLiteral::Capture(id) => captures
                .get(*id as usize)
                .cloned()
                .ok_or_else(|| Error::CannotEvaluate { path: path.clone() }),
            mlir::ValueLiteral::Extern(_) => Err(Error::CannotEvaluate { path: path.clone() }),
            mlir::ValueLiteral::Definition(def_path) => self
                .def_table
                .get(def_path)
                .map(|d| d.inst.clone())
                .ok_or_else(|| Error::CannotEvaluate { path: path.clone() }),
            mlir::ValueLiteral::Instance(inst_path) => Ok(inst_path.clone()),
            mlir::ValueLiteral::Implementation { path: impl_path, captures: idx } => {
                let mut selected = Vec::with_capacity(idx.len());
                for &i in idx {
                    selected.push(
                        captures
                            .get(i as usize)
                            .cloned()
                            .ok_or_else(|| Error::CannotEvaluate { path: path.clone() })?,
                    );
                }
                Ok(self.instantiate(impl_path, selected))
            }
        }
    }

    /// Call-site specialization (spec §4.5): fold a literal operand into an
    /// `InstanceLiteral` wherever its value is already fully known, leaving
    /// everything else untouched for codegen or a later init-time load.
    fn specialize_literal(&mut self, lit: mlir::ValueLiteral) -> mlir::ValueLiteral {
        match &lit {
            mlir::ValueLiteral::Definition(def_path) => {
                if let Some(defi) = self.def_table.get(def_path) {
                    if !defi.needs_init {
                        return mlir::ValueLiteral::Instance(defi.inst.clone());
                    }
                }
                lit
            }
            mlir::ValueLiteral::Implementation { path, captures } if captures.is_empty() => {
                let path = path.clone();
                mlir::ValueLiteral::Instance(self.instantiate(&path, Vec::new()))
            }
            _ => lit,
        }
    }

    fn specialize_implementation(&mut self, imp: &mut mlir::Implementation) {
        match imp {
            mlir::Implementation::Return { value, .. } => {
                *value = self.specialize_literal(std::mem::replace(value, mlir::ValueLiteral::Capture(0)));
            }
            mlir::Implementation::TailCall { fn_, arg, .. } => {
                *fn_ = self.specialize_literal(std::mem::replace(fn_, mlir::ValueLiteral::Capture(0)));
                *arg = self.specialize_literal(std::mem::replace(arg, mlir::ValueLiteral::Capture(0)));
            }
            mlir::Implementation::ContinueCall { fn_, arg, next, .. } => {
                *fn_ = self.specialize_literal(std::mem::replace(fn_, mlir::ValueLiteral::Capture(0)));
                *arg = self.specialize_literal(std::mem::replace(arg, mlir::ValueLiteral::Capture(0)));
                *next = self.specialize_literal(std::mem::replace(next, mlir::ValueLiteral::Capture(0)));
            }
        }
    }

    fn evaluate_definition(&mut self, path: &Path, entry: &ImplementationPath, is_public: bool) {
        match self.evaluate_stack(path, entry) {
            Ok(inst_path) => {
                let defi = mlir::Definition { path: path.clone(), inst: inst_path, needs_init: false, is_public };
                self.def_table.insert(path.clone(), defi.clone());
                self.definitions.push(defi);
            }
            Err(_) => {
                // fall back to the zero-capture thunk wrapper: every entry
                // implementation has zero captures by construction, so it
                // was eagerly instantiated during specialization already.
                let inst_path = self
                    .impl_inst_table
                    .get(entry)
                    .cloned()
                    .unwrap_or_else(|| self.instantiate(entry, Vec::new()));
                let defi = mlir::Definition { path: path.clone(), inst: inst_path, needs_init: true, is_public };
                self.def_table.insert(path.clone(), defi.clone());
                self.definitions.push(defi);
            }
        }
    }

    fn run(mut self, crate_: &mlir::Crate) -> mlir::Crate {
        for imp in &crate_.implementations {
            self.impl_table.insert(imp.path().clone(), imp.clone());
        }

        let mut implementations: Vec<mlir::Implementation> = crate_.implementations.clone();
        for imp in &mut implementations {
            self.specialize_implementation(imp);
            self.impl_table.insert(imp.path().clone(), imp.clone());

            if imp.capture_count() == 0 && !self.impl_inst_table.contains_key(imp.path()) {
                let path = imp.path().clone();
                self.instantiate(&path, Vec::new());
            }
        }

        for defi in &crate_.definitions {
            let entry = ImplementationPath { path: defi.path.clone(), lambda_id: 0, continuation_id: 0 };
            self.evaluate_definition(&defi.path, &entry, defi.is_public);
        }

        mlir::Crate {
            name: crate_.name.clone(),
            extern_crates: crate_.extern_crates.clone(),
            externs: crate_.externs.clone(),
            definitions: self.definitions,
            implementations,
            instances: self.instances,
        }
    }
}

/// Partially evaluates one crate's worth of MLIR (spec §4.5).
pub fn evaluate_crate(crate_: &mlir::Crate, opts: EvalOptions) -> mlir::Crate {
    Evaluator::new(opts).run(crate_)
}

/// Partially evaluates an entire program, crate by crate.
pub fn evaluate_program(prog: &mlir::Program, opts: EvalOptions) -> mlir::Program {
    mlir::Program {
        entry_crate: prog.entry_crate.clone(),
        crates: prog.crates.iter().map(|c| evaluate_crate(c, opts)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambdac_frontend::path::Path as LPath;

    fn path(s: &str) -> LPath {
        LPath::parse(s).unwrap()
    }

    #[test]
    fn pure_lambda_definition_needs_no_init() {
        // `ident = a -> a`: the entry implementation is just Return(Capture(0)),
        // which evaluates with zero captures with no externs involved.
        let p = path("main::ident");
        let entry = ImplementationPath { path: p.clone(), lambda_id: 0, continuation_id: 0 };
        let crate_ = mlir::Crate {
            name: "main".into(),
            extern_crates: vec![],
            externs: vec![],
            definitions: vec![mlir::Definition {
                path: p.clone(),
                inst: InstancePath { path: p.clone(), id: 0 },
                needs_init: true,
                is_public: true,
            }],
            implementations: vec![mlir::Implementation::Return {
                path: entry,
                captures: 0,
                value: mlir::ValueLiteral::Capture(0),
            }],
            instances: vec![],
        };

        let out = evaluate_crate(&crate_, EvalOptions::default());
        assert_eq!(out.definitions.len(), 1);
        assert!(!out.definitions[0].needs_init);
    }

    #[test]
    fn extern_dependent_definition_needs_init() {
        let p = path("main::uses_extern");
        let entry = ImplementationPath { path: p.clone(), lambda_id: 0, continuation_id: 0 };
        let crate_ = mlir::Crate {
            name: "main".into(),
            extern_crates: vec![],
            externs: vec!["putchar".into()],
            definitions: vec![mlir::Definition {
                path: p.clone(),
                inst: InstancePath { path: p.clone(), id: 0 },
                needs_init: true,
                is_public: true,
            }],
            implementations: vec![mlir::Implementation::Return {
                path: entry,
                captures: 0,
                value: mlir::ValueLiteral::Extern("putchar".into()),
            }],
            instances: vec![],
        };

        let out = evaluate_crate(&crate_, EvalOptions::default());
        assert!(out.definitions[0].needs_init);
    }
}
