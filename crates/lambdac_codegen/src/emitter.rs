//! The shared emission state threaded through [`crate::instance`] and
//! [`crate::body`]: one [`CrateEmitter`] per crate, caching every global,
//! instance alias, and implementation function so forward references within
//! the same crate resolve to a single LLVM value regardless of visit order.

use std::collections::HashMap;

use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::{FunctionValue, GlobalValue};
use inkwell::AddressSpace;

use lambdac_frontend::path::{ImplementationPath, InstancePath, Path};
use lambdac_middle::mlir;

use crate::mangle;
use crate::runtime::{self, RuntimeFns};
use crate::target::Architecture;
use crate::types::TypeRegistry;
use crate::{Error, Result};

pub struct CrateEmitter<'ctx> {
    pub(crate) context: &'ctx Context,
    pub(crate) module: Module<'ctx>,
    pub(crate) registry: TypeRegistry<'ctx>,
    pub(crate) runtime: RuntimeFns<'ctx>,
    pub(crate) arch: Architecture,

    pub(crate) globals: HashMap<Path, GlobalValue<'ctx>>,
    pub(crate) insts: HashMap<InstancePath, GlobalValue<'ctx>>,
    pub(crate) inst_backings: HashMap<InstancePath, GlobalValue<'ctx>>,
    pub(crate) impls: HashMap<ImplementationPath, FunctionValue<'ctx>>,
    pub(crate) externs: HashMap<String, GlobalValue<'ctx>>,
}

impl<'ctx> CrateEmitter<'ctx> {
    pub fn new(context: &'ctx Context, crate_name: &str, arch: Architecture) -> Self {
        let module = context.create_module(crate_name);
        module.set_triple(&inkwell::targets::TargetTriple::create(arch.triple));
        module.set_data_layout(&inkwell::support::DataLayout::create(arch.data_layout));

        let registry = TypeRegistry::new(context, arch);
        let runtime = runtime::declare_runtime(&module, &registry);

        Self {
            context,
            module,
            registry,
            runtime,
            arch,
            globals: HashMap::new(),
            insts: HashMap::new(),
            inst_backings: HashMap::new(),
            impls: HashMap::new(),
            externs: HashMap::new(),
        }
    }

    pub fn into_module(self) -> Module<'ctx> {
        self.module
    }

    pub fn verify(&self) -> Result<()> {
        self.module
            .verify()
            .map_err(|msg| Error::VerificationFailed(msg.to_string()))
    }

    /// Run the full crate pipeline: pre-declare every symbol this crate
    /// owns (so forward references within a single pass resolve), then
    /// define each definition, instance, and implementation in turn,
    /// finally closing out with the crate's init/fini functions.
    pub fn emit_crate(&mut self, crate_: &mlir::Crate) -> Result<()> {
        for defi in &crate_.definitions {
            self.ensure_global(&defi.path);
        }
        for inst in &crate_.instances {
            self.ensure_inst(&inst.path);
        }
        for imp in &crate_.implementations {
            self.ensure_impl(imp.path());
        }

        for defi in &crate_.definitions {
            crate::instance::emit_definition(self, defi);
        }
        for inst in &crate_.instances {
            crate::instance::emit_instance(self, inst);
        }
        for imp in &crate_.implementations {
            crate::body::emit_implementation(self, imp);
        }

        crate::program::emit_crate_init_fini(self, &crate_.name, &crate_.definitions);

        Ok(())
    }

    /// Get-or-create the `%lambda*` global backing a Definition, whether or
    /// not it's owned by this crate (a cross-crate reference declares it
    /// `external`).
    pub(crate) fn ensure_global(&mut self, path: &Path) -> GlobalValue<'ctx> {
        if let Some(g) = self.globals.get(path) {
            return *g;
        }
        let name = mangle::mangle_path(path);
        let g = self.module.add_global(self.registry.ptr_type(), None, &name);
        self.globals.insert(path.clone(), g);
        g
    }

    /// Get-or-create the public `%lambda` alias for an instance.
    pub(crate) fn ensure_inst(&mut self, inst: &InstancePath) -> GlobalValue<'ctx> {
        if let Some(g) = self.insts.get(inst) {
            return *g;
        }
        let name = mangle::mangle_inst(inst, false);
        let alias = self
            .module
            .add_global_alias(self.registry.lambda(), AddressSpace::default(), &name);
        self.insts.insert(inst.clone(), alias);
        alias
    }

    /// Get-or-create the private `%lambda_c<N>` backing aggregate.
    pub(crate) fn ensure_inst_backing(&mut self, inst: &InstancePath, captures: u32) -> GlobalValue<'ctx> {
        if let Some(g) = self.inst_backings.get(inst) {
            return *g;
        }
        let name = mangle::mangle_inst(inst, true);
        let ty = self.registry.instance_type(captures);
        let g = self.module.add_global(ty, None, &name);
        self.inst_backings.insert(inst.clone(), g);
        g
    }

    /// Get-or-create the declared `%lambda*(%lambda*, %lambda*, %lambda_cont*)`
    /// implementation function, whether or not it's defined by this crate.
    pub(crate) fn ensure_impl(&mut self, impl_path: &ImplementationPath) -> FunctionValue<'ctx> {
        if let Some(f) = self.impls.get(impl_path) {
            return *f;
        }
        let name = mangle::mangle_impl(impl_path);
        let f = self.module.add_function(&name, self.registry.lambda_fn(), None);
        self.impls.insert(impl_path.clone(), f);
        f
    }

    /// Get-or-create the `external dso_local global %lambda*` for a runtime
    /// extern symbol.
    pub(crate) fn ensure_extern(&mut self, name: &str) -> GlobalValue<'ctx> {
        if let Some(g) = self.externs.get(name) {
            return *g;
        }
        let g = self.module.add_global(self.registry.ptr_type(), None, name);
        self.externs.insert(name.to_string(), g);
        g
    }
}
