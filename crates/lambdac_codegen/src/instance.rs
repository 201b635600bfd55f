//! Emits Definitions and Instances (spec §4.7's "symbol mangling" section):
//! a Definition is a `%lambda*` global; an Instance is a private constant
//! `%lambda_c<N>` aggregate plus a public `%lambda` alias pointing at it.

use inkwell::module::Linkage;
use inkwell::values::PointerValue;

use lambdac_middle::mlir;

use crate::emitter::CrateEmitter;

pub fn emit_definition<'ctx>(emitter: &mut CrateEmitter<'ctx>, defi: &mlir::Definition) {
    let inst_alias = emitter.ensure_inst(&defi.inst);
    let global = emitter.ensure_global(&defi.path);

    if !defi.is_public {
        global.set_linkage(Linkage::Internal);
    }
    global.set_dso_local(true);

    let init: PointerValue<'ctx> = if defi.needs_init {
        emitter.registry.ptr_type().const_null()
    } else {
        inst_alias.as_pointer_value()
    };
    global.set_initializer(&init);
}

pub fn emit_instance<'ctx>(emitter: &mut CrateEmitter<'ctx>, inst: &mlir::Instance) {
    let captures = inst.captures.len() as u32;
    let impl_fn = emitter.ensure_impl(&inst.implementation);

    let capture_ptrs: Vec<PointerValue<'ctx>> = inst
        .captures
        .iter()
        .map(|cap| emitter.ensure_inst(cap).as_pointer_value())
        .collect();

    let ptr_bits = emitter.registry.ptr_bits_type();
    let header_const = emitter.registry.lambda_header().const_named_struct(&[
        ptr_bits.const_int(1, false).into(),
        ptr_bits.const_int(captures as u64, false).into(),
        ptr_bits.const_int(0, false).into(),
        impl_fn.as_global_value().as_pointer_value().into(),
    ]);

    let array_const = emitter.registry.ptr_type().const_array(&capture_ptrs);

    let instance_ty = emitter.registry.instance_type(captures);
    let backing_const = instance_ty.const_named_struct(&[header_const.into(), array_const.into()]);

    let backing = emitter.ensure_inst_backing(&inst.path, captures);
    backing.set_linkage(Linkage::Private);
    backing.set_dso_local(true);
    backing.set_unnamed_addr(true);
    backing.set_constant(true);
    backing.set_initializer(&backing_const);

    let alias = emitter.ensure_inst(&inst.path);
    alias.set_dso_local(true);
    alias.set_initializer(&backing.as_pointer_value());
}
