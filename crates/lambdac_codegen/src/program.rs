//! Per-crate init/fini and the whole-program driver (spec §4.7's last two
//! subsections): composing crate-level constructors/destructors into
//! `@llvm.global_ctors`/`@llvm.global_dtors` and emitting `@main`.

use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::values::PointerValue;
use inkwell::AddressSpace;

use lambdac_frontend::path::Path;
use lambdac_middle::mlir;

use crate::emitter::CrateEmitter;
use crate::mangle;
use crate::target::Architecture;
use crate::types::TypeRegistry;

/// Emit `@_L<len>I<crate>` / `@_L<len>F<crate>`: null-initialize, then
/// `lambda_null_call` and store, every `needs_init` definition in
/// declaration order; unreference each in reverse order on fini.
pub(crate) fn emit_crate_init_fini<'ctx>(emitter: &mut CrateEmitter<'ctx>, crate_name: &str, definitions: &[mlir::Definition]) {
    let needs_init: Vec<&mlir::Definition> = definitions.iter().filter(|d| d.needs_init).collect();

    let void = emitter.context.void_type();
    let init_fn = emitter
        .module
        .add_function(&mangle::mangle_crate_init(crate_name), void.fn_type(&[], false), None);
    let init_bb = emitter.context.append_basic_block(init_fn, "entry");
    let builder = emitter.context.create_builder();
    builder.position_at_end(init_bb);

    for defi in &needs_init {
        let inst_ptr = emitter.ensure_inst(&defi.inst).as_pointer_value();
        let ptr_bits = emitter.registry.ptr_bits_type();
        builder
            .build_call(emitter.runtime.lambda_ref, &[inst_ptr.into(), ptr_bits.const_int(1, false).into()], "")
            .unwrap();
        let call = builder
            .build_call(emitter.runtime.lambda_null_call, &[inst_ptr.into()], "init")
            .unwrap();
        call.set_tail_call(true);
        let value = call.try_as_basic_value().unwrap_basic().into_pointer_value();
        let global = emitter.ensure_global(&defi.path).as_pointer_value();
        builder.build_store(global, value).unwrap();
    }
    builder.build_return(None).unwrap();

    let fini_fn = emitter
        .module
        .add_function(&mangle::mangle_crate_fini(crate_name), void.fn_type(&[], false), None);
    let fini_bb = emitter.context.append_basic_block(fini_fn, "entry");
    builder.position_at_end(fini_bb);

    for defi in needs_init.iter().rev() {
        let global = emitter.ensure_global(&defi.path).as_pointer_value();
        let value = builder
            .build_load(emitter.registry.ptr_type(), global, "val")
            .unwrap()
            .into_pointer_value();
        builder.build_call(emitter.runtime.lambda_unref, &[value.into()], "").unwrap();
    }
    builder.build_return(None).unwrap();
}

/// Emit the whole-program driver module: declares each crate's init/fini,
/// wires them into `@llvm.global_ctors`/`@llvm.global_dtors` in dependency
/// order (deps first for ctors, reversed for dtors), and emits `@main`,
/// which calls `main_crate::main` via `lambda_null_call`.
pub fn emit_program_driver<'ctx>(context: &'ctx Context, crates_in_order: &[String], arch: &Architecture) -> Module<'ctx> {
    let module = context.create_module("main");
    module.set_triple(&inkwell::targets::TargetTriple::create(arch.triple));
    module.set_data_layout(&inkwell::support::DataLayout::create(arch.data_layout));

    let registry = TypeRegistry::new(context, *arch);
    let runtime = crate::runtime::declare_runtime(&module, &registry);

    let void = context.void_type();
    let crate_ctors: Vec<_> = crates_in_order
        .iter()
        .map(|c| module.add_function(&mangle::mangle_crate_init(c), void.fn_type(&[], false), None))
        .collect();
    let crate_dtors: Vec<_> = crates_in_order
        .iter()
        .map(|c| module.add_function(&mangle::mangle_crate_fini(c), void.fn_type(&[], false), None))
        .collect();

    let builder = context.create_builder();

    let global_init = module.add_function("_LI", void.fn_type(&[], false), None);
    let init_bb = context.append_basic_block(global_init, "entry");
    builder.position_at_end(init_bb);
    for ctor in &crate_ctors {
        let call = builder.build_call(*ctor, &[], "").unwrap();
        call.set_tail_call(true);
    }
    builder.build_return(None).unwrap();

    let global_fini = module.add_function("_LF", void.fn_type(&[], false), None);
    let fini_bb = context.append_basic_block(global_fini, "entry");
    builder.position_at_end(fini_bb);
    for dtor in crate_dtors.iter().rev() {
        let call = builder.build_call(*dtor, &[], "").unwrap();
        call.set_tail_call(true);
    }
    builder.build_return(None).unwrap();

    emit_global_ctor_dtor_table(&module, context, "llvm.global_ctors", global_init);
    emit_global_ctor_dtor_table(&module, context, "llvm.global_dtors", global_fini);

    // @main: load main_crate::main, lambda_null_call it, unref, return 0.
    let main_crate = crates_in_order
        .last()
        .expect("program driver needs at least one crate")
        .clone();
    let main_path = Path::new(vec![main_crate, "main".to_string()]);
    let main_global = module.add_global(registry.ptr_type(), None, &mangle::mangle_path(&main_path));
    main_global.set_dso_local(true);

    let i32_ty = context.i32_type();
    let main_fn = module.add_function("main", i32_ty.fn_type(&[], false), None);
    let main_bb = context.append_basic_block(main_fn, "entry");
    builder.position_at_end(main_bb);

    let entry_point: PointerValue = builder
        .build_load(registry.ptr_type(), main_global.as_pointer_value(), "entry")
        .unwrap()
        .into_pointer_value();

    let ptr_bits = registry.ptr_bits_type();
    builder
        .build_call(runtime.lambda_ref, &[entry_point.into(), ptr_bits.const_int(1, false).into()], "")
        .unwrap();
    let call = builder.build_call(runtime.lambda_null_call, &[entry_point.into()], "result").unwrap();
    call.set_tail_call(true);
    let result = call.try_as_basic_value().unwrap_basic().into_pointer_value();
    builder.build_call(runtime.lambda_unref, &[result.into()], "").unwrap();
    builder.build_return(Some(&i32_ty.const_zero())).unwrap();

    module
}

/// Register a zero-argument void function in LLVM's appending
/// `llvm.global_ctors`/`llvm.global_dtors` array at the default priority.
fn emit_global_ctor_dtor_table<'ctx>(
    module: &Module<'ctx>,
    context: &'ctx Context,
    symbol: &str,
    func: inkwell::values::FunctionValue<'ctx>,
) {
    let i32_ty = context.i32_type();
    let ptr_ty = context.ptr_type(AddressSpace::default());
    let entry_ty = context.struct_type(&[i32_ty.into(), ptr_ty.into(), ptr_ty.into()], false);
    let array_ty = entry_ty.array_type(1);

    let entry = entry_ty.const_named_struct(&[
        i32_ty.const_int(65535, false).into(),
        func.as_global_value().as_pointer_value().into(),
        ptr_ty.const_null().into(),
    ]);
    let table = array_ty.const_array(&[entry]);

    let global = module.add_global(array_ty, None, symbol);
    global.set_linkage(Linkage::Appending);
    global.set_initializer(&table);
}
