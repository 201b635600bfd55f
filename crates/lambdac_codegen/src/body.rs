//! Emits Implementation function bodies (spec §4.7's "per-implementation
//! emission"): a refcount prologue derived from counting literal uses,
//! followed by the flat `Return`/`TailCall`/`ContinueCall` tail.

use inkwell::values::{FunctionValue, PointerValue};

use lambdac_middle::mlir::{self, ValueLiteral};

use crate::emitter::CrateEmitter;
use crate::uses::ValueUses;

pub fn emit_implementation<'ctx>(emitter: &mut CrateEmitter<'ctx>, imp: &mlir::Implementation) {
    let uses = ValueUses::count(imp);

    for name in uses.extern_uses.keys() {
        emitter.ensure_extern(name);
    }
    for path in uses.def_uses.keys() {
        emitter.ensure_global(path);
    }
    for inst in uses.inst_uses.keys() {
        emitter.ensure_inst(inst);
    }
    for impl_path in uses.impl_uses.keys() {
        emitter.ensure_impl(impl_path);
    }

    let func = emitter.ensure_impl(imp.path());
    let entry = emitter.context.append_basic_block(func, "entry");
    let builder = emitter.context.create_builder();
    builder.position_at_end(entry);

    let arg = func.get_nth_param(0).unwrap().into_pointer_value();
    let self_ = func.get_nth_param(1).unwrap().into_pointer_value();
    let cont = func.get_nth_param(2).unwrap().into_pointer_value();

    let mut unref_arg = false;
    for (&idx, &refcount) in &uses.capture_uses {
        if idx == 0 {
            if refcount == 0 {
                unref_arg = true;
            } else if refcount > 1 {
                build_lambda_ref(emitter, &builder, arg, refcount - 1);
            }
        } else {
            let ptr = build_load_capture(emitter, &builder, self_, idx - 1);
            build_lambda_ref(emitter, &builder, ptr, refcount);
        }
    }

    for (inst, &refcount) in &uses.inst_uses {
        let ptr = emitter.ensure_inst(inst).as_pointer_value();
        build_lambda_ref(emitter, &builder, ptr, refcount);
    }

    for (name, &refcount) in &uses.extern_uses {
        let ptr = build_load_extern(emitter, &builder, name);
        build_lambda_ref(emitter, &builder, ptr, refcount);
    }

    for (path, &refcount) in &uses.def_uses {
        let ptr = build_load_global(emitter, &builder, path);
        build_lambda_ref(emitter, &builder, ptr, refcount);
    }

    if unref_arg {
        build_lambda_unref(emitter, &builder, arg);
    }

    let ret = match imp {
        mlir::Implementation::Return { value, .. } => {
            let v = realize_literal(emitter, &builder, func, arg, self_, value);
            build_lambda_unref(emitter, &builder, self_);
            build_lambda_cont_call(emitter, &builder, v, cont)
        }
        mlir::Implementation::TailCall { fn_, arg: call_arg, .. } => {
            let f = realize_literal(emitter, &builder, func, arg, self_, fn_);
            let a = realize_literal(emitter, &builder, func, arg, self_, call_arg);
            build_lambda_unref(emitter, &builder, self_);
            build_lambda_call(emitter, &builder, f, a, cont)
        }
        mlir::Implementation::ContinueCall { fn_, arg: call_arg, next, .. } => {
            let f = realize_literal(emitter, &builder, func, arg, self_, fn_);
            let a = realize_literal(emitter, &builder, func, arg, self_, call_arg);
            let n = realize_literal(emitter, &builder, func, arg, self_, next);
            let new_cont = build_lambda_cont_alloc(emitter, &builder, cont, n);
            build_lambda_unref(emitter, &builder, self_);
            build_lambda_call(emitter, &builder, f, a, new_cont)
        }
    };

    builder.build_return(Some(&ret)).unwrap();
}

/// Resolve an operand literal to a concrete `%lambda*` SSA value. A capture,
/// extern, definition, or instance reference is (re-)loaded here rather than
/// reused from the prologue — matching the one-load-per-use shape of the
/// rest of the ABI and letting later optimization passes fold the redundancy.
fn realize_literal<'ctx>(
    emitter: &mut CrateEmitter<'ctx>,
    builder: &inkwell::builder::Builder<'ctx>,
    func: FunctionValue<'ctx>,
    arg: PointerValue<'ctx>,
    self_: PointerValue<'ctx>,
    lit: &ValueLiteral,
) -> PointerValue<'ctx> {
    match lit {
        ValueLiteral::Capture(0) => arg,
        ValueLiteral::Capture(id) => build_load_capture(emitter, builder, self_, id - 1),
        ValueLiteral::Extern(name) => build_load_extern(emitter, builder, name),
        ValueLiteral::Definition(path) => build_load_global(emitter, builder, path),
        ValueLiteral::Instance(inst) => emitter.ensure_inst(inst).as_pointer_value(),
        ValueLiteral::Implementation { path, captures } => {
            materialize_closure(emitter, builder, func, arg, self_, path, captures)
        }
    }
}

/// `@lambda_alloc(N, 0)`, store the implementation pointer, then store each
/// capture slot from a looked-up SSA value.
fn materialize_closure<'ctx>(
    emitter: &mut CrateEmitter<'ctx>,
    builder: &inkwell::builder::Builder<'ctx>,
    func: FunctionValue<'ctx>,
    arg: PointerValue<'ctx>,
    self_: PointerValue<'ctx>,
    impl_path: &lambdac_frontend::path::ImplementationPath,
    captures: &[u32],
) -> PointerValue<'ctx> {
    let impl_fn = emitter.ensure_impl(impl_path);
    let ptr_bits = emitter.registry.ptr_bits_type();
    let lamb = builder
        .build_call(
            emitter.runtime.lambda_alloc,
            &[
                ptr_bits.const_int(captures.len() as u64, false).into(),
                ptr_bits.const_int(0, false).into(),
            ],
            "lamb",
        )
        .unwrap()
        .try_as_basic_value()
        .unwrap_basic()
        .into_pointer_value();

    build_store_impl(emitter, builder, lamb, impl_fn);

    for (dest_index, &cap) in captures.iter().enumerate() {
        let value = realize_literal(emitter, builder, func, arg, self_, &ValueLiteral::Capture(cap));
        build_store_capture(emitter, builder, lamb, dest_index as u32, value);
    }

    lamb
}

fn build_capture_ptr<'ctx>(
    emitter: &CrateEmitter<'ctx>,
    builder: &inkwell::builder::Builder<'ctx>,
    lamb: PointerValue<'ctx>,
    capture_index: u32,
) -> PointerValue<'ctx> {
    let ptr_bits = emitter.registry.ptr_bits_type();
    let zero = ptr_bits.const_zero();
    let one = emitter.context.i32_type().const_int(1, false);
    let idx = ptr_bits.const_int(capture_index as u64, false);
    unsafe {
        builder
            .build_gep(emitter.registry.lambda(), lamb, &[zero, one, idx], "cap_ptr")
            .unwrap()
    }
}

fn build_load_capture<'ctx>(
    emitter: &mut CrateEmitter<'ctx>,
    builder: &inkwell::builder::Builder<'ctx>,
    self_: PointerValue<'ctx>,
    capture_index: u32,
) -> PointerValue<'ctx> {
    let ptr = build_capture_ptr(emitter, builder, self_, capture_index);
    builder
        .build_load(emitter.registry.ptr_type(), ptr, "cap")
        .unwrap()
        .into_pointer_value()
}

fn build_store_capture<'ctx>(
    emitter: &mut CrateEmitter<'ctx>,
    builder: &inkwell::builder::Builder<'ctx>,
    lamb: PointerValue<'ctx>,
    capture_index: u32,
    value: PointerValue<'ctx>,
) {
    let ptr = build_capture_ptr(emitter, builder, lamb, capture_index);
    builder.build_store(ptr, value).unwrap();
}

fn build_store_impl<'ctx>(
    emitter: &mut CrateEmitter<'ctx>,
    builder: &inkwell::builder::Builder<'ctx>,
    lamb: PointerValue<'ctx>,
    impl_fn: FunctionValue<'ctx>,
) {
    let ptr_bits = emitter.registry.ptr_bits_type();
    let zero = ptr_bits.const_zero();
    let field0 = emitter.context.i32_type().const_zero();
    let field3 = emitter.context.i32_type().const_int(3, false);
    let ptr = unsafe {
        builder
            .build_gep(emitter.registry.lambda(), lamb, &[zero, field0, field3], "impl_ptr")
            .unwrap()
    };
    builder
        .build_store(ptr, impl_fn.as_global_value().as_pointer_value())
        .unwrap();
}

fn build_load_extern<'ctx>(
    emitter: &mut CrateEmitter<'ctx>,
    builder: &inkwell::builder::Builder<'ctx>,
    name: &str,
) -> PointerValue<'ctx> {
    let g = emitter.ensure_extern(name);
    builder
        .build_load(emitter.registry.ptr_type(), g.as_pointer_value(), name)
        .unwrap()
        .into_pointer_value()
}

fn build_load_global<'ctx>(
    emitter: &mut CrateEmitter<'ctx>,
    builder: &inkwell::builder::Builder<'ctx>,
    path: &lambdac_frontend::path::Path,
) -> PointerValue<'ctx> {
    let g = emitter.ensure_global(path);
    builder
        .build_load(emitter.registry.ptr_type(), g.as_pointer_value(), "global")
        .unwrap()
        .into_pointer_value()
}

fn build_lambda_ref<'ctx>(
    emitter: &CrateEmitter<'ctx>,
    builder: &inkwell::builder::Builder<'ctx>,
    value: PointerValue<'ctx>,
    count: u32,
) {
    let ptr_bits = emitter.registry.ptr_bits_type();
    builder
        .build_call(
            emitter.runtime.lambda_ref,
            &[value.into(), ptr_bits.const_int(count as u64, false).into()],
            "",
        )
        .unwrap();
}

fn build_lambda_unref<'ctx>(emitter: &CrateEmitter<'ctx>, builder: &inkwell::builder::Builder<'ctx>, value: PointerValue<'ctx>) {
    builder.build_call(emitter.runtime.lambda_unref, &[value.into()], "").unwrap();
}

fn build_lambda_cont_alloc<'ctx>(
    emitter: &CrateEmitter<'ctx>,
    builder: &inkwell::builder::Builder<'ctx>,
    cont: PointerValue<'ctx>,
    next: PointerValue<'ctx>,
) -> PointerValue<'ctx> {
    builder
        .build_call(emitter.runtime.lambda_cont_alloc, &[cont.into(), next.into()], "cont")
        .unwrap()
        .try_as_basic_value()
        .unwrap_basic()
        .into_pointer_value()
}

fn build_lambda_call<'ctx>(
    emitter: &CrateEmitter<'ctx>,
    builder: &inkwell::builder::Builder<'ctx>,
    fn_: PointerValue<'ctx>,
    arg: PointerValue<'ctx>,
    cont: PointerValue<'ctx>,
) -> PointerValue<'ctx> {
    let call = builder
        .build_call(emitter.runtime.lambda_call, &[fn_.into(), arg.into(), cont.into()], "call")
        .unwrap();
    call.set_tail_call(true);
    call.try_as_basic_value().unwrap_basic().into_pointer_value()
}

fn build_lambda_cont_call<'ctx>(
    emitter: &CrateEmitter<'ctx>,
    builder: &inkwell::builder::Builder<'ctx>,
    value: PointerValue<'ctx>,
    cont: PointerValue<'ctx>,
) -> PointerValue<'ctx> {
    let call = builder
        .build_call(emitter.runtime.lambda_cont_call, &[value.into(), cont.into()], "call")
        .unwrap();
    call.set_tail_call(true);
    call.try_as_basic_value().unwrap_basic().into_pointer_value()
}
