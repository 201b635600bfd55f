//! Declares the C runtime's ABI surface (spec §4.7) in a module's preamble.
//! Only declarations are emitted — the runtime itself is out of scope (spec
//! non-goals) and is linked in separately, matching the bundled `lambda.h`
//! this project targets rather than reimplements.

use inkwell::module::{Linkage, Module};
use inkwell::values::FunctionValue;

use crate::types::TypeRegistry;

/// Cached handles to every runtime entry point a crate's codegen might call.
#[derive(Clone, Copy)]
pub struct RuntimeFns<'ctx> {
    pub lambda_alloc: FunctionValue<'ctx>,
    pub lambda_cont_alloc: FunctionValue<'ctx>,
    pub lambda_ref: FunctionValue<'ctx>,
    pub lambda_unref: FunctionValue<'ctx>,
    pub lambda_call: FunctionValue<'ctx>,
    pub lambda_cont_call: FunctionValue<'ctx>,
    pub lambda_ret_call: FunctionValue<'ctx>,
    pub lambda_null_call: FunctionValue<'ctx>,
    pub lambda_userdata: FunctionValue<'ctx>,
    pub lambda_abort: FunctionValue<'ctx>,
    pub lambda_mem_alloc: FunctionValue<'ctx>,
    pub lambda_mem_free: FunctionValue<'ctx>,
}

/// Declare every runtime function in `module`, sized for `registry`'s
/// pointer width. Idempotent would require caching by module; callers emit
/// one module per crate so this runs exactly once per module.
pub fn declare_runtime<'ctx>(module: &Module<'ctx>, registry: &TypeRegistry<'ctx>) -> RuntimeFns<'ctx> {
    let ptr = registry.ptr_type();
    let ptr_bits = registry.ptr_bits_type();
    let void = module.get_context().void_type();
    let i8 = module.get_context().i8_type();

    let lambda_alloc = module.add_function(
        "lambda_alloc",
        ptr.fn_type(&[ptr_bits.into(), ptr_bits.into()], false),
        None,
    );
    let lambda_cont_alloc = module.add_function(
        "lambda_cont_alloc",
        ptr.fn_type(&[ptr.into(), ptr.into()], false),
        None,
    );
    let lambda_ref = module.add_function(
        "lambda_ref",
        void.fn_type(&[ptr.into(), ptr_bits.into()], false),
        None,
    );
    let lambda_unref = module.add_function("lambda_unref", void.fn_type(&[ptr.into()], false), None);
    let lambda_call = module.add_function(
        "lambda_call",
        ptr.fn_type(&[ptr.into(), ptr.into(), ptr.into()], false),
        None,
    );
    let lambda_cont_call = module.add_function(
        "lambda_cont_call",
        ptr.fn_type(&[ptr.into(), ptr.into()], false),
        None,
    );
    let lambda_ret_call = module.add_function(
        "lambda_ret_call",
        ptr.fn_type(&[ptr.into(), ptr.into()], false),
        None,
    );
    let lambda_null_call = module.add_function("lambda_null_call", ptr.fn_type(&[ptr.into()], false), None);
    let lambda_userdata = module.add_function(
        "lambda_userdata",
        i8.ptr_type(inkwell::AddressSpace::default()).fn_type(&[ptr.into()], false),
        None,
    );
    let lambda_abort = module.add_function("lambda_abort", void.fn_type(&[], false), Some(Linkage::ExternalWeak));
    let lambda_mem_alloc = module.add_function(
        "lambda_mem_alloc",
        i8.ptr_type(inkwell::AddressSpace::default()).fn_type(&[ptr_bits.into()], false),
        None,
    );
    let lambda_mem_free = module.add_function("lambda_mem_free", void.fn_type(&[ptr.into()], false), None);

    RuntimeFns {
        lambda_alloc,
        lambda_cont_alloc,
        lambda_ref,
        lambda_unref,
        lambda_call,
        lambda_cont_call,
        lambda_ret_call,
        lambda_null_call,
        lambda_userdata,
        lambda_abort,
        lambda_mem_alloc,
        lambda_mem_free,
    }
}
