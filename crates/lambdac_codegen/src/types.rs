//! LLVM type registry for the closure ABI (spec §4.7): `%lambda`,
//! `%lambda_header`, `%lambda_cont`, `%lambda_fn`, and the per-capture-count
//! `%lambda_c<N>` sized aggregate used for Instance globals.

use std::collections::HashMap;

use inkwell::context::Context;
use inkwell::types::{FunctionType, PointerType, StructType};
use inkwell::AddressSpace;

use crate::target::Architecture;

/// Caches the closure ABI's LLVM types for one module's context, so the
/// same `%lambda_c<N>` type is only declared once per capture count.
pub struct TypeRegistry<'ctx> {
    context: &'ctx Context,
    arch: Architecture,
    lambda: StructType<'ctx>,
    lambda_header: StructType<'ctx>,
    lambda_cont: StructType<'ctx>,
    lambda_fn: FunctionType<'ctx>,
    instance_types: HashMap<u32, StructType<'ctx>>,
}

impl<'ctx> TypeRegistry<'ctx> {
    pub fn new(context: &'ctx Context, arch: Architecture) -> Self {
        let ptr_ty = context.ptr_type(AddressSpace::default());
        let ptr_bits = context.custom_width_int_type(arch.ptr_bits());

        let lambda = context.opaque_struct_type("lambda");
        let lambda_header = context.opaque_struct_type("lambda_header");
        let lambda_cont = context.opaque_struct_type("lambda_cont");

        // %lambda_fn = %lambda* (%lambda*, %lambda*, %lambda_cont*)
        let lambda_fn = ptr_ty.fn_type(&[ptr_ty.into(), ptr_ty.into(), ptr_ty.into()], false);

        // %lambda_header = { i<ptr_bits>, i<ptr_bits>, i<ptr_bits>, %lambda_fn* }
        // the header's union{impl,tail} field is represented as a bare
        // pointer slot; `impl` and `tail` are both single-pointer-wide.
        lambda_header.set_body(
            &[ptr_bits.into(), ptr_bits.into(), ptr_bits.into(), ptr_ty.into()],
            false,
        );

        // %lambda = { %lambda_header, [0 x %lambda*] }
        lambda.set_body(&[lambda_header.into(), ptr_ty.array_type(0).into()], false);

        // %lambda_cont = { %lambda_cont*, %lambda* }
        lambda_cont.set_body(&[ptr_ty.into(), ptr_ty.into()], false);

        Self {
            context,
            arch,
            lambda,
            lambda_header,
            lambda_cont,
            lambda_fn,
            instance_types: HashMap::new(),
        }
    }

    pub fn lambda(&self) -> StructType<'ctx> {
        self.lambda
    }

    pub fn lambda_header(&self) -> StructType<'ctx> {
        self.lambda_header
    }

    pub fn lambda_cont(&self) -> StructType<'ctx> {
        self.lambda_cont
    }

    pub fn lambda_fn(&self) -> FunctionType<'ctx> {
        self.lambda_fn
    }

    pub fn ptr_type(&self) -> PointerType<'ctx> {
        self.context.ptr_type(AddressSpace::default())
    }

    pub fn ptr_bits_type(&self) -> inkwell::types::IntType<'ctx> {
        self.context.custom_width_int_type(self.arch.ptr_bits())
    }

    /// `%lambda_c<N> = type { %lambda_header, [ N x %lambda* ] }`, the
    /// sized aggregate type backing an Instance's private constant global.
    pub fn instance_type(&mut self, captures: u32) -> StructType<'ctx> {
        if let Some(ty) = self.instance_types.get(&captures) {
            return *ty;
        }
        let name = format!("lambda_c{captures}");
        let ty = self.context.opaque_struct_type(&name);
        let ptr_ty = self.ptr_type();
        ty.set_body(
            &[self.lambda_header.into(), ptr_ty.array_type(captures).into()],
            false,
        );
        self.instance_types.insert(captures, ty);
        ty
    }
}
