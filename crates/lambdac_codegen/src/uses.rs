//! Per-implementation use counting (spec §4.7's "counting literal uses"):
//! drives both the refcount prologue and the set of externs/globals/
//! instances/implementations a function body needs declared before it.

use std::collections::BTreeMap;

use lambdac_frontend::path::{ImplementationPath, InstancePath, Path};
use lambdac_middle::mlir::{Implementation, ValueLiteral};

#[derive(Debug, Default)]
pub struct ValueUses {
    pub capture_uses: BTreeMap<u32, u32>,
    pub extern_uses: BTreeMap<String, u32>,
    pub def_uses: BTreeMap<Path, u32>,
    pub inst_uses: BTreeMap<InstancePath, u32>,
    pub impl_uses: BTreeMap<ImplementationPath, u32>,
}

impl ValueUses {
    pub fn count(imp: &Implementation) -> Self {
        let mut uses = ValueUses::default();
        uses.capture_uses.entry(0).or_insert(0);
        match imp {
            Implementation::Return { value, .. } => uses.count_lit(value),
            Implementation::TailCall { fn_, arg, .. } => {
                uses.count_lit(fn_);
                uses.count_lit(arg);
            }
            Implementation::ContinueCall { fn_, arg, next, .. } => {
                uses.count_lit(fn_);
                uses.count_lit(arg);
                uses.count_lit(next);
            }
        }
        uses
    }

    fn count_lit(&mut self, lit: &ValueLiteral) {
        match lit {
            ValueLiteral::Capture(id) => *self.capture_uses.entry(*id).or_insert(0) += 1,
            ValueLiteral::Extern(name) => *self.extern_uses.entry(name.clone()).or_insert(0) += 1,
            ValueLiteral::Definition(path) => *self.def_uses.entry(path.clone()).or_insert(0) += 1,
            ValueLiteral::Instance(inst) => *self.inst_uses.entry(inst.clone()).or_insert(0) += 1,
            ValueLiteral::Implementation { path, captures } => {
                *self.impl_uses.entry(path.clone()).or_insert(0) += 1;
                for cap in captures {
                    *self.capture_uses.entry(*cap).or_insert(0) += 1;
                }
            }
        }
    }
}
