//! Symbol mangling (spec §4.7): length-prefixed path components, plus the
//! instance/implementation/crate-init-fini suffix grammar.

use lambdac_frontend::path::{ImplementationPath, InstancePath, Path};

/// `a::b::c` → `_L1Na1Nb1Nc`.
pub fn mangle_path(path: &Path) -> String {
    let mut out = String::from("_L");
    for name in path.components() {
        out.push_str(&name.len().to_string());
        out.push('N');
        out.push_str(name);
    }
    out
}

/// An instance's public alias (`alt = false`) or its private backing
/// aggregate (`alt = true`, `...X` suffix).
pub fn mangle_inst(inst: &InstancePath, alt: bool) -> String {
    let mut out = format!("{}G{}", mangle_path(&inst.path), inst.id);
    if alt {
        out.push('X');
    }
    out
}

pub fn mangle_impl(impl_path: &ImplementationPath) -> String {
    format!(
        "{}L{}I{}",
        mangle_path(&impl_path.path),
        impl_path.lambda_id,
        impl_path.continuation_id
    )
}

pub fn mangle_crate_init(crate_name: &str) -> String {
    format!("_L{}I{}", crate_name.len(), crate_name)
}

pub fn mangle_crate_fini(crate_name: &str) -> String {
    format!("_L{}F{}", crate_name.len(), crate_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangles_path_components() {
        let path = Path::new(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(mangle_path(&path), "_L1Na1Nb1Nc");
    }

    #[test]
    fn mangles_instance_alt() {
        let path = Path::single("f".to_string());
        let inst = InstancePath { path, id: 3 };
        assert_eq!(mangle_inst(&inst, false), "_L1NfG3");
        assert_eq!(mangle_inst(&inst, true), "_L1NfG3X");
    }

    #[test]
    fn mangles_implementation() {
        let path = Path::single("f".to_string());
        let impl_path = ImplementationPath {
            path,
            lambda_id: 2,
            continuation_id: 1,
        };
        assert_eq!(mangle_impl(&impl_path), "_L1NfL2I1");
    }

    #[test]
    fn mangles_crate_init_fini() {
        assert_eq!(mangle_crate_init("main"), "_L4Imain");
        assert_eq!(mangle_crate_fini("main"), "_L4Fmain");
    }
}
