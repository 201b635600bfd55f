//! Textual dumps for `--emit-hlir`/`--emit-mlir` (spec §6): enough of the
//! HLIR/MLIR textual forms to inspect a pipeline stop point. This is not a
//! standalone pretty-printer crate (spec.md names that as an external
//! collaborator, out of scope here) — just the minimal rendering the CLI's
//! early-exit flags need.

use std::fmt::Write as _;

use lambdac_frontend::hlir;
use lambdac_middle::mlir;

pub fn format_hlir_program(program: &hlir::Program) -> String {
    let mut out = String::new();
    for crate_ in &program.crates {
        let _ = writeln!(out, "# crate {}", crate_.name);
        for stmt in &crate_.statements {
            format_hlir_statement(&mut out, stmt);
        }
        out.push('\n');
    }
    out
}

fn format_hlir_statement(out: &mut String, stmt: &hlir::Statement) {
    match stmt {
        hlir::Statement::ExternCrate { name } => {
            let _ = writeln!(out, "extern crate {name} ;");
        }
        hlir::Statement::Extern { name } => {
            let _ = writeln!(out, "extern impure {name} ;");
        }
        hlir::Statement::Assignment { path, value, is_public, is_impure } => {
            let pub_kw = if *is_public { "pub " } else { "" };
            let impure_kw = if *is_impure { "impure " } else { "" };
            let _ = writeln!(out, "{pub_kw}{impure_kw}{path} = {} ;", format_hlir_expr(value));
        }
        hlir::Statement::Alias { path, target, is_public } => {
            let pub_kw = if *is_public { "pub " } else { "" };
            let _ = writeln!(out, "{pub_kw}{path} = use {target} ;");
        }
    }
}

fn format_hlir_expr(expr: &hlir::Expr) -> String {
    match expr {
        hlir::Expr::Ellipsis => "...".to_string(),
        hlir::Expr::Paren(inner) => format!("({})", format_hlir_expr(inner)),
        hlir::Expr::Call(f, a) => format!("{} {}", format_hlir_expr(f), format_hlir_expr(a)),
        hlir::Expr::Lambda { name, body } => format!("{name} -> {}", format_hlir_expr(body)),
        hlir::Expr::Ident(name) => name.clone(),
        hlir::Expr::Absolute(path) => path.to_string(),
    }
}

pub fn format_mlir_program(program: &mlir::Program) -> String {
    let mut out = String::new();
    for crate_ in &program.crates {
        let _ = writeln!(out, "# crate {}", crate_.name);
        for name in &crate_.extern_crates {
            let _ = writeln!(out, "extern crate {name} ;");
        }
        for name in &crate_.externs {
            let _ = writeln!(out, "extern {name} ;");
        }
        for imp in &crate_.implementations {
            format_mlir_implementation(&mut out, imp);
        }
        for inst in &crate_.instances {
            let caps = inst
                .captures
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(out, "inst {} = {} [ {caps} ] ;", inst.path, inst.implementation);
        }
        for defi in &crate_.definitions {
            let pub_kw = if defi.is_public { "pub " } else { "" };
            let init = if defi.needs_init { " $$" } else { "" };
            let _ = writeln!(out, "{pub_kw}{} = {}{init} ;", defi.path, defi.inst);
        }
        out.push('\n');
    }
    out
}

fn format_mlir_implementation(out: &mut String, imp: &mlir::Implementation) {
    match imp {
        mlir::Implementation::Return { path, value, .. } => {
            let _ = writeln!(out, "impl {path} = {} ;", format_mlir_literal(value));
        }
        mlir::Implementation::TailCall { path, fn_, arg, .. } => {
            let _ = writeln!(out, "impl {path} = {} {} ;", format_mlir_literal(fn_), format_mlir_literal(arg));
        }
        mlir::Implementation::ContinueCall { path, fn_, arg, next, .. } => {
            let _ = writeln!(
                out,
                "impl {path} = {} {} -> {} ;",
                format_mlir_literal(fn_),
                format_mlir_literal(arg),
                format_mlir_literal(next)
            );
        }
    }
}

fn format_mlir_literal(lit: &mlir::ValueLiteral) -> String {
    match lit {
        mlir::ValueLiteral::Capture(id) => format!("${id}"),
        mlir::ValueLiteral::Extern(name) => name.clone(),
        mlir::ValueLiteral::Definition(path) => path.to_string(),
        mlir::ValueLiteral::Instance(inst) => inst.to_string(),
        mlir::ValueLiteral::Implementation { path, captures } => {
            let caps = captures.iter().map(|c| format!("${c}")).collect::<Vec<_>>().join(" ");
            format!("{path}[{caps}]")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambdac_frontend::path::Path;

    #[test]
    fn renders_a_minimal_hlir_program() {
        let mut crate_ = hlir::Crate::new("main");
        crate_.statements.push(hlir::Statement::Assignment {
            path: Path::parse("main::ident").unwrap(),
            value: hlir::Expr::Lambda { name: "a".to_string(), body: Box::new(hlir::Expr::Ident("a".to_string())) },
            is_public: true,
            is_impure: false,
        });
        let program = hlir::Program { entry_crate: "main".to_string(), crates: vec![crate_] };
        let text = format_hlir_program(&program);
        assert!(text.contains("pub main::ident = a -> a ;"));
    }
}
