//! Driver glue (spec §4.8-adjacent, component C10): resolve the module
//! graph, run the frontend and middle-end, emit one LLVM module per crate
//! plus the whole-program driver module, then assemble and link — matching
//! the teacher's `compile_file` shape one stage for one stage.

use std::collections::HashMap;
use std::path::Path as FsPath;

use inkwell::context::Context;
use inkwell::passes::PassBuilderOptions;
use inkwell::targets::{CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine};

use lambdac_middle::{mlir, EvalOptions};

use crate::error::{CompileError, Result};
use crate::options::CompileOptions;
use crate::{linker, order, text};

/// Run the full pipeline against `entry`, per `options`. Returns `Ok(())`
/// having either written a native binary, one `.ll` per crate, or (for
/// `--emit-hlir`/`--emit-mlir`) printed the requested intermediate form to
/// stdout and stopped early.
pub fn compile(entry: &FsPath, options: &CompileOptions) -> Result<()> {
    log::debug!("loading program from {}", entry.display());
    let hlir_program = lambdac_frontend::compile_to_hlir(entry, options.search_path.clone(), options.stub_only)?;

    if options.emit_hlir {
        print!("{}", text::format_hlir_program(&hlir_program));
        return Ok(());
    }

    let hlir_order = order::order_hlir_crates(&hlir_program)?;
    log::trace!("crate dependency order: {hlir_order:?}");

    log::debug!("lowering to MLIR (step budget {})", options.step_budget);
    let mlir_program = lambdac_middle::lower_program(&hlir_program, EvalOptions { step_budget: options.step_budget })?;

    if options.emit_mlir {
        print!("{}", text::format_mlir_program(&mlir_program));
        return Ok(());
    }

    let crate_order = order::order_mlir_crates(&mlir_program)?;
    let crates_by_name: HashMap<&str, &mlir::Crate> = mlir_program.crates.iter().map(|c| (c.name.as_str(), c)).collect();

    let arch = *lambdac_codegen::Architecture::by_name(&options.target).ok_or_else(|| CompileError::UnknownTarget(options.target.clone()))?;

    let context = Context::create();
    let mut object_paths = Vec::new();

    for name in &crate_order {
        let crate_ = crates_by_name
            .get(name.as_str())
            .unwrap_or_else(|| panic!("dependency orderer produced unknown crate '{name}'"));
        log::debug!("emitting LLVM IR for crate '{name}'");
        let module = lambdac_codegen::emit_crate(&context, crate_, &arch)?;
        emit_module(&module, &arch, options, name, &mut object_paths)?;
    }

    log::debug!("emitting whole-program driver module");
    let driver_module = lambdac_codegen::emit_program_driver(&context, &crate_order, &arch);
    emit_module(&driver_module, &arch, options, "main", &mut object_paths)?;

    if options.emit_ir {
        return Ok(());
    }

    log::debug!("linking {} object file(s) into '{}'", object_paths.len(), options.output);
    let result = linker::link(&object_paths, &options.output);
    for path in &object_paths {
        let _ = std::fs::remove_file(path);
    }
    result
}

/// Either write `module` as LLVM IR text (`<name>.ll`, kept) or optimize and
/// emit it as an object file (`<name>.o`, appended to `object_paths` for the
/// caller to link and later delete).
fn emit_module(module: &inkwell::module::Module<'_>, arch: &lambdac_codegen::Architecture, options: &CompileOptions, name: &str, object_paths: &mut Vec<String>) -> Result<()> {
    module.verify().map_err(|msg| lambdac_codegen::Error::VerificationFailed(msg.to_string()))?;

    if options.emit_ir {
        let ll_path = format!("{name}.ll");
        module
            .print_to_file(&ll_path)
            .map_err(|msg| CompileError::Codegen(lambdac_codegen::Error::VerificationFailed(msg.to_string())))?;
        return Ok(());
    }

    Target::initialize_all(&InitializationConfig::default());
    let target_triple = inkwell::targets::TargetTriple::create(arch.triple);
    let target = Target::from_triple(&target_triple).map_err(|e| CompileError::TargetMachine(e.to_string()))?;

    let machine = target
        .create_target_machine(&target_triple, "generic", "", options.opt_level, RelocMode::PIC, CodeModel::Default)
        .ok_or_else(|| CompileError::TargetMachine(arch.triple.to_string()))?;

    let pass = match options.opt_level {
        inkwell::OptimizationLevel::None => None,
        inkwell::OptimizationLevel::Less => Some("default<O1>"),
        inkwell::OptimizationLevel::Default => Some("default<O2>"),
        inkwell::OptimizationLevel::Aggressive => Some("default<O3>"),
    };
    if let Some(passes) = pass {
        module
            .run_passes(passes, &machine, PassBuilderOptions::create())
            .map_err(|e| CompileError::TargetMachine(e.to_string()))?;
    }

    let obj_path = format!("{name}.o");
    machine
        .write_to_file(module, FileType::Object, FsPath::new(&obj_path))
        .map_err(|e| CompileError::TargetMachine(e.to_string()))?;
    object_paths.push(obj_path);
    Ok(())
}
