//! Compiler configuration, threaded through [`crate::pipeline::compile`]
//! exactly as the teacher threads `CompileOptions` through `compile_file`.

use std::path::PathBuf;

use inkwell::OptimizationLevel;

#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Optimization level for LLVM passes.
    pub opt_level: OptimizationLevel,
    /// Stop after emitting LLVM IR text (one `.ll` per crate) instead of
    /// assembling and linking a binary.
    pub emit_ir: bool,
    /// Stop after resolution and print each crate's HLIR textual form.
    pub emit_hlir: bool,
    /// Stop after the middle-end and print each crate's MLIR textual form.
    pub emit_mlir: bool,
    /// Output file path (binary, or `.ll` directory stem when `emit_ir`).
    pub output: String,
    /// Short target name understood by [`lambdac_codegen::Architecture::by_name`]
    /// (`x86_64`, `i686`, `aarch64`, `armv7`).
    pub target: String,
    /// Additional directories the loader searches for `extern crate`d
    /// dependencies, beyond the entry file's own directory.
    pub search_path: Vec<PathBuf>,
    /// Force HLIS-only (stub) resolution rather than full bodies (spec
    /// §4.1's interface-stub mode).
    pub stub_only: bool,
    /// Override for the partial evaluator's non-termination guard.
    pub step_budget: u64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            opt_level: OptimizationLevel::Default,
            emit_ir: false,
            emit_hlir: false,
            emit_mlir: false,
            output: "a.out".to_string(),
            target: "x86_64".to_string(),
            search_path: Vec::new(),
            stub_only: false,
            step_budget: lambdac_middle::EvalOptions::default().step_budget,
        }
    }
}
