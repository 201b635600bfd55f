use std::path::{Path, PathBuf};
use std::process::{self, Command};

use clap::Parser;
use inkwell::OptimizationLevel;
use lambdac_driver::{compile, CompileOptions};

#[derive(Parser, Debug)]
#[command(name = "lambdac", about = "lambdac — untyped lambda-calculus to native compiler via LLVM")]
struct Cli {
    /// Entry source file (`.lambda`, or a directory's `mod.lambda`).
    input: String,

    /// Output file path.
    #[arg(short, long)]
    output: Option<String>,

    /// Optimization level (0-3).
    #[arg(short = 'O', long = "opt-level", default_value = "0")]
    opt_level: u8,

    /// Additional crate search path directories, may be repeated.
    #[arg(short = 'L', long = "search-path")]
    search_path: Vec<PathBuf>,

    /// Target architecture (x86_64, i686, aarch64, armv7).
    #[arg(long, default_value = "x86_64")]
    target: String,

    /// Emit LLVM IR text (one `.ll` per crate) instead of a binary.
    #[arg(long)]
    emit_ir: bool,

    /// Stop after name resolution and print each crate's HLIR.
    #[arg(long)]
    emit_hlir: bool,

    /// Stop after the middle-end and print each crate's MLIR.
    #[arg(long)]
    emit_mlir: bool,

    /// Resolve `extern crate`d dependencies from `.hlis` stubs only, never
    /// falling back to full `.hlir`/`.lambda` sources.
    #[arg(long)]
    stub_only: bool,

    /// Override the partial evaluator's step budget before it bails out to
    /// runtime initialization.
    #[arg(long)]
    step_budget: Option<u64>,

    /// Compile and run immediately (binary is cleaned up after).
    #[arg(short, long)]
    run: bool,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let opt_level = match cli.opt_level {
        0 => OptimizationLevel::None,
        1 => OptimizationLevel::Less,
        2 => OptimizationLevel::Default,
        _ => OptimizationLevel::Aggressive,
    };

    let stem = Path::new(&cli.input)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "out".to_string());

    let output = if let Some(ref o) = cli.output {
        o.clone()
    } else if cli.run {
        format!("/tmp/lambdac_run_{stem}_{}", process::id())
    } else {
        let build_dir = Path::new("build");
        if !build_dir.exists() {
            std::fs::create_dir_all(build_dir).unwrap_or_else(|e| {
                eprintln!("error: cannot create build directory: {e}");
                process::exit(1);
            });
        }
        format!("build/{stem}")
    };

    let mut options = CompileOptions {
        opt_level,
        emit_ir: cli.emit_ir,
        emit_hlir: cli.emit_hlir,
        emit_mlir: cli.emit_mlir,
        output: output.clone(),
        target: cli.target,
        search_path: cli.search_path,
        stub_only: cli.stub_only,
        ..CompileOptions::default()
    };
    if let Some(budget) = cli.step_budget {
        options.step_budget = budget;
    }

    let path = Path::new(&cli.input);
    if !path.exists() {
        eprintln!("error: file not found: {}", cli.input);
        process::exit(1);
    }

    match compile(path, &options) {
        Ok(()) => {
            if options.emit_hlir || options.emit_mlir {
                // already printed to stdout by the driver
            } else if options.emit_ir {
                eprintln!("LLVM IR written alongside {output}");
            } else if cli.run {
                let status = Command::new(&output).status().unwrap_or_else(|e| {
                    eprintln!("error: failed to run {output}: {e}");
                    process::exit(1);
                });

                if cli.output.is_none() {
                    let _ = std::fs::remove_file(&output);
                }

                process::exit(status.code().unwrap_or(1));
            } else {
                eprintln!("compiled to {output}");
            }
        }
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}
