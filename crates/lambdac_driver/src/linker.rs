//! Invokes the system C compiler as the linker, exactly as the teacher's
//! `linker::link` does — the C reference-counted runtime and libc are
//! expected to be on the linker's search path already; this project does
//! not supply or reimplement the runtime (spec's non-goal).

use std::process::Command;

use crate::error::{CompileError, Result};

pub fn link(object_paths: &[String], output_path: &str) -> Result<()> {
    let status = Command::new("cc")
        .args(object_paths)
        .arg("-o")
        .arg(output_path)
        .status()
        .map_err(|e| CompileError::Link(format!("failed to invoke linker: {e}")))?;

    if !status.success() {
        return Err(CompileError::Link(format!("linker exited with status: {status}")));
    }

    Ok(())
}
