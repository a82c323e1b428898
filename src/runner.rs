use crate::error::{RepinError, Result};
use std::process::{Command, Output};
use tracing::debug;

/// Run an external command, capturing its output and failing on a non-zero
/// exit. This is the only path through which git, nix, and nix-update are
/// invoked.
pub fn run(program: &str, args: &[String]) -> Result<Output> {
    let output = run_unchecked(program, args)?;
    ensure_success(program, args, &output)?;
    Ok(output)
}

/// Like [`run`] but leaves exit-status handling to the caller.
pub fn run_unchecked(program: &str, args: &[String]) -> Result<Output> {
    debug!("subprocess: {} {}", program, args.join(" "));
    Command::new(program).args(args).output().map_err(|e| {
        RepinError::CommandFailed(format!("failed to spawn '{program}': {e}"))
    })
}

fn ensure_success(program: &str, args: &[String], output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }

    Err(RepinError::CommandFailed(format!(
        "'{} {}' exited with code {}: {}",
        program,
        args.join(" "),
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}
