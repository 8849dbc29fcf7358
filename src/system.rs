use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

// Shell used for commandToExecute
const SHELL: &str = "/bin/sh";

// Captured result of a shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

// Whether the handler runs with root privileges
#[must_use]
pub fn is_elevated() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Run `command` through the shell in `work_dir`, keeping at most `limit`
/// bytes of each output stream.
///
/// # Errors
///
/// Returns an error if the shell cannot be spawned.
pub fn run_shell(command: &str, work_dir: &Path, limit: usize) -> Result<ShellOutput> {
    let output = Command::new(SHELL)
        .arg("-c")
        .arg(command)
        .current_dir(work_dir)
        .output()
        .with_context(|| format!("failed to run {SHELL} in {}", work_dir.display()))?;

    Ok(ShellOutput {
        code: output.status.code(),
        stdout: truncate(&String::from_utf8_lossy(&output.stdout), limit),
        stderr: truncate(&String::from_utf8_lossy(&output.stderr), limit),
    })
}

/// Cut `text` to at most `limit` bytes on a char boundary.
#[must_use]
pub fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &text[..end])
}
