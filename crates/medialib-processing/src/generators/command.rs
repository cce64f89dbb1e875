use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use tokio::process::Command;

/// Whether `program` resolves to an executable, either as a path or through `PATH`.
pub fn binary_is_available(program: &str) -> bool {
    !program.trim().is_empty() && which::which(program).is_ok()
}

/// Run `program` with `args`, returning stdout on success and stderr in the error otherwise.
pub(crate) async fn run(program: &str, args: &[String]) -> Result<Vec<u8>> {
    let start = std::time::Instant::now();
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("Failed to execute {}", program))?;

    tracing::debug!(
        process.executable.path = %program,
        exit_code = ?output.status.code(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "External command finished"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("{} failed: {}", program, stderr.trim()));
    }

    Ok(output.stdout)
}
