use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::{CommandOutput, CommandRunner, Invocation};

/// 1980-01-01T00:00:00Z, the ZIP epoch, for reproducible embedded timestamps.
pub const SOURCE_DATE_EPOCH: &str = "315532800";

/// Runs invocations as real subprocesses.
///
/// The child inherits the current environment; the invocation's variables
/// and `SOURCE_DATE_EPOCH` are added on top. Output is captured, stdin is
/// closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner;

impl CommandRunner for TokioRunner {
  async fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
    let mut command = Command::new(&invocation.program);
    command
      .args(&invocation.args)
      .current_dir(&invocation.workdir)
      .stdin(Stdio::null())
      .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH);
    for (key, value) in &invocation.env {
      command.env(key, value);
    }

    debug!(command = %invocation.command_line(), workdir = %invocation.workdir.display(), "spawning process");
    let output = command.output().await?;

    let result = CommandOutput {
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
      exit_code: output.status.code(),
    };
    debug!(program = %invocation.program, code = ?result.exit_code, "process exited");
    Ok(result)
  }
}
