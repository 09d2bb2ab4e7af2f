//! External toolchain boundary.
//!
//! The pipeline never spawns processes directly. It builds [`Invocation`]s
//! and hands them to a [`CommandRunner`]; [`TokioRunner`] is the production
//! implementation, tests substitute recording fakes.
//!
//! # Submodules
//!
//! - [`runner`] - subprocess execution via `tokio::process`
//! - [`invoke`] - the cargo / wasm-bindgen / wasm-opt command lines

pub mod invoke;
pub mod runner;

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;

use thiserror::Error;

pub use invoke::{CompiledArtifact, Toolchain};
pub use runner::TokioRunner;

/// One program to run: argv, working directory and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
  pub workdir: PathBuf,
  /// Added on top of the inherited environment.
  pub env: BTreeMap<String, String>,
}

impl Invocation {
  pub fn new(program: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      workdir: workdir.into(),
      env: BTreeMap::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  /// `program arg1 arg2 ...`, for logs and messages.
  pub fn command_line(&self) -> String {
    std::iter::once(self.program.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
  pub stdout: String,
  pub stderr: String,
  /// `None` when the process was terminated by a signal.
  pub exit_code: Option<i32>,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.exit_code == Some(0)
  }
}

/// Capability to run external programs.
///
/// An `Err` means the program could not be started at all; a program that
/// ran and failed is an `Ok` with a non-zero exit code.
pub trait CommandRunner: Send + Sync {
  fn run(&self, invocation: &Invocation) -> impl Future<Output = std::io::Result<CommandOutput>> + Send;
}

#[derive(Debug, Error)]
pub enum ToolchainError {
  #[error("{program} failed with {}:\n{stderr}", code.map(|c| format!("exit code {}", c)).unwrap_or_else(|| "a signal".to_string()))]
  Failed {
    program: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("expected toolchain output not found: {}", path.display())]
  MissingOutput { path: PathBuf },
}
