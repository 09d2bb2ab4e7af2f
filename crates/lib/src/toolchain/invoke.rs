//! Command lines issued to the contract toolchain.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{CommandOutput, CommandRunner, Invocation, ToolchainError};
use crate::consts::{SCHEMA_DIR, WASM_TARGET};
use crate::project::ProjectDescriptor;

/// Artifact and JS bindings produced by `wasm-bindgen`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
  /// `<out>/<crate_ident>_bg.wasm`
  pub wasm: PathBuf,
  /// `<out>/<crate_ident>.js`
  pub bindings: PathBuf,
}

/// The toolchain steps, expressed over a [`CommandRunner`].
#[derive(Debug, Clone)]
pub struct Toolchain<R> {
  runner: R,
}

impl<R: CommandRunner> Toolchain<R> {
  pub fn new(runner: R) -> Self {
    Self { runner }
  }

  pub fn runner(&self) -> &R {
    &self.runner
  }

  /// `cargo build` for the wasm target; returns the raw compiled module.
  pub async fn compile(
    &self,
    project_root: &Path,
    descriptor: &ProjectDescriptor,
    use_build_cache: bool,
  ) -> Result<PathBuf, ToolchainError> {
    let target_dir = project_root.join("target");
    let mut inv = Invocation::new("cargo", project_root)
      .args(["build", "--release", "--lib", "--target", WASM_TARGET])
      .env("CARGO_TARGET_DIR", display(&target_dir));
    if use_build_cache {
      inv = inv.env("RUSTC_WRAPPER", "sccache");
    }

    self.run_checked(&inv).await?;

    let module = target_dir
      .join(WASM_TARGET)
      .join("release")
      .join(format!("{}.wasm", descriptor.crate_ident()));
    expect_output(&module).await?;
    info!(module = %module.display(), "compiled contract");
    Ok(module)
  }

  /// `wasm-bindgen --target web` into `out_dir`.
  pub async fn bindgen(&self, module: &Path, out_dir: &Path, crate_ident: &str) -> Result<CompiledArtifact, ToolchainError> {
    let inv = Invocation::new("wasm-bindgen", out_dir).args([
      "--target".to_string(),
      "web".to_string(),
      "--out-dir".to_string(),
      display(out_dir),
      "--out-name".to_string(),
      crate_ident.to_string(),
      display(module),
    ]);

    self.run_checked(&inv).await?;

    let artifact = CompiledArtifact {
      wasm: out_dir.join(format!("{}_bg.wasm", crate_ident)),
      bindings: out_dir.join(format!("{}.js", crate_ident)),
    };
    expect_output(&artifact.wasm).await?;
    expect_output(&artifact.bindings).await?;
    Ok(artifact)
  }

  /// `wasm-opt -Os` in place.
  pub async fn optimize(&self, wasm: &Path) -> Result<(), ToolchainError> {
    let workdir = wasm.parent().unwrap_or_else(|| Path::new("."));
    let inv = Invocation::new("wasm-opt", workdir).args(["-Os".to_string(), display(wasm), "-o".to_string(), display(wasm)]);

    self.run_checked(&inv).await?;
    expect_output(wasm).await?;
    debug!(wasm = %wasm.display(), "optimized artifact");
    Ok(())
  }

  /// Compile, generate bindings into `out_dir`, and optionally optimize.
  pub async fn build(
    &self,
    project_root: &Path,
    descriptor: &ProjectDescriptor,
    out_dir: &Path,
    use_build_cache: bool,
    run_optimizer: bool,
  ) -> Result<CompiledArtifact, ToolchainError> {
    let module = self.compile(project_root, descriptor, use_build_cache).await?;
    let artifact = self.bindgen(&module, out_dir, &descriptor.crate_ident()).await?;
    if run_optimizer {
      self.optimize(&artifact.wasm).await?;
    }
    Ok(artifact)
  }

  /// `cargo run --example schema`; the project writes its documents into
  /// `<project>/schema/`, which is returned.
  pub async fn generate_schema(&self, project_root: &Path) -> Result<PathBuf, ToolchainError> {
    let inv = Invocation::new("cargo", project_root).args(["run", "--example", "schema"]);
    self.run_checked(&inv).await?;

    let schema_dir = project_root.join(SCHEMA_DIR);
    expect_output(&schema_dir).await?;
    info!(dir = %schema_dir.display(), "generated schemas");
    Ok(schema_dir)
  }

  async fn run_checked(&self, inv: &Invocation) -> Result<CommandOutput, ToolchainError> {
    info!(command = %inv.command_line(), "running toolchain");

    let output = self.runner.run(inv).await.map_err(|source| ToolchainError::Spawn {
      program: inv.program.clone(),
      source,
    })?;

    if !output.stdout.is_empty() {
      debug!(program = %inv.program, stdout = %output.stdout.trim_end(), "toolchain stdout");
    }
    if !output.success() {
      return Err(ToolchainError::Failed {
        program: inv.program.clone(),
        code: output.exit_code,
        stderr: output.stderr,
      });
    }
    Ok(output)
  }
}

async fn expect_output(path: &Path) -> Result<(), ToolchainError> {
  if tokio::fs::try_exists(path).await.unwrap_or(false) {
    Ok(())
  } else {
    Err(ToolchainError::MissingOutput { path: path.to_path_buf() })
  }
}

fn display(path: &Path) -> String {
  path.to_string_lossy().into_owned()
}
