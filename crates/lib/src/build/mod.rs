//! Build orchestration: options, stages and the error taxonomy.
//!
//! A build moves through a fixed sequence of stages, each of which must
//! succeed before the next starts:
//!
//! ```text
//! Validating → Compiling → SchemaResolving → AssetProcessing
//!            → ProvenanceRecording → Assembling → Done
//! ```
//!
//! Any error moves the build to `Failed`, recorded in a [`BuildFailure`]
//! together with the stage it happened in.
//!
//! # Submodules
//!
//! - [`pipeline`] - the orchestrator driving the stages

pub mod pipeline;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::assets::{AssetError, AssetRules, ProcessError, SelectionError};
use crate::consts::DEFAULT_NETWORK;
use crate::package::{AssemblyError, OutputLayout};
use crate::project::{PreconditionError, ProjectConfig};
use crate::provenance::ProvenanceError;
use crate::schema::SchemaError;
use crate::toolchain::ToolchainError;

pub use pipeline::{BuildOutcome, Pipeline, PipelineRequest, SchemaSource};

/// Resolved knobs for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
  /// Wrap rustc in `sccache`.
  pub use_build_cache: bool,
  /// Run `wasm-opt` on the artifact.
  pub run_optimizer: bool,
  pub output_layout: OutputLayout,
  /// Provenance network tag.
  pub network: String,
  pub rules: AssetRules,
}

impl Default for BuildOptions {
  fn default() -> Self {
    Self {
      use_build_cache: false,
      run_optimizer: true,
      output_layout: OutputLayout::Flat,
      network: DEFAULT_NETWORK.to_string(),
      rules: AssetRules::default(),
    }
  }
}

/// Values given on the command line. `None` defers to `Ownable.toml`, then
/// to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOverrides {
  pub use_build_cache: Option<bool>,
  pub run_optimizer: Option<bool>,
  pub output_layout: Option<OutputLayout>,
  pub network: Option<String>,
}

impl BuildOptions {
  pub fn resolve(config: &ProjectConfig, overrides: &BuildOverrides, rules: AssetRules) -> Self {
    let defaults = Self::default();
    Self {
      use_build_cache: overrides
        .use_build_cache
        .or(config.build.use_build_cache)
        .unwrap_or(defaults.use_build_cache),
      run_optimizer: overrides
        .run_optimizer
        .or(config.build.run_optimizer)
        .unwrap_or(defaults.run_optimizer),
      output_layout: overrides
        .output_layout
        .or(config.build.output_layout)
        .unwrap_or(defaults.output_layout),
      network: overrides
        .network
        .clone()
        .or_else(|| config.network.clone())
        .unwrap_or(defaults.network),
      rules,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStage {
  Validating,
  Compiling,
  SchemaResolving,
  AssetProcessing,
  ProvenanceRecording,
  Assembling,
  Done,
  Failed,
}

impl BuildStage {
  /// Working stages in execution order.
  pub const SEQUENCE: [BuildStage; 6] = [
    BuildStage::Validating,
    BuildStage::Compiling,
    BuildStage::SchemaResolving,
    BuildStage::AssetProcessing,
    BuildStage::ProvenanceRecording,
    BuildStage::Assembling,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      BuildStage::Validating => "validating",
      BuildStage::Compiling => "compiling",
      BuildStage::SchemaResolving => "schema-resolving",
      BuildStage::AssetProcessing => "asset-processing",
      BuildStage::ProvenanceRecording => "provenance-recording",
      BuildStage::Assembling => "assembling",
      BuildStage::Done => "done",
      BuildStage::Failed => "failed",
    }
  }

  /// Stage reached when this one succeeds. Terminal stages have none.
  pub fn next(&self) -> Option<BuildStage> {
    match self {
      BuildStage::Validating => Some(BuildStage::Compiling),
      BuildStage::Compiling => Some(BuildStage::SchemaResolving),
      BuildStage::SchemaResolving => Some(BuildStage::AssetProcessing),
      BuildStage::AssetProcessing => Some(BuildStage::ProvenanceRecording),
      BuildStage::ProvenanceRecording => Some(BuildStage::Assembling),
      BuildStage::Assembling => Some(BuildStage::Done),
      BuildStage::Done | BuildStage::Failed => None,
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, BuildStage::Done | BuildStage::Failed)
  }
}

impl fmt::Display for BuildStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Precondition(#[from] PreconditionError),

  #[error(transparent)]
  Selection(#[from] SelectionError),

  #[error(transparent)]
  Validation(#[from] AssetError),

  #[error(transparent)]
  Toolchain(#[from] ToolchainError),

  #[error(transparent)]
  Schema(#[from] SchemaError),

  #[error(transparent)]
  Assembly(#[from] AssemblyError),

  #[error(transparent)]
  Provenance(#[from] ProvenanceError),
}

impl From<ProcessError> for BuildError {
  fn from(e: ProcessError) -> Self {
    match e {
      ProcessError::Selection(e) => BuildError::Selection(e),
      ProcessError::Validation(e) => BuildError::Validation(e),
    }
  }
}

impl BuildError {
  pub fn category(&self) -> &'static str {
    match self {
      BuildError::Precondition(_) => "precondition",
      BuildError::Selection(_) => "selection",
      BuildError::Validation(_) => "validation",
      BuildError::Toolchain(_) => "toolchain",
      BuildError::Schema(_) => "schema",
      BuildError::Assembly(_) => "assembly",
      BuildError::Provenance(_) => "provenance",
    }
  }
}

/// A build that ended in `Failed`.
#[derive(Debug, Error)]
#[error("{stage} failed: {error}")]
pub struct BuildFailure {
  /// Stage that was running when the error occurred.
  pub stage: BuildStage,
  #[source]
  pub error: BuildError,
}

impl BuildFailure {
  pub fn category(&self) -> &'static str {
    self.error.category()
  }
}

/// Receives stage transitions, e.g. to print progress.
pub trait ProgressSink: Send + Sync {
  fn stage_started(&self, stage: BuildStage);
}
