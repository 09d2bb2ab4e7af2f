//! Implementation of the `ownable build` command.
//!
//! Resolves the cache location and output directory, runs the pipeline with
//! the real toolchain and the Ed25519 signer, and prints a summary.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::debug;

use ownable_lib::build::{BuildOutcome, BuildOverrides, BuildStage, Pipeline, PipelineRequest, ProgressSink};
use ownable_lib::package::OutputLayout;
use ownable_lib::platform::paths;
use ownable_lib::provenance::{Ed25519Signer, Secret};
use ownable_lib::schema::{CacheScope, SchemaCache};
use ownable_lib::toolchain::TokioRunner;

use crate::CacheScopeArg;
use crate::output::{OutputFormat, Report, format_elapsed, format_size, print_built, print_json, print_stage, short_id};

pub struct BuildArgs {
  pub path: PathBuf,
  pub output_dir: Option<PathBuf>,
  pub secret: String,
  pub cache_scope: CacheScopeArg,
  pub cache_dir: Option<PathBuf>,
  pub build_cache: bool,
  pub no_optimizer: bool,
  pub layout: Option<OutputLayout>,
  pub network: Option<String>,
  pub output: OutputFormat,
}

/// Prints one line per stage in text mode.
struct StageProgress;

impl ProgressSink for StageProgress {
  fn stage_started(&self, stage: BuildStage) {
    if !stage.is_terminal() {
      print_stage(&stage.to_string());
    }
  }
}

#[derive(Serialize)]
struct BuildSummary<'a> {
  archive: String,
  archive_bytes: u64,
  name: &'a str,
  version: &'a str,
  kind: &'a str,
  layout: &'a str,
  schema_source: &'a str,
  chain_id: &'a str,
  package_hash: &'a str,
  elapsed_ms: u128,
}

impl<'a> BuildSummary<'a> {
  fn new(outcome: &'a BuildOutcome, archive_bytes: u64) -> Self {
    Self {
      archive: outcome.archive.display().to_string(),
      archive_bytes,
      name: &outcome.name,
      version: &outcome.version,
      kind: outcome.kind.as_str(),
      layout: outcome.layout.as_str(),
      schema_source: outcome.schema_source.as_str(),
      chain_id: &outcome.chain_id,
      package_hash: &outcome.package_hash,
      elapsed_ms: outcome.elapsed.as_millis(),
    }
  }
}

/// Execute the build command.
///
/// Exits non-zero with `[<category>] <stage> failed: <message>` when the
/// pipeline fails.
pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let project_root = dunce::canonicalize(&args.path).unwrap_or_else(|_| args.path.clone());
  let output_dir = match args.output_dir {
    Some(dir) => dir,
    None => std::env::current_dir().context("Failed to determine current directory")?,
  };

  let scope = match args.cache_scope {
    CacheScopeArg::Global => {
      let root = args
        .cache_dir
        .or_else(paths::schema_cache_dir)
        .context("Could not determine the schema cache directory; pass --cache-dir")?;
      CacheScope::Global { root }
    }
    CacheScopeArg::Project => CacheScope::Project {
      project_root: project_root.clone(),
    },
  };

  debug!(project = %project_root.display(), output_dir = %output_dir.display(), cache = ?scope, "resolved build paths");

  let mut pipeline = Pipeline::new(TokioRunner, Ed25519Signer, SchemaCache::new(scope));
  if !args.output.is_json() {
    pipeline = pipeline.with_progress(Box::new(StageProgress));
  }

  let mut request = PipelineRequest::new(&project_root, &output_dir, Secret::new(args.secret));
  request.overrides = BuildOverrides {
    use_build_cache: args.build_cache.then_some(true),
    run_optimizer: args.no_optimizer.then_some(false),
    output_layout: args.layout,
    network: args.network,
  };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt
    .block_on(pipeline.run(request))
    .map_err(|failure| anyhow!("[{}] {}", failure.category(), failure))?;

  let archive_bytes = std::fs::metadata(&outcome.archive).map(|m| m.len()).unwrap_or(0);

  if args.output.is_json() {
    print_json(&BuildSummary::new(&outcome, archive_bytes))?;
  } else {
    println!();
    print_built(&format!("Built {} {}", outcome.name, outcome.version));
    Report::new()
      .row("Archive", outcome.archive.display().to_string())
      .row("Size", format_size(archive_bytes))
      .row("Kind", outcome.kind.as_str())
      .row("Layout", outcome.layout.as_str())
      .row("Schemas", outcome.schema_source.as_str())
      .row("Chain", short_id(&outcome.chain_id))
      .row("Package", short_id(&outcome.package_hash))
      .row("Elapsed", format_elapsed(outcome.elapsed))
      .print();
  }

  Ok(())
}
