//! The build orchestrator.
//!
//! [`Pipeline`] owns the capabilities a build needs (a command runner, a
//! signer and the schema cache) and drives one project through every stage.
//! The working tree is created per build and removed when the build ends,
//! successfully or not. Project files are never deleted.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{BuildError, BuildFailure, BuildOptions, BuildOverrides, BuildStage, ProgressSink};
use crate::assets::{self, AssetRules};
use crate::consts::SCHEMA_DIR;
use crate::package::layout::PROVENANCE_RECORD;
use crate::package::{self, AssemblyError, OutputTree, PackageLayout, PackageManifest};
use crate::project::{OwnableKind, ProjectConfig, ProjectDescriptor, validate_project};
use crate::provenance::{self, Secret, Signer};
use crate::schema::{SchemaBundle, SchemaCache, SchemaError};
use crate::toolchain::{CommandRunner, CompiledArtifact, Toolchain};
use crate::util::hash::hash_directory;

/// Where the schema bundle of a build came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaSource {
  /// The project's own `schema/` directory.
  Project,
  /// Copied from the schema cache.
  Cache,
  /// Generated by the toolchain during this build.
  Generated,
}

impl SchemaSource {
  pub fn as_str(&self) -> &'static str {
    match self {
      SchemaSource::Project => "project",
      SchemaSource::Cache => "cache",
      SchemaSource::Generated => "generated",
    }
  }
}

/// Everything one build needs from the caller.
#[derive(Debug)]
pub struct PipelineRequest {
  pub project_root: PathBuf,
  /// Directory receiving `<name>.zip`.
  pub output_dir: PathBuf,
  pub secret: Secret,
  pub overrides: BuildOverrides,
  pub rules: AssetRules,
  /// Parent of the per-build output tree; the system temp dir when `None`.
  pub work_dir: Option<PathBuf>,
}

impl PipelineRequest {
  pub fn new(project_root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, secret: Secret) -> Self {
    Self {
      project_root: project_root.into(),
      output_dir: output_dir.into(),
      secret,
      overrides: BuildOverrides::default(),
      rules: AssetRules::default(),
      work_dir: None,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
  pub archive: PathBuf,
  pub name: String,
  pub version: String,
  pub kind: OwnableKind,
  pub layout: package::OutputLayout,
  pub schema_source: SchemaSource,
  pub chain_id: String,
  /// Content hash of the staged package, as recorded in the genesis event.
  pub package_hash: String,
  pub elapsed: Duration,
}

pub struct Pipeline<R, S> {
  toolchain: Toolchain<R>,
  signer: S,
  cache: SchemaCache,
  progress: Option<Box<dyn ProgressSink>>,
}

impl<R: CommandRunner, S: Signer> Pipeline<R, S> {
  pub fn new(runner: R, signer: S, cache: SchemaCache) -> Self {
    Self {
      toolchain: Toolchain::new(runner),
      signer,
      cache,
      progress: None,
    }
  }

  pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
    self.progress = Some(progress);
    self
  }

  pub fn runner(&self) -> &R {
    self.toolchain.runner()
  }

  pub fn cache(&self) -> &SchemaCache {
    &self.cache
  }

  /// Build `request.project_root` into an archive in `request.output_dir`.
  pub async fn run(&self, request: PipelineRequest) -> Result<BuildOutcome, BuildFailure> {
    let started = Instant::now();
    let mut stage = BuildStage::Validating;
    let mut tree = None;

    let result = self.run_stages(request, started, &mut stage, &mut tree).await;

    if let Some(tree) = tree.take() {
      tree.cleanup();
    }

    match result {
      Ok(outcome) => {
        self.enter(BuildStage::Done);
        info!(
          archive = %outcome.archive.display(),
          elapsed_ms = outcome.elapsed.as_millis() as u64,
          "build finished"
        );
        Ok(outcome)
      }
      Err(error) => {
        error!(stage = %stage, category = error.category(), error = %error, "build failed");
        self.enter(BuildStage::Failed);
        Err(BuildFailure { stage, error })
      }
    }
  }

  fn enter(&self, stage: BuildStage) {
    debug!(stage = %stage, "entering stage");
    if let Some(progress) = &self.progress {
      progress.stage_started(stage);
    }
  }

  fn advance(&self, stage: &mut BuildStage, next: BuildStage) {
    *stage = next;
    self.enter(next);
  }

  async fn run_stages(
    &self,
    request: PipelineRequest,
    started: Instant,
    stage: &mut BuildStage,
    tree_slot: &mut Option<OutputTree>,
  ) -> Result<BuildOutcome, BuildError> {
    let PipelineRequest {
      project_root,
      output_dir,
      secret,
      overrides,
      rules,
      work_dir,
    } = request;
    let root = project_root.as_path();

    self.enter(BuildStage::Validating);
    let (validated, descriptor, config) = tokio::join!(
      validate_project(root),
      ProjectDescriptor::load(root),
      ProjectConfig::load(root)
    );
    validated?;
    let descriptor = descriptor?;
    let config = config?;

    let options = BuildOptions::resolve(&config, &overrides, rules);
    let kind = config.kind;
    let layout = PackageLayout::new(options.output_layout, descriptor.crate_ident());
    info!(name = %descriptor.name, kind = %kind, layout = %options.output_layout, "building ownable");

    let manifest = assets::plan(kind, root, &descriptor, &layout, &options.rules).await?;

    self.advance(stage, BuildStage::Compiling);
    let tree = tree_slot.insert(create_tree(work_dir.as_deref())?);
    let artifact = self
      .toolchain
      .build(
        root,
        &descriptor,
        tree.toolchain_dir(),
        options.use_build_cache,
        options.run_optimizer,
      )
      .await?;
    stage_artifact(tree, &layout, &artifact).await?;

    self.advance(stage, BuildStage::SchemaResolving);
    let (bundle, schema_source) = self.resolve_schema(root, kind).await?;
    stage_schemas(tree, &layout, &bundle).await?;

    self.advance(stage, BuildStage::AssetProcessing);
    assets::place(&manifest, tree, &layout, &options.rules).await?;
    PackageManifest::new(&descriptor, kind, options.output_layout)
      .write(&tree.package_path(&layout.manifest()))
      .await?;

    self.advance(stage, BuildStage::ProvenanceRecording);
    let package_dir = tree.package_dir().to_path_buf();
    let package_hash = tokio::task::spawn_blocking(move || hash_directory(&package_dir, &[PROVENANCE_RECORD]))
      .await
      .map_err(|e| AssemblyError::Task(e.to_string()))?
      .map_err(AssemblyError::from)?;
    let chain = provenance::record_package(
      &self.signer,
      secret,
      &options.network,
      &package_hash.0,
      descriptor.keywords.clone(),
    )?;
    let chain_path = tree.package_path(&layout.provenance());
    tokio::fs::write(&chain_path, chain.to_json()?)
      .await
      .map_err(|source| AssemblyError::Io {
        path: chain_path.clone(),
        source,
      })?;

    self.advance(stage, BuildStage::Assembling);
    let destination = output_dir.join(descriptor.archive_name());
    let package_dir = tree.package_dir().to_path_buf();
    let archive_layout = layout.clone();
    let archive = tokio::task::spawn_blocking(move || package::assemble(&package_dir, &archive_layout, &destination))
      .await
      .map_err(|e| AssemblyError::Task(e.to_string()))??;

    Ok(BuildOutcome {
      archive,
      name: descriptor.name,
      version: descriptor.version,
      kind,
      layout: options.output_layout,
      schema_source,
      chain_id: chain.id,
      package_hash: package_hash.0,
      elapsed: started.elapsed(),
    })
  }

  /// Write-through on presence, read-through on absence, generate last.
  async fn resolve_schema(&self, project_root: &Path, kind: OwnableKind) -> Result<(SchemaBundle, SchemaSource), BuildError> {
    let schema_dir = project_root.join(SCHEMA_DIR);

    match SchemaBundle::load(&schema_dir).await {
      Ok(bundle) => {
        info!(dir = %schema_dir.display(), "using project schemas");
        if let Err(e) = self.cache.store(kind, &schema_dir).await {
          warn!(kind = %kind, error = %e, "failed to update schema cache");
        }
        return Ok((bundle, SchemaSource::Project));
      }
      Err(SchemaError::Missing { missing, .. }) => {
        debug!(dir = %schema_dir.display(), missing = missing.len(), "project schemas incomplete");
      }
      Err(e) => {
        warn!(dir = %schema_dir.display(), error = %e, "project schemas unusable");
      }
    }

    if self.cache.lookup(kind).await.is_some() {
      match self.cache.materialize(kind, &schema_dir).await {
        Ok(bundle) => return Ok((bundle, SchemaSource::Cache)),
        Err(e) => warn!(kind = %kind, error = %e, "failed to materialize cached schemas, generating"),
      }
    }

    let generated_dir = self.toolchain.generate_schema(project_root).await?;
    let bundle = SchemaBundle::load(&generated_dir).await?;
    if let Err(e) = self.cache.store(kind, &generated_dir).await {
      warn!(kind = %kind, error = %e, "failed to store generated schemas in cache");
    }
    Ok((bundle, SchemaSource::Generated))
  }
}

fn create_tree(work_dir: Option<&Path>) -> Result<OutputTree, AssemblyError> {
  let created = match work_dir {
    Some(dir) => OutputTree::create_in(dir),
    None => OutputTree::create(),
  };
  created.map_err(|source| AssemblyError::Io {
    path: work_dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
    source,
  })
}

/// Copy the compiled artifact (under its generic name) and the bindings into
/// the package.
async fn stage_artifact(tree: &OutputTree, layout: &PackageLayout, artifact: &CompiledArtifact) -> Result<(), AssemblyError> {
  let wasm = tree.package_path(&layout.artifact());
  let bindings = tree.package_path(&layout.bindings());

  tokio::try_join!(copy_into(&artifact.wasm, &wasm), copy_into(&artifact.bindings, &bindings))?;
  debug!(wasm = %wasm.display(), bindings = %bindings.display(), "staged artifact");
  Ok(())
}

async fn stage_schemas(tree: &OutputTree, layout: &PackageLayout, bundle: &SchemaBundle) -> Result<(), AssemblyError> {
  for (document, content) in bundle.iter() {
    let path = tree.package_path(&layout.schema_document(document));
    ensure_parent(&path).await?;
    tokio::fs::write(&path, content)
      .await
      .map_err(|source| AssemblyError::Io { path, source })?;
  }
  Ok(())
}

async fn copy_into(from: &Path, to: &Path) -> Result<(), AssemblyError> {
  ensure_parent(to).await?;
  tokio::fs::copy(from, to).await.map_err(|source| AssemblyError::Io {
    path: to.to_path_buf(),
    source,
  })?;
  Ok(())
}

async fn ensure_parent(path: &Path) -> Result<(), AssemblyError> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await.map_err(|source| AssemblyError::Io {
      path: parent.to_path_buf(),
      source,
    })?;
  }
  Ok(())
}
