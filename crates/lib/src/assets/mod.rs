//! Media selection, validation and placement.
//!
//! Processing is split in two phases:
//!
//! - **plan** reads the project's `assets/` tree, selects the files the kind
//!   needs, validates them and renders the display document. It writes
//!   nothing, so it can run before the expensive toolchain steps.
//! - **place** copies the planned files into the [`OutputTree`] and derives
//!   the thumbnail. Every path it creates is recorded and removed again if
//!   any step fails.
//!
//! # Submodules
//!
//! - [`rules`] - limits for images, audio and thumbnails
//! - [`media`] - single-file checks and the thumbnail transform
//! - [`placeholder`] - `$${key}` substitution in `index.html`
//! - [`static_kind`] - selection for static ownables
//! - [`music`] - selection for music ownables

pub mod media;
pub mod music;
pub mod placeholder;
pub mod rules;
pub mod static_kind;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::consts::{ASSETS_DIR, AUDIO_DIR, DISPLAY_DOCUMENT, IMAGES_DIR};
use crate::package::layout::{THUMBNAIL, web_path};
use crate::package::{OutputTree, PackageLayout};
use crate::project::{OwnableKind, ProjectDescriptor};

pub use media::{AudioInfo, ImageInfo};
pub use placeholder::PlaceholderError;
pub use rules::{AssetRules, AudioRules, ImageRules, ThumbnailRules};

/// The project's assets do not identify the files a kind needs.
#[derive(Debug, Error)]
pub enum SelectionError {
  #[error("required asset directory not found: {}", path.display())]
  MissingDirectory { path: PathBuf },

  #[error("no {what} found in {}", dir.display())]
  NoMatch { dir: PathBuf, what: String },

  #[error("ambiguous {what} in {}: {}", dir.display(), candidates.join(", "))]
  Ambiguous {
    dir: PathBuf,
    what: String,
    candidates: Vec<String>,
  },

  #[error("need at least {required} images in {}, found {found}", dir.display())]
  NotEnoughImages { dir: PathBuf, found: usize, required: usize },

  #[error("failed to list {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// A selected asset breaks a rule, or could not be transformed.
#[derive(Debug, Error)]
pub enum AssetError {
  #[error("{}: file extension not allowed (allowed: {allowed})", path.display())]
  Extension { path: PathBuf, allowed: String },

  #[error("{}: {size} bytes exceeds the {limit} byte limit", path.display())]
  TooLarge { path: PathBuf, size: u64, limit: u64 },

  #[error("{}: content is not a recognized image format", path.display())]
  UnknownFormat { path: PathBuf },

  #[error("{}: image format {format} not allowed (allowed: {allowed})", path.display())]
  UnsupportedFormat {
    path: PathBuf,
    format: String,
    allowed: String,
  },

  #[error("{}: dimensions {width}x{height} outside the allowed range {min}..={max} px", path.display())]
  Dimensions {
    path: PathBuf,
    width: u32,
    height: u32,
    min: u32,
    max: u32,
  },

  #[error("{}: would overwrite {} in the package", path.display(), web_path(package_path))]
  Reserved { path: PathBuf, package_path: PathBuf },

  #[error("{}: already present in the package", path.display())]
  Occupied { path: PathBuf },

  #[error("{}: failed to decode: {message}", path.display())]
  Decode { path: PathBuf, message: String },

  #[error("{}: thumbnail is {size} bytes, over the {limit} byte ceiling", path.display())]
  ThumbnailTooLarge { path: PathBuf, size: u64, limit: u64 },

  #[error("{}: {source}", path.display())]
  Placeholder {
    path: PathBuf,
    #[source]
    source: PlaceholderError,
  },

  #[error("asset i/o on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("asset task failed: {message}")]
  Task { message: String },
}

/// Any failure of an asset processor.
#[derive(Debug, Error)]
pub enum ProcessError {
  #[error(transparent)]
  Selection(#[from] SelectionError),

  #[error(transparent)]
  Validation(#[from] AssetError),
}

/// Files chosen for a kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
  Static {
    image: ImageInfo,
  },
  Music {
    audio: AudioInfo,
    cover: ImageInfo,
    backdrop: ImageInfo,
  },
}

/// Output of the plan phase: everything `place` needs, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManifest {
  pub assets_dir: PathBuf,
  pub selection: Selection,
  /// `index.html` with placeholders substituted.
  pub display_document: String,
  /// Other files under `assets/`, relative to it, copied verbatim.
  pub extra_files: Vec<PathBuf>,
}

impl AssetManifest {
  pub fn kind(&self) -> OwnableKind {
    match self.selection {
      Selection::Static { .. } => OwnableKind::Static,
      Selection::Music { .. } => OwnableKind::Music,
    }
  }

  /// Image the thumbnail is derived from.
  pub fn thumbnail_source(&self) -> &Path {
    match &self.selection {
      Selection::Static { image } => &image.path,
      Selection::Music { cover, .. } => &cover.path,
    }
  }

  /// Package-relative paths of every file `place` writes, sorted.
  pub fn placed_paths(&self, layout: &PackageLayout) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = self.jobs(layout).into_iter().map(|job| job.dest().to_path_buf()).collect();
    paths.sort();
    paths
  }

  fn jobs(&self, layout: &PackageLayout) -> Vec<PlaceJob> {
    let mut jobs = Vec::new();

    match &self.selection {
      Selection::Static { image } => {
        jobs.push(PlaceJob::Copy {
          from: image.path.clone(),
          to: layout.image(&file_name(&image.path)),
        });
      }
      Selection::Music { audio, cover, backdrop } => {
        jobs.push(PlaceJob::Copy {
          from: audio.path.clone(),
          to: layout.audio(&file_name(&audio.path)),
        });
        for image in [cover, backdrop] {
          jobs.push(PlaceJob::Copy {
            from: image.path.clone(),
            to: layout.image(&file_name(&image.path)),
          });
        }
      }
    }

    jobs.push(PlaceJob::Thumbnail {
      from: self.thumbnail_source().to_path_buf(),
      to: layout.thumbnail(),
    });

    for relative in &self.extra_files {
      jobs.push(PlaceJob::Copy {
        from: self.assets_dir.join(relative),
        to: relative.clone(),
      });
    }

    jobs.push(PlaceJob::Write {
      content: self.display_document.clone(),
      to: layout.display_document(),
    });

    jobs
  }
}

/// Select and validate the assets of `project_root` for `kind`.
pub async fn plan(
  kind: OwnableKind,
  project_root: &Path,
  descriptor: &ProjectDescriptor,
  layout: &PackageLayout,
  rules: &AssetRules,
) -> Result<AssetManifest, ProcessError> {
  let assets_dir = project_root.join(ASSETS_DIR);

  let selection = match kind {
    OwnableKind::Static => static_kind::select(&assets_dir, descriptor, rules).await?,
    OwnableKind::Music => music::select(&assets_dir, rules).await?,
  };

  let display_document = render_display_document(&assets_dir, descriptor, &selection).await?;
  let extra_files = list_extra_files(&assets_dir).await?;
  check_reserved(&assets_dir, &extra_files, layout)?;

  info!(kind = %kind, extra = extra_files.len(), "planned assets");
  Ok(AssetManifest {
    assets_dir,
    selection,
    display_document,
    extra_files,
  })
}

/// Write the planned assets into `tree`. On failure nothing placed here
/// remains in the tree.
pub async fn place(
  manifest: &AssetManifest,
  tree: &OutputTree,
  layout: &PackageLayout,
  rules: &AssetRules,
) -> Result<Vec<PathBuf>, ProcessError> {
  let mut placement = Placement::new(tree.package_dir());

  match place_jobs(manifest, layout, rules, &mut placement).await {
    Ok(()) => {
      let placed = manifest.placed_paths(layout);
      info!(files = placed.len(), "placed assets");
      Ok(placed)
    }
    Err(e) => {
      placement.rollback().await;
      Err(e.into())
    }
  }
}

/// [`plan`] followed by [`place`].
pub async fn process(
  kind: OwnableKind,
  project_root: &Path,
  descriptor: &ProjectDescriptor,
  tree: &OutputTree,
  layout: &PackageLayout,
  rules: &AssetRules,
) -> Result<AssetManifest, ProcessError> {
  let manifest = plan(kind, project_root, descriptor, layout, rules).await?;
  place(&manifest, tree, layout, rules).await?;
  Ok(manifest)
}

async fn place_jobs(
  manifest: &AssetManifest,
  layout: &PackageLayout,
  rules: &AssetRules,
  placement: &mut Placement,
) -> Result<(), AssetError> {
  let jobs = manifest.jobs(layout);

  for job in &jobs {
    placement.claim(job.dest()).await?;
  }

  let root = placement.root.clone();
  let blocking: Vec<BlockingJob<()>> = jobs
    .into_iter()
    .map(|job| {
      let root = root.clone();
      let thumbnail = rules.thumbnail.clone();
      Box::new(move || job.run(&root, &thumbnail)) as BlockingJob<()>
    })
    .collect();

  run_blocking(blocking).await.map(|_| ())
}

enum PlaceJob {
  Copy { from: PathBuf, to: PathBuf },
  Thumbnail { from: PathBuf, to: PathBuf },
  Write { content: String, to: PathBuf },
}

impl PlaceJob {
  fn dest(&self) -> &Path {
    match self {
      PlaceJob::Copy { to, .. } | PlaceJob::Thumbnail { to, .. } | PlaceJob::Write { to, .. } => to,
    }
  }

  fn run(self, root: &Path, thumbnail: &ThumbnailRules) -> Result<(), AssetError> {
    let dest = root.join(self.dest());
    let write_err = |source| AssetError::Io {
      path: dest.clone(),
      source,
    };

    match &self {
      PlaceJob::Copy { from, .. } => {
        std::fs::copy(from, &dest).map_err(write_err)?;
      }
      PlaceJob::Thumbnail { from, .. } => {
        let bytes = media::render_thumbnail(from, thumbnail)?;
        std::fs::write(&dest, bytes).map_err(write_err)?;
      }
      PlaceJob::Write { content, .. } => {
        std::fs::write(&dest, content).map_err(write_err)?;
      }
    }
    debug!(dest = %dest.display(), "placed asset");
    Ok(())
  }
}

/// Paths created under the package root, for rollback.
struct Placement {
  root: PathBuf,
  files: Vec<PathBuf>,
  dirs: Vec<PathBuf>,
}

impl Placement {
  fn new(root: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
      files: Vec::new(),
      dirs: Vec::new(),
    }
  }

  /// Record `relative` as written by this placement and create its missing
  /// parent directories. Fails if something is already there.
  async fn claim(&mut self, relative: &Path) -> Result<(), AssetError> {
    let dest = self.root.join(relative);
    let exists = tokio::fs::try_exists(&dest).await.map_err(|source| AssetError::Io {
      path: dest.clone(),
      source,
    })?;
    if exists || self.files.contains(&dest) {
      return Err(AssetError::Occupied { path: dest });
    }

    if let Some(parent) = relative.parent() {
      let mut dir = self.root.clone();
      for component in parent.components() {
        dir.push(component);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
          tokio::fs::create_dir(&dir).await.map_err(|source| AssetError::Io {
            path: dir.clone(),
            source,
          })?;
          self.dirs.push(dir.clone());
        }
      }
    }
    self.files.push(dest);
    Ok(())
  }

  async fn rollback(self) {
    for file in self.files.iter().rev() {
      match tokio::fs::remove_file(file).await {
        Ok(()) => debug!(path = %file.display(), "rolled back asset"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %file.display(), error = %e, "failed to roll back asset"),
      }
    }
    for dir in self.dirs.iter().rev() {
      if let Err(e) = tokio::fs::remove_dir(dir).await {
        warn!(path = %dir.display(), error = %e, "failed to roll back asset directory");
      }
    }
  }
}

type BlockingJob<T> = Box<dyn FnOnce() -> Result<T, AssetError> + Send + 'static>;

/// Run `jobs` on the blocking pool concurrently and wait for all of them.
///
/// Results come back in job order; the error of the first failing job (by
/// position, not completion time) is returned.
async fn run_blocking<T: Send + 'static>(jobs: Vec<BlockingJob<T>>) -> Result<Vec<T>, AssetError> {
  let mut join_set = JoinSet::new();
  let mut slots: Vec<Option<Result<T, AssetError>>> = Vec::with_capacity(jobs.len());

  for (index, job) in jobs.into_iter().enumerate() {
    slots.push(None);
    join_set.spawn_blocking(move || (index, job()));
  }

  let mut task_failure = None;
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((index, result)) => {
        if let Some(slot) = slots.get_mut(index) {
          *slot = Some(result);
        }
      }
      Err(e) => {
        error!(error = %e, "asset task panicked");
        task_failure.get_or_insert(AssetError::Task { message: e.to_string() });
      }
    }
  }

  let mut values = Vec::with_capacity(slots.len());
  for slot in slots {
    match slot {
      Some(Ok(value)) => values.push(value),
      Some(Err(e)) => return Err(e),
      None => {}
    }
  }
  match task_failure {
    Some(e) => Err(e),
    None => Ok(values),
  }
}

/// File names of regular files directly inside `dir`, sorted.
async fn list_files(dir: &Path) -> Result<Vec<String>, SelectionError> {
  let list_err = |source| SelectionError::Io {
    path: dir.to_path_buf(),
    source,
  };

  let mut entries = match tokio::fs::read_dir(dir).await {
    Ok(entries) => entries,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      return Err(SelectionError::MissingDirectory { path: dir.to_path_buf() });
    }
    Err(source) => return Err(list_err(source)),
  };

  let mut names = Vec::new();
  while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
    if entry.file_type().await.map_err(list_err)?.is_file() {
      names.push(entry.file_name().to_string_lossy().into_owned());
    }
  }
  names.sort();
  Ok(names)
}

async fn render_display_document(
  assets_dir: &Path,
  descriptor: &ProjectDescriptor,
  selection: &Selection,
) -> Result<String, AssetError> {
  let path = assets_dir.join(DISPLAY_DOCUMENT);
  let template = tokio::fs::read_to_string(&path).await.map_err(|source| AssetError::Io {
    path: path.clone(),
    source,
  })?;

  let values = placeholder_values(descriptor, selection);
  placeholder::substitute(&template, &values).map_err(|source| AssetError::Placeholder { path, source })
}

/// Values for every placeholder the display document of this kind may use.
pub fn placeholder_values(descriptor: &ProjectDescriptor, selection: &Selection) -> BTreeMap<&'static str, String> {
  let image_path = |info: &ImageInfo| web_path(&Path::new(IMAGES_DIR).join(file_name(&info.path)));

  let mut values = BTreeMap::from([
    ("name", descriptor.name.clone()),
    ("description", descriptor.description.clone()),
    ("version", descriptor.version.clone()),
    ("thumbnail", THUMBNAIL.to_string()),
  ]);

  match selection {
    Selection::Static { image } => {
      values.insert("image", image_path(image));
    }
    Selection::Music { audio, cover, backdrop } => {
      values.insert("cover", image_path(cover));
      values.insert("backdrop", image_path(backdrop));
      values.insert("audio", web_path(&Path::new(AUDIO_DIR).join(file_name(&audio.path))));
    }
  }

  values
}

/// Files under `assets/` other than the display document and the media
/// directories, relative to `assets/`, sorted.
async fn list_extra_files(assets_dir: &Path) -> Result<Vec<PathBuf>, AssetError> {
  let root = assets_dir.to_path_buf();

  tokio::task::spawn_blocking(move || {
    let mut files = Vec::new();
    let walker = WalkDir::new(&root)
      .min_depth(1)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|e| {
        let top_level = e.depth() == 1;
        let name = e.file_name().to_string_lossy();
        !(top_level && (name == DISPLAY_DOCUMENT || name == IMAGES_DIR || name == AUDIO_DIR))
      });

    for entry in walker {
      let entry = entry.map_err(|e| AssetError::Io {
        path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone()),
        source: e.into(),
      })?;
      if !entry.file_type().is_file() {
        continue;
      }
      if let Ok(relative) = entry.path().strip_prefix(&root) {
        files.push(relative.to_path_buf());
      }
    }
    Ok(files)
  })
  .await
  .map_err(|e| AssetError::Task { message: e.to_string() })?
}

/// Reject extra files that would land on, above or below a path the pipeline
/// generates.
fn check_reserved(assets_dir: &Path, extra_files: &[PathBuf], layout: &PackageLayout) -> Result<(), AssetError> {
  let generated = layout.generated_paths();
  for relative in extra_files {
    let clash = generated
      .iter()
      .find(|owned| relative.starts_with(owned) || owned.starts_with(relative));
    if let Some(owned) = clash {
      return Err(AssetError::Reserved {
        path: assets_dir.join(relative),
        package_path: owned.clone(),
      });
    }
  }
  Ok(())
}

fn file_name(path: &Path) -> String {
  path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}
