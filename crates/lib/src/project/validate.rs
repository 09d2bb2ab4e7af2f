//! Project shape checks.
//!
//! The validator only reads. It stops at the first missing precondition, in
//! the order a user would fix them.

use std::path::Path;

use tokio::fs;
use tracing::debug;

use super::PreconditionError;
use crate::consts::{ASSETS_DIR, DISPLAY_DOCUMENT, IMAGES_DIR, MANIFEST_FILE, SOURCE_DIR};

/// Check that `project_root` has the layout the pipeline needs.
///
/// In order: `Cargo.toml`, `src/`, `assets/`, `assets/index.html`,
/// `assets/images/` holding at least one file.
pub async fn validate_project(project_root: &Path) -> Result<(), PreconditionError> {
  let manifest = project_root.join(MANIFEST_FILE);
  if !is_file(&manifest).await {
    return Err(PreconditionError::MissingManifest { path: manifest });
  }

  let source = project_root.join(SOURCE_DIR);
  if !is_dir(&source).await {
    return Err(PreconditionError::MissingSourceDir { path: source });
  }

  let assets = project_root.join(ASSETS_DIR);
  if !is_dir(&assets).await {
    return Err(PreconditionError::MissingAssetDir { path: assets });
  }

  let display = assets.join(DISPLAY_DOCUMENT);
  if !is_file(&display).await {
    return Err(PreconditionError::MissingDisplayDocument { path: display });
  }

  let images = assets.join(IMAGES_DIR);
  if !is_dir(&images).await {
    return Err(PreconditionError::MissingImageDir { path: images });
  }
  if !has_file(&images).await? {
    return Err(PreconditionError::EmptyImageDir { path: images });
  }

  debug!(project = %project_root.display(), "project layout valid");
  Ok(())
}

async fn is_file(path: &Path) -> bool {
  fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

async fn is_dir(path: &Path) -> bool {
  fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

async fn has_file(dir: &Path) -> Result<bool, PreconditionError> {
  let read_err = |source| PreconditionError::Read {
    path: dir.to_path_buf(),
    source,
  };

  let mut entries = fs::read_dir(dir).await.map_err(read_err)?;
  while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
    if entry.file_type().await.map_err(read_err)?.is_file() {
      return Ok(true);
    }
  }
  Ok(false)
}
