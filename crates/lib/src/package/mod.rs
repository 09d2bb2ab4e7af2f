//! Staging tree, package layout and final archive.
//!
//! # Submodules
//!
//! - [`tree`] - the per-build temporary [`OutputTree`]
//! - [`layout`] - where each part lands for a given [`OutputLayout`]
//! - [`manifest`] - `package.json`
//! - [`archive`] - deterministic zip assembly

pub mod archive;
pub mod layout;
pub mod manifest;
pub mod tree;

use std::path::PathBuf;

use thiserror::Error;

use crate::util::hash::HashError;

pub use archive::assemble;
pub use layout::{OutputLayout, PackageLayout};
pub use manifest::PackageManifest;
pub use tree::OutputTree;

#[derive(Debug, Error)]
pub enum AssemblyError {
  #[error("failed to stage {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to walk package tree: {0}")]
  Walk(#[from] walkdir::Error),

  #[error("failed to write archive: {0}")]
  Zip(#[from] zip::result::ZipError),

  #[error("compiled artifact missing from package: {}", path.display())]
  MissingArtifact { path: PathBuf },

  #[error("failed to serialize package manifest: {0}")]
  Manifest(String),

  #[error("failed to hash staged package: {0}")]
  Hash(#[from] HashError),

  #[error("staging task failed: {0}")]
  Task(String),
}
