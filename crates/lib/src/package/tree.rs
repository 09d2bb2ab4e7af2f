//! Disposable staging directory for one build.
//!
//! ```text
//! <tmp>/ownable-build-XXXXXX/
//! ├── package/     # becomes the archive
//! └── toolchain/   # bindgen/optimizer scratch, never archived
//! ```

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct OutputTree {
  temp: TempDir,
  package: PathBuf,
  toolchain: PathBuf,
}

impl OutputTree {
  /// Create a fresh tree in the system temp directory.
  pub fn create() -> io::Result<Self> {
    Self::from_temp(tempfile::Builder::new().prefix("ownable-build-").tempdir()?)
  }

  /// Create a fresh tree under `parent`.
  pub fn create_in(parent: &Path) -> io::Result<Self> {
    Self::from_temp(tempfile::Builder::new().prefix("ownable-build-").tempdir_in(parent)?)
  }

  fn from_temp(temp: TempDir) -> io::Result<Self> {
    let package = temp.path().join("package");
    let toolchain = temp.path().join("toolchain");
    std::fs::create_dir(&package)?;
    std::fs::create_dir(&toolchain)?;
    debug!(path = %temp.path().display(), "created output tree");
    Ok(Self {
      temp,
      package,
      toolchain,
    })
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  /// Everything under here ends up in the archive.
  pub fn package_dir(&self) -> &Path {
    &self.package
  }

  pub fn toolchain_dir(&self) -> &Path {
    &self.toolchain
  }

  /// Absolute path of a package-relative path.
  pub fn package_path(&self, relative: &Path) -> PathBuf {
    self.package.join(relative)
  }

  /// Delete the tree. Failure is logged, not returned.
  pub fn cleanup(self) {
    let path = self.temp.path().to_path_buf();
    match self.temp.close() {
      Ok(()) => debug!(path = %path.display(), "removed output tree"),
      Err(e) => warn!(path = %path.display(), error = %e, "failed to remove output tree"),
    }
  }
}
