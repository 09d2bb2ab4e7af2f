//! Project inputs: descriptor, kind and configuration.
//!
//! Everything here is read once at the start of a build and treated as
//! immutable afterwards.
//!
//! # Submodules
//!
//! - [`validate`] - precondition checks on the project tree

pub mod validate;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{MANIFEST_FILE, OWNABLE_CONFIG_FILE};
use crate::package::OutputLayout;

pub use validate::validate_project;

/// A project precondition that does not hold.
///
/// Every variant carries the path that was expected so the caller can say
/// exactly what to create or fix.
#[derive(Debug, Error)]
pub enum PreconditionError {
  #[error("project manifest not found: {}", path.display())]
  MissingManifest { path: PathBuf },

  #[error("source directory not found: {}", path.display())]
  MissingSourceDir { path: PathBuf },

  #[error("asset directory not found: {}", path.display())]
  MissingAssetDir { path: PathBuf },

  #[error("display document not found: {}", path.display())]
  MissingDisplayDocument { path: PathBuf },

  #[error("image directory not found: {}", path.display())]
  MissingImageDir { path: PathBuf },

  #[error("image directory is empty: {}", path.display())]
  EmptyImageDir { path: PathBuf },

  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid manifest {}: {message}", path.display())]
  ManifestParse { path: PathBuf, message: String },

  #[error("invalid {OWNABLE_CONFIG_FILE} {}: {message}", path.display())]
  ConfigParse { path: PathBuf, message: String },

  #[error("invalid project name '{name}': only lowercase letters, digits and '-' are allowed")]
  InvalidName { name: String },

  #[error("invalid version '{version}': expected major.minor.patch")]
  InvalidVersion { version: String },
}

/// Which family of ownable a project produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnableKind {
  /// A single display image.
  #[default]
  Static,
  /// An audio track with cover and backdrop images.
  Music,
}

impl OwnableKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      OwnableKind::Static => "static",
      OwnableKind::Music => "music",
    }
  }
}

impl fmt::Display for OwnableKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Identity of the package, derived from the project manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
  pub name: String,
  pub description: String,
  pub version: String,
  pub authors: Vec<String>,
  pub keywords: Vec<String>,
}

#[derive(Deserialize)]
struct CargoManifest {
  package: Option<CargoPackage>,
}

#[derive(Deserialize)]
struct CargoPackage {
  name: String,
  version: String,
  #[serde(default)]
  description: Option<String>,
  #[serde(default)]
  authors: Vec<String>,
  #[serde(default)]
  keywords: Vec<String>,
}

impl ProjectDescriptor {
  /// Read and normalize the descriptor from `<root>/Cargo.toml`.
  pub async fn load(project_root: &Path) -> Result<Self, PreconditionError> {
    let path = project_root.join(MANIFEST_FILE);
    let content = tokio::fs::read_to_string(&path)
      .await
      .map_err(|source| PreconditionError::Read {
        path: path.clone(),
        source,
      })?;
    Self::parse(&content, &path)
  }

  /// Parse manifest text; `path` is only used for error messages.
  pub fn parse(content: &str, path: &Path) -> Result<Self, PreconditionError> {
    let manifest: CargoManifest = toml::from_str(content).map_err(|e| PreconditionError::ManifestParse {
      path: path.to_path_buf(),
      message: e.message().to_string(),
    })?;

    let package = manifest.package.ok_or_else(|| PreconditionError::ManifestParse {
      path: path.to_path_buf(),
      message: "missing [package] table".to_string(),
    })?;

    let name = normalize_name(&package.name);
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
      return Err(PreconditionError::InvalidName { name: package.name });
    }

    if !is_plain_version(&package.version) {
      return Err(PreconditionError::InvalidVersion {
        version: package.version,
      });
    }

    let mut keywords: Vec<String> = Vec::with_capacity(package.keywords.len());
    for keyword in package.keywords {
      if !keywords.contains(&keyword) {
        keywords.push(keyword);
      }
    }

    debug!(name = %name, version = %package.version, "read project descriptor");

    Ok(Self {
      name,
      description: package.description.unwrap_or_default(),
      version: package.version,
      authors: package.authors,
      keywords,
    })
  }

  /// The name as a Rust identifier: the file stem of the compiled artifact
  /// and of the generated bindings.
  pub fn crate_ident(&self) -> String {
    self.name.replace('-', "_")
  }

  /// File name of the finished archive.
  pub fn archive_name(&self) -> String {
    format!("{}.zip", self.name)
  }
}

/// Lowercase, with `_` and spaces folded into `-`.
pub fn normalize_name(raw: &str) -> String {
  raw
    .trim()
    .chars()
    .map(|c| match c {
      '_' | ' ' => '-',
      c => c.to_ascii_lowercase(),
    })
    .collect()
}

fn is_plain_version(version: &str) -> bool {
  let parts: Vec<&str> = version.split('.').collect();
  parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

/// Contents of the optional `Ownable.toml` marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
  pub kind: OwnableKind,
  pub network: Option<String>,
  pub build: BuildSection,
}

/// `[build]` table of `Ownable.toml`. Unset keys fall back to CLI flags or
/// built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSection {
  pub use_build_cache: Option<bool>,
  pub run_optimizer: Option<bool>,
  pub output_layout: Option<OutputLayout>,
}

impl ProjectConfig {
  /// Read `<root>/Ownable.toml`; a missing file yields the defaults
  /// (a `Static` ownable).
  pub async fn load(project_root: &Path) -> Result<Self, PreconditionError> {
    let path = project_root.join(OWNABLE_CONFIG_FILE);
    let content = match tokio::fs::read_to_string(&path).await {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no ownable config, assuming static");
        return Ok(Self::default());
      }
      Err(source) => return Err(PreconditionError::Read { path, source }),
    };

    toml::from_str(&content).map_err(|e| PreconditionError::ConfigParse {
      path,
      message: e.message().to_string(),
    })
  }
}
