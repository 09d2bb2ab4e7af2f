use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{AssemblyError, OutputLayout};
use crate::project::{OwnableKind, ProjectDescriptor};

/// `package.json` at the package root.
///
/// Field order is the serialization order, so equal inputs give equal bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageManifest {
  pub name: String,
  pub description: String,
  pub version: String,
  pub authors: Vec<String>,
  pub keywords: Vec<String>,
  pub kind: OwnableKind,
  pub layout: OutputLayout,
}

impl PackageManifest {
  pub fn new(descriptor: &ProjectDescriptor, kind: OwnableKind, layout: OutputLayout) -> Self {
    Self {
      name: descriptor.name.clone(),
      description: descriptor.description.clone(),
      version: descriptor.version.clone(),
      authors: descriptor.authors.clone(),
      keywords: descriptor.keywords.clone(),
      kind,
      layout,
    }
  }

  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    Ok(format!("{}\n", serde_json::to_string_pretty(self)?))
  }

  /// Write the manifest to `path`.
  pub async fn write(&self, path: &Path) -> Result<(), AssemblyError> {
    let json = self.to_json().map_err(|e| AssemblyError::Manifest(e.to_string()))?;
    tokio::fs::write(path, json).await.map_err(|source| AssemblyError::Io {
      path: PathBuf::from(path),
      source,
    })
  }
}
