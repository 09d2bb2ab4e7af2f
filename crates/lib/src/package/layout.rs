//! Where each part of a package lands inside the staging tree.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::{AUDIO_DIR, DISPLAY_DOCUMENT, IMAGES_DIR};
use crate::schema::SchemaDocument;

pub const PACKAGE_MANIFEST: &str = "package.json";
pub const PROVENANCE_RECORD: &str = "chain.json";
pub const THUMBNAIL: &str = "thumbnail.jpg";
/// Conventional name of the compiled artifact, independent of the project.
pub const GENERIC_ARTIFACT: &str = "ownable.wasm";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLayout {
  /// Artifact, bindings and schemas at the package root.
  #[default]
  Flat,
  /// Artifact and bindings under `pkg/`, schemas under `schema/`.
  Nested,
}

impl OutputLayout {
  pub fn as_str(&self) -> &'static str {
    match self {
      OutputLayout::Flat => "flat",
      OutputLayout::Nested => "nested",
    }
  }
}

impl fmt::Display for OutputLayout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OutputLayout {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "flat" => Ok(OutputLayout::Flat),
      "nested" => Ok(OutputLayout::Nested),
      other => Err(format!("unknown output layout '{}' (expected flat or nested)", other)),
    }
  }
}

/// Package-relative paths for one project under one layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLayout {
  layout: OutputLayout,
  crate_ident: String,
}

impl PackageLayout {
  pub fn new(layout: OutputLayout, crate_ident: impl Into<String>) -> Self {
    Self {
      layout,
      crate_ident: crate_ident.into(),
    }
  }

  pub fn layout(&self) -> OutputLayout {
    self.layout
  }

  fn code_dir(&self) -> PathBuf {
    match self.layout {
      OutputLayout::Flat => PathBuf::new(),
      OutputLayout::Nested => PathBuf::from("pkg"),
    }
  }

  /// The compiled artifact under its generic name.
  pub fn artifact(&self) -> PathBuf {
    self.code_dir().join(GENERIC_ARTIFACT)
  }

  /// The compiled artifact under the name the bindings load it by.
  pub fn artifact_alias(&self) -> PathBuf {
    self.code_dir().join(format!("{}_bg.wasm", self.crate_ident))
  }

  pub fn bindings(&self) -> PathBuf {
    self.code_dir().join(format!("{}.js", self.crate_ident))
  }

  pub fn schema_document(&self, document: SchemaDocument) -> PathBuf {
    match self.layout {
      OutputLayout::Flat => PathBuf::from(document.file_name()),
      OutputLayout::Nested => PathBuf::from("schema").join(document.file_name()),
    }
  }

  pub fn display_document(&self) -> PathBuf {
    PathBuf::from(DISPLAY_DOCUMENT)
  }

  pub fn manifest(&self) -> PathBuf {
    PathBuf::from(PACKAGE_MANIFEST)
  }

  pub fn provenance(&self) -> PathBuf {
    PathBuf::from(PROVENANCE_RECORD)
  }

  pub fn thumbnail(&self) -> PathBuf {
    PathBuf::from(THUMBNAIL)
  }

  /// Paths the pipeline writes itself, as opposed to copied assets.
  pub fn generated_paths(&self) -> Vec<PathBuf> {
    let mut paths = vec![self.artifact(), self.artifact_alias(), self.bindings()];
    paths.extend(SchemaDocument::ALL.iter().map(|doc| self.schema_document(*doc)));
    paths.extend([self.manifest(), self.provenance(), self.thumbnail(), self.display_document()]);
    paths
  }

  pub fn image(&self, file_name: &str) -> PathBuf {
    PathBuf::from(IMAGES_DIR).join(file_name)
  }

  pub fn audio(&self, file_name: &str) -> PathBuf {
    PathBuf::from(AUDIO_DIR).join(file_name)
  }
}

/// Forward-slash form of a package-relative path, as used in archive entry
/// names and in the display document.
pub fn web_path(relative: &Path) -> String {
  relative
    .components()
    .filter_map(|c| match c {
      Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
      _ => None,
    })
    .collect::<Vec<_>>()
    .join("/")
}
