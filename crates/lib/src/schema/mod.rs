//! Schema documents describing the contract's messages.
//!
//! A package always ships the same seven JSON documents. A set of them is a
//! [`SchemaBundle`] only when it is complete: every document present and each
//! one parses as JSON. Anything less is an error, never a partial bundle.
//!
//! # Submodules
//!
//! - [`cache`] - reuse of bundles across builds

pub mod cache;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

use crate::util::hash::{ContentHash, hash_bytes};

pub use cache::{CacheError, CacheScope, SchemaCache};

/// One of the seven documents of a bundle, in bundle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchemaDocument {
  Instantiate,
  Execute,
  Query,
  ExternalEvent,
  InfoResponse,
  Metadata,
  Config,
}

impl SchemaDocument {
  pub const ALL: [SchemaDocument; 7] = [
    SchemaDocument::Instantiate,
    SchemaDocument::Execute,
    SchemaDocument::Query,
    SchemaDocument::ExternalEvent,
    SchemaDocument::InfoResponse,
    SchemaDocument::Metadata,
    SchemaDocument::Config,
  ];

  pub fn name(&self) -> &'static str {
    match self {
      SchemaDocument::Instantiate => "instantiate",
      SchemaDocument::Execute => "execute",
      SchemaDocument::Query => "query",
      SchemaDocument::ExternalEvent => "external_event",
      SchemaDocument::InfoResponse => "info_response",
      SchemaDocument::Metadata => "metadata",
      SchemaDocument::Config => "config",
    }
  }

  /// Fixed on-disk name; consumers outside the pipeline read these.
  pub fn file_name(&self) -> &'static str {
    match self {
      SchemaDocument::Instantiate => "instantiate_msg.json",
      SchemaDocument::Execute => "execute_msg.json",
      SchemaDocument::Query => "query_msg.json",
      SchemaDocument::ExternalEvent => "external_event_msg.json",
      SchemaDocument::InfoResponse => "info_response.json",
      SchemaDocument::Metadata => "metadata.json",
      SchemaDocument::Config => "config.json",
    }
  }
}

impl fmt::Display for SchemaDocument {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Error)]
pub enum SchemaError {
  #[error("schema bundle in {} is incomplete, missing: {}", dir.display(), missing.join(", "))]
  Missing { dir: PathBuf, missing: Vec<&'static str> },

  #[error("schema document '{document}' at {} is not valid JSON: {message}", path.display())]
  Malformed {
    document: SchemaDocument,
    path: PathBuf,
    message: String,
  },

  #[error("failed to access schema document {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// A complete, validated set of schema documents.
///
/// Document text is kept verbatim so copies are byte-identical to the
/// generated originals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaBundle {
  documents: BTreeMap<SchemaDocument, String>,
}

impl SchemaBundle {
  /// Load a bundle from a directory holding the seven documents.
  ///
  /// Missing documents are all reported together; a missing document is
  /// reported before any malformed one.
  pub async fn load(dir: &Path) -> Result<Self, SchemaError> {
    let mut documents = BTreeMap::new();
    let mut missing = Vec::new();

    for document in SchemaDocument::ALL {
      let path = dir.join(document.file_name());
      match fs::read_to_string(&path).await {
        Ok(content) => {
          documents.insert(document, content);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => missing.push(document.file_name()),
        Err(source) => return Err(SchemaError::Io { path, source }),
      }
    }

    if !missing.is_empty() {
      return Err(SchemaError::Missing {
        dir: dir.to_path_buf(),
        missing,
      });
    }

    for (document, content) in &documents {
      if let Err(e) = serde_json::from_str::<serde_json::Value>(content) {
        return Err(SchemaError::Malformed {
          document: *document,
          path: dir.join(document.file_name()),
          message: e.to_string(),
        });
      }
    }

    Ok(Self { documents })
  }

  /// Write every document into `dir`, creating it if needed.
  pub async fn write_to(&self, dir: &Path) -> Result<(), SchemaError> {
    fs::create_dir_all(dir).await.map_err(|source| SchemaError::Io {
      path: dir.to_path_buf(),
      source,
    })?;

    for (document, content) in &self.documents {
      let path = dir.join(document.file_name());
      fs::write(&path, content)
        .await
        .map_err(|source| SchemaError::Io { path, source })?;
    }
    Ok(())
  }

  pub fn get(&self, document: SchemaDocument) -> Option<&str> {
    self.documents.get(&document).map(String::as_str)
  }

  /// Documents in bundle order.
  pub fn iter(&self) -> impl Iterator<Item = (SchemaDocument, &str)> {
    self.documents.iter().map(|(d, c)| (*d, c.as_str()))
  }

  /// SHA-256 over every document name and body, in bundle order.
  pub fn content_hash(&self) -> ContentHash {
    let mut buf = Vec::new();
    for (document, content) in &self.documents {
      buf.extend_from_slice(document.file_name().as_bytes());
      buf.push(0);
      buf.extend_from_slice(content.as_bytes());
      buf.push(b'\n');
    }
    hash_bytes(&buf)
  }
}
