//! Schema bundle cache.
//!
//! Generating schemas means compiling and running the project, so complete
//! bundles are kept per ownable kind and copied into later projects.
//!
//! # Layout
//!
//! ```text
//! <global root>/                      # CacheScope::Global
//! ├── static/
//! │   ├── instantiate_msg.json …      # the seven documents
//! │   └── .ownable-schema.json        # CacheMarker
//! └── music/
//!
//! <project>/.ownable/schema-cache/    # CacheScope::Project
//! └── <kind>/…
//! ```
//!
//! An entry is valid when all seven documents are present and parse. The
//! marker's content hash is recorded for diagnostics only; lookups do not
//! compare it.
//!
//! Cache trouble is never fatal: `lookup` logs and reports a miss, and the
//! orchestrator downgrades `store`/`materialize` errors the same way.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use super::{SchemaBundle, SchemaError};
use crate::consts::PROJECT_STATE_DIR;
use crate::project::OwnableKind;

/// Marker written next to the documents of every stored entry.
pub const CACHE_MARKER: &str = ".ownable-schema.json";

const CACHE_MARKER_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CacheError {
  #[error(transparent)]
  Schema(#[from] SchemaError),

  #[error("schema cache i/o on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write cache marker: {0}")]
  Marker(#[from] serde_json::Error),
}

/// Where cache entries live. Always supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheScope {
  /// Machine-wide, shared by every project; keyed by kind.
  Global { root: PathBuf },
  /// Hidden directory inside one project; keyed by (project, kind).
  Project { project_root: PathBuf },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheMarker {
  pub version: u32,
  pub kind: OwnableKind,
  /// SHA-256 of the stored documents.
  pub content_hash: String,
}

#[derive(Debug, Clone)]
pub struct SchemaCache {
  scope: CacheScope,
}

impl SchemaCache {
  pub fn new(scope: CacheScope) -> Self {
    Self { scope }
  }

  pub fn scope(&self) -> &CacheScope {
    &self.scope
  }

  /// Directory holding the entry for `kind`.
  pub fn entry_dir(&self, kind: OwnableKind) -> PathBuf {
    let root = match &self.scope {
      CacheScope::Global { root } => root.clone(),
      CacheScope::Project { project_root } => project_root.join(PROJECT_STATE_DIR).join("schema-cache"),
    };
    root.join(kind.as_str())
  }

  /// Return the cached bundle for `kind` if every document is present and valid.
  pub async fn lookup(&self, kind: OwnableKind) -> Option<SchemaBundle> {
    let dir = self.entry_dir(kind);

    match SchemaBundle::load(&dir).await {
      Ok(bundle) => {
        info!(kind = %kind, path = %dir.display(), "schema cache hit");
        Some(bundle)
      }
      Err(SchemaError::Missing { missing, .. }) => {
        debug!(kind = %kind, path = %dir.display(), missing = missing.len(), "schema cache miss");
        None
      }
      Err(e) => {
        warn!(kind = %kind, path = %dir.display(), error = %e, "schema cache unreadable, treating as miss");
        None
      }
    }
  }

  /// Replace the entry for `kind` with the bundle found in `source_dir`.
  ///
  /// The source must hold a complete bundle; otherwise nothing is written.
  /// The new entry is assembled beside the old one and renamed into place.
  pub async fn store(&self, kind: OwnableKind, source_dir: &Path) -> Result<SchemaBundle, CacheError> {
    let bundle = SchemaBundle::load(source_dir).await?;
    let entry = self.entry_dir(kind);
    let parent = entry.parent().map(Path::to_path_buf).unwrap_or_else(|| entry.clone());

    fs::create_dir_all(&parent).await.map_err(|source| CacheError::Io {
      path: parent.clone(),
      source,
    })?;

    let staging = parent.join(format!(".{}.tmp-{}", kind.as_str(), std::process::id()));
    if fs::try_exists(&staging).await.unwrap_or(false) {
      remove_dir(&staging).await?;
    }

    bundle.write_to(&staging).await?;

    let marker = CacheMarker {
      version: CACHE_MARKER_VERSION,
      kind,
      content_hash: bundle.content_hash().0,
    };
    let marker_path = staging.join(CACHE_MARKER);
    fs::write(&marker_path, format!("{}\n", serde_json::to_string(&marker)?))
      .await
      .map_err(|source| CacheError::Io {
        path: marker_path,
        source,
      })?;

    if fs::try_exists(&entry).await.unwrap_or(false) {
      remove_dir(&entry).await?;
    }
    if let Err(source) = fs::rename(&staging, &entry).await {
      discard_staging(&staging).await;
      return Err(CacheError::Io { path: entry, source });
    }

    info!(kind = %kind, path = %entry.display(), hash = %marker.content_hash, "stored schema bundle in cache");
    Ok(bundle)
  }

  /// Copy the cached documents for `kind` into `project_schema_dir`.
  pub async fn materialize(&self, kind: OwnableKind, project_schema_dir: &Path) -> Result<SchemaBundle, CacheError> {
    let bundle = SchemaBundle::load(&self.entry_dir(kind)).await?;
    bundle.write_to(project_schema_dir).await?;
    debug!(kind = %kind, dest = %project_schema_dir.display(), "materialized cached schemas");
    Ok(bundle)
  }

  /// Read the marker of a stored entry, if there is one.
  pub async fn read_marker(&self, kind: OwnableKind) -> Option<CacheMarker> {
    let content = fs::read_to_string(self.entry_dir(kind).join(CACHE_MARKER)).await.ok()?;
    serde_json::from_str(&content).ok()
  }
}

/// Best-effort removal of a staging directory after a failed swap.
async fn discard_staging(staging: &Path) {
  match fs::remove_dir_all(staging).await {
    Ok(()) => {}
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
    Err(e) => warn!(path = %staging.display(), error = %e, "failed to remove schema cache staging dir"),
  }
}

async fn remove_dir(path: &Path) -> Result<(), CacheError> {
  fs::remove_dir_all(path).await.map_err(|source| CacheError::Io {
    path: path.to_path_buf(),
    source,
  })
}
