//! Content hashing for staged packages and schema bundles.
//!
//! - `ContentHash`: full 64-character SHA-256, lowercase hex
//! - `hash_directory()`: deterministic hash over a directory tree
//! - `hash_file()` / `hash_bytes()`: single inputs

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
  /// Leading `len` characters, for identifiers and log lines.
  pub fn prefix(&self, len: usize) -> &str {
    &self.0[..len.min(self.0.len())]
  }
}

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Error)]
pub enum HashError {
  #[error("failed to walk directory: {0}")]
  Walk(#[from] walkdir::Error),

  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: std::path::PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Hash a directory's structure and file contents.
///
/// Timestamps and permissions are ignored. Entries named in `exclude` are
/// skipped together with everything beneath them. Entries are visited in
/// file-name order so equal trees hash equally on every platform.
pub fn hash_directory(path: &Path, exclude: &[&str]) -> Result<ContentHash, HashError> {
  let mut hasher = Sha256::new();

  let walker = WalkDir::new(path)
    .min_depth(1)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| e.file_name().to_str().is_none_or(|name| !exclude.contains(&name)));

  for entry in walker {
    let entry = entry?;
    let rel = entry.path().strip_prefix(path).unwrap_or(entry.path());
    let rel = rel.to_string_lossy().replace('\\', "/");

    let line = if entry.file_type().is_dir() {
      format!("D:{}", rel)
    } else if entry.file_type().is_file() {
      format!("F:{}:{}", rel, hash_file(entry.path())?)
    } else {
      continue;
    };

    hasher.update(line.as_bytes());
    hasher.update(b"\n");
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
  let read_err = |source| HashError::Read {
    path: path.to_path_buf(),
    source,
  };

  let mut file = fs::File::open(path).map_err(read_err)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let n = file.read(&mut buffer).map_err(read_err)?;
    if n == 0 {
      break;
    }
    hasher.update(&buffer[..n]);
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

pub fn hash_bytes(data: &[u8]) -> ContentHash {
  ContentHash(format!("{:x}", Sha256::digest(data)))
}
