//! Deterministic zip assembly of a staged package.
//!
//! Entries are written in sorted path order with a fixed timestamp and fixed
//! permissions, so two identical trees produce byte-identical archives.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::layout::web_path;
use super::{AssemblyError, PackageLayout};

const FILE_MODE: u32 = 0o644;
const DIR_MODE: u32 = 0o755;

enum Entry {
  Dir,
  File(PathBuf),
}

/// Zip `package_dir` into `destination`, returning its canonical path.
///
/// The compiled artifact is also written under its alias name so the
/// bindings can load it. Nothing appears at `destination` unless the whole
/// archive was written.
pub fn assemble(package_dir: &Path, layout: &PackageLayout, destination: &Path) -> Result<PathBuf, AssemblyError> {
  let mut entries = collect_entries(package_dir)?;

  let artifact = layout.artifact();
  let artifact_name = web_path(&artifact);
  let artifact_path = match entries.get(&artifact_name) {
    Some(Entry::File(path)) => path.clone(),
    _ => {
      return Err(AssemblyError::MissingArtifact {
        path: package_dir.join(&artifact),
      });
    }
  };
  entries.insert(web_path(&layout.artifact_alias()), Entry::File(artifact_path));

  let parent = destination
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .unwrap_or_else(|| Path::new("."));
  std::fs::create_dir_all(parent).map_err(|source| AssemblyError::Io {
    path: parent.to_path_buf(),
    source,
  })?;

  let temp = tempfile::Builder::new()
    .prefix(".ownable-archive-")
    .suffix(".zip.tmp")
    .tempfile_in(parent)
    .map_err(|source| AssemblyError::Io {
      path: parent.to_path_buf(),
      source,
    })?;

  let temp = write_archive(temp, &entries)?;

  temp.persist(destination).map_err(|e| AssemblyError::Io {
    path: destination.to_path_buf(),
    source: e.error,
  })?;

  let archive = dunce::canonicalize(destination).map_err(|source| AssemblyError::Io {
    path: destination.to_path_buf(),
    source,
  })?;
  info!(path = %archive.display(), entries = entries.len(), "assembled package");
  Ok(archive)
}

fn collect_entries(package_dir: &Path) -> Result<BTreeMap<String, Entry>, AssemblyError> {
  let mut entries = BTreeMap::new();

  for entry in WalkDir::new(package_dir).min_depth(1).sort_by_file_name() {
    let entry = entry?;
    let relative = entry
      .path()
      .strip_prefix(package_dir)
      .map_err(|_| AssemblyError::Io {
        path: entry.path().to_path_buf(),
        source: std::io::Error::other("entry outside package directory"),
      })?;
    let name = web_path(relative);

    if entry.file_type().is_dir() {
      entries.insert(format!("{}/", name), Entry::Dir);
    } else {
      entries.insert(name, Entry::File(entry.path().to_path_buf()));
    }
  }

  Ok(entries)
}

fn write_archive(temp: NamedTempFile, entries: &BTreeMap<String, Entry>) -> Result<NamedTempFile, AssemblyError> {
  let base = SimpleFileOptions::default()
    .compression_method(CompressionMethod::Deflated)
    .last_modified_time(DateTime::default());

  let mut zip = ZipWriter::new(temp);

  for (name, entry) in entries {
    match entry {
      Entry::Dir => {
        zip.add_directory(name.trim_end_matches('/'), base.unix_permissions(DIR_MODE))?;
      }
      Entry::File(path) => {
        let bytes = std::fs::read(path).map_err(|source| AssemblyError::Io {
          path: path.clone(),
          source,
        })?;
        zip.start_file(name.as_str(), base.unix_permissions(FILE_MODE))?;
        zip.write_all(&bytes).map_err(|source| AssemblyError::Io {
          path: path.clone(),
          source,
        })?;
        debug!(entry = %name, bytes = bytes.len(), "added archive entry");
      }
    }
  }

  Ok(zip.finish()?)
}
