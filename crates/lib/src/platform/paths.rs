use std::path::PathBuf;

use crate::consts::APP_NAME;

/// Environment variable overriding the machine-wide schema cache root.
pub const CACHE_DIR_ENV: &str = "OWNABLE_CACHE_DIR";

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("USERPROFILE").map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").map(PathBuf::from)
}

/// Returns the directory for cache files for the application
#[cfg(windows)]
pub fn cache_dir() -> Option<PathBuf> {
  let local_appdata = std::env::var_os("LOCALAPPDATA")?;
  Some(PathBuf::from(local_appdata).join(APP_NAME).join("Cache"))
}

/// Returns the directory for cache files for the application
#[cfg(not(windows))]
pub fn cache_dir() -> Option<PathBuf> {
  let cache_home = match std::env::var_os("XDG_CACHE_HOME") {
    Some(dir) => PathBuf::from(dir),
    None => home_dir()?.join(".cache"),
  };
  Some(cache_home.join(APP_NAME))
}

/// Root of the machine-wide schema cache.
///
/// `OWNABLE_CACHE_DIR` wins when set; otherwise `<cache_dir>/schemas`.
pub fn schema_cache_dir() -> Option<PathBuf> {
  if let Some(dir) = std::env::var_os(CACHE_DIR_ENV) {
    return Some(PathBuf::from(dir));
  }
  cache_dir().map(|dir| dir.join("schemas"))
}
