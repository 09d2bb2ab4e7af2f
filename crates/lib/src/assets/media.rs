//! Per-file media checks and the thumbnail transform.
//!
//! Everything here is synchronous and CPU or disk bound; processors run it on
//! the blocking pool.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, ImageFormat};
use tracing::debug;

use super::AssetError;
use super::rules::{AudioRules, ImageRules, ThumbnailRules, extension_of};

/// Enough for every signature `image::guess_format` knows.
const SNIFF_LEN: u64 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
  pub path: PathBuf,
  pub format: ImageFormat,
  pub width: u32,
  pub height: u32,
  pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInfo {
  pub path: PathBuf,
  pub bytes: u64,
}

/// Check an image against `rules`: extension, byte size, detected format,
/// then dimensions. The first failing rule is reported.
pub fn validate_image(path: &Path, rules: &ImageRules) -> Result<ImageInfo, AssetError> {
  check_extension(path, &rules.extensions)?;
  let bytes = check_size(path, rules.max_bytes)?;

  let format = sniff_format(path)?;
  if !rules.formats.contains(&format) {
    return Err(AssetError::UnsupportedFormat {
      path: path.to_path_buf(),
      format: format!("{:?}", format).to_lowercase(),
      allowed: rules.extensions.join(", "),
    });
  }

  let mut reader = image::io::Reader::open(path).map_err(|source| AssetError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  reader.set_format(format);
  let (width, height) = reader.into_dimensions().map_err(|e| AssetError::Decode {
    path: path.to_path_buf(),
    message: e.to_string(),
  })?;

  let in_range = |d: u32| d >= rules.min_dimension && d <= rules.max_dimension;
  if !in_range(width) || !in_range(height) {
    return Err(AssetError::Dimensions {
      path: path.to_path_buf(),
      width,
      height,
      min: rules.min_dimension,
      max: rules.max_dimension,
    });
  }

  debug!(path = %path.display(), width, height, bytes, "image valid");
  Ok(ImageInfo {
    path: path.to_path_buf(),
    format,
    width,
    height,
    bytes,
  })
}

/// Check an audio file against `rules`: extension, then byte size.
pub fn validate_audio(path: &Path, rules: &AudioRules) -> Result<AudioInfo, AssetError> {
  check_extension(path, &rules.extensions)?;
  let bytes = check_size(path, rules.max_bytes)?;
  debug!(path = %path.display(), bytes, "audio valid");
  Ok(AudioInfo {
    path: path.to_path_buf(),
    bytes,
  })
}

/// Encode a JPEG thumbnail of `source` that fits the configured box.
///
/// Smaller images keep their size. The encoded result must stay under the
/// byte ceiling.
pub fn render_thumbnail(source: &Path, rules: &ThumbnailRules) -> Result<Vec<u8>, AssetError> {
  let img = image::open(source).map_err(|e| AssetError::Decode {
    path: source.to_path_buf(),
    message: e.to_string(),
  })?;

  let img = if img.width() > rules.max_width || img.height() > rules.max_height {
    img.resize(rules.max_width, rules.max_height, FilterType::Triangle)
  } else {
    img
  };
  let rgb = img.to_rgb8();

  let mut buf = Cursor::new(Vec::new());
  JpegEncoder::new_with_quality(&mut buf, rules.jpeg_quality)
    .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
    .map_err(|e| AssetError::Decode {
      path: source.to_path_buf(),
      message: e.to_string(),
    })?;
  let bytes = buf.into_inner();

  if bytes.len() as u64 > rules.max_bytes {
    return Err(AssetError::ThumbnailTooLarge {
      path: source.to_path_buf(),
      size: bytes.len() as u64,
      limit: rules.max_bytes,
    });
  }

  debug!(source = %source.display(), width = rgb.width(), height = rgb.height(), bytes = bytes.len(), "rendered thumbnail");
  Ok(bytes)
}

/// Format from the leading bytes only; the file name plays no part.
fn sniff_format(path: &Path) -> Result<ImageFormat, AssetError> {
  let io_err = |source| AssetError::Io {
    path: path.to_path_buf(),
    source,
  };

  let mut head = Vec::with_capacity(SNIFF_LEN as usize);
  std::fs::File::open(path)
    .map_err(io_err)?
    .take(SNIFF_LEN)
    .read_to_end(&mut head)
    .map_err(io_err)?;

  image::guess_format(&head).map_err(|_| AssetError::UnknownFormat {
    path: path.to_path_buf(),
  })
}

fn check_extension(path: &Path, allowed: &[&'static str]) -> Result<(), AssetError> {
  let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
  match extension_of(&file_name) {
    Some(ext) if allowed.contains(&ext.as_str()) => Ok(()),
    _ => Err(AssetError::Extension {
      path: path.to_path_buf(),
      allowed: allowed.join(", "),
    }),
  }
}

fn check_size(path: &Path, limit: u64) -> Result<u64, AssetError> {
  let size = std::fs::metadata(path)
    .map_err(|source| AssetError::Io {
      path: path.to_path_buf(),
      source,
    })?
    .len();
  if size > limit {
    return Err(AssetError::TooLarge {
      path: path.to_path_buf(),
      size,
      limit,
    });
  }
  Ok(size)
}
