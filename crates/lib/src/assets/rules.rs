//! Limits applied to media assets.
//!
//! [`AssetRules::default`] carries the production limits. Tests construct
//! narrower rules to exercise boundaries without multi-megabyte fixtures.

use image::ImageFormat;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetRules {
  pub image: ImageRules,
  pub audio: AudioRules,
  pub thumbnail: ThumbnailRules,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRules {
  /// Lowercase file extensions accepted for images.
  pub extensions: Vec<&'static str>,
  /// Decoded content formats accepted for images.
  pub formats: Vec<ImageFormat>,
  pub max_bytes: u64,
  /// Inclusive bounds, applied to each axis separately.
  pub min_dimension: u32,
  pub max_dimension: u32,
}

impl Default for ImageRules {
  fn default() -> Self {
    Self {
      extensions: vec!["png", "jpg", "jpeg", "webp"],
      formats: vec![ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP],
      max_bytes: 20 * MIB,
      min_dimension: 64,
      max_dimension: 8192,
    }
  }
}

impl ImageRules {
  pub fn allows_extension(&self, file_name: &str) -> bool {
    extension_of(file_name).is_some_and(|ext| self.extensions.contains(&ext.as_str()))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRules {
  pub extensions: Vec<&'static str>,
  pub max_bytes: u64,
}

impl Default for AudioRules {
  fn default() -> Self {
    Self {
      extensions: vec!["mp3", "wav", "ogg", "flac"],
      max_bytes: 50 * MIB,
    }
  }
}

impl AudioRules {
  pub fn allows_extension(&self, file_name: &str) -> bool {
    extension_of(file_name).is_some_and(|ext| self.extensions.contains(&ext.as_str()))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRules {
  /// The thumbnail fits inside a `max_width`×`max_height` box.
  pub max_width: u32,
  pub max_height: u32,
  pub jpeg_quality: u8,
  pub max_bytes: u64,
}

impl Default for ThumbnailRules {
  fn default() -> Self {
    Self {
      max_width: 300,
      max_height: 300,
      jpeg_quality: 80,
      max_bytes: 256 * 1024,
    }
  }
}

/// Lowercase extension of a file name, without the dot.
pub fn extension_of(file_name: &str) -> Option<String> {
  let (stem, ext) = file_name.rsplit_once('.')?;
  if stem.is_empty() || ext.is_empty() {
    return None;
  }
  Some(ext.to_ascii_lowercase())
}
