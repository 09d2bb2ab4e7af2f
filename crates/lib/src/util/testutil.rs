//! Test fixtures for ownable-lib unit tests.
//!
//! Helpers here write small but real media files and project skeletons so
//! tests exercise the same decoders the pipeline uses.

use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage};

/// Write a `width`×`height` image with a gradient so encoders have detail to
/// work with. The format follows the file extension.
pub fn write_image(path: &Path, width: u32, height: u32) {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]));
  let format = ImageFormat::from_path(path).unwrap();
  img.save_with_format(path, format).unwrap();
}

/// Write an opaque byte blob standing in for an audio file.
pub fn write_audio(path: &Path, len: usize) {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(path, vec![0xFFu8; len]).unwrap();
}

pub fn write_file(path: &Path, content: &str) {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(path, content).unwrap();
}

/// Lay out the minimum a project needs to pass validation: manifest, `src/`,
/// `assets/index.html` and one image named after the project.
pub fn static_project(root: &Path, name: &str) -> PathBuf {
  write_file(
    &root.join("Cargo.toml"),
    &format!("[package]\nname = \"{}\"\nversion = \"1.0.0\"\ndescription = \"test ownable\"\n", name),
  );
  write_file(&root.join("src/lib.rs"), "");
  write_file(&root.join("assets/index.html"), "<img src=\"$${image}\">");
  let image = root.join("assets/images").join(format!("{}.png", name));
  write_image(&image, 128, 128);
  image
}
