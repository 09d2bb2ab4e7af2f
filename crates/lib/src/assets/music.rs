//! Music ownables: one audio track plus a cover and a backdrop image.
//!
//! Images are recognized by name only, never by position in the listing:
//!
//! | role | lowercase name contains |
//! |------|-------------------------|
//! | cover | `cover` or `front` |
//! | backdrop | `backdrop` or `back` |
//!
//! Each role needs exactly one match, and no file may match both.

use std::path::Path;

use tracing::debug;

use super::{
  AssetError, AssetRules, BlockingJob, ImageInfo, ProcessError, Selection, SelectionError, list_files, media,
  run_blocking,
};
use crate::consts::{AUDIO_DIR, IMAGES_DIR};

const COVER_MARKERS: [&str; 2] = ["cover", "front"];
const BACKDROP_MARKERS: [&str; 2] = ["backdrop", "back"];

/// Select the track, cover and backdrop and validate all three concurrently.
pub async fn select(assets_dir: &Path, rules: &AssetRules) -> Result<Selection, ProcessError> {
  let audio_dir = assets_dir.join(AUDIO_DIR);
  let images_dir = assets_dir.join(IMAGES_DIR);

  let audio_names = list_files(&audio_dir).await?;
  let image_names = list_files(&images_dir).await?;

  let audio = audio_names
    .into_iter()
    .find(|name| rules.audio.allows_extension(name))
    .ok_or_else(|| SelectionError::NoMatch {
      dir: audio_dir.clone(),
      what: format!("audio file ({})", rules.audio.extensions.join(", ")),
    })?;

  let images: Vec<String> = image_names
    .into_iter()
    .filter(|name| rules.image.allows_extension(name))
    .collect();
  let (cover, backdrop) = pick_cover_and_backdrop(&images_dir, &images)?;
  debug!(audio = %audio, cover = %cover, backdrop = %backdrop, "selected music assets");

  let audio_path = audio_dir.join(&audio);
  let audio_rules = rules.audio.clone();
  let audio_job: BlockingJob<Validated> =
    Box::new(move || media::validate_audio(&audio_path, &audio_rules).map(Validated::Audio));

  let mut jobs = vec![audio_job];
  for name in [&cover, &backdrop] {
    let path = images_dir.join(name);
    let image_rules = rules.image.clone();
    let job: BlockingJob<Validated> = Box::new(move || media::validate_image(&path, &image_rules).map(Validated::Image));
    jobs.push(job);
  }

  let mut results = run_blocking(jobs).await?.into_iter();
  match (results.next(), results.next(), results.next()) {
    (Some(Validated::Audio(audio)), Some(Validated::Image(cover)), Some(Validated::Image(backdrop))) => {
      Ok(Selection::Music { audio, cover, backdrop })
    }
    _ => Err(
      AssetError::Task {
        message: "music validation returned unexpected results".to_string(),
      }
      .into(),
    ),
  }
}

enum Validated {
  Audio(super::AudioInfo),
  Image(ImageInfo),
}

/// Match `images` (sorted file names) to the cover and backdrop roles.
pub fn pick_cover_and_backdrop(dir: &Path, images: &[String]) -> Result<(String, String), SelectionError> {
  if images.len() < 2 {
    return Err(SelectionError::NotEnoughImages {
      dir: dir.to_path_buf(),
      found: images.len(),
      required: 2,
    });
  }

  let mut covers = Vec::new();
  let mut backdrops = Vec::new();

  for name in images {
    let lower = name.to_lowercase();
    let is_cover = COVER_MARKERS.iter().any(|m| lower.contains(m));
    let is_backdrop = BACKDROP_MARKERS.iter().any(|m| lower.contains(m));

    match (is_cover, is_backdrop) {
      (true, true) => {
        return Err(SelectionError::Ambiguous {
          dir: dir.to_path_buf(),
          what: "image matching both cover and backdrop".to_string(),
          candidates: vec![name.clone()],
        });
      }
      (true, false) => covers.push(name.clone()),
      (false, true) => backdrops.push(name.clone()),
      (false, false) => {}
    }
  }

  let cover = exactly_one(dir, covers, "cover image (name containing 'cover' or 'front')")?;
  let backdrop = exactly_one(dir, backdrops, "backdrop image (name containing 'backdrop' or 'back')")?;
  Ok((cover, backdrop))
}

fn exactly_one(dir: &Path, mut candidates: Vec<String>, what: &str) -> Result<String, SelectionError> {
  if candidates.len() > 1 {
    candidates.sort();
    return Err(SelectionError::Ambiguous {
      dir: dir.to_path_buf(),
      what: what.to_string(),
      candidates,
    });
  }
  candidates.pop().ok_or_else(|| SelectionError::NoMatch {
    dir: dir.to_path_buf(),
    what: what.to_string(),
  })
}
