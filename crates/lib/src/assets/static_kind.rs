//! Static ownables: one display image named after the project.

use std::path::Path;

use tracing::debug;

use super::{
  AssetError, AssetRules, BlockingJob, ImageInfo, ProcessError, Selection, SelectionError, list_files, media,
  run_blocking,
};
use crate::consts::IMAGES_DIR;
use crate::project::{ProjectDescriptor, normalize_name};

/// Pick the single image in `assets/images/` whose normalized name starts
/// with the project name, and validate it. Files without an image extension
/// are not candidates.
pub async fn select(
  assets_dir: &Path,
  descriptor: &ProjectDescriptor,
  rules: &AssetRules,
) -> Result<Selection, ProcessError> {
  let images_dir = assets_dir.join(IMAGES_DIR);
  let names = list_files(&images_dir).await?;

  let matches: Vec<String> = names
    .into_iter()
    .filter(|name| rules.image.allows_extension(name))
    .filter(|name| normalize_name(name).starts_with(&descriptor.name))
    .collect();

  if matches.len() > 1 {
    return Err(
      SelectionError::Ambiguous {
        dir: images_dir,
        what: format!("images starting with '{}'", descriptor.name),
        candidates: matches,
      }
      .into(),
    );
  }
  let Some(name) = matches.into_iter().next() else {
    return Err(
      SelectionError::NoMatch {
        dir: images_dir,
        what: format!("image starting with '{}'", descriptor.name),
      }
      .into(),
    );
  };

  let path = images_dir.join(&name);
  debug!(image = %path.display(), "selected static image");

  let image_rules = rules.image.clone();
  let job: BlockingJob<ImageInfo> = Box::new(move || media::validate_image(&path, &image_rules));
  let image = run_blocking(vec![job])
    .await?
    .into_iter()
    .next()
    .ok_or_else(|| AssetError::Task {
      message: "image validation produced no result".to_string(),
    })?;
  Ok(Selection::Static { image })
}
