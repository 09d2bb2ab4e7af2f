//! Failed builds: the stage they stop in and what they leave behind.

use ownable_lib::assets::AssetError;
use ownable_lib::build::{BuildError, BuildStage};
use ownable_lib::project::PreconditionError;
use ownable_lib::toolchain::ToolchainError;

use super::common::*;

#[tokio::test]
async fn missing_manifest_fails_validation_before_toolchain() {
  let env = TestEnv::new();
  let project = env.static_project();
  std::fs::remove_file(project.join("Cargo.toml")).unwrap();
  let pipeline = env.pipeline(ScriptedRunner::new());

  let failure = pipeline.run(env.request(&project)).await.unwrap_err();

  assert_eq!(failure.stage, BuildStage::Validating);
  assert_eq!(failure.category(), "precondition");
  assert!(matches!(
    failure.error,
    BuildError::Precondition(PreconditionError::MissingManifest { .. })
  ));
  assert!(pipeline.runner().calls().is_empty());
}

#[tokio::test]
async fn music_with_one_image_fails_selection() {
  let env = TestEnv::new();
  let project = env.music_project();
  std::fs::remove_file(project.join("assets/images/my-backdrop.png")).unwrap();
  let pipeline = env.pipeline(ScriptedRunner::new());

  let failure = pipeline.run(env.request(&project)).await.unwrap_err();

  assert_eq!(failure.stage, BuildStage::Validating);
  assert_eq!(failure.category(), "selection");
  assert!(pipeline.runner().calls().is_empty());
  assert!(!env.output_dir().join("night-track.zip").exists());
  assert!(env.leftover_trees().is_empty());
}

#[tokio::test]
async fn undersized_image_fails_validation() {
  let env = TestEnv::new();
  let project = env.static_project();
  write_image(&project.join("assets/images/sun-icon.png"), 32, 32);
  let pipeline = env.pipeline(ScriptedRunner::new());

  let failure = pipeline.run(env.request(&project)).await.unwrap_err();

  assert_eq!(failure.stage, BuildStage::Validating);
  assert_eq!(failure.category(), "validation");
  assert!(failure.to_string().contains("sun-icon.png"));
  assert!(pipeline.runner().calls().is_empty());
}

#[tokio::test]
async fn unknown_placeholder_fails_before_compiling() {
  let env = TestEnv::new();
  let project = env.static_project();
  write_file(&project.join("assets/index.html"), "<h1>$${title}</h1>");
  let pipeline = env.pipeline(ScriptedRunner::new());

  let failure = pipeline.run(env.request(&project)).await.unwrap_err();

  assert_eq!(failure.stage, BuildStage::Validating);
  assert_eq!(failure.category(), "validation");
  assert!(failure.to_string().contains("title"));
  assert!(pipeline.runner().calls().is_empty());
}

#[tokio::test]
async fn assets_named_like_generated_files_fail_validation() {
  for name in ["config.json", "ownable.wasm"] {
    let env = TestEnv::new();
    let project = env.static_project();
    write_file(&project.join("assets").join(name), "user data");
    let pipeline = env.pipeline(ScriptedRunner::new());

    let failure = pipeline.run(env.request(&project)).await.unwrap_err();

    assert_eq!(failure.stage, BuildStage::Validating);
    assert_eq!(failure.category(), "validation");
    assert!(matches!(
      failure.error,
      BuildError::Validation(AssetError::Reserved { .. })
    ));
    assert!(failure.to_string().contains(name));
    assert!(pipeline.runner().calls().is_empty());
    assert!(!env.output_dir().join("sun-icon.zip").exists());
    assert!(env.leftover_trees().is_empty());
  }
}

#[tokio::test]
async fn compiler_failure_stops_in_compiling() {
  let env = TestEnv::new();
  let project = env.static_project();
  let pipeline = env.pipeline(ScriptedRunner::failing("cargo"));

  let failure = pipeline.run(env.request(&project)).await.unwrap_err();

  assert_eq!(failure.stage, BuildStage::Compiling);
  assert_eq!(failure.category(), "toolchain");
  match &failure.error {
    BuildError::Toolchain(ToolchainError::Failed { program, code, stderr }) => {
      assert_eq!(program, "cargo");
      assert_eq!(*code, Some(101));
      assert!(stderr.contains("E0425"));
    }
    other => panic!("expected toolchain failure, got {:?}", other),
  }

  assert_eq!(pipeline.runner().calls().len(), 1);
  assert!(!env.output_dir().join("sun-icon.zip").exists());
  assert!(env.leftover_trees().is_empty());
}

#[tokio::test]
async fn optimizer_failure_stops_in_compiling() {
  let env = TestEnv::new();
  let project = env.static_project();
  let pipeline = env.pipeline(ScriptedRunner::failing("wasm-opt"));

  let failure = pipeline.run(env.request(&project)).await.unwrap_err();

  assert_eq!(failure.stage, BuildStage::Compiling);
  assert!(failure.to_string().starts_with("compiling failed:"));
  assert!(env.leftover_trees().is_empty());
}

#[tokio::test]
async fn empty_secret_fails_provenance_and_leaves_no_archive() {
  let env = TestEnv::new();
  let project = env.static_project();
  let pipeline = env.pipeline(ScriptedRunner::new());

  let mut request = env.request(&project);
  request.secret = ownable_lib::provenance::Secret::new("");
  let failure = pipeline.run(request).await.unwrap_err();

  assert_eq!(failure.stage, BuildStage::ProvenanceRecording);
  assert_eq!(failure.category(), "provenance");
  assert!(!env.output_dir().join("sun-icon.zip").exists());
  assert!(env.leftover_trees().is_empty());
}
