//! Where a build's schema documents come from.

use ownable_lib::build::SchemaSource;
use ownable_lib::project::OwnableKind;
use ownable_lib::schema::SchemaDocument;

use super::common::*;

fn ran_schema_generation(runner: &ScriptedRunner) -> bool {
  runner.command_lines().iter().any(|l| l == "cargo run --example schema")
}

#[tokio::test]
async fn project_schemas_are_used_and_cached() {
  let env = TestEnv::new();
  let project = env.static_project();
  write_schema_dir(&project.join("schema"), "project");
  let pipeline = env.pipeline(ScriptedRunner::new());

  let outcome = pipeline.run(env.request(&project)).await.unwrap();

  assert_eq!(outcome.schema_source, SchemaSource::Project);
  assert!(!ran_schema_generation(pipeline.runner()));

  let entries = archive_map(&outcome.archive);
  assert!(entry_text(&entries, "query_msg.json").contains("\"origin\": \"project\""));

  let cached = env.cache().lookup(OwnableKind::Static).await.unwrap();
  assert!(cached.get(SchemaDocument::Query).unwrap().contains("project"));
}

#[tokio::test]
async fn cache_fills_in_for_missing_project_schemas() {
  let env = TestEnv::new();
  let seed = env.temp.path().join("seed");
  write_schema_dir(&seed, "cache");
  env.cache().store(OwnableKind::Static, &seed).await.unwrap();

  let project = env.static_project();
  let pipeline = env.pipeline(ScriptedRunner::new());

  let outcome = pipeline.run(env.request(&project)).await.unwrap();

  assert_eq!(outcome.schema_source, SchemaSource::Cache);
  assert!(!ran_schema_generation(pipeline.runner()));
  assert!(project.join("schema/instantiate_msg.json").is_file());

  let entries = archive_map(&outcome.archive);
  assert!(entry_text(&entries, "config.json").contains("\"origin\": \"cache\""));
}

#[tokio::test]
async fn cache_entries_are_per_kind() {
  let env = TestEnv::new();
  let seed = env.temp.path().join("seed");
  write_schema_dir(&seed, "music-cache");
  env.cache().store(OwnableKind::Music, &seed).await.unwrap();

  let project = env.static_project();
  let pipeline = env.pipeline(ScriptedRunner::new());

  let outcome = pipeline.run(env.request(&project)).await.unwrap();

  assert_eq!(outcome.schema_source, SchemaSource::Generated);
  assert!(ran_schema_generation(pipeline.runner()));
}

#[tokio::test]
async fn incomplete_project_schemas_are_regenerated_and_stored() {
  let env = TestEnv::new();
  let project = env.static_project();
  write_file(&project.join("schema/query_msg.json"), "{\"partial\": true}");
  let pipeline = env.pipeline(ScriptedRunner::new());

  let outcome = pipeline.run(env.request(&project)).await.unwrap();

  assert_eq!(outcome.schema_source, SchemaSource::Generated);
  assert!(ran_schema_generation(pipeline.runner()));

  let entries = archive_map(&outcome.archive);
  assert!(entry_text(&entries, "query_msg.json").contains("\"origin\": \"generated\""));

  let cached = env.cache().lookup(OwnableKind::Static).await.unwrap();
  assert!(cached.get(SchemaDocument::Metadata).unwrap().contains("generated"));
}

#[tokio::test]
async fn unusable_cache_entry_falls_back_to_generation() {
  let env = TestEnv::new();
  let entry = env.cache().entry_dir(OwnableKind::Static);
  write_schema_dir(&entry, "cache");
  write_file(&entry.join("execute_msg.json"), "not json");

  let project = env.static_project();
  let pipeline = env.pipeline(ScriptedRunner::new());

  let outcome = pipeline.run(env.request(&project)).await.unwrap();

  assert_eq!(outcome.schema_source, SchemaSource::Generated);
  assert!(env.cache().lookup(OwnableKind::Static).await.is_some());
}
