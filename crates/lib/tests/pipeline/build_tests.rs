//! Successful builds and the shape of what they produce.

use ownable_lib::build::SchemaSource;
use ownable_lib::package::OutputLayout;
use ownable_lib::project::OwnableKind;
use ownable_lib::provenance::{Ed25519Signer, EventChain};
use ownable_lib::util::hash::hash_file;

use super::common::*;

mod static_kind {
  use super::*;

  #[tokio::test]
  async fn produces_complete_flat_archive() {
    let env = TestEnv::new();
    let project = env.static_project();
    let pipeline = env.pipeline(ScriptedRunner::new());

    let outcome = pipeline.run(env.request(&project)).await.unwrap();

    assert_eq!(outcome.name, "sun-icon");
    assert_eq!(outcome.version, "1.2.0");
    assert_eq!(outcome.kind, OwnableKind::Static);
    assert_eq!(outcome.layout, OutputLayout::Flat);
    assert_eq!(outcome.schema_source, SchemaSource::Generated);
    assert_eq!(outcome.archive, dunce::canonicalize(env.output_dir().join("sun-icon.zip")).unwrap());

    assert_eq!(
      archive_names(&outcome.archive),
      vec![
        "chain.json",
        "config.json",
        "execute_msg.json",
        "external_event_msg.json",
        "images/",
        "images/sun-icon.png",
        "index.html",
        "info_response.json",
        "instantiate_msg.json",
        "metadata.json",
        "ownable.wasm",
        "package.json",
        "query_msg.json",
        "style.css",
        "sun_icon.js",
        "sun_icon_bg.wasm",
        "thumbnail.jpg",
      ]
    );
  }

  #[tokio::test]
  async fn square_sun_icon_gets_bounded_thumbnail() {
    let env = TestEnv::new();
    let project = env.static_project_with("1.0.0", 512, 512);
    let pipeline = env.pipeline(ScriptedRunner::new());

    let outcome = pipeline.run(env.request(&project)).await.unwrap();
    assert_eq!(outcome.version, "1.0.0");
    assert_eq!(outcome.archive.file_name().unwrap(), "sun-icon.zip");

    let entries = archive_map(&outcome.archive);
    assert_eq!(
      entries["images/sun-icon.png"],
      std::fs::read(project.join("assets/images/sun-icon.png")).unwrap()
    );
    assert_eq!(
      entry_text(&entries, "index.html"),
      "<html><title>sun-icon 1.0.0</title><img src=\"images/sun-icon.png\"></html>\n"
    );

    let thumbnail_bytes = &entries["thumbnail.jpg"];
    assert!(
      thumbnail_bytes.len() <= 256 * 1024,
      "thumbnail is {} bytes",
      thumbnail_bytes.len()
    );
    assert_eq!(image::guess_format(thumbnail_bytes).unwrap(), image::ImageFormat::Jpeg);
    let thumbnail = image::load_from_memory(thumbnail_bytes).unwrap();
    assert_eq!((thumbnail.width(), thumbnail.height()), (300, 300));

    let manifest: serde_json::Value = serde_json::from_str(&entry_text(&entries, "package.json")).unwrap();
    assert_eq!(manifest["version"], "1.0.0");
  }

  #[tokio::test]
  async fn archive_contents_are_rendered_and_described() {
    let env = TestEnv::new();
    let project = env.static_project();
    let pipeline = env.pipeline(ScriptedRunner::new());

    let outcome = pipeline.run(env.request(&project)).await.unwrap();
    let entries = archive_map(&outcome.archive);

    assert_eq!(
      entry_text(&entries, "index.html"),
      "<html><title>sun-icon 1.2.0</title><img src=\"images/sun-icon.png\"></html>\n"
    );
    assert_eq!(entries["ownable.wasm"], entries["sun_icon_bg.wasm"]);
    assert_eq!(
      entries["images/sun-icon.png"],
      std::fs::read(project.join("assets/images/sun-icon.png")).unwrap()
    );

    let thumbnail = image::load_from_memory(&entries["thumbnail.jpg"]).unwrap();
    assert_eq!((thumbnail.width(), thumbnail.height()), (300, 150));

    let manifest: serde_json::Value = serde_json::from_str(&entry_text(&entries, "package.json")).unwrap();
    assert_eq!(manifest["name"], "sun-icon");
    assert_eq!(manifest["description"], "A sun in the corner of your wallet");
    assert_eq!(manifest["version"], "1.2.0");
    assert_eq!(manifest["keywords"], serde_json::json!(["sun", "icon"]));
    assert_eq!(manifest["kind"], "static");
  }

  #[tokio::test]
  async fn provenance_chain_signs_the_package() {
    let env = TestEnv::new();
    let project = env.static_project();
    let pipeline = env.pipeline(ScriptedRunner::new());

    let outcome = pipeline.run(env.request(&project)).await.unwrap();
    let entries = archive_map(&outcome.archive);

    let chain: EventChain = serde_json::from_str(&entry_text(&entries, "chain.json")).unwrap();
    chain.verify(&Ed25519Signer).unwrap();
    assert_eq!(chain.id, outcome.chain_id);
    assert_eq!(chain.id.len(), 40);
    assert_eq!(chain.events.len(), 1);

    let genesis = &chain.events[0];
    assert_eq!(genesis.previous, chain.anchor());
    assert_eq!(genesis.payload.package, outcome.package_hash);
    assert_eq!(genesis.payload.network, "T");
    assert_eq!(genesis.payload.keywords, vec!["sun".to_string(), "icon".to_string()]);
  }

  #[tokio::test]
  async fn toolchain_runs_compile_bindgen_optimize_then_schema() {
    let env = TestEnv::new();
    let project = env.static_project();
    let pipeline = env.pipeline(ScriptedRunner::new());

    pipeline.run(env.request(&project)).await.unwrap();

    let programs: Vec<String> = pipeline
      .runner()
      .calls()
      .iter()
      .map(|c| format!("{} {}", c.program, c.args[0]))
      .collect();
    assert_eq!(programs, vec!["cargo build", "wasm-bindgen --target", "wasm-opt -Os", "cargo run"]);
  }

  #[tokio::test]
  async fn project_files_are_left_alone() {
    let env = TestEnv::new();
    let project = env.static_project();
    let image = project.join("assets/images/sun-icon.png");
    let before = hash_file(&image).unwrap();
    let pipeline = env.pipeline(ScriptedRunner::new());

    pipeline.run(env.request(&project)).await.unwrap();

    assert_eq!(hash_file(&image).unwrap(), before);
    assert!(project.join("assets/index.html").is_file());
    assert!(project.join("src/lib.rs").is_file());
  }
}

mod music_kind {
  use super::*;

  #[tokio::test]
  async fn packages_audio_cover_and_backdrop() {
    let env = TestEnv::new();
    let project = env.music_project();
    let pipeline = env.pipeline(ScriptedRunner::new());

    let outcome = pipeline.run(env.request(&project)).await.unwrap();
    assert_eq!(outcome.kind, OwnableKind::Music);
    assert_eq!(outcome.archive.file_name().unwrap(), "night-track.zip");

    let entries = archive_map(&outcome.archive);
    for name in [
      "audio/",
      "audio/track.mp3",
      "images/cover-art.jpg",
      "images/my-backdrop.png",
      "night_track.js",
      "night_track_bg.wasm",
      "ownable.wasm",
      "thumbnail.jpg",
    ] {
      assert!(entries.contains_key(name), "missing {}", name);
    }

    assert_eq!(
      entry_text(&entries, "index.html"),
      "<img src=\"images/cover-art.jpg\"><div style=\"background: url(images/my-backdrop.png)\"></div><audio src=\"audio/track.mp3\"></audio>\n"
    );

    // Derived from the 800x600 cover, not the square backdrop.
    let thumbnail = image::load_from_memory(&entries["thumbnail.jpg"]).unwrap();
    assert_eq!((thumbnail.width(), thumbnail.height()), (300, 225));
    let cover = image::load_from_memory(&entries["images/cover-art.jpg"]).unwrap();
    assert_eq!((cover.width(), cover.height()), (800, 600));

    let manifest: serde_json::Value = serde_json::from_str(&entry_text(&entries, "package.json")).unwrap();
    assert_eq!(manifest["kind"], "music");
  }
}

mod layout {
  use super::*;

  #[tokio::test]
  async fn nested_layout_groups_code_and_schemas() {
    let env = TestEnv::new();
    let project = env.static_project();
    write_file(&project.join("Ownable.toml"), "[build]\noutput_layout = \"nested\"\n");
    let pipeline = env.pipeline(ScriptedRunner::new());

    let outcome = pipeline.run(env.request(&project)).await.unwrap();
    assert_eq!(outcome.layout, OutputLayout::Nested);

    let names = archive_names(&outcome.archive);
    for name in [
      "pkg/",
      "pkg/ownable.wasm",
      "pkg/sun_icon_bg.wasm",
      "pkg/sun_icon.js",
      "schema/",
      "schema/query_msg.json",
      "index.html",
      "package.json",
      "chain.json",
    ] {
      assert!(names.iter().any(|n| n == name), "missing {} in {:?}", name, names);
    }
    assert!(!names.iter().any(|n| n == "ownable.wasm" || n == "query_msg.json"));
  }

  #[tokio::test]
  async fn cli_override_beats_project_config() {
    let env = TestEnv::new();
    let project = env.static_project();
    write_file(&project.join("Ownable.toml"), "[build]\noutput_layout = \"nested\"\n");
    let pipeline = env.pipeline(ScriptedRunner::new());

    let mut request = env.request(&project);
    request.overrides.output_layout = Some(OutputLayout::Flat);
    request.overrides.run_optimizer = Some(false);
    request.overrides.network = Some("L".to_string());
    let outcome = pipeline.run(request).await.unwrap();

    assert_eq!(outcome.layout, OutputLayout::Flat);
    assert!(pipeline.runner().calls().iter().all(|c| c.program != "wasm-opt"));

    let entries = archive_map(&outcome.archive);
    let chain: EventChain = serde_json::from_str(&entry_text(&entries, "chain.json")).unwrap();
    assert_eq!(chain.events[0].signer.network, "L");
  }
}

mod reproducibility {
  use super::*;

  #[tokio::test]
  async fn rebuild_differs_only_in_provenance() {
    let env = TestEnv::new();
    let project = env.static_project();
    let pipeline = env.pipeline(ScriptedRunner::new());

    let first = pipeline.run(env.request(&project)).await.unwrap();
    let first_entries = read_archive(&first.archive);
    let second = pipeline.run(env.request(&project)).await.unwrap();
    let second_entries = read_archive(&second.archive);

    assert_eq!(first.archive, second.archive);
    assert_eq!(first.package_hash, second.package_hash);
    assert_ne!(first.chain_id, second.chain_id);

    let names = |entries: &[(String, Vec<u8>)]| entries.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>();
    assert_eq!(names(&first_entries), names(&second_entries));

    for ((name, a), (_, b)) in first_entries.iter().zip(&second_entries) {
      if name != "chain.json" {
        assert_eq!(a, b, "entry {} changed between builds", name);
      }
    }
  }

  #[tokio::test]
  async fn output_trees_are_removed() {
    let env = TestEnv::new();
    let project = env.static_project();
    let pipeline = env.pipeline(ScriptedRunner::new());

    pipeline.run(env.request(&project)).await.unwrap();

    assert!(env.leftover_trees().is_empty());
  }
}
