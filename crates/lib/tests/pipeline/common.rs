//! Shared helpers for pipeline integration tests.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{ImageFormat, Rgb, RgbImage};
use ownable_lib::build::{Pipeline, PipelineRequest};
use ownable_lib::consts::WASM_TARGET;
use ownable_lib::provenance::{Ed25519Signer, Secret};
use ownable_lib::schema::{CacheScope, SchemaCache, SchemaDocument};
use ownable_lib::toolchain::{CommandOutput, CommandRunner, Invocation};
use tempfile::TempDir;

pub const SECRET: &str = "integration test secret";

/// Stands in for cargo, wasm-bindgen and wasm-opt.
///
/// Every call is recorded. Successful calls create the files the real tool
/// would, so the pipeline's output checks pass.
#[derive(Default)]
pub struct ScriptedRunner {
  calls: Mutex<Vec<Invocation>>,
  fail_program: Option<String>,
}

impl ScriptedRunner {
  pub fn new() -> Self {
    Self::default()
  }

  /// A runner whose first call to `program` exits with status 101.
  pub fn failing(program: &str) -> Self {
    Self {
      fail_program: Some(program.to_string()),
      ..Self::default()
    }
  }

  pub fn calls(&self) -> Vec<Invocation> {
    self.calls.lock().unwrap().clone()
  }

  pub fn command_lines(&self) -> Vec<String> {
    self.calls().iter().map(Invocation::command_line).collect()
  }

  fn produce(inv: &Invocation) {
    match (inv.program.as_str(), inv.args.first().map(String::as_str)) {
      ("cargo", Some("build")) => {
        let target = PathBuf::from(&inv.env["CARGO_TARGET_DIR"]).join(WASM_TARGET).join("release");
        fs::create_dir_all(&target).unwrap();
        let ident = crate_ident(&inv.workdir);
        fs::write(target.join(format!("{}.wasm", ident)), b"\0asm\x01\0\0\0").unwrap();
      }
      ("wasm-bindgen", _) => {
        let out = PathBuf::from(&inv.args[3]);
        let name = &inv.args[5];
        fs::write(out.join(format!("{}_bg.wasm", name)), b"\0asm\x01\0\0\0bindgen").unwrap();
        fs::write(
          out.join(format!("{}.js", name)),
          format!("export default function init() {{ return fetch('{}_bg.wasm'); }}\n", name),
        )
        .unwrap();
      }
      ("cargo", Some("run")) => write_schema_dir(&inv.workdir.join("schema"), "generated"),
      _ => {}
    }
  }
}

impl CommandRunner for ScriptedRunner {
  async fn run(&self, inv: &Invocation) -> std::io::Result<CommandOutput> {
    self.calls.lock().unwrap().push(inv.clone());

    if self.fail_program.as_deref() == Some(inv.program.as_str()) {
      return Ok(CommandOutput {
        stdout: String::new(),
        stderr: "error[E0425]: cannot find value `x` in this scope\n".to_string(),
        exit_code: Some(101),
      });
    }

    Self::produce(inv);
    Ok(CommandOutput {
      exit_code: Some(0),
      ..Default::default()
    })
  }
}

/// The crate identifier the scripted compiler names its output after, read
/// back from the project manifest like cargo would.
fn crate_ident(project_root: &Path) -> String {
  let manifest = fs::read_to_string(project_root.join("Cargo.toml")).unwrap();
  let value: toml::Value = toml::from_str(&manifest).unwrap();
  value["package"]["name"].as_str().unwrap().replace('-', "_")
}

/// Write a complete set of schema documents, each tagged with `origin`.
pub fn write_schema_dir(dir: &Path, origin: &str) {
  fs::create_dir_all(dir).unwrap();
  for document in SchemaDocument::ALL {
    fs::write(
      dir.join(document.file_name()),
      format!("{{\"title\": \"{}\", \"origin\": \"{}\"}}\n", document.name(), origin),
    )
    .unwrap();
  }
}

pub fn write_file(path: &Path, content: &str) {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(path, content).unwrap();
}

pub fn write_image(path: &Path, width: u32, height: u32) {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
  img.save_with_format(path, ImageFormat::from_path(path).unwrap()).unwrap();
}

pub fn write_audio(path: &Path) {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(path, vec![0xFFu8; 4096]).unwrap();
}

/// Isolated workspace: a project directory, an output directory, a cache
/// root and a work directory for output trees.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let env = Self {
      temp: TempDir::new().unwrap(),
    };
    for dir in [env.output_dir(), env.cache_root(), env.work_dir()] {
      fs::create_dir_all(dir).unwrap();
    }
    env
  }

  pub fn project(&self, name: &str) -> PathBuf {
    self.temp.path().join("projects").join(name)
  }

  pub fn output_dir(&self) -> PathBuf {
    self.temp.path().join("dist")
  }

  pub fn cache_root(&self) -> PathBuf {
    self.temp.path().join("cache")
  }

  pub fn work_dir(&self) -> PathBuf {
    self.temp.path().join("work")
  }

  /// `sun-icon`: one display image, no `Ownable.toml`.
  pub fn static_project(&self) -> PathBuf {
    self.static_project_with("1.2.0", 512, 256)
  }

  /// `sun-icon` at `version` with a `width`×`height` display image.
  pub fn static_project_with(&self, version: &str, width: u32, height: u32) -> PathBuf {
    let root = self.project("sun-icon");
    write_file(
      &root.join("Cargo.toml"),
      &format!(
        r#"[package]
name = "sun-icon"
version = "{}"
description = "A sun in the corner of your wallet"
authors = ["Ada <ada@example.com>"]
keywords = ["sun", "icon", "sun"]
"#,
        version
      ),
    );
    write_file(&root.join("src/lib.rs"), "pub fn instantiate() {}\n");
    write_file(
      &root.join("assets/index.html"),
      "<html><title>$${name} $${version}</title><img src=\"$${image}\"></html>\n",
    );
    write_file(&root.join("assets/style.css"), "img { width: 100%; }\n");
    write_image(&root.join("assets/images/sun-icon.png"), width, height);
    root
  }

  /// `night-track`: an audio file with a 4:3 cover and a square backdrop.
  pub fn music_project(&self) -> PathBuf {
    let root = self.project("night-track");
    write_file(
      &root.join("Cargo.toml"),
      "[package]\nname = \"night-track\"\nversion = \"0.1.0\"\ndescription = \"Late night\"\n",
    );
    write_file(&root.join("Ownable.toml"), "kind = \"music\"\n");
    write_file(&root.join("src/lib.rs"), "");
    write_file(
      &root.join("assets/index.html"),
      "<img src=\"$${cover}\"><div style=\"background: url($${backdrop})\"></div><audio src=\"$${audio}\"></audio>\n",
    );
    write_audio(&root.join("assets/audio/track.mp3"));
    write_image(&root.join("assets/images/cover-art.jpg"), 800, 600);
    write_image(&root.join("assets/images/my-backdrop.png"), 800, 800);
    root
  }

  pub fn cache(&self) -> SchemaCache {
    SchemaCache::new(CacheScope::Global { root: self.cache_root() })
  }

  pub fn pipeline(&self, runner: ScriptedRunner) -> Pipeline<ScriptedRunner, Ed25519Signer> {
    Pipeline::new(runner, Ed25519Signer, self.cache())
  }

  pub fn request(&self, project: &Path) -> PipelineRequest {
    let mut request = PipelineRequest::new(project, self.output_dir(), Secret::new(SECRET));
    request.work_dir = Some(self.work_dir());
    request
  }

  /// Entries of the work directory; empty once every build cleaned up.
  pub fn leftover_trees(&self) -> Vec<PathBuf> {
    fs::read_dir(self.work_dir())
      .unwrap()
      .map(|e| e.unwrap().path())
      .collect()
  }
}

/// Name to content of every entry in a zip, in archive order.
pub fn read_archive(path: &Path) -> Vec<(String, Vec<u8>)> {
  let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
  let mut entries = Vec::with_capacity(archive.len());
  for i in 0..archive.len() {
    let mut file = archive.by_index(i).unwrap();
    let mut content = Vec::new();
    file.read_to_end(&mut content).unwrap();
    entries.push((file.name().to_string(), content));
  }
  entries
}

pub fn archive_map(path: &Path) -> BTreeMap<String, Vec<u8>> {
  read_archive(path).into_iter().collect()
}

pub fn archive_names(path: &Path) -> Vec<String> {
  read_archive(path).into_iter().map(|(name, _)| name).collect()
}

pub fn entry_text(entries: &BTreeMap<String, Vec<u8>>, name: &str) -> String {
  let bytes = entries
    .get(name)
    .unwrap_or_else(|| panic!("archive has no entry {}", name));
  String::from_utf8(bytes.clone()).unwrap()
}
