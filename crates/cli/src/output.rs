//! Terminal output for the build command.
//!
//! Stage lines and errors go to stderr; the final report (or the JSON
//! summary with `--output json`) goes to stdout.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

const BUILT: &str = "✓";
const FAILED: &str = "✗";
const STAGE: &str = "→";

/// Chain ids longer than this are shown as head and tail.
const ID_DISPLAY_LEN: usize = 16;

/// `0f3a9c1b…44a8` for long ids, unchanged otherwise.
pub fn short_id(id: &str) -> String {
  if id.len() <= ID_DISPLAY_LEN || !id.is_ascii() {
    return id.to_string();
  }
  format!("{}…{}", &id[..8], &id[id.len() - 4..])
}

/// Archive size in binary units; exact below 1 KiB.
pub fn format_size(bytes: u64) -> String {
  const KIB: f64 = 1024.0;
  let b = bytes as f64;

  if b >= KIB * KIB {
    format!("{:.1} MiB", b / (KIB * KIB))
  } else if b >= KIB {
    format!("{:.1} KiB", b / KIB)
  } else if bytes == 1 {
    "1 byte".to_string()
  } else {
    format!("{} bytes", bytes)
  }
}

/// Wall-clock build time: tenths of a second, or minutes and seconds.
pub fn format_elapsed(elapsed: Duration) -> String {
  let secs = elapsed.as_secs();
  if secs >= 60 {
    format!("{}m{:02}s", secs / 60, secs % 60)
  } else {
    format!("{:.1}s", elapsed.as_secs_f64())
  }
}

pub fn print_stage(stage: &str) {
  eprintln!("{} {}", STAGE.if_supports_color(Stream::Stderr, |s| s.cyan()), stage);
}

pub fn print_built(message: &str) {
  println!("{} {}", BUILT.if_supports_color(Stream::Stdout, |s| s.green()), message);
}

pub fn print_failure(message: &str) {
  eprintln!(
    "{} {}",
    FAILED.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

/// Label/value rows printed as an aligned block under the build line.
#[derive(Debug, Default)]
pub struct Report {
  rows: Vec<(&'static str, String)>,
}

impl Report {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn row(mut self, label: &'static str, value: impl Into<String>) -> Self {
    self.rows.push((label, value.into()));
    self
  }

  /// Rows with labels padded to the widest one.
  fn lines(&self) -> Vec<(String, &str)> {
    let width = self.rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    self
      .rows
      .iter()
      .map(|(label, value)| (format!("{:<width$}", label, width = width), value.as_str()))
      .collect()
  }

  pub fn print(&self) {
    for (label, value) in self.lines() {
      println!("  {}  {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
    }
  }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize build summary")?;
  println!("{}", json);
  Ok(())
}
