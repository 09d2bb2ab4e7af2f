mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use ownable_lib::package::OutputLayout;

use crate::cmd::BuildArgs;
use crate::output::OutputFormat;

/// Build and package digital ownables
#[derive(Parser)]
#[command(name = "ownable")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheScopeArg {
  /// Shared by every project on this machine
  Global,
  /// Inside the project's `.ownable/` directory
  Project,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile a project and package it as `<name>.zip`
  Build {
    /// Project directory
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Directory receiving the archive (default: current directory)
    #[arg(short = 'd', long)]
    output_dir: Option<PathBuf>,

    /// Secret the provenance signing key is derived from
    #[arg(long, env = "OWNABLE_SECRET", hide_env_values = true)]
    secret: String,

    /// Where schema bundles are cached
    #[arg(long, value_enum, default_value_t = CacheScopeArg::Global)]
    cache_scope: CacheScopeArg,

    /// Root of the global schema cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Wrap rustc in sccache
    #[arg(long)]
    build_cache: bool,

    /// Skip wasm-opt
    #[arg(long)]
    no_optimizer: bool,

    /// Package layout: flat or nested
    #[arg(long)]
    layout: Option<OutputLayout>,

    /// Network tag recorded in the provenance chain
    #[arg(long)]
    network: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Build {
      path,
      output_dir,
      secret,
      cache_scope,
      cache_dir,
      build_cache,
      no_optimizer,
      layout,
      network,
      output,
    } => cmd::cmd_build(BuildArgs {
      path,
      output_dir,
      secret,
      cache_scope,
      cache_dir,
      build_cache,
      no_optimizer,
      layout,
      network,
      output,
    }),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      output::print_failure(&format!("error: {:#}", e));
      ExitCode::FAILURE
    }
  }
}
