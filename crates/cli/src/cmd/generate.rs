//! Implementation of the `appsync generate` command.
//!
//! Refreshes a manifest's file list from an application directory and writes
//! the manifest back in template form.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use appsync_lib::codec::{self, SerializeMode};
use appsync_lib::generate::{GenerateOptions, update_from_dir};
use appsync_lib::manifest::ApplicationManifest;
use appsync_lib::util::hash::HashAlgorithm;

use crate::output::{OutputFormat, print_json, print_stat, print_success};

#[derive(Debug, Args)]
pub struct GenerateArgs {
  /// Manifest file to update (created when missing)
  #[arg(short, long)]
  pub manifest: PathBuf,

  /// Application directory to describe
  #[arg(short, long)]
  pub dir: PathBuf,

  /// URL the application directory is published under
  #[arg(short, long)]
  pub base_url: String,

  /// Use legacy MD5 digests instead of SHA-256
  #[arg(long)]
  pub md5: bool,

  /// File or directory names to leave out (repeatable)
  #[arg(long)]
  pub exclude: Vec<String>,
}

pub fn cmd_generate(args: GenerateArgs, output: OutputFormat) -> Result<()> {
  let mut manifest = if args.manifest.exists() {
    codec::read_file(&args.manifest).with_context(|| format!("Failed to read manifest: {}", args.manifest.display()))?
  } else {
    ApplicationManifest::default()
  };

  let options = GenerateOptions {
    base_url: args.base_url,
    algorithm: if args.md5 {
      HashAlgorithm::Md5
    } else {
      HashAlgorithm::Sha256
    },
    exclude: args.exclude,
  };
  let dir = dunce::canonicalize(&args.dir)
    .with_context(|| format!("Application directory not found: {}", args.dir.display()))?;
  let report =
    update_from_dir(&mut manifest, &dir, &options).with_context(|| format!("Failed to describe {}", dir.display()))?;

  codec::write_file(&manifest, &args.manifest, SerializeMode::Template, true)
    .with_context(|| format!("Failed to write manifest: {}", args.manifest.display()))?;

  if output.is_json() {
    print_json(&report)?;
  } else {
    print_success(&format!("Updated {}", args.manifest.display()));
    print_stat("Added", &report.added.len().to_string());
    print_stat("Updated", &report.updated.len().to_string());
    print_stat("Unchanged", &report.unchanged.len().to_string());
    print_stat("Removed", &report.removed.len().to_string());
  }
  Ok(())
}
