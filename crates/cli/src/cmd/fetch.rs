//! Implementation of the `appsync fetch` command.
//!
//! Retrieves individual files on demand, such as files deferred by lazy
//! loading or served from a source directory.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;

use appsync_lib::consts::DEST_DIR_VARIABLE;
use appsync_lib::manifest::EntryKey;
use appsync_lib::transfer::{FileLoader, IntegrityPolicy};

use crate::output::{OutputFormat, print_info, print_json, print_success};

#[derive(Debug, Args)]
pub struct FetchArgs {
  /// Manifest location (URL or path)
  #[arg(short, long)]
  pub manifest: String,

  /// Files to fetch, as destination-relative paths
  #[arg(required = true)]
  pub files: Vec<String>,

  /// Installation directory (default: from the install marker or the manifest)
  #[arg(short, long)]
  pub dest: Option<PathBuf>,

  /// Directory holding the install marker (default: home directory)
  #[arg(long)]
  pub marker_dir: Option<PathBuf>,

  /// Option override as key=value (repeatable)
  #[arg(short = 'o', long = "option", value_parser = super::parse_option)]
  pub options: Vec<(String, String)>,

  /// Remove the files instead of fetching them
  #[arg(long)]
  pub delete: bool,

  /// Fail when a fetched file does not match its declared hash
  #[arg(long)]
  pub strict: bool,
}

pub fn cmd_fetch(args: FetchArgs, output: OutputFormat) -> Result<()> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let manifest = super::load_manifest(&rt, &args.manifest)?;
  let mut variables = super::variables(&args.options);

  let dest = super::installed_destination(&manifest, &variables, args.dest, args.marker_dir)?;
  variables.set(DEST_DIR_VARIABLE, dest.display().to_string());

  let integrity = if args.strict {
    IntegrityPolicy::Fail
  } else {
    IntegrityPolicy::Warn
  };
  let loader = FileLoader::new(&manifest, &variables, &dest).with_integrity(integrity);

  let mut results = Vec::new();
  for file in &args.files {
    let Some(key) = EntryKey::parse(file) else {
      bail!("Not a file path: '{}'", file);
    };
    if args.delete {
      let removed = loader
        .delete_file(key.path.as_str(), &key.file_name)
        .with_context(|| format!("Failed to delete {}", key))?;
      if !output.is_json() {
        if removed {
          print_success(&format!("Deleted {}", key));
        } else {
          print_info(&format!("{} was not present", key));
        }
      }
      results.push((key.to_string(), key.under(&dest), removed));
    } else {
      let placed = rt
        .block_on(loader.load_file(key.path.as_str(), &key.file_name))
        .with_context(|| format!("Failed to fetch {}", key))?;
      if !output.is_json() {
        print_success(&format!("{} -> {}", key, placed.display()));
      }
      results.push((key.to_string(), placed, true));
    }
  }

  if output.is_json() {
    print_json(&results)?;
  }
  Ok(())
}
