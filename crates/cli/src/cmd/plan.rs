//! Implementation of the `appsync plan` command.
//!
//! Compares a manifest with an installation and lists what a sync would do,
//! without changing anything.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use appsync_lib::codec;
use appsync_lib::consts::{DEST_DIR_VARIABLE, LOCAL_MANIFEST_FILENAME};
use appsync_lib::reconcile::{ReconcileOptions, deleted_since, reconcile, scan_orphans};

use crate::output::{OutputFormat, print_info, print_json, print_plan, print_success};

#[derive(Debug, Args)]
pub struct PlanArgs {
  /// Manifest location (URL or path)
  #[arg(short, long)]
  pub manifest: String,

  /// Installation directory (default: from the install marker or the manifest)
  #[arg(short, long)]
  pub dest: Option<PathBuf>,

  /// Directory holding the install marker (default: home directory)
  #[arg(long)]
  pub marker_dir: Option<PathBuf>,

  /// Option override as key=value (repeatable)
  #[arg(short = 'o', long = "option", value_parser = super::parse_option)]
  pub options: Vec<(String, String)>,

  /// Also list undeclared files in the destination as deletions
  #[arg(long)]
  pub orphans: bool,

  /// Names skipped by the orphan scan (repeatable)
  #[arg(long, requires = "orphans")]
  pub exclude: Vec<String>,

  /// Show digests, sources and unchanged files
  #[arg(short, long)]
  pub verbose: bool,
}

pub fn cmd_plan(args: PlanArgs, output: OutputFormat) -> Result<()> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let manifest = super::load_manifest(&rt, &args.manifest)?;
  let mut variables = super::variables(&args.options);

  let dest = super::installed_destination(&manifest, &variables, args.dest, args.marker_dir)?;
  variables.set(DEST_DIR_VARIABLE, dest.display().to_string());

  let local_manifest = dest.join(LOCAL_MANIFEST_FILENAME);
  let mut deleted = if local_manifest.is_file() {
    let previous = codec::read_file(&local_manifest)
      .with_context(|| format!("Failed to read installed manifest: {}", local_manifest.display()))?;
    deleted_since(&previous, &manifest)
  } else {
    Vec::new()
  };

  if args.orphans {
    let exclude: Vec<&str> = args.exclude.iter().map(String::as_str).collect();
    for orphan in scan_orphans(&manifest, &dest, &exclude, 0).context("Failed to scan destination")? {
      if !deleted.iter().any(|d| d.key == orphan.key) {
        deleted.push(orphan);
      }
    }
  }

  let options = ReconcileOptions::for_manifest(&manifest, variables).with_deleted(deleted);
  let plan = reconcile(&manifest, &dest, &options).context("Failed to compare manifest with destination")?;

  if output.is_json() {
    print_json(&plan)?;
    return Ok(());
  }

  print_plan(&plan, args.verbose);
  println!();
  if plan.is_update_necessary() {
    print_info(&format!("Would transfer {} file(s)", plan.transfer_count()));
  } else {
    print_success("Files are up to date");
  }
  Ok(())
}
