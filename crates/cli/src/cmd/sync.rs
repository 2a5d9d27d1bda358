//! Implementation of the `appsync sync` command.
//!
//! Installs or updates the application described by a manifest and then
//! launches it.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::{info, warn};

use appsync_lib::install::{self, InstallOptions, InstallReport, InstallStatus};
use appsync_lib::placeholder::substitute;
use appsync_lib::platform::paths;
use appsync_lib::transfer::{EventSink, IntegrityPolicy, TransferConfig};

use crate::logging::LogFile;
use crate::output::{
  OutputFormat, format_bytes, format_duration, print_event, print_info, print_json, print_stat, print_success,
  print_warning,
};
use crate::prompts::PromptConsent;

#[derive(Debug, Args)]
pub struct SyncArgs {
  /// Manifest location (URL or path)
  #[arg(short, long)]
  pub manifest: String,

  /// Option override as key=value (repeatable)
  #[arg(short = 'o', long = "option", value_parser = super::parse_option)]
  pub options: Vec<(String, String)>,

  /// Directory holding the install marker (default: home directory)
  #[arg(long)]
  pub marker_dir: Option<PathBuf>,

  /// Maximum concurrent transfers per phase
  #[arg(short, long, default_value_t = appsync_lib::consts::DEFAULT_PARALLELISM)]
  pub parallelism: usize,

  /// Fail when a transferred file does not match its declared hash
  #[arg(long)]
  pub strict: bool,

  /// Accept the suggested destination and any update without asking
  #[arg(short, long)]
  pub yes: bool,

  /// Prepare the launch command but do not start the application
  #[arg(long)]
  pub no_launch: bool,
}

pub fn cmd_sync(args: SyncArgs, log_file: &LogFile, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

  let manifest = super::load_manifest(&rt, &args.manifest)?;
  let variables = super::variables(&args.options);

  if let Some(log_path) = manifest.log_path.as_deref().filter(|p| !p.trim().is_empty()) {
    let log_path = PathBuf::from(substitute(log_path, &variables));
    if let Err(e) = log_file.attach(&log_path) {
      warn!(error = %e, "continuing without log file");
    }
  }

  let marker_dir = args
    .marker_dir
    .or_else(paths::marker_dir)
    .context("Cannot locate the install marker directory; set HOME or pass --marker-dir")?;

  let options = InstallOptions {
    marker_dir,
    variables,
    transfer: TransferConfig {
      parallelism: args.parallelism.max(1),
      integrity: if args.strict {
        IntegrityPolicy::Fail
      } else {
        IntegrityPolicy::Warn
      },
      ..TransferConfig::default()
    },
    silent: false,
    cancel: Default::default(),
  };

  let cancel = options.cancel.clone();
  rt.spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      cancel.cancel();
    }
  });

  let consent = PromptConsent { assume_yes: args.yes };
  let json = output.is_json();
  let report = rt.block_on(async {
    let (events, mut rx) = EventSink::channel();
    let printer = tokio::spawn(async move {
      while let Some(event) = rx.recv().await {
        if !json {
          print_event(&event);
        }
      }
    });
    let result = install::run(&manifest, &options, &consent, events).await;
    let _ = printer.await;
    result
  });
  let report = report.context("Installation failed")?;

  if output.is_json() {
    print_json(&report)?;
  } else {
    print_summary(&report, start);
  }

  if report.is_canceled() || args.no_launch {
    return Ok(());
  }
  let Some(launch) = &report.launch else {
    return Ok(());
  };

  info!(command = %launch, "starting application");
  let mut child = launch
    .command()
    .spawn()
    .with_context(|| format!("Failed to start {}", launch.program))?;

  if !manifest.exit_after_execute {
    let status = child.wait().context("Failed to wait for the application")?;
    if !status.success() {
      bail!("Application exited with {}", status);
    }
  }
  Ok(())
}

fn print_summary(report: &InstallReport, start: Instant) {
  println!();
  match &report.status {
    InstallStatus::UpToDate => print_success("Files are up to date"),
    InstallStatus::Updated(transfer) => {
      print_success(if report.first_installation {
        "Installation complete!"
      } else {
        "Update complete!"
      });
      print_stat("Copied", &transfer.copied.len().to_string());
      print_stat("Deleted", &transfer.deleted.len().to_string());
      print_stat("Expanded", &transfer.decompressed.len().to_string());
      print_stat("Transferred", &format_bytes(transfer.bytes));
      if !transfer.integrity_warnings.is_empty() {
        print_warning(&format!(
          "{} file(s) did not match their declared hash",
          transfer.integrity_warnings.len()
        ));
      }
    }
    InstallStatus::Declined => print_info("Update skipped"),
    InstallStatus::Canceled(_) => {
      print_warning("Installation canceled");
      return;
    }
  }
  print_stat("Destination", &report.destination.display().to_string());
  if let Some(launch) = &report.launch {
    print_stat("Launch", &launch.to_string());
  }
  print_stat("Duration", &format_duration(start.elapsed()));
}
