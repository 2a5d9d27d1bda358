//! Installation session orchestration.
//!
//! [`run`] takes a manifest from "where should this live" to "ready to
//! launch": it resolves the destination through the install marker, reconciles
//! and executes the plan when an update is due, stores the resolved manifest
//! next to the installation and prepares the launch command. Spawning the
//! application is left to the caller.

mod consent;
mod launch;
mod marker;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub use consent::{Consent, SilentConsent};
pub use launch::{LaunchCommand, split_args};
pub use marker::InstallMarker;

use crate::codec::{self, CodecError, SerializeMode};
use crate::consts::{
  CLASSPATH_VARIABLE, CONFIG_FILE_URL_VARIABLE, DEST_DIR_VARIABLE, INCOMPLETE_MARKER, LAUNCH_LOG_FILENAME,
  LOCAL_MANIFEST_FILENAME,
};
use crate::manifest::{ApplicationManifest, ManifestError, OptionMap};
use crate::reconcile::{
  ReconcileError, ReconcileOptions, ReconciliationPlan, build_classpath, deleted_since, reconcile,
};
use crate::transfer::{
  CancelFlag, EventSink, TransferConfig, TransferError, TransferExecutor, TransferOutcome, TransferReport,
};

/// Errors that end an install session.
#[derive(Debug, Error)]
pub enum InstallError {
  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error(transparent)]
  Codec(#[from] CodecError),

  #[error(transparent)]
  Reconcile(#[from] ReconcileError),

  #[error(transparent)]
  Transfer(#[from] TransferError),

  /// The install marker could not be read or written.
  #[error("install marker {path}: {source}")]
  Marker {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("the property '{key}' was not found inside '{path}'")]
  MarkerKey { path: String, key: &'static str },

  /// The marker points at something that is not a directory.
  #[error("recorded installation directory {path} does not exist")]
  InvalidDestination { path: String },

  #[error("I/O error on {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

fn io_err(path: &Path) -> impl Fn(std::io::Error) -> InstallError + '_ {
  move |source| InstallError::Io {
    path: path.display().to_string(),
    source,
  }
}

/// Options for an install session.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
  /// Directory holding the install marker, usually the user's home.
  pub marker_dir: PathBuf,
  /// Initial option map, e.g. `userHome` and command-line overrides.
  pub variables: OptionMap,
  pub transfer: TransferConfig,
  /// Treat the session as silent regardless of the manifest settings.
  pub silent: bool,
  pub cancel: CancelFlag,
}

/// How the update step of a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "report", rename_all = "snake_case")]
pub enum InstallStatus {
  /// Nothing to do.
  UpToDate,
  /// The plan was executed.
  Updated(TransferReport),
  /// An update was available but not confirmed.
  Declined,
  /// The user or a cancel flag stopped the session.
  Canceled(TransferReport),
}

/// Result of a session that did not fail.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
  pub destination: PathBuf,
  pub first_installation: bool,
  pub status: InstallStatus,
  pub plan: ReconciliationPlan,
  /// The option map after the session, including `destDir` and `classpath`.
  pub variables: OptionMap,
  /// Resolved manifest copy inside the destination.
  pub local_manifest: Option<PathBuf>,
  /// Present when the session completed and the manifest names an executable.
  pub launch: Option<LaunchCommand>,
}

impl InstallReport {
  fn canceled(destination: PathBuf, variables: OptionMap, report: TransferReport) -> Self {
    Self {
      destination,
      first_installation: false,
      status: InstallStatus::Canceled(report),
      plan: ReconciliationPlan::default(),
      variables,
      local_manifest: None,
      launch: None,
    }
  }

  pub fn is_canceled(&self) -> bool {
    matches!(self.status, InstallStatus::Canceled(_))
  }
}

/// Runs one install or update session for `manifest`.
pub async fn run(
  manifest: &ApplicationManifest,
  options: &InstallOptions,
  consent: &dyn Consent,
  events: EventSink,
) -> Result<InstallReport, InstallError> {
  let mut variables = options.variables.clone();

  let Some(destination) = resolve_destination(manifest, options, consent, &variables)? else {
    info!("installation canceled while choosing a destination");
    return Ok(InstallReport::canceled(PathBuf::new(), variables, TransferReport::default()));
  };
  let incomplete = destination.join(INCOMPLETE_MARKER);
  let first_installation = incomplete.exists();

  variables.set(DEST_DIR_VARIABLE, destination.display().to_string());
  manifest.validate()?;

  let local_manifest = destination.join(LOCAL_MANIFEST_FILENAME);
  let previous = previous_manifest(&local_manifest);
  let deleted = previous
    .as_ref()
    .map(|previous| deleted_since(previous, manifest))
    .unwrap_or_default();

  let reconcile_options = ReconcileOptions::for_manifest(manifest, variables.clone()).with_deleted(deleted);
  let plan = reconcile(manifest, &destination, &reconcile_options)?;

  let status = if plan.is_update_necessary() {
    info!(
      new = plan.new_files.len(),
      changed = plan.changed_files.len(),
      deleted = plan.deleted.len(),
      silent_install = manifest.silent_install,
      silent_update = manifest.silent_update,
      first_installation,
      "an update is available"
    );
    let silent = options.silent || manifest.silent_update;
    if silent || first_installation || consent.confirm_update(&plan) {
      let executor = TransferExecutor::new(options.transfer.clone())
        .with_events(events)
        .with_cancel(options.cancel.clone());
      match executor.execute(&plan).await? {
        TransferOutcome::Completed(report) => {
          if incomplete.exists() {
            std::fs::remove_file(&incomplete).map_err(io_err(&incomplete))?;
          }
          InstallStatus::Updated(report)
        }
        TransferOutcome::Canceled(report) => {
          let mut canceled = InstallReport::canceled(destination, variables, report);
          canceled.first_installation = first_installation;
          canceled.plan = plan;
          return Ok(canceled);
        }
      }
    } else {
      info!("update declined");
      InstallStatus::Declined
    }
  } else {
    info!("files are up to date");
    InstallStatus::UpToDate
  };

  let config_url = url::Url::from_file_path(&local_manifest)
    .map(|u| u.to_string())
    .unwrap_or_else(|_| local_manifest.display().to_string());
  variables.set(CONFIG_FILE_URL_VARIABLE, config_url.clone());

  // The stored manifest is the next deletion baseline and must describe what
  // is installed. A declined update leaves it alone.
  let stored = match previous {
    Some(installed) if status == InstallStatus::Declined => {
      variables.set(CLASSPATH_VARIABLE, build_classpath(installed.files.iter().filter(|f| f.on_classpath)));
      installed
    }
    _ => {
      variables.set(CLASSPATH_VARIABLE, plan.classpath_string());
      let mut stored = manifest.clone();
      stored.config_file_url = Some(config_url);
      codec::write_file(&stored, &local_manifest, SerializeMode::Resolved(&variables), true)?;
      stored
    }
  };

  let launch = match stored.launch_executable.as_deref().map(str::trim) {
    Some(program) if !program.is_empty() => {
      let resolved = stored.resolved(&variables);
      let command = LaunchCommand::new(
        resolved.launch_executable.as_deref().unwrap_or(program),
        resolved.launch_arguments.as_deref(),
        &destination,
      );
      let log = destination.join(LAUNCH_LOG_FILENAME);
      std::fs::write(&log, command.to_string()).map_err(io_err(&log))?;
      info!(command = %command, "prepared launch command");
      Some(command)
    }
    _ => None,
  };

  Ok(InstallReport {
    destination,
    first_installation,
    status,
    plan,
    variables,
    local_manifest: Some(local_manifest),
    launch,
  })
}

/// Finds the destination from the marker, or asks for one and records it.
fn resolve_destination(
  manifest: &ApplicationManifest,
  options: &InstallOptions,
  consent: &dyn Consent,
  variables: &OptionMap,
) -> Result<Option<PathBuf>, InstallError> {
  let id_filename = manifest
    .id_filename
    .as_deref()
    .map(str::trim)
    .filter(|id| !id.is_empty())
    .ok_or(ManifestError::MissingField { field: "idFilename" })?;
  let marker = InstallMarker::new(&options.marker_dir, id_filename);

  if let Some(directory) = marker.read()? {
    if !directory.is_dir() {
      return Err(InstallError::InvalidDestination {
        path: directory.display().to_string(),
      });
    }
    return Ok(Some(directory));
  }

  let suggested = manifest
    .dest_dir(variables)
    .ok_or(ManifestError::MissingField { field: "destPath" })?;
  let chosen = if options.silent || manifest.silent_install {
    suggested
  } else {
    match consent.choose_destination(&suggested) {
      Some(chosen) => chosen,
      None => return Ok(None),
    }
  };

  marker.write(&chosen)?;
  if !chosen.exists() {
    std::fs::create_dir_all(&chosen).map_err(io_err(&chosen))?;
    let incomplete = chosen.join(INCOMPLETE_MARKER);
    std::fs::write(&incomplete, b"").map_err(io_err(&incomplete))?;
    info!(destination = %chosen.display(), "created installation directory");
  }
  Ok(Some(chosen))
}

/// The manifest stored by the previous session, if it can be read.
fn previous_manifest(path: &Path) -> Option<ApplicationManifest> {
  if !path.is_file() {
    return None;
  }
  match codec::read_file(path) {
    Ok(previous) => Some(previous),
    Err(e) => {
      warn!(path = %path.display(), error = %e, "ignoring unreadable previous manifest");
      None
    }
  }
}
