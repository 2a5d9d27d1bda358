mod fetch;
mod generate;
mod plan;
mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};

use appsync_lib::codec;
use appsync_lib::install::InstallMarker;
use appsync_lib::manifest::{ApplicationManifest, OptionMap};
use appsync_lib::platform::paths;

pub use fetch::{FetchArgs, cmd_fetch};
pub use generate::{GenerateArgs, cmd_generate};
pub use plan::{PlanArgs, cmd_plan};
pub use sync::{SyncArgs, cmd_sync};

/// Parses a `key=value` option override.
pub fn parse_option(raw: &str) -> Result<(String, String), String> {
  match raw.split_once('=') {
    Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
    _ => Err(format!("expected key=value, got '{}'", raw)),
  }
}

/// The option map for a run: `userHome` from the environment, then overrides.
pub fn variables(overrides: &[(String, String)]) -> OptionMap {
  let mut variables = match paths::home_dir() {
    Some(home) => OptionMap::with_user_home(&home),
    None => OptionMap::new(),
  };
  variables.extend(overrides.iter().cloned());
  variables
}

pub fn load_manifest(rt: &tokio::runtime::Runtime, location: &str) -> Result<ApplicationManifest> {
  rt.block_on(codec::load(location))
    .with_context(|| format!("Failed to load manifest: {}", location))
}

/// Destination of an existing installation: an explicit directory, the one
/// recorded in the install marker, or the manifest's destination path.
pub fn installed_destination(
  manifest: &ApplicationManifest,
  variables: &OptionMap,
  explicit: Option<PathBuf>,
  marker_dir: Option<PathBuf>,
) -> Result<PathBuf> {
  if let Some(dest) = explicit {
    return Ok(dest);
  }

  let marker_dir = marker_dir.or_else(paths::marker_dir);
  if let (Some(marker_dir), Some(id)) = (marker_dir, manifest.id_filename.as_deref()) {
    let marker = InstallMarker::new(&marker_dir, id);
    if let Some(dest) = marker.read().context("Failed to read install marker")? {
      return Ok(dest);
    }
  }

  manifest
    .dest_dir(variables)
    .context("Manifest has no destination path; pass --dest")
}
