//! Sources for the deleted set.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use super::{DeletedEntry, ReconcileError};
use crate::consts::{BACKUP_SUFFIX, LAUNCH_LOG_FILENAME, LOCAL_MANIFEST_FILENAME};
use crate::manifest::{ApplicationManifest, EntryKey, RelPath};

/// Files declared by `previous` that `current` no longer declares.
///
/// Each removal keeps the rollout order it had in `previous`, so it happens in
/// the phase that originally placed the file.
pub fn deleted_since(previous: &ApplicationManifest, current: &ApplicationManifest) -> Vec<DeletedEntry> {
  let current_keys: HashSet<EntryKey> = current.files.iter().map(|f| f.key()).collect();
  let mut seen = HashSet::new();

  previous
    .files
    .iter()
    .filter(|f| !current_keys.contains(&f.key()))
    .filter(|f| seen.insert(f.key()))
    .map(|f| DeletedEntry::new(f.key(), f.rollout_order))
    .collect()
}

/// Lists files under `destination` that `manifest` does not declare.
///
/// This is an opt-in pass: the result includes anything unmanaged, such as
/// user data or files expanded from archives, so callers should review the
/// candidates before passing them on as deletions. The local manifest copy,
/// its backup and the launch log are never reported, and entries whose name
/// matches one of `exclude` are skipped together with their contents.
pub fn scan_orphans(
  manifest: &ApplicationManifest,
  destination: &Path,
  exclude: &[&str],
  rollout_order: i32,
) -> Result<Vec<DeletedEntry>, ReconcileError> {
  if !destination.is_dir() {
    return Ok(Vec::new());
  }

  let declared: HashSet<EntryKey> = manifest.files.iter().map(|f| f.key()).collect();
  let backup = format!("{}{}", LOCAL_MANIFEST_FILENAME, BACKUP_SUFFIX);
  let reserved = [LOCAL_MANIFEST_FILENAME, backup.as_str(), LAUNCH_LOG_FILENAME];

  let walker = WalkDir::new(destination)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| e.file_name().to_str().map(|name| !exclude.contains(&name)).unwrap_or(true));

  let mut orphans = Vec::new();
  for entry in walker {
    let entry = entry.map_err(|e| ReconcileError::Scan { message: e.to_string() })?;
    if !entry.file_type().is_file() {
      continue;
    }

    let Some(parent) = entry.path().parent() else {
      continue;
    };
    let Some(path) = RelPath::relative_to(destination, parent) else {
      continue;
    };
    let file_name = entry.file_name().to_string_lossy().into_owned();
    if path.is_root() && reserved.contains(&file_name.as_str()) {
      continue;
    }

    let key = EntryKey { path, file_name };
    if !declared.contains(&key) {
      debug!(file = %key, "unmanaged file in destination");
      orphans.push(DeletedEntry::new(key, rollout_order));
    }
  }

  Ok(orphans)
}
