//! Manifest generation from an application directory.
//!
//! Rebuilds a manifest's file list from what is actually on disk, which is how
//! a release is published: lay the application out, point the generator at
//! it, upload the directory next to the updated manifest.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::manifest::{ApplicationManifest, EntryKey, FileEntry, ManifestError};
use crate::util::hash::HashAlgorithm;

#[derive(Debug, Error)]
pub enum GenerateError {
  #[error("application directory {path} does not exist")]
  NotADirectory { path: String },

  #[error("failed to walk {path}: {message}")]
  Walk { path: String, message: String },

  #[error(transparent)]
  Manifest(#[from] ManifestError),
}

/// Options for [`update_from_dir`].
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
  /// URL (or path) the application directory is published under.
  pub base_url: String,
  pub algorithm: HashAlgorithm,
  /// File and directory names to leave out, matched against each path component.
  pub exclude: Vec<String>,
}

/// What changed in the file list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerateReport {
  pub added: Vec<EntryKey>,
  pub updated: Vec<EntryKey>,
  pub unchanged: Vec<EntryKey>,
  pub removed: Vec<EntryKey>,
}

fn source_location(base_url: &str, key: &EntryKey) -> String {
  format!("{}/{}", base_url.trim_end_matches('/'), key)
}

/// Replaces the file list of `manifest` with the files below `app_dir`.
///
/// Files are visited in sorted order. Entries that already existed keep their
/// archive, lazy loading, classpath and order settings; new entries get the
/// defaults. Every entry gets a fresh digest, size and source location.
pub fn update_from_dir(
  manifest: &mut ApplicationManifest,
  app_dir: &Path,
  options: &GenerateOptions,
) -> Result<GenerateReport, GenerateError> {
  if !app_dir.is_dir() {
    return Err(GenerateError::NotADirectory {
      path: app_dir.display().to_string(),
    });
  }

  let previous: HashMap<EntryKey, FileEntry> = manifest.files.drain(..).map(|f| (f.key(), f)).collect();
  let mut report = GenerateReport::default();

  let walker = WalkDir::new(app_dir)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| {
      e.depth() == 0
        || e
          .file_name()
          .to_str()
          .is_none_or(|name| !options.exclude.iter().any(|x| x == name))
    });

  let mut files = Vec::new();
  for entry in walker {
    let entry = entry.map_err(|e| GenerateError::Walk {
      path: app_dir.display().to_string(),
      message: e.to_string(),
    })?;
    if !entry.file_type().is_file() {
      continue;
    }

    let described = FileEntry::from_local(app_dir, entry.path(), "-", options.algorithm)?;
    let key = described.key();
    let mut file = FileEntry {
      source_location: source_location(&options.base_url, &key),
      ..described
    };

    match previous.get(&key) {
      Some(old) => {
        file.archive_expand = old.archive_expand;
        file.always_load = old.always_load;
        file.on_classpath = old.on_classpath;
        file.rollout_order = old.rollout_order;
        if old.content_hash.eq_ignore_ascii_case(&file.content_hash) && old.size_bytes == file.size_bytes {
          report.unchanged.push(key);
        } else {
          debug!(file = %key, "content changed");
          report.updated.push(key);
        }
      }
      None => {
        debug!(file = %key, "new file");
        report.added.push(key);
      }
    }
    files.push(file);
  }

  let mut removed: Vec<EntryKey> = previous
    .into_keys()
    .filter(|key| !files.iter().any(|f| f.key() == *key))
    .collect();
  removed.sort();
  report.removed = removed;
  manifest.files = files;

  info!(
    added = report.added.len(),
    updated = report.updated.len(),
    unchanged = report.unchanged.len(),
    removed = report.removed.len(),
    "updated manifest from {}",
    app_dir.display()
  );
  Ok(report)
}
