use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{DirectoryEntry, EntryKey, FileEntry, Locale, ManifestError, RelPath, SourceDirectoryEntry};
use crate::placeholder::{Resolver, substitute};

/// The full description of one application installation.
///
/// String settings are stored as written in the manifest and may contain
/// `${...}` variables; [`ApplicationManifest::resolved`] produces a copy with
/// variables substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationManifest {
  pub title: Option<String>,
  pub vendor: Option<String>,
  pub description: Option<String>,
  pub version: Option<String>,
  pub locale: Option<Locale>,

  /// Destination directory template. Required.
  pub dest_path: Option<String>,
  /// Name of the install marker file. Required.
  pub id_filename: Option<String>,

  pub exit_after_execute: bool,
  pub silent_install: bool,
  pub silent_update: bool,
  pub lazy_loading: bool,
  pub show_start_frame: bool,
  pub start_frame_delay_seconds: u32,

  /// Program to run after a successful sync.
  pub launch_executable: Option<String>,
  /// Argument template for the launch command.
  pub launch_arguments: Option<String>,

  pub log_path: Option<String>,
  pub msg_file_url: Option<String>,
  /// Where this manifest was loaded from; required for lazy loading.
  pub config_file_url: Option<String>,
  pub look_and_feel: Option<String>,
  /// Character encoding declared when writing this manifest.
  pub xml_encoding: String,

  pub files: Vec<FileEntry>,
  pub directories: Vec<DirectoryEntry>,
  pub source_directories: Vec<SourceDirectoryEntry>,
}

impl Default for ApplicationManifest {
  fn default() -> Self {
    Self {
      title: None,
      vendor: None,
      description: None,
      version: None,
      locale: None,
      dest_path: None,
      id_filename: None,
      exit_after_execute: true,
      silent_install: false,
      silent_update: false,
      lazy_loading: false,
      show_start_frame: true,
      start_frame_delay_seconds: 2,
      launch_executable: None,
      launch_arguments: None,
      log_path: None,
      msg_file_url: None,
      config_file_url: None,
      look_and_feel: None,
      xml_encoding: "UTF-8".to_string(),
      files: Vec::new(),
      directories: Vec::new(),
      source_directories: Vec::new(),
    }
  }
}

fn is_blank(value: &Option<String>) -> bool {
  value.as_deref().map(str::trim).is_none_or(str::is_empty)
}

impl ApplicationManifest {
  /// Checks the settings every sync needs.
  pub fn validate(&self) -> Result<(), ManifestError> {
    if is_blank(&self.dest_path) {
      return Err(ManifestError::MissingField { field: "destPath" });
    }
    if is_blank(&self.id_filename) {
      return Err(ManifestError::MissingField { field: "idFilename" });
    }
    if self.lazy_loading && is_blank(&self.config_file_url) {
      return Err(ManifestError::LazyLoadingWithoutConfigUrl);
    }
    if let Some(key) = self.duplicate_key() {
      return Err(ManifestError::DuplicateFile { key: key.to_string() });
    }
    Ok(())
  }

  /// The first file key declared more than once, if any.
  pub fn duplicate_key(&self) -> Option<EntryKey> {
    let mut seen = HashSet::with_capacity(self.files.len());
    self.files.iter().map(FileEntry::key).find(|key| !seen.insert(key.clone()))
  }

  /// A copy with every string setting and source location substituted.
  pub fn resolved(&self, vars: &impl Resolver) -> ApplicationManifest {
    let sub = |value: &Option<String>| value.as_ref().map(|v| substitute(v, vars));

    ApplicationManifest {
      title: sub(&self.title),
      vendor: sub(&self.vendor),
      description: sub(&self.description),
      version: sub(&self.version),
      locale: self.locale.clone(),
      dest_path: sub(&self.dest_path),
      id_filename: sub(&self.id_filename),
      launch_executable: sub(&self.launch_executable),
      launch_arguments: sub(&self.launch_arguments),
      log_path: sub(&self.log_path),
      msg_file_url: sub(&self.msg_file_url),
      config_file_url: sub(&self.config_file_url),
      look_and_feel: sub(&self.look_and_feel),
      files: self
        .files
        .iter()
        .map(|f| FileEntry {
          source_location: f.resolved_source(vars),
          ..f.clone()
        })
        .collect(),
      source_directories: self
        .source_directories
        .iter()
        .map(|d| SourceDirectoryEntry {
          source_location_template: substitute(&d.source_location_template, vars),
          ..d.clone()
        })
        .collect(),
      ..self.clone()
    }
  }

  /// Destination directory with variables substituted.
  pub fn dest_dir(&self, vars: &impl Resolver) -> Option<PathBuf> {
    self
      .dest_path
      .as_deref()
      .map(str::trim)
      .filter(|p| !p.is_empty())
      .map(|p| PathBuf::from(substitute(p, vars)))
  }

  pub fn find_file(&self, path: &str, file_name: &str) -> Option<&FileEntry> {
    let key = EntryKey::new(path, file_name);
    self.files.iter().find(|f| f.path == key.path && f.file_name == key.file_name)
  }

  pub fn find_source_directory(&self, path: &str) -> Option<&SourceDirectoryEntry> {
    let path = RelPath::new(path);
    self.source_directories.iter().find(|d| d.path == path)
  }

  /// Files keyed by identity. The last declaration wins for duplicate keys.
  pub fn file_index(&self) -> HashMap<EntryKey, &FileEntry> {
    self.files.iter().map(|f| (f.key(), f)).collect()
  }

  /// Distinct rollout orders of all file entries, ascending.
  pub fn rollout_orders(&self) -> Vec<i32> {
    let mut orders: Vec<i32> = self.files.iter().map(|f| f.rollout_order).collect();
    orders.sort_unstable();
    orders.dedup();
    orders
  }
}
