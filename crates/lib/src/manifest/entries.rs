use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{EntryKey, ManifestError, RelPath};
use crate::consts::{FILENAME_VARIABLE, MAX_PROGRESS_UNIT};
use crate::placeholder::{Resolver, substitute};
use crate::util::hash::{HashAlgorithm, hash_file};

/// One file of an installation.
///
/// Identity is the [`EntryKey`] (path plus file name). Equality on the struct
/// itself compares every field and is only meaningful for whole-value checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
  pub path: RelPath,
  pub file_name: String,
  /// Hex digest of the content (SHA-256, or legacy 32-character MD5).
  pub content_hash: String,
  pub size_bytes: u64,
  /// Where to fetch the file from; may contain `${...}` variables.
  pub source_location: String,
  /// Expand this file as a zip archive into the destination after placing it.
  pub archive_expand: bool,
  /// Fetch eagerly even when lazy loading is enabled.
  pub always_load: bool,
  /// Contribute this file to the launch classpath.
  pub on_classpath: bool,
  /// Rollout phase; lower orders are processed first.
  pub rollout_order: i32,
}

impl FileEntry {
  /// Builds an entry from declared values. File name and hash must not be empty.
  pub fn new(
    path: &str,
    file_name: impl Into<String>,
    content_hash: impl Into<String>,
    size_bytes: u64,
    source_location: impl Into<String>,
  ) -> Result<Self, ManifestError> {
    let file_name = file_name.into().trim().to_string();
    let content_hash = content_hash.into().trim().to_string();
    let source_location = source_location.into().trim().to_string();

    validate_file_name(&file_name)?;
    if content_hash.is_empty() {
      return Err(ManifestError::MissingField { field: "contentHash" });
    }
    if source_location.is_empty() {
      return Err(ManifestError::MissingField { field: "sourceLocation" });
    }

    Ok(Self {
      path: RelPath::parse(path)?,
      file_name,
      content_hash,
      size_bytes,
      source_location,
      archive_expand: false,
      always_load: false,
      on_classpath: false,
      rollout_order: 0,
    })
  }

  /// Describes a file that exists below `base_dir`, computing its size and digest.
  pub fn from_local(
    base_dir: &Path,
    file: &Path,
    source_location: impl Into<String>,
    algorithm: HashAlgorithm,
  ) -> Result<Self, ManifestError> {
    let outside = || ManifestError::OutsideBase {
      path: file.display().to_string(),
      base: base_dir.display().to_string(),
    };
    let parent = file.parent().ok_or_else(outside)?;
    let path = RelPath::relative_to(base_dir, parent).ok_or_else(outside)?;
    let file_name = file
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .ok_or_else(outside)?;

    let metadata = fs::metadata(file).map_err(|source| ManifestError::Metadata {
      path: file.display().to_string(),
      source,
    })?;
    let hash = hash_file(file, algorithm)?;

    Self::new(path.as_str(), file_name, hash.0, metadata.len(), source_location)
  }

  pub fn with_archive_expand(mut self, value: bool) -> Self {
    self.archive_expand = value;
    self
  }

  pub fn with_always_load(mut self, value: bool) -> Self {
    self.always_load = value;
    self
  }

  pub fn with_on_classpath(mut self, value: bool) -> Self {
    self.on_classpath = value;
    self
  }

  pub fn with_rollout_order(mut self, order: i32) -> Self {
    self.rollout_order = order;
    self
  }

  pub fn key(&self) -> EntryKey {
    EntryKey {
      path: self.path.clone(),
      file_name: self.file_name.clone(),
    }
  }

  /// Destination-relative `path/file` string.
  pub fn relative_path(&self) -> String {
    self.key().to_string()
  }

  /// Native destination of this file below `base`.
  pub fn target_in(&self, base: &Path) -> PathBuf {
    self.path.under(base).join(&self.file_name)
  }

  /// Size as reported to progress consumers, clamped to the largest progress unit.
  pub fn progress_size(&self) -> u64 {
    self.size_bytes.min(MAX_PROGRESS_UNIT)
  }

  /// Must this entry be fetched eagerly under a lazy loading policy?
  pub fn is_eager(&self) -> bool {
    self.always_load || self.on_classpath
  }

  /// Source location with variables substituted.
  pub fn resolved_source(&self, vars: &impl Resolver) -> String {
    substitute(&self.source_location, vars)
  }
}

pub(crate) fn validate_file_name(name: &str) -> Result<(), ManifestError> {
  if name.is_empty() {
    return Err(ManifestError::MissingField { field: "fileName" });
  }
  if name.contains(['/', '\\']) {
    return Err(ManifestError::InvalidFileName {
      name: name.to_string(),
      reason: "contains a path separator",
    });
  }
  if name == "." || name == ".." {
    return Err(ManifestError::InvalidFileName {
      name: name.to_string(),
      reason: "is a relative directory reference",
    });
  }
  Ok(())
}

/// A directory that must exist below the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
  pub path: RelPath,
}

impl DirectoryEntry {
  pub fn new(path: &str) -> Result<Self, ManifestError> {
    if path.trim().is_empty() {
      return Err(ManifestError::MissingField { field: "path" });
    }
    Ok(Self {
      path: RelPath::parse(path)?,
    })
  }

  pub fn target_in(&self, base: &Path) -> PathBuf {
    self.path.under(base)
  }
}

/// A directory whose files can be fetched on demand from a location template.
///
/// The template references the requested file as `${filename}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDirectoryEntry {
  pub path: RelPath,
  pub source_location_template: String,
}

impl SourceDirectoryEntry {
  pub fn new(path: &str, source_location_template: impl Into<String>) -> Result<Self, ManifestError> {
    let template = source_location_template.into().trim().to_string();
    if template.is_empty() {
      return Err(ManifestError::MissingField { field: "sourceLocationTemplate" });
    }
    Ok(Self {
      path: RelPath::parse(path)?,
      source_location_template: template,
    })
  }

  /// Source location of `file_name`, with other variables taken from `vars`.
  pub fn source_for(&self, file_name: &str, vars: &impl Resolver) -> String {
    let with_name = FilenameResolver { file_name, vars };
    substitute(&self.source_location_template, &with_name)
  }
}

struct FilenameResolver<'a, R> {
  file_name: &'a str,
  vars: &'a R,
}

impl<R: Resolver> Resolver for FilenameResolver<'_, R> {
  fn resolve(&self, name: &str) -> Option<&str> {
    if name == FILENAME_VARIABLE {
      Some(self.file_name)
    } else {
      self.vars.resolve(name)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::manifest::OptionMap;
  use crate::util::hash::{HashAlgorithm, hash_bytes};
  use std::fs;
  use tempfile::tempdir;

  #[test]
  fn new_requires_name_and_hash() {
    let err = FileEntry::new("lib", "", "abc", 1, "http://x/a").unwrap_err();
    assert!(matches!(err, ManifestError::MissingField { field: "fileName" }));

    let err = FileEntry::new("lib", "a.jar", "  ", 1, "http://x/a").unwrap_err();
    assert!(matches!(err, ManifestError::MissingField { field: "contentHash" }));

    let err = FileEntry::new("lib", "sub/a.jar", "abc", 1, "http://x/a").unwrap_err();
    assert!(matches!(err, ManifestError::InvalidFileName { .. }));

    let err = FileEntry::new("../lib", "a.jar", "abc", 1, "http://x/a").unwrap_err();
    assert!(matches!(err, ManifestError::UnsafePath { .. }));
  }

  #[test]
  fn defaults_and_builders() {
    let entry = FileEntry::new("/lib/", "a.jar", "abc", 10, "http://x/a.jar").unwrap();
    assert_eq!(entry.path.as_str(), "lib");
    assert!(!entry.archive_expand && !entry.always_load && !entry.on_classpath);
    assert_eq!(entry.rollout_order, 0);
    assert!(!entry.is_eager());

    let entry = entry.with_on_classpath(true).with_rollout_order(3);
    assert!(entry.is_eager());
    assert_eq!(entry.rollout_order, 3);
    assert_eq!(entry.relative_path(), "lib/a.jar");
  }

  #[test]
  fn progress_size_is_clamped() {
    let entry = FileEntry::new("", "big.bin", "abc", u64::MAX, "http://x/big").unwrap();
    assert_eq!(entry.progress_size(), MAX_PROGRESS_UNIT);
  }

  #[test]
  fn from_local_computes_size_and_digest() {
    let temp = tempdir().unwrap();
    fs::create_dir_all(temp.path().join("lib")).unwrap();
    let file = temp.path().join("lib").join("a.jar");
    fs::write(&file, b"jar bytes").unwrap();

    let entry = FileEntry::from_local(temp.path(), &file, "http://x/lib/a.jar", HashAlgorithm::Sha256).unwrap();
    assert_eq!(entry.path.as_str(), "lib");
    assert_eq!(entry.file_name, "a.jar");
    assert_eq!(entry.size_bytes, 9);
    assert_eq!(entry.content_hash, hash_bytes(b"jar bytes", HashAlgorithm::Sha256).0);
  }

  #[test]
  fn from_local_rejects_files_outside_base() {
    let base = tempdir().unwrap();
    let other = tempdir().unwrap();
    let file = other.path().join("x.txt");
    fs::write(&file, b"x").unwrap();

    let err = FileEntry::from_local(base.path(), &file, "http://x", HashAlgorithm::Sha256).unwrap_err();
    assert!(matches!(err, ManifestError::OutsideBase { .. }));
  }

  #[test]
  fn source_directory_substitutes_filename() {
    let dir = SourceDirectoryEntry::new("docs", "${base}/docs/${filename}").unwrap();
    let mut vars = OptionMap::new();
    vars.set("base", "https://example.com");
    assert_eq!(dir.source_for("readme.txt", &vars), "https://example.com/docs/readme.txt");
  }

  #[test]
  fn directory_requires_path() {
    assert!(DirectoryEntry::new(" ").is_err());
    assert_eq!(DirectoryEntry::new("/logs/").unwrap().path.as_str(), "logs");
  }
}
