use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::manifest::{DirectoryEntry, EntryKey, FileEntry};

/// A destination file scheduled for removal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeletedEntry {
  pub key: EntryKey,
  /// Phase in which the file is removed.
  pub rollout_order: i32,
}

impl DeletedEntry {
  pub fn new(key: EntryKey, rollout_order: i32) -> Self {
    Self { key, rollout_order }
  }

  /// Parses caller-supplied `path/file` strings. Blank entries are skipped.
  pub fn from_relative_paths<S: AsRef<str>>(paths: &[S], rollout_order: i32) -> Vec<Self> {
    paths
      .iter()
      .filter_map(|p| EntryKey::parse(p.as_ref()))
      .map(|key| Self::new(key, rollout_order))
      .collect()
  }
}

/// The outcome of comparing a manifest with a destination directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
  pub destination: PathBuf,
  /// Declared but missing from the destination.
  pub new_files: Vec<FileEntry>,
  /// Present with a different digest.
  pub changed_files: Vec<FileEntry>,
  /// Present with the declared digest.
  pub unchanged_files: Vec<FileEntry>,
  /// Caller-supplied removals.
  pub deleted: Vec<DeletedEntry>,
  /// New or changed archives to expand after placement.
  pub decompress_files: Vec<FileEntry>,
  /// Reconciled entries that contribute to the classpath, in declaration order.
  pub classpath: Vec<FileEntry>,
  pub directories: Vec<DirectoryEntry>,
  /// Distinct rollout orders, ascending.
  pub phases: Vec<i32>,
}

fn in_order(files: &[FileEntry], order: i32) -> impl Iterator<Item = &FileEntry> {
  files.iter().filter(move |f| f.rollout_order == order)
}

impl ReconciliationPlan {
  pub fn new_in(&self, order: i32) -> impl Iterator<Item = &FileEntry> {
    in_order(&self.new_files, order)
  }

  pub fn changed_in(&self, order: i32) -> impl Iterator<Item = &FileEntry> {
    in_order(&self.changed_files, order)
  }

  pub fn unchanged_in(&self, order: i32) -> impl Iterator<Item = &FileEntry> {
    in_order(&self.unchanged_files, order)
  }

  pub fn decompress_in(&self, order: i32) -> impl Iterator<Item = &FileEntry> {
    in_order(&self.decompress_files, order)
  }

  pub fn deleted_in(&self, order: i32) -> impl Iterator<Item = &DeletedEntry> {
    self.deleted.iter().filter(move |d| d.rollout_order == order)
  }

  /// Whether running the plan would change the destination.
  pub fn is_update_necessary(&self) -> bool {
    self.new_files.len() + self.changed_files.len() + self.deleted.len() > 0
  }

  /// Number of files that will be transferred.
  pub fn transfer_count(&self) -> usize {
    self.new_files.len() + self.changed_files.len()
  }

  /// Total declared bytes of all transfers.
  pub fn transfer_bytes(&self) -> u64 {
    self
      .new_files
      .iter()
      .chain(&self.changed_files)
      .map(FileEntry::progress_size)
      .sum()
  }

  /// Classpath string: each entry's relative path, quoted, joined by the
  /// platform path-list separator.
  pub fn classpath_string(&self) -> String {
    build_classpath(&self.classpath)
  }
}

#[cfg(windows)]
pub const PATH_LIST_SEPARATOR: &str = ";";

#[cfg(not(windows))]
pub const PATH_LIST_SEPARATOR: &str = ":";

/// Joins the relative paths of `entries` into a classpath string.
pub fn build_classpath<'a>(entries: impl IntoIterator<Item = &'a FileEntry>) -> String {
  entries
    .into_iter()
    .map(|f| format!("\"{}\"", f.relative_path()))
    .collect::<Vec<_>>()
    .join(PATH_LIST_SEPARATOR)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn file(path: &str, name: &str, order: i32) -> FileEntry {
    FileEntry::new(path, name, "abc", 10, "https://x")
      .unwrap()
      .with_rollout_order(order)
  }

  #[test]
  fn classpath_is_quoted_and_joined() {
    let entries = [file("lib", "a.jar", 0), file("", "app.jar", 0)];
    let expected = format!("\"lib/a.jar\"{}\"app.jar\"", PATH_LIST_SEPARATOR);
    assert_eq!(build_classpath(&entries), expected);
    assert_eq!(build_classpath(std::iter::empty()), "");
  }

  #[test]
  fn filters_by_phase() {
    let plan = ReconciliationPlan {
      new_files: vec![file("", "a", 0), file("", "b", 1)],
      changed_files: vec![file("", "c", 1)],
      deleted: vec![DeletedEntry::new(EntryKey::new("", "d"), 1)],
      phases: vec![0, 1],
      ..ReconciliationPlan::default()
    };

    assert_eq!(plan.new_in(0).count(), 1);
    assert_eq!(plan.new_in(1).count(), 1);
    assert_eq!(plan.changed_in(1).count(), 1);
    assert_eq!(plan.deleted_in(1).count(), 1);
    assert_eq!(plan.deleted_in(0).count(), 0);
    assert_eq!(plan.transfer_count(), 3);
    assert_eq!(plan.transfer_bytes(), 30);
  }

  #[test]
  fn parses_deleted_paths() {
    let deleted = DeletedEntry::from_relative_paths(&["lib/old.jar", " ", "/readme.txt"], 0);
    let keys: Vec<String> = deleted.iter().map(|d| d.key.to_string()).collect();
    assert_eq!(keys, vec!["lib/old.jar", "readme.txt"]);
  }
}
