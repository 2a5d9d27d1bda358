//! Reconciliation of a manifest against a destination directory.
//!
//! [`reconcile`] classifies every declared file as new, changed or unchanged
//! by looking at the destination and comparing content digests. Files that
//! should be removed are never guessed from a directory listing: they are
//! supplied by the caller, typically from [`deleted_since`] (a diff against
//! the previously installed manifest) or, opt-in, from [`scan_orphans`].

mod plan;
mod snapshot;

use std::path::Path;

use tracing::{debug, info};

pub use plan::*;
pub use snapshot::*;

use crate::manifest::{ApplicationManifest, FileEntry, OptionMap};
use crate::util::hash::{HashError, hash_file_like};

/// Errors raised while computing a plan.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
  #[error("failed to inspect {path}: {source}")]
  Inspect {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("failed to scan destination: {message}")]
  Scan { message: String },
}

/// Inputs that shape a plan besides the manifest itself.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
  /// Defer files that are neither `always_load` nor `on_classpath`.
  pub lazy_loading: bool,
  /// Files to remove from the destination.
  pub deleted: Vec<DeletedEntry>,
  /// Values substituted into source locations.
  pub variables: OptionMap,
}

impl ReconcileOptions {
  /// Options that follow the manifest's own lazy loading setting.
  pub fn for_manifest(manifest: &ApplicationManifest, variables: OptionMap) -> Self {
    Self {
      lazy_loading: manifest.lazy_loading,
      deleted: Vec::new(),
      variables,
    }
  }

  pub fn with_deleted(mut self, deleted: Vec<DeletedEntry>) -> Self {
    self.deleted = deleted;
    self
  }
}

/// Compares `manifest` against `destination` and returns the classified plan.
///
/// Entries keep their declaration order inside each classification. Source
/// locations in the plan have their variables substituted.
pub fn reconcile(
  manifest: &ApplicationManifest,
  destination: &Path,
  options: &ReconcileOptions,
) -> Result<ReconciliationPlan, ReconcileError> {
  let mut plan = ReconciliationPlan {
    destination: destination.to_path_buf(),
    directories: manifest.directories.clone(),
    deleted: options.deleted.clone(),
    ..ReconciliationPlan::default()
  };

  for declared in &manifest.files {
    if options.lazy_loading && !declared.is_eager() {
      debug!(file = %declared.relative_path(), "deferred by lazy loading");
      continue;
    }

    let entry = FileEntry {
      source_location: declared.resolved_source(&options.variables),
      ..declared.clone()
    };
    if entry.on_classpath {
      plan.classpath.push(entry.clone());
    }
    plan.phases.push(entry.rollout_order);

    let target = entry.target_in(destination);
    let metadata = match std::fs::metadata(&target) {
      Ok(metadata) => Some(metadata),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
      Err(source) => {
        return Err(ReconcileError::Inspect {
          path: target.display().to_string(),
          source,
        });
      }
    };

    match metadata {
      Some(metadata) if metadata.is_file() => {
        let actual = hash_file_like(&target, &entry.content_hash)?;
        if actual.matches(&entry.content_hash) {
          plan.unchanged_files.push(entry);
        } else {
          debug!(file = %entry.relative_path(), expected = %entry.content_hash, actual = %actual, "content changed");
          if entry.archive_expand {
            plan.decompress_files.push(entry.clone());
          }
          plan.changed_files.push(entry);
        }
      }
      _ => {
        if entry.archive_expand {
          plan.decompress_files.push(entry.clone());
        }
        plan.new_files.push(entry);
      }
    }
  }

  for deleted in &plan.deleted {
    plan.phases.push(deleted.rollout_order);
  }
  plan.phases.sort_unstable();
  plan.phases.dedup();

  info!(
    new = plan.new_files.len(),
    changed = plan.changed_files.len(),
    unchanged = plan.unchanged_files.len(),
    deleted = plan.deleted.len(),
    phases = plan.phases.len(),
    "reconciled manifest against destination"
  );

  Ok(plan)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::manifest::EntryKey;
  use crate::util::testutil::{entry_for, manifest_with, write_file};
  use tempfile::tempdir;

  #[test]
  fn classifies_new_changed_and_unchanged() {
    let source = tempdir().unwrap();
    let dest = tempdir().unwrap();
    let same = entry_for(source.path(), "lib", "same.jar", b"same");
    let changed = entry_for(source.path(), "lib", "changed.jar", b"new content");
    let missing = entry_for(source.path(), "", "missing.txt", b"missing");
    write_file(dest.path(), "lib/same.jar", b"same");
    write_file(dest.path(), "lib/changed.jar", b"old content");

    let manifest = manifest_with(vec![same, changed, missing]);
    let plan = reconcile(&manifest, dest.path(), &ReconcileOptions::default()).unwrap();

    let names = |files: &[FileEntry]| files.iter().map(|f| f.file_name.clone()).collect::<Vec<_>>();
    assert_eq!(names(&plan.new_files), vec!["missing.txt"]);
    assert_eq!(names(&plan.changed_files), vec!["changed.jar"]);
    assert_eq!(names(&plan.unchanged_files), vec!["same.jar"]);
    assert!(plan.is_update_necessary());
  }

  #[test]
  fn empty_destination_makes_everything_new() {
    let source = tempdir().unwrap();
    let dest = tempdir().unwrap();
    let app = entry_for(source.path(), "lib", "app.jar", b"application bytes");

    let manifest = manifest_with(vec![app]);
    let plan = reconcile(&manifest, &dest.path().join("not-yet-created"), &ReconcileOptions::default()).unwrap();

    assert_eq!(plan.new_files.len(), 1);
    assert!(plan.changed_files.is_empty() && plan.unchanged_files.is_empty());
    assert!(plan.decompress_files.is_empty());
    assert_eq!(plan.phases, vec![0]);
  }

  #[test]
  fn unchanged_only_needs_no_update() {
    let source = tempdir().unwrap();
    let dest = tempdir().unwrap();
    let app = entry_for(source.path(), "", "app.jar", b"bytes");
    write_file(dest.path(), "app.jar", b"bytes");

    let plan = reconcile(&manifest_with(vec![app]), dest.path(), &ReconcileOptions::default()).unwrap();
    assert!(!plan.is_update_necessary());
  }

  #[test]
  fn deleted_entries_trigger_update() {
    let dest = tempdir().unwrap();
    let options = ReconcileOptions::default().with_deleted(vec![DeletedEntry::new(EntryKey::new("lib", "old.jar"), 3)]);

    let plan = reconcile(&manifest_with(Vec::new()), dest.path(), &options).unwrap();
    assert!(plan.is_update_necessary());
    assert_eq!(plan.phases, vec![3]);
  }

  #[test]
  fn lazy_loading_skips_optional_files() {
    let source = tempdir().unwrap();
    let dest = tempdir().unwrap();
    let optional = entry_for(source.path(), "docs", "manual.pdf", b"pdf");
    let always = entry_for(source.path(), "", "launcher.exe", b"exe").with_always_load(true);
    let classpath = entry_for(source.path(), "lib", "core.jar", b"jar").with_on_classpath(true);

    let manifest = manifest_with(vec![optional, always, classpath]);
    let options = ReconcileOptions {
      lazy_loading: true,
      ..ReconcileOptions::default()
    };
    let plan = reconcile(&manifest, dest.path(), &options).unwrap();

    let names: Vec<_> = plan.new_files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(names, vec!["launcher.exe", "core.jar"]);
  }

  #[test]
  fn archives_are_decompressed_only_when_placed() {
    let source = tempdir().unwrap();
    let dest = tempdir().unwrap();
    let fresh = entry_for(source.path(), "", "fresh.zip", b"zip1").with_archive_expand(true);
    let stale = entry_for(source.path(), "", "stale.zip", b"zip2").with_archive_expand(true);
    let current = entry_for(source.path(), "", "current.zip", b"zip3").with_archive_expand(true);
    write_file(dest.path(), "stale.zip", b"old");
    write_file(dest.path(), "current.zip", b"zip3");

    let manifest = manifest_with(vec![fresh, stale, current]);
    let plan = reconcile(&manifest, dest.path(), &ReconcileOptions::default()).unwrap();

    let names: Vec<_> = plan.decompress_files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(names, vec!["fresh.zip", "stale.zip"]);
  }

  #[test]
  fn phases_are_distinct_and_sorted() {
    let source = tempdir().unwrap();
    let dest = tempdir().unwrap();
    let files = vec![
      entry_for(source.path(), "", "c", b"c").with_rollout_order(2),
      entry_for(source.path(), "", "a", b"a"),
      entry_for(source.path(), "", "b", b"b").with_rollout_order(-1),
      entry_for(source.path(), "", "d", b"d").with_rollout_order(2),
    ];

    let plan = reconcile(&manifest_with(files), dest.path(), &ReconcileOptions::default()).unwrap();
    assert_eq!(plan.phases, vec![-1, 0, 2]);
    assert_eq!(plan.new_in(2).count(), 2);
  }

  #[test]
  fn legacy_md5_digests_are_honored() {
    let dest = tempdir().unwrap();
    write_file(dest.path(), "hello.txt", b"hello world");
    let entry = FileEntry::new("", "hello.txt", "5EB63BBBE01EEED093CB22BB8F5ACDC3", 11, "https://x/hello.txt").unwrap();

    let plan = reconcile(&manifest_with(vec![entry]), dest.path(), &ReconcileOptions::default()).unwrap();
    assert_eq!(plan.unchanged_files.len(), 1);
  }

  #[test]
  fn source_locations_are_resolved() {
    let dest = tempdir().unwrap();
    let entry = FileEntry::new("", "a.jar", "abc", 1, "${base}/a.jar").unwrap();
    let options = ReconcileOptions {
      variables: [("base", "https://cdn.example.com")].into_iter().collect(),
      ..ReconcileOptions::default()
    };

    let plan = reconcile(&manifest_with(vec![entry]), dest.path(), &options).unwrap();
    assert_eq!(plan.new_files[0].source_location, "https://cdn.example.com/a.jar");
  }
}
