//! Execution of a reconciliation plan.
//!
//! The [`TransferExecutor`] walks a plan phase by phase (ascending rollout
//! order). Within a phase it fetches new then changed files through a bounded
//! worker pool, removes deleted files and finally expands archives. A phase is
//! a full barrier: nothing of a later phase starts before every operation of
//! the current one has finished.
//!
//! Progress and outcomes are reported as [`TransferEvent`]s. A shared
//! [`CancelFlag`] is checked between file-level operations; a canceled run
//! returns [`TransferOutcome::Canceled`] rather than an error.
//!
//! The [`FileLoader`] fetches single files on demand, for entries deferred by
//! lazy loading or served from a source directory.

mod events;
mod executor;
mod fetch;
mod loader;
mod unpack;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

pub use events::*;
pub use executor::TransferExecutor;
pub use fetch::{Source, fetch_to};
pub use loader::FileLoader;
pub use unpack::unpack_archive;

use crate::consts::{DEFAULT_PARALLELISM, MAX_PROGRESS_UNIT};
use crate::manifest::{EntryKey, ManifestError};
use crate::util::hash::HashError;

/// Errors raised while transferring files.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
  #[error("source not found: {location}")]
  NotFound { location: String },

  #[error("failed to fetch {location}: {message}")]
  Fetch { location: String, message: String },

  #[error("I/O error on {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("archive {archive} contains unsafe entry '{entry}'")]
  UnsafeArchivePath { archive: String, entry: String },

  #[error("archive {archive} entry '{entry}' exceeds the {limit} byte limit")]
  EntryTooLarge { archive: String, entry: String, limit: u64 },

  #[error("failed to read archive {archive}: {message}")]
  Archive { archive: String, message: String },

  #[error("integrity check failed for {path}: expected {expected}, got {actual}")]
  IntegrityMismatch {
    path: String,
    expected: String,
    actual: String,
  },

  #[error("Unknown file! {key}")]
  NotDeclared { key: String },

  #[error(transparent)]
  InvalidKey(#[from] ManifestError),

  #[error("failed to delete {path}: {source}")]
  Delete {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("transfer task failed: {0}")]
  Task(String),
}

impl TransferError {
  pub(crate) fn io(path: &std::path::Path) -> impl Fn(std::io::Error) -> TransferError + '_ {
    move |source| TransferError::Io {
      path: path.display().to_string(),
      source,
    }
  }
}

/// What to do when a placed file's digest differs from the declared one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityPolicy {
  /// Log and report the mismatch, keep going.
  #[default]
  Warn,
  /// Fail the transfer.
  Fail,
}

/// Execution configuration.
#[derive(Debug, Clone)]
pub struct TransferConfig {
  /// Maximum number of concurrent fetches within a phase.
  pub parallelism: usize,
  pub integrity: IntegrityPolicy,
  /// Largest archive entry that may be expanded.
  pub max_entry_size: u64,
}

impl Default for TransferConfig {
  fn default() -> Self {
    Self {
      parallelism: DEFAULT_PARALLELISM,
      integrity: IntegrityPolicy::default(),
      max_entry_size: MAX_PROGRESS_UNIT,
    }
  }
}

/// Cooperative cancellation shared between the initiator and the executor.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_canceled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// What a run did, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReport {
  pub copied: Vec<EntryKey>,
  pub deleted: Vec<EntryKey>,
  pub decompressed: Vec<EntryKey>,
  pub integrity_warnings: Vec<EntryKey>,
  pub bytes: u64,
  pub phases_completed: Vec<i32>,
}

/// Result of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "report", rename_all = "lowercase")]
pub enum TransferOutcome {
  Completed(TransferReport),
  Canceled(TransferReport),
}

impl TransferOutcome {
  pub fn report(&self) -> &TransferReport {
    match self {
      TransferOutcome::Completed(report) | TransferOutcome::Canceled(report) => report,
    }
  }

  pub fn is_canceled(&self) -> bool {
    matches!(self, TransferOutcome::Canceled(_))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cancel_flag_is_shared_between_clones() {
    let flag = CancelFlag::new();
    let observer = flag.clone();
    assert!(!observer.is_canceled());
    flag.cancel();
    assert!(observer.is_canceled());
  }

  #[test]
  fn default_config() {
    let config = TransferConfig::default();
    assert_eq!(config.integrity, IntegrityPolicy::Warn);
    assert_eq!(config.max_entry_size, i32::MAX as u64);
    assert!(config.parallelism >= 1);
  }

  #[test]
  fn outcome_exposes_report() {
    let outcome = TransferOutcome::Canceled(TransferReport {
      bytes: 7,
      ..TransferReport::default()
    });
    assert!(outcome.is_canceled());
    assert_eq!(outcome.report().bytes, 7);
  }

  #[test]
  fn outcome_serializes_with_status_tag() {
    let json = serde_json::to_value(TransferOutcome::Completed(TransferReport::default())).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["report"]["bytes"], 0);
  }
}
