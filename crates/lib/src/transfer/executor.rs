use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, warn};

use super::fetch::fetch_to;
use super::unpack::unpack_archive;
use super::{
  CancelFlag, EventSink, IntegrityPolicy, TransferConfig, TransferError, TransferEvent, TransferOutcome,
  TransferProgress, TransferReport,
};
use crate::manifest::{EntryKey, FileEntry};
use crate::reconcile::{DeletedEntry, ReconciliationPlan};
use crate::util::hash::hash_file_like;

/// Runs reconciliation plans against the destination they were computed for.
#[derive(Debug, Clone, Default)]
pub struct TransferExecutor {
  config: TransferConfig,
  events: EventSink,
  cancel: CancelFlag,
  progress: Arc<TransferProgress>,
}

/// A finished copy, as reported by a worker.
struct Copied {
  key: EntryKey,
  bytes: u64,
  integrity_warning: bool,
}

/// Shared state handed to every copy worker of a phase.
#[derive(Clone)]
struct CopyContext {
  destination: PathBuf,
  integrity: IntegrityPolicy,
  events: EventSink,
  cancel: CancelFlag,
  halt: Arc<AtomicBool>,
  progress: Arc<TransferProgress>,
  sequence: Arc<AtomicUsize>,
  total: usize,
}

impl TransferExecutor {
  pub fn new(config: TransferConfig) -> Self {
    Self {
      config,
      ..Self::default()
    }
  }

  pub fn with_events(mut self, events: EventSink) -> Self {
    self.events = events;
    self
  }

  pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn config(&self) -> &TransferConfig {
    &self.config
  }

  /// Flag that cancels this executor's runs.
  pub fn cancel_flag(&self) -> CancelFlag {
    self.cancel.clone()
  }

  /// Running totals of the current or most recent run. Reset whenever
  /// [`TransferExecutor::execute`] starts.
  pub fn progress(&self) -> Arc<TransferProgress> {
    self.progress.clone()
  }

  /// Executes `plan` phase by phase.
  ///
  /// Directories are created before the first phase. Each phase copies its new
  /// and changed files, removes its deleted files and expands its archives
  /// before the next phase starts. Returns [`TransferOutcome::Canceled`] when
  /// the cancel flag was raised; the first failing file aborts the run with
  /// an error after in-flight copies of the phase have settled.
  pub async fn execute(&self, plan: &ReconciliationPlan) -> Result<TransferOutcome, TransferError> {
    info!(
      destination = %plan.destination.display(),
      phases = plan.phases.len(),
      transfers = plan.transfer_count(),
      deletions = plan.deleted.len(),
      "executing plan"
    );

    self.progress.reset();
    let mut report = TransferReport::default();
    if self.cancel.is_canceled() {
      return Ok(self.canceled(report));
    }

    self.create_directories(plan);

    let sequence = Arc::new(AtomicUsize::new(0));
    for &order in &plan.phases {
      if self.cancel.is_canceled() {
        return Ok(self.canceled(report));
      }

      let copies: Vec<FileEntry> = plan.new_in(order).chain(plan.changed_in(order)).cloned().collect();
      info!(order, transfers = copies.len(), "starting phase");
      self.events.emit(TransferEvent::PhaseStarted {
        order,
        transfers: copies.len(),
      });

      let context = CopyContext {
        destination: plan.destination.clone(),
        integrity: self.config.integrity,
        events: self.events.clone(),
        cancel: self.cancel.clone(),
        halt: Arc::new(AtomicBool::new(false)),
        progress: self.progress.clone(),
        sequence: sequence.clone(),
        total: plan.transfer_count(),
      };
      self.copy_phase(context, copies, &mut report).await?;

      for deleted in plan.deleted_in(order) {
        if self.cancel.is_canceled() {
          return Ok(self.canceled(report));
        }
        self.delete(&plan.destination, deleted, &mut report);
      }

      for archive in plan.decompress_in(order) {
        if self.cancel.is_canceled() {
          return Ok(self.canceled(report));
        }
        self.decompress(&plan.destination, archive, &mut report).await?;
      }

      if self.cancel.is_canceled() {
        return Ok(self.canceled(report));
      }
      report.phases_completed.push(order);
      self.events.emit(TransferEvent::PhaseCompleted { order });
    }

    info!(
      copied = report.copied.len(),
      deleted = report.deleted.len(),
      decompressed = report.decompressed.len(),
      bytes = report.bytes,
      "plan executed"
    );
    Ok(TransferOutcome::Completed(report))
  }

  fn canceled(&self, report: TransferReport) -> TransferOutcome {
    warn!(copied = report.copied.len(), "transfer canceled");
    self.events.emit(TransferEvent::Canceled);
    TransferOutcome::Canceled(report)
  }

  fn create_directories(&self, plan: &ReconciliationPlan) {
    for dir in &plan.directories {
      let path = dir.target_in(&plan.destination);
      if path.is_dir() {
        debug!(path = %path.display(), "directory already exists");
        self.events.emit(TransferEvent::DirectoryExists { path });
        continue;
      }
      match std::fs::create_dir_all(&path) {
        Ok(()) => {
          info!(path = %path.display(), "created directory");
          self.events.emit(TransferEvent::DirectoryCreated { path });
        }
        Err(e) => {
          warn!(path = %path.display(), error = %e, "failed to create directory");
          self.events.emit(TransferEvent::DirectoryFailed {
            path,
            message: e.to_string(),
          });
        }
      }
    }
  }

  /// Copies one phase's files through a bounded worker pool.
  async fn copy_phase(
    &self,
    context: CopyContext,
    copies: Vec<FileEntry>,
    report: &mut TransferReport,
  ) -> Result<(), TransferError> {
    let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
    let mut join_set = JoinSet::new();

    for entry in copies {
      let context = context.clone();
      let semaphore = semaphore.clone();

      let task = async move {
        let _permit = semaphore
          .acquire_owned()
          .await
          .map_err(|e| TransferError::Task(e.to_string()))?;
        if context.cancel.is_canceled() || context.halt.load(Ordering::SeqCst) {
          return Ok(None);
        }
        let result = copy_file(&context, &entry).await;
        if result.is_err() {
          context.halt.store(true, Ordering::SeqCst);
        }
        result.map(Some)
      };
      join_set.spawn(task.in_current_span());
    }

    let mut first_error = None;
    while let Some(joined) = join_set.join_next().await {
      match joined {
        Ok(Ok(Some(copied))) => {
          report.bytes += copied.bytes;
          if copied.integrity_warning {
            report.integrity_warnings.push(copied.key.clone());
          }
          report.copied.push(copied.key);
        }
        Ok(Ok(None)) => {}
        Ok(Err(e)) => {
          error!(error = %e, "transfer failed");
          first_error.get_or_insert(e);
        }
        Err(e) => {
          error!(error = %e, "transfer task panicked");
          first_error.get_or_insert(TransferError::Task(e.to_string()));
        }
      }
    }

    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  fn delete(&self, destination: &Path, deleted: &DeletedEntry, report: &mut TransferReport) {
    let target = deleted.key.under(destination);
    match std::fs::remove_file(&target) {
      Ok(()) => {
        info!(file = %deleted.key, "deleted");
        report.deleted.push(deleted.key.clone());
        self.events.emit(TransferEvent::FileDeleted {
          key: deleted.key.clone(),
        });
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(file = %deleted.key, "already absent");
      }
      Err(e) => {
        warn!(file = %deleted.key, error = %e, "delete failed");
        self.events.emit(TransferEvent::DeleteFailed {
          key: deleted.key.clone(),
          message: e.to_string(),
        });
      }
    }
  }

  async fn decompress(
    &self,
    destination: &Path,
    entry: &FileEntry,
    report: &mut TransferReport,
  ) -> Result<(), TransferError> {
    let archive = entry.target_in(destination);
    let destination = destination.to_path_buf();
    let limit = self.config.max_entry_size;

    let entries = tokio::task::spawn_blocking(move || unpack_archive(&archive, &destination, limit))
      .await
      .map_err(|e| TransferError::Task(e.to_string()))??;

    report.decompressed.push(entry.key());
    self.events.emit(TransferEvent::Decompressed {
      key: entry.key(),
      entries,
    });
    Ok(())
  }
}

async fn copy_file(context: &CopyContext, entry: &FileEntry) -> Result<Copied, TransferError> {
  let target = entry.target_in(&context.destination);
  let size = entry.progress_size();
  let sequence = context.sequence.fetch_add(1, Ordering::SeqCst) + 1;

  info!(file = %entry.relative_path(), source = %entry.source_location, sequence, total = context.total, "copying");
  context.events.emit(TransferEvent::FileStarted {
    source: entry.source_location.clone(),
    destination: target.clone(),
    sequence,
    total: context.total,
    size,
  });

  let events = context.events.clone();
  let progress = context.progress.clone();
  let progress_target = target.clone();
  let mut reported = 0u64;
  let fetched = fetch_to(&entry.source_location, &target, move |bytes| {
    progress.add_bytes(bytes - reported);
    reported = bytes;
    events.emit(TransferEvent::Progress {
      destination: progress_target.clone(),
      bytes,
      size,
    });
  })
  .await;

  let bytes = match fetched {
    Ok(bytes) => bytes,
    Err(e) => {
      if matches!(e, TransferError::NotFound { .. }) {
        context.events.emit(TransferEvent::NotFound {
          source: entry.source_location.clone(),
          destination: target.clone(),
        });
      }
      return Err(e);
    }
  };
  context.progress.file_done();

  let integrity_warning = verify(entry, &target, context.integrity, &context.events).await?;
  context.events.emit(TransferEvent::FileCopied {
    key: entry.key(),
    destination: target,
    bytes,
  });

  Ok(Copied {
    key: entry.key(),
    bytes,
    integrity_warning,
  })
}

/// Recomputes the digest of a placed file. Returns whether a tolerated
/// mismatch was found.
pub(crate) async fn verify(
  entry: &FileEntry,
  target: &Path,
  policy: IntegrityPolicy,
  events: &EventSink,
) -> Result<bool, TransferError> {
  let path = target.to_path_buf();
  let declared = entry.content_hash.clone();
  let actual = tokio::task::spawn_blocking(move || hash_file_like(&path, &declared))
    .await
    .map_err(|e| TransferError::Task(e.to_string()))??;

  if actual.matches(&entry.content_hash) {
    return Ok(false);
  }

  match policy {
    IntegrityPolicy::Warn => {
      warn!(
        file = %entry.relative_path(),
        expected = %entry.content_hash,
        actual = %actual,
        "content hash mismatch after copy"
      );
      events.emit(TransferEvent::IntegrityWarning {
        key: entry.key(),
        expected: entry.content_hash.clone(),
        actual: actual.0,
      });
      Ok(true)
    }
    IntegrityPolicy::Fail => Err(TransferError::IntegrityMismatch {
      path: target.display().to_string(),
      expected: entry.content_hash.clone(),
      actual: actual.0,
    }),
  }
}
