use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::mpsc;

use crate::manifest::EntryKey;

/// Progress and outcome notifications for presentation layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
  PhaseStarted {
    order: i32,
    transfers: usize,
  },
  DirectoryCreated {
    path: PathBuf,
  },
  DirectoryExists {
    path: PathBuf,
  },
  DirectoryFailed {
    path: PathBuf,
    message: String,
  },
  FileStarted {
    source: String,
    destination: PathBuf,
    /// 1-based position among all transfers of the run.
    sequence: usize,
    total: usize,
    size: u64,
  },
  Progress {
    destination: PathBuf,
    bytes: u64,
    size: u64,
  },
  FileCopied {
    key: EntryKey,
    destination: PathBuf,
    bytes: u64,
  },
  NotFound {
    source: String,
    destination: PathBuf,
  },
  IntegrityWarning {
    key: EntryKey,
    expected: String,
    actual: String,
  },
  FileDeleted {
    key: EntryKey,
  },
  DeleteFailed {
    key: EntryKey,
    message: String,
  },
  Decompressed {
    key: EntryKey,
    entries: usize,
  },
  PhaseCompleted {
    order: i32,
  },
  Canceled,
}

/// Where events go. A sink without a receiver drops everything.
#[derive(Debug, Clone, Default)]
pub struct EventSink(Option<mpsc::UnboundedSender<TransferEvent>>);

impl EventSink {
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransferEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self(Some(tx)), rx)
  }

  pub fn none() -> Self {
    Self(None)
  }

  pub fn emit(&self, event: TransferEvent) {
    if let Some(tx) = &self.0 {
      // A closed receiver means nobody is listening anymore.
      let _ = tx.send(event);
    }
  }
}

/// Running totals, written by transfer workers and readable from anywhere.
#[derive(Debug, Default)]
pub struct TransferProgress {
  bytes: AtomicU64,
  files: AtomicUsize,
}

impl TransferProgress {
  pub fn add_bytes(&self, bytes: u64) {
    self.bytes.fetch_add(bytes, Ordering::Relaxed);
  }

  pub fn file_done(&self) {
    self.files.fetch_add(1, Ordering::Relaxed);
  }

  pub fn reset(&self) {
    self.bytes.store(0, Ordering::Relaxed);
    self.files.store(0, Ordering::Relaxed);
  }

  pub fn bytes(&self) -> u64 {
    self.bytes.load(Ordering::Relaxed)
  }

  pub fn files(&self) -> usize {
    self.files.load(Ordering::Relaxed)
  }
}
