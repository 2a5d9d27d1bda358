use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::executor::verify;
use super::fetch::fetch_to;
use super::{EventSink, IntegrityPolicy, TransferError, TransferEvent};
use crate::manifest::{ApplicationManifest, EntryKey, OptionMap};
use crate::util::hash::hash_file_like;

/// On-demand retrieval of single files, outside of a bulk plan.
///
/// A request is resolved against the declared files first and then against
/// the source directories. Declared files are only fetched when missing or
/// changed and are verified afterwards; files from a source directory have no
/// digest and are always fetched.
pub struct FileLoader<'a> {
  manifest: &'a ApplicationManifest,
  variables: &'a OptionMap,
  destination: PathBuf,
  integrity: IntegrityPolicy,
  events: EventSink,
}

impl<'a> FileLoader<'a> {
  pub fn new(manifest: &'a ApplicationManifest, variables: &'a OptionMap, destination: impl Into<PathBuf>) -> Self {
    Self {
      manifest,
      variables,
      destination: destination.into(),
      integrity: IntegrityPolicy::default(),
      events: EventSink::none(),
    }
  }

  pub fn with_integrity(mut self, integrity: IntegrityPolicy) -> Self {
    self.integrity = integrity;
    self
  }

  pub fn with_events(mut self, events: EventSink) -> Self {
    self.events = events;
    self
  }

  pub fn destination(&self) -> &Path {
    &self.destination
  }

  /// Makes `path/file_name` available in the destination and returns its
  /// location there.
  pub async fn load_file(&self, path: &str, file_name: &str) -> Result<PathBuf, TransferError> {
    let key = EntryKey::checked(path, file_name)?;
    if let Some(entry) = self.manifest.find_file(path, file_name) {
      let target = entry.target_in(&self.destination);
      if target.is_file() && hash_file_like(&target, &entry.content_hash)?.matches(&entry.content_hash) {
        debug!(file = %entry.relative_path(), "already current");
        return Ok(target);
      }

      let source = entry.resolved_source(self.variables);
      info!(file = %entry.relative_path(), source = %source, "loading declared file");
      let bytes = self.fetch(&source, &target, entry.progress_size()).await?;
      verify(entry, &target, self.integrity, &self.events).await?;
      self.events.emit(TransferEvent::FileCopied {
        key: entry.key(),
        destination: target.clone(),
        bytes,
      });
      return Ok(target);
    }

    if let Some(dir) = self.manifest.find_source_directory(path) {
      let target = key.under(&self.destination);
      let source = dir.source_for(&key.file_name, self.variables);
      info!(file = %key, source = %source, "loading file from source directory");
      let bytes = self.fetch(&source, &target, 0).await?;
      self.events.emit(TransferEvent::FileCopied {
        key,
        destination: target.clone(),
        bytes,
      });
      return Ok(target);
    }

    Err(TransferError::NotDeclared { key: key.to_string() })
  }

  async fn fetch(&self, source: &str, target: &Path, size: u64) -> Result<u64, TransferError> {
    self.events.emit(TransferEvent::FileStarted {
      source: source.to_string(),
      destination: target.to_path_buf(),
      sequence: 1,
      total: 1,
      size,
    });

    let events = self.events.clone();
    let progress_target = target.to_path_buf();
    let result = fetch_to(source, target, move |bytes| {
      events.emit(TransferEvent::Progress {
        destination: progress_target.clone(),
        bytes,
        size,
      });
    })
    .await;

    if let Err(TransferError::NotFound { .. }) = &result {
      self.events.emit(TransferEvent::NotFound {
        source: source.to_string(),
        destination: target.to_path_buf(),
      });
    }
    result
  }

  /// Removes `path/file_name` from the destination. Returns whether a file
  /// was removed. Keys reaching outside the destination are rejected.
  pub fn delete_file(&self, path: &str, file_name: &str) -> Result<bool, TransferError> {
    let key = EntryKey::checked(path, file_name)?;
    let removed = remove(&key.under(&self.destination))?;
    if removed {
      self.events.emit(TransferEvent::FileDeleted { key });
    }
    Ok(removed)
  }

  /// Removes a file given by its destination-relative `path/file` string.
  pub fn delete_path(&self, relative: &str) -> Result<bool, TransferError> {
    match EntryKey::parse(relative) {
      Some(key) => self.delete_file(key.path.as_str(), &key.file_name),
      None => Ok(false),
    }
  }
}

fn remove(target: &Path) -> Result<bool, TransferError> {
  match std::fs::remove_file(target) {
    Ok(()) => {
      info!(path = %target.display(), "deleted");
      Ok(true)
    }
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
    Err(source) => {
      warn!(path = %target.display(), error = %source, "delete failed");
      Err(TransferError::Delete {
        path: target.display().to_string(),
        source,
      })
    }
  }
}
