//! Tracing setup for the CLI.
//!
//! Logs always go to stderr. Once a manifest names a log path, the same events
//! are also appended to that file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// A log file that can be attached after the subscriber is installed.
#[derive(Clone, Default)]
pub struct LogFile(Arc<Mutex<Option<File>>>);

impl LogFile {
  /// Starts appending log output to `path`, creating parent directories.
  pub fn attach(&self, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }
    let file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(path)
      .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    if let Ok(mut slot) = self.0.lock() {
      *slot = Some(file);
    }
    Ok(())
  }
}

impl Write for LogFile {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    match self.0.lock() {
      Ok(mut slot) => match slot.as_mut() {
        Some(file) => file.write(buf),
        None => Ok(buf.len()),
      },
      Err(_) => Ok(buf.len()),
    }
  }

  fn flush(&mut self) -> io::Result<()> {
    match self.0.lock() {
      Ok(mut slot) => slot.as_mut().map_or(Ok(()), |file| file.flush()),
      Err(_) => Ok(()),
    }
  }
}

impl<'a> MakeWriter<'a> for LogFile {
  type Writer = LogFile;

  fn make_writer(&'a self) -> Self::Writer {
    self.clone()
  }
}

/// Installs the global subscriber. `RUST_LOG` wins over `verbose`.
pub fn init(verbose: bool) -> LogFile {
  let default = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  let log_file = LogFile::default();

  tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr).without_time())
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(log_file.clone())
        .with_ansi(false),
    )
    .init();

  log_file
}
