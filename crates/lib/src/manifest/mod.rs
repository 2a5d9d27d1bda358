//! Typed application manifest.
//!
//! A manifest describes one application: its settings, the files that make up
//! an installation, the directories to create and the directories files may be
//! fetched from on demand. Values are kept raw; variable substitution happens
//! against an explicit [`OptionMap`] when a caller needs resolved values.

mod application;
mod entries;
mod options;
mod path;

pub use application::*;
pub use entries::*;
pub use options::*;
pub use path::*;

use crate::util::hash::HashError;

/// Errors raised while building or validating manifest values.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
  #[error("{field} is required")]
  MissingField { field: &'static str },

  #[error("invalid file name '{name}': {reason}")]
  InvalidFileName { name: String, reason: &'static str },

  #[error("path '{path}' escapes the destination directory")]
  UnsafePath { path: String },

  #[error("file '{key}' is declared more than once")]
  DuplicateFile { key: String },

  #[error("lazy loading requires a non-empty config file URL")]
  LazyLoadingWithoutConfigUrl,

  #[error("{path} is not inside {base}")]
  OutsideBase { path: String, base: String },

  #[error("failed to read metadata of {path}: {source}")]
  Metadata {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Hash(#[from] HashError),
}
