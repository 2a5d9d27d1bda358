//! XML manifest codec.
//!
//! Reads manifests from bytes, local files or URLs and writes them back in
//! template or resolved form, optionally keeping a backup of the previous file.

pub mod encoding;
mod read;
mod write;

use std::path::Path;

use tracing::{debug, info};

pub use read::{parse_bytes, parse_str};
pub use write::{SerializeMode, backup_path, to_xml, write_file};

use crate::manifest::{ApplicationManifest, ManifestError};

/// Errors raised while reading or writing manifests.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to fetch {url}: {message}")]
  Fetch { url: String, message: String },

  #[error("unsupported encoding '{0}'")]
  UnsupportedEncoding(String),

  #[error("manifest is not valid {encoding}")]
  Decode { encoding: &'static str },

  #[error("malformed XML: {0}")]
  Xml(String),

  #[error("manifest has no root element")]
  MissingRoot,

  #[error("Element '{element}' missing required attribute '{attribute}'!")]
  MissingAttribute { element: String, attribute: String },

  #[error("Element '{element}' has invalid {attribute} '{value}', expected {expected}")]
  InvalidAttribute {
    element: String,
    attribute: String,
    value: String,
    expected: &'static str,
  },

  #[error("invalid value '{value}' for {element}, expected {expected}")]
  InvalidValue {
    element: String,
    value: String,
    expected: &'static str,
  },

  #[error("file '{key}' is declared more than once")]
  DuplicateFile { key: String },

  #[error(transparent)]
  Manifest(#[from] ManifestError),
}

/// Reads and parses a manifest from a local file.
pub fn read_file(path: &Path) -> Result<ApplicationManifest, CodecError> {
  let bytes = std::fs::read(path).map_err(|source| CodecError::Read {
    path: path.display().to_string(),
    source,
  })?;
  debug!(path = %path.display(), bytes = bytes.len(), "read manifest");
  parse_bytes(&bytes)
}

/// Loads a manifest from an `http(s)://` or `file://` URL, or a plain path.
///
/// When the manifest does not name its own config file URL, the location it
/// was loaded from is recorded there.
pub async fn load(location: &str) -> Result<ApplicationManifest, CodecError> {
  let (mut manifest, canonical) = match url::Url::parse(location) {
    Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
      info!(url = %url, "fetching manifest");
      let fetch_err = |e: reqwest::Error| CodecError::Fetch {
        url: url.to_string(),
        message: e.to_string(),
      };
      let response = reqwest::get(url.clone())
        .await
        .and_then(|r| r.error_for_status())
        .map_err(fetch_err)?;
      let bytes = response.bytes().await.map_err(fetch_err)?;
      (parse_bytes(&bytes)?, url.to_string())
    }
    Ok(url) if url.scheme() == "file" => {
      let path = url.to_file_path().map_err(|_| CodecError::Fetch {
        url: url.to_string(),
        message: "not a local file URL".to_string(),
      })?;
      (read_file(&path)?, url.to_string())
    }
    _ => {
      let path = Path::new(location);
      let manifest = read_file(path)?;
      let absolute = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
      let canonical = url::Url::from_file_path(&absolute)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| location.to_string());
      (manifest, canonical)
    }
  };

  if manifest.config_file_url.as_deref().is_none_or(|u| u.trim().is_empty()) {
    manifest.config_file_url = Some(canonical);
  }
  Ok(manifest)
}
