use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::InstallError;
use crate::consts::{APP_NAME, PROGRAM_DIRECTORY_KEY};

/// Key/value file outside the destination that remembers where an
/// application was installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallMarker {
  path: PathBuf,
}

impl InstallMarker {
  /// Marker named `id_filename` inside `marker_dir`.
  pub fn new(marker_dir: &Path, id_filename: &str) -> Self {
    Self {
      path: marker_dir.join(id_filename.trim()),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// The recorded destination, or `None` when no marker exists yet.
  pub fn read(&self) -> Result<Option<PathBuf>, InstallError> {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(source) => {
        return Err(InstallError::Marker {
          path: self.path.display().to_string(),
          source,
        });
      }
    };

    let directory = content
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
      .filter_map(|line| line.split_once('='))
      .find(|(key, _)| key.trim() == PROGRAM_DIRECTORY_KEY)
      .map(|(_, value)| PathBuf::from(value.trim()));

    match directory {
      Some(directory) => {
        debug!(marker = %self.path.display(), destination = %directory.display(), "found install marker");
        Ok(Some(directory))
      }
      None => Err(InstallError::MarkerKey {
        path: self.path.display().to_string(),
        key: PROGRAM_DIRECTORY_KEY,
      }),
    }
  }

  /// Records `destination`, replacing any previous marker.
  pub fn write(&self, destination: &Path) -> Result<(), InstallError> {
    let marker_err = |source| InstallError::Marker {
      path: self.path.display().to_string(),
      source,
    };
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent).map_err(marker_err)?;
    }
    let content = format!(
      "# --- DO NOT EDIT OR DELETE --- Generated by {} ---\n{}={}\n",
      APP_NAME,
      PROGRAM_DIRECTORY_KEY,
      destination.display()
    );
    fs::write(&self.path, content).map_err(marker_err)?;
    info!(marker = %self.path.display(), destination = %destination.display(), "wrote install marker");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn missing_marker_means_first_install() {
    let temp = tempdir().unwrap();
    assert_eq!(InstallMarker::new(temp.path(), ".myapp").read().unwrap(), None);
  }

  #[test]
  fn written_marker_is_read_back() {
    let temp = tempdir().unwrap();
    let marker = InstallMarker::new(&temp.path().join("home"), ".myapp");
    let destination = temp.path().join("apps").join("my app");

    marker.write(&destination).unwrap();
    assert_eq!(marker.read().unwrap(), Some(destination));
    let content = fs::read_to_string(marker.path()).unwrap();
    assert!(content.starts_with('#'));
  }

  #[test]
  fn marker_without_directory_key_is_an_error() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join(".myapp"), "# comment\nother=value\n").unwrap();

    let err = InstallMarker::new(temp.path(), ".myapp").read().unwrap_err();
    assert!(matches!(err, InstallError::MarkerKey { key: "program-directory", .. }));
  }
}
