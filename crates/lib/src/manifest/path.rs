use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ManifestError;
use super::entries::validate_file_name;

/// A path relative to the destination directory.
///
/// Stored with `/` separators and without leading, trailing or repeated
/// separators, so `"lib"`, `"/lib/"` and `"lib\\"` are the same path. The
/// empty path is the destination directory itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelPath(String);

impl RelPath {
  /// Normalizes `raw` without checking for parent references.
  pub fn new(raw: &str) -> Self {
    let components: Vec<&str> = raw
      .split(['/', '\\'])
      .filter(|c| !c.is_empty() && *c != ".")
      .collect();
    RelPath(components.join("/"))
  }

  /// Normalizes `raw` and rejects paths that climb out of the destination.
  pub fn parse(raw: &str) -> Result<Self, ManifestError> {
    let path = Self::new(raw);
    if path.components().any(|c| c == "..") {
      return Err(ManifestError::UnsafePath { path: raw.to_string() });
    }
    Ok(path)
  }

  /// Relative path of `path` below `base`, if it is inside it.
  pub fn relative_to(base: &Path, path: &Path) -> Option<Self> {
    let rel = path.strip_prefix(base).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
      match component {
        Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        Component::CurDir => {}
        _ => return None,
      }
    }
    Some(RelPath(parts.join("/")))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn is_root(&self) -> bool {
    self.0.is_empty()
  }

  pub fn components(&self) -> impl Iterator<Item = &str> {
    self.0.split('/').filter(|c| !c.is_empty())
  }

  /// Native path of this location below `base`.
  pub fn under(&self, base: &Path) -> PathBuf {
    let mut path = base.to_path_buf();
    for component in self.components() {
      path.push(component);
    }
    path
  }
}

impl std::fmt::Display for RelPath {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Identity of a file entry: its relative path plus file name.
///
/// Two entries with the same key describe the same destination file, whatever
/// their hashes or flags say.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey {
  pub path: RelPath,
  pub file_name: String,
}

impl EntryKey {
  pub fn new(path: &str, file_name: &str) -> Self {
    Self {
      path: RelPath::new(path),
      file_name: file_name.trim().to_string(),
    }
  }

  /// Like [`EntryKey::new`], but rejects keys that would resolve outside the
  /// destination directory.
  pub fn checked(path: &str, file_name: &str) -> Result<Self, ManifestError> {
    let file_name = file_name.trim();
    validate_file_name(file_name)?;
    Ok(Self {
      path: RelPath::parse(path)?,
      file_name: file_name.to_string(),
    })
  }

  /// Splits a destination-relative `path/file` string at its last separator.
  pub fn parse(relative: &str) -> Option<Self> {
    let normalized = RelPath::new(relative.trim());
    let (path, file_name) = match normalized.as_str().rsplit_once('/') {
      Some((path, file_name)) => (path, file_name),
      None => ("", normalized.as_str()),
    };
    if file_name.is_empty() {
      return None;
    }
    Some(Self::new(path, file_name))
  }

  /// Native path of the file below `base`.
  pub fn under(&self, base: &Path) -> PathBuf {
    self.path.under(base).join(&self.file_name)
  }
}

impl std::fmt::Display for EntryKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if self.path.is_root() {
      write!(f, "{}", self.file_name)
    } else {
      write!(f, "{}/{}", self.path, self.file_name)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn equivalent_spellings_normalize_to_one_path() {
    for raw in ["lib", "/lib", "lib/", "\\lib\\", "./lib", "lib//"] {
      assert_eq!(RelPath::new(raw).as_str(), "lib", "raw: {raw:?}");
    }
    assert!(RelPath::new("/").is_root());
    assert_eq!(RelPath::new("a\\b/c").as_str(), "a/b/c");
  }

  #[test]
  fn parent_references_are_rejected() {
    assert!(RelPath::parse("../outside").is_err());
    assert!(RelPath::parse("lib/../../x").is_err());
    assert!(RelPath::parse("lib/..dots").is_ok());
  }

  #[test]
  fn relative_to_base() {
    let base = Path::new("/opt/app");
    assert_eq!(
      RelPath::relative_to(base, Path::new("/opt/app/lib/ext")),
      Some(RelPath::new("lib/ext"))
    );
    assert_eq!(RelPath::relative_to(base, base), Some(RelPath::default()));
    assert_eq!(RelPath::relative_to(base, Path::new("/opt/other")), None);
  }

  #[test]
  fn entry_key_display_and_parse() {
    let key = EntryKey::new("/lib/", "a.jar");
    assert_eq!(key.to_string(), "lib/a.jar");
    assert_eq!(EntryKey::parse("lib\\a.jar"), Some(key));

    let root = EntryKey::parse("/app.jar").unwrap();
    assert!(root.path.is_root());
    assert_eq!(root.to_string(), "app.jar");

    assert_eq!(EntryKey::parse("  "), None);
  }

  #[test]
  fn checked_key_stays_inside_destination() {
    assert_eq!(EntryKey::checked("/lib/", "a.jar").unwrap(), EntryKey::new("lib", "a.jar"));
    assert!(matches!(
      EntryKey::checked("..", "x.txt"),
      Err(ManifestError::UnsafePath { .. })
    ));
    assert!(matches!(
      EntryKey::checked("images", "../../evil"),
      Err(ManifestError::InvalidFileName { .. })
    ));
    assert!(matches!(
      EntryKey::checked("lib", ".."),
      Err(ManifestError::InvalidFileName { .. })
    ));
  }

  #[test]
  fn entry_key_under_base() {
    let key = EntryKey::new("lib/ext", "x.jar");
    assert_eq!(
      key.under(Path::new("/opt/app")),
      Path::new("/opt/app").join("lib").join("ext").join("x.jar")
    );
  }
}
