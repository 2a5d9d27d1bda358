//! Zip expansion into the destination directory.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::TransferError;

/// Maps an archive entry name to a path relative to the destination, or
/// `None` if the name is absolute or climbs out of the destination.
fn safe_entry_path(name: &str) -> Option<PathBuf> {
  if name.starts_with('/') || name.starts_with('\\') {
    return None;
  }
  let mut path = PathBuf::new();
  for part in name.split(['/', '\\']) {
    match part {
      "" | "." => {}
      ".." => return None,
      p if p.contains(':') => return None,
      p => path.push(p),
    }
  }
  Some(path)
}

/// Expands the zip archive at `archive` into `destination`.
///
/// Every entry is checked before anything is written: an absolute or escaping
/// entry name fails with [`TransferError::UnsafeArchivePath`] and an entry
/// larger than `max_entry_size` with [`TransferError::EntryTooLarge`].
/// Returns the number of files written.
pub fn unpack_archive(archive: &Path, destination: &Path, max_entry_size: u64) -> Result<usize, TransferError> {
  let archive_name = archive.display().to_string();
  let archive_err = |e: zip::result::ZipError| TransferError::Archive {
    archive: archive_name.clone(),
    message: e.to_string(),
  };

  let file = fs::File::open(archive).map_err(TransferError::io(archive))?;
  let mut zip = zip::ZipArchive::new(file).map_err(archive_err)?;

  let mut targets = Vec::with_capacity(zip.len());
  for index in 0..zip.len() {
    let entry = zip.by_index(index).map_err(archive_err)?;
    let name = entry.name().to_string();
    let relative = match (safe_entry_path(&name), entry.enclosed_name()) {
      (Some(relative), Some(_)) => relative,
      _ => {
        return Err(TransferError::UnsafeArchivePath {
          archive: archive_name.clone(),
          entry: name,
        });
      }
    };
    if entry.size() > max_entry_size {
      return Err(TransferError::EntryTooLarge {
        archive: archive_name.clone(),
        entry: name,
        limit: max_entry_size,
      });
    }
    targets.push((index, name, relative, entry.is_dir()));
  }

  let mut written = 0;
  for (index, name, relative, is_dir) in targets {
    let out_path = destination.join(&relative);
    if is_dir || relative.as_os_str().is_empty() {
      fs::create_dir_all(&out_path).map_err(TransferError::io(&out_path))?;
      continue;
    }
    if let Some(parent) = out_path.parent() {
      fs::create_dir_all(parent).map_err(TransferError::io(parent))?;
    }

    let mut entry = zip.by_index(index).map_err(archive_err)?;
    let mut out_file = fs::File::create(&out_path).map_err(TransferError::io(&out_path))?;
    // Declared sizes can lie; cap what is actually copied.
    let copied = io::copy(&mut (&mut entry).take(max_entry_size.saturating_add(1)), &mut out_file)
      .map_err(TransferError::io(&out_path))?;
    if copied > max_entry_size {
      drop(out_file);
      let _ = fs::remove_file(&out_path);
      return Err(TransferError::EntryTooLarge {
        archive: archive_name.clone(),
        entry: name,
        limit: max_entry_size,
      });
    }

    #[cfg(unix)]
    if let Some(mode) = entry.unix_mode() {
      use std::os::unix::fs::PermissionsExt;
      let _ = fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777));
    }

    debug!(entry = %name, path = %out_path.display(), bytes = copied, "expanded archive entry");
    written += 1;
  }

  info!(archive = %archive.display(), files = written, "archive expanded");
  Ok(written)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::write_zip;
  use tempfile::tempdir;

  #[test]
  fn expands_nested_entries() {
    let temp = tempdir().unwrap();
    let archive = temp.path().join("bundle.zip");
    write_zip(&archive, &[("bin/tool", b"#!/bin/sh\n"), ("readme.txt", b"hello")]);
    let dest = temp.path().join("dest");

    let count = unpack_archive(&archive, &dest, u64::MAX).unwrap();
    assert_eq!(count, 2);
    assert_eq!(fs::read(dest.join("bin").join("tool")).unwrap(), b"#!/bin/sh\n");
    assert_eq!(fs::read(dest.join("readme.txt")).unwrap(), b"hello");
  }

  #[test]
  fn escaping_entry_is_rejected_before_any_write() {
    let temp = tempdir().unwrap();
    let archive = temp.path().join("evil.zip");
    write_zip(&archive, &[("fine.txt", b"ok"), ("../../evil.txt", b"pwned")]);
    let dest = temp.path().join("a").join("b").join("dest");
    fs::create_dir_all(&dest).unwrap();

    let err = unpack_archive(&archive, &dest, u64::MAX).unwrap_err();
    assert!(matches!(err, TransferError::UnsafeArchivePath { ref entry, .. } if entry == "../../evil.txt"));
    assert!(!dest.join("fine.txt").exists());
    assert!(!temp.path().join("a").join("evil.txt").exists());
    assert!(!temp.path().join("evil.txt").exists());
  }

  #[test]
  fn absolute_entry_is_rejected() {
    let temp = tempdir().unwrap();
    let archive = temp.path().join("abs.zip");
    write_zip(&archive, &[("/etc/passwd", b"x")]);

    let err = unpack_archive(&archive, &temp.path().join("dest"), u64::MAX).unwrap_err();
    assert!(matches!(err, TransferError::UnsafeArchivePath { .. }));
  }

  #[test]
  fn oversized_entry_fails_fast() {
    let temp = tempdir().unwrap();
    let archive = temp.path().join("big.zip");
    write_zip(&archive, &[("small.txt", b"1234"), ("big.bin", &[0u8; 64])]);
    let dest = temp.path().join("dest");

    let err = unpack_archive(&archive, &dest, 16).unwrap_err();
    assert!(matches!(err, TransferError::EntryTooLarge { ref entry, limit: 16, .. } if entry == "big.bin"));
    assert!(!dest.join("small.txt").exists());
  }

  #[test]
  fn safe_entry_paths() {
    assert_eq!(safe_entry_path("a/./b"), Some(PathBuf::from("a").join("b")));
    assert_eq!(safe_entry_path("a\\b"), Some(PathBuf::from("a").join("b")));
    assert_eq!(safe_entry_path("a/../b"), None);
    assert_eq!(safe_entry_path("C:/windows"), None);
    assert_eq!(safe_entry_path("\\server\\share"), None);
  }

  #[test]
  fn corrupt_archive_is_an_error() {
    let temp = tempdir().unwrap();
    let archive = temp.path().join("broken.zip");
    fs::write(&archive, b"not a zip").unwrap();
    assert!(matches!(
      unpack_archive(&archive, temp.path(), u64::MAX),
      Err(TransferError::Archive { .. })
    ));
  }
}
