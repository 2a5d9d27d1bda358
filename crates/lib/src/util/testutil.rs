//! Test utilities for appsync-lib.
//!
//! Helpers that build small application trees and archives on disk.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::manifest::{ApplicationManifest, FileEntry};
use crate::util::hash::{HashAlgorithm, hash_bytes};

/// Writes `content` to `dir/rel`, creating parent directories.
pub fn write_file(dir: &Path, rel: &str, content: &[u8]) {
  let path = dir.join(rel);
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(path, content).unwrap();
}

/// Builds a file entry whose source lives under `source_dir` as a `file://` URL.
pub fn entry_for(source_dir: &Path, path: &str, file_name: &str, content: &[u8]) -> FileEntry {
  let rel = if path.is_empty() {
    file_name.to_string()
  } else {
    format!("{}/{}", path, file_name)
  };
  write_file(source_dir, &rel, content);
  let location = url::Url::from_file_path(source_dir.join(&rel)).unwrap().to_string();
  FileEntry::new(
    path,
    file_name,
    hash_bytes(content, HashAlgorithm::Sha256).0,
    content.len() as u64,
    location,
  )
  .unwrap()
}

/// A manifest with the two required settings filled in.
pub fn manifest_with(files: Vec<FileEntry>) -> ApplicationManifest {
  ApplicationManifest {
    dest_path: Some("/tmp/appsync-test".to_string()),
    id_filename: Some(".appsync-test".to_string()),
    files,
    ..ApplicationManifest::default()
  }
}

/// Writes a zip archive with the given (name, content) entries.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
  let file = fs::File::create(path).unwrap();
  let mut writer = zip::ZipWriter::new(file);
  let options = zip::write::SimpleFileOptions::default();
  for (name, content) in entries {
    writer.start_file(*name, options).unwrap();
    writer.write_all(content).unwrap();
  }
  writer.finish().unwrap();
}
