//! Content hashing for manifest entries.
//!
//! Manifests carry a hex digest per file. New manifests use SHA-256; digests that are
//! 32 hex characters long are legacy MD5 values and are verified with MD5.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Digest algorithm used for a manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
  Md5,
  #[default]
  Sha256,
}

impl HashAlgorithm {
  /// Picks the algorithm that produced `digest`, judged by its length.
  pub fn detect(digest: &str) -> Self {
    if digest.trim().len() == 32 {
      HashAlgorithm::Md5
    } else {
      HashAlgorithm::Sha256
    }
  }
}

impl std::fmt::Display for HashAlgorithm {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      HashAlgorithm::Md5 => write!(f, "md5"),
      HashAlgorithm::Sha256 => write!(f, "sha256"),
    }
  }
}

/// A lowercase hex digest of some content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
  /// Case-insensitive comparison against a declared digest.
  pub fn matches(&self, declared: &str) -> bool {
    self.0.eq_ignore_ascii_case(declared.trim())
  }
}

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum HashError {
  #[error("failed to read file {path}: {source}")]
  ReadFile {
    path: String,
    #[source]
    source: io::Error,
  },
}

fn digest_reader<D: Digest>(reader: &mut impl Read) -> io::Result<String> {
  let mut hasher = D::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = reader.read(&mut buffer)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(hex::encode(hasher.finalize()))
}

/// Hash a file's contents with the given algorithm.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<ContentHash, HashError> {
  let read_err = |source| HashError::ReadFile {
    path: path.display().to_string(),
    source,
  };

  let mut file = fs::File::open(path).map_err(read_err)?;
  let digest = match algorithm {
    HashAlgorithm::Md5 => digest_reader::<Md5>(&mut file),
    HashAlgorithm::Sha256 => digest_reader::<Sha256>(&mut file),
  }
  .map_err(read_err)?;

  Ok(ContentHash(digest))
}

/// Hash a file with whichever algorithm produced `declared`, so the two can be compared.
pub fn hash_file_like(path: &Path, declared: &str) -> Result<ContentHash, HashError> {
  hash_file(path, HashAlgorithm::detect(declared))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8], algorithm: HashAlgorithm) -> ContentHash {
  let digest = match algorithm {
    HashAlgorithm::Md5 => hex::encode(Md5::digest(data)),
    HashAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
  };
  ContentHash(digest)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  #[test]
  fn detects_legacy_md5_by_length() {
    assert_eq!(HashAlgorithm::detect("5eb63bbbe01eeed093cb22bb8f5acdc3"), HashAlgorithm::Md5);
    assert_eq!(
      HashAlgorithm::detect("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"),
      HashAlgorithm::Sha256
    );
    assert_eq!(HashAlgorithm::detect(""), HashAlgorithm::Sha256);
  }

  #[test]
  fn hash_bytes_known_values() {
    assert_eq!(
      hash_bytes(b"hello world", HashAlgorithm::Md5).0,
      "5eb63bbbe01eeed093cb22bb8f5acdc3"
    );
    assert_eq!(
      hash_bytes(b"hello world", HashAlgorithm::Sha256).0,
      "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );
  }

  #[test]
  fn hash_file_matches_hash_bytes() {
    let temp = tempdir().unwrap();
    let file_path = temp.path().join("test.txt");
    fs::write(&file_path, "hello world").unwrap();

    let from_file = hash_file(&file_path, HashAlgorithm::Sha256).unwrap();
    assert_eq!(from_file, hash_bytes(b"hello world", HashAlgorithm::Sha256));

    let legacy = hash_file_like(&file_path, "D41D8CD98F00B204E9800998ECF8427E").unwrap();
    assert!(legacy.matches("5EB63BBBE01EEED093CB22BB8F5ACDC3"));
  }

  #[test]
  fn hash_missing_file_fails() {
    let temp = tempdir().unwrap();
    let err = hash_file(&temp.path().join("missing"), HashAlgorithm::Md5).unwrap_err();
    assert!(err.to_string().contains("missing"));
  }
}
