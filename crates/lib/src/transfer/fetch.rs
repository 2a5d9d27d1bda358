//! Streaming a source location into a destination file.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};
use url::Url;

use super::TransferError;
use crate::consts::{COPY_BUFFER_SIZE, PARTIAL_SUFFIX};

/// A parsed source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
  Local(PathBuf),
  Remote(Url),
}

impl Source {
  /// `http(s)://` locations are remote, `file://` URLs and anything that is
  /// not a URL are local paths.
  pub fn parse(location: &str) -> Result<Self, TransferError> {
    let location = location.trim();
    match Url::parse(location) {
      Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(Source::Remote(url)),
      Ok(url) if url.scheme() == "file" => url.to_file_path().map(Source::Local).map_err(|_| TransferError::Fetch {
        location: location.to_string(),
        message: "not a local file URL".to_string(),
      }),
      Ok(url) if url.scheme().len() > 1 => Err(TransferError::Fetch {
        location: location.to_string(),
        message: format!("unsupported scheme '{}'", url.scheme()),
      }),
      _ => Ok(Source::Local(PathBuf::from(location))),
    }
  }
}

fn partial_path(target: &Path) -> PathBuf {
  let mut name = target.as_os_str().to_owned();
  name.push(PARTIAL_SUFFIX);
  PathBuf::from(name)
}

/// Streams `location` into `target`, calling `on_progress` with the running
/// byte count. Returns the number of bytes written.
///
/// Data lands in `<target>.part` first and is renamed over `target` only once
/// the transfer completed; a failed transfer removes the partial file.
pub async fn fetch_to<F>(location: &str, target: &Path, mut on_progress: F) -> Result<u64, TransferError>
where
  F: FnMut(u64) + Send,
{
  let source = Source::parse(location)?;
  if let Some(parent) = target.parent() {
    fs::create_dir_all(parent).await.map_err(TransferError::io(parent))?;
  }

  let partial = partial_path(target);
  let result = match &source {
    Source::Local(path) => copy_local(location, path, &partial, &mut on_progress).await,
    Source::Remote(url) => download(url, &partial, &mut on_progress).await,
  };

  match result {
    Ok(bytes) => {
      fs::rename(&partial, target).await.map_err(TransferError::io(target))?;
      debug!(location = %location, target = %target.display(), bytes, "transfer complete");
      Ok(bytes)
    }
    Err(e) => {
      let _ = fs::remove_file(&partial).await;
      Err(e)
    }
  }
}

async fn copy_local<F>(location: &str, source: &Path, partial: &Path, on_progress: &mut F) -> Result<u64, TransferError>
where
  F: FnMut(u64) + Send,
{
  let mut input = match fs::File::open(source).await {
    Ok(file) => file,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      return Err(TransferError::NotFound {
        location: location.to_string(),
      });
    }
    Err(e) => return Err(TransferError::io(source)(e)),
  };

  let mut output = fs::File::create(partial).await.map_err(TransferError::io(partial))?;
  let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
  let mut total = 0u64;

  loop {
    let read = input.read(&mut buffer).await.map_err(TransferError::io(source))?;
    if read == 0 {
      break;
    }
    output
      .write_all(&buffer[..read])
      .await
      .map_err(TransferError::io(partial))?;
    total += read as u64;
    on_progress(total);
  }

  output.flush().await.map_err(TransferError::io(partial))?;
  Ok(total)
}

async fn download<F>(url: &Url, partial: &Path, on_progress: &mut F) -> Result<u64, TransferError>
where
  F: FnMut(u64) + Send,
{
  info!(url = %url, "fetching URL");
  let fetch_err = |message: String| TransferError::Fetch {
    location: url.to_string(),
    message,
  };

  let mut response = reqwest::get(url.clone()).await.map_err(|e| fetch_err(e.to_string()))?;
  let status = response.status();
  if status == reqwest::StatusCode::NOT_FOUND {
    return Err(TransferError::NotFound {
      location: url.to_string(),
    });
  }
  if !status.is_success() {
    return Err(fetch_err(format!("HTTP {}", status)));
  }

  let mut output = fs::File::create(partial).await.map_err(TransferError::io(partial))?;
  let mut total = 0u64;

  while let Some(chunk) = response.chunk().await.map_err(|e| fetch_err(e.to_string()))? {
    output.write_all(&chunk).await.map_err(TransferError::io(partial))?;
    total += chunk.len() as u64;
    on_progress(total);
  }

  output.flush().await.map_err(TransferError::io(partial))?;
  Ok(total)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{Arc, Mutex};
  use tempfile::tempdir;

  #[test]
  fn parses_source_kinds() {
    assert!(matches!(
      Source::parse("https://example.com/a.jar").unwrap(),
      Source::Remote(_)
    ));
    assert_eq!(
      Source::parse("/srv/files/a.jar").unwrap(),
      Source::Local(PathBuf::from("/srv/files/a.jar"))
    );
    assert!(matches!(Source::parse("ftp://example.com/a.jar"), Err(TransferError::Fetch { .. })));
  }

  #[tokio::test]
  async fn local_copy_reports_progress_and_cleans_up() {
    let temp = tempdir().unwrap();
    let source = temp.path().join("source.bin");
    let content = vec![7u8; COPY_BUFFER_SIZE * 2 + 10];
    std::fs::write(&source, &content).unwrap();
    let target = temp.path().join("out").join("target.bin");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let url = Url::from_file_path(&source).unwrap();
    let bytes = fetch_to(url.as_str(), &target, move |n| sink.lock().unwrap().push(n))
      .await
      .unwrap();

    assert_eq!(bytes, content.len() as u64);
    assert_eq!(std::fs::read(&target).unwrap(), content);
    assert!(!partial_path(&target).exists());
    let seen = seen.lock().unwrap();
    assert_eq!(seen.last().copied(), Some(content.len() as u64));
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
  }

  #[tokio::test]
  async fn missing_source_is_not_found_and_leaves_nothing() {
    let temp = tempdir().unwrap();
    let target = temp.path().join("target.bin");
    std::fs::write(&target, b"previous").unwrap();

    let err = fetch_to(temp.path().join("missing").to_str().unwrap(), &target, |_| {})
      .await
      .unwrap_err();
    assert!(matches!(err, TransferError::NotFound { .. }));
    assert!(!partial_path(&target).exists());
    assert_eq!(std::fs::read(&target).unwrap(), b"previous");
  }
}
