//! Manifest serialization.

use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::CodecError;
use super::encoding::Encoding;
use crate::consts::BACKUP_SUFFIX;
use crate::manifest::{ApplicationManifest, OptionMap};

/// Which values to write.
#[derive(Debug, Clone, Copy)]
pub enum SerializeMode<'a> {
  /// Values exactly as stored, variables intact.
  Template,
  /// Values with variables substituted from the given options.
  Resolved(&'a OptionMap),
}

/// Escapes markup characters and writes every non-ASCII character as a
/// numeric reference, so the output is valid in any supported encoding.
fn escape(value: &str) -> String {
  let escaped = quick_xml::escape::escape(value);
  let mut out = String::with_capacity(escaped.len());
  for ch in escaped.chars() {
    if ch.is_ascii() {
      out.push(ch);
    } else {
      let _ = write!(out, "&#{};", ch as u32);
    }
  }
  out
}

fn element(out: &mut String, name: &str, value: &str) {
  let _ = writeln!(out, "  <{name}>{}</{name}>", escape(value));
}

fn optional(out: &mut String, name: &str, value: &Option<String>) {
  if let Some(value) = value {
    element(out, name, value);
  }
}

/// Renders `manifest` as an XML document.
pub fn to_xml(manifest: &ApplicationManifest, mode: SerializeMode<'_>) -> Result<String, CodecError> {
  let encoding =
    Encoding::from_label(&manifest.xml_encoding).ok_or_else(|| CodecError::UnsupportedEncoding(manifest.xml_encoding.clone()))?;

  let resolved;
  let manifest = match mode {
    SerializeMode::Template => manifest,
    SerializeMode::Resolved(vars) => {
      resolved = manifest.resolved(vars);
      &resolved
    }
  };

  let mut out = String::new();
  let _ = writeln!(out, "<?xml version=\"1.0\" encoding=\"{}\"?>", encoding.name());
  out.push_str("<application>\n");

  optional(&mut out, "title", &manifest.title);
  optional(&mut out, "vendor", &manifest.vendor);
  optional(&mut out, "description", &manifest.description);
  optional(&mut out, "version", &manifest.version);
  if let Some(locale) = &manifest.locale {
    element(&mut out, "locale", &locale.to_string());
  }
  optional(&mut out, "destPath", &manifest.dest_path);
  optional(&mut out, "idFilename", &manifest.id_filename);
  element(&mut out, "exitAfterExecute", &manifest.exit_after_execute.to_string());
  element(&mut out, "silentInstall", &manifest.silent_install.to_string());
  element(&mut out, "silentUpdate", &manifest.silent_update.to_string());
  element(&mut out, "lazyLoading", &manifest.lazy_loading.to_string());
  element(&mut out, "showStartFrame", &manifest.show_start_frame.to_string());
  element(
    &mut out,
    "startFrameDelaySeconds",
    &manifest.start_frame_delay_seconds.to_string(),
  );
  optional(&mut out, "launchExe", &manifest.launch_executable);
  optional(&mut out, "launchArgs", &manifest.launch_arguments);
  optional(&mut out, "logFilename", &manifest.log_path);
  optional(&mut out, "msgFileUrl", &manifest.msg_file_url);
  optional(&mut out, "configFileUrl", &manifest.config_file_url);
  optional(&mut out, "lookAndFeelClassName", &manifest.look_and_feel);

  for dir in &manifest.directories {
    let _ = writeln!(out, "  <mkdir path=\"{}\"/>", escape(dir.path.as_str()));
  }

  for dir in &manifest.source_directories {
    let _ = writeln!(
      out,
      "  <dir path=\"{}\" srcPathUrl=\"{}\"/>",
      escape(dir.path.as_str()),
      escape(&dir.source_location_template)
    );
  }

  for file in &manifest.files {
    let _ = write!(
      out,
      "  <file path=\"{}\" file=\"{}\" hash=\"{}\" size=\"{}\" unzip=\"{}\" loadAlways=\"{}\" addToClasspath=\"{}\" srcFileUrl=\"{}\"",
      escape(file.path.as_str()),
      escape(&file.file_name),
      escape(&file.content_hash),
      file.size_bytes,
      file.archive_expand,
      file.always_load,
      file.on_classpath,
      escape(&file.source_location),
    );
    if file.rollout_order != 0 {
      let _ = write!(out, " order=\"{}\"", file.rollout_order);
    }
    out.push_str("/>\n");
  }

  out.push_str("</application>\n");
  Ok(out)
}

/// Path of the backup written next to `path`.
pub fn backup_path(path: &Path) -> PathBuf {
  let mut name = path.as_os_str().to_owned();
  name.push(BACKUP_SUFFIX);
  PathBuf::from(name)
}

/// Writes `manifest` to `path`.
///
/// With `backup`, an existing file is first moved to `<path>.bak`, replacing
/// any previous backup. The new document is written to a temporary file in the
/// same directory and renamed into place.
pub fn write_file(
  manifest: &ApplicationManifest,
  path: &Path,
  mode: SerializeMode<'_>,
  backup: bool,
) -> Result<(), CodecError> {
  let document = to_xml(manifest, mode)?;
  let write_err = |source| CodecError::Write {
    path: path.display().to_string(),
    source,
  };

  let parent = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => PathBuf::from("."),
  };
  fs::create_dir_all(&parent).map_err(write_err)?;

  let mut temp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
  temp.write_all(document.as_bytes()).map_err(write_err)?;
  temp.flush().map_err(write_err)?;

  if backup && path.exists() {
    let backup = backup_path(path);
    if backup.exists() {
      fs::remove_file(&backup).map_err(write_err)?;
    }
    fs::rename(path, &backup).map_err(write_err)?;
    debug!(backup = %backup.display(), "previous manifest backed up");
  }

  temp.persist(path).map_err(|e| write_err(e.error))?;
  info!(path = %path.display(), "manifest written");
  Ok(())
}
