//! Manifest parsing.
//!
//! Only direct children of the root element are read. Elements named `file`,
//! `mkdir` and `dir` carry their data in attributes; every other child is a
//! scalar setting whose trimmed text is the value (empty text means unset).
//! Unknown settings are ignored.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use super::CodecError;
use super::encoding;
use crate::manifest::{ApplicationManifest, DirectoryEntry, FileEntry, Locale, SourceDirectoryEntry};

/// Parses raw manifest bytes, honoring the declared encoding.
pub fn parse_bytes(bytes: &[u8]) -> Result<ApplicationManifest, CodecError> {
  let encoding = encoding::detect(bytes)?;
  let text = encoding.decode(bytes)?;
  parse_document(&text, encoding.name())
}

/// Parses an already decoded manifest document.
pub fn parse_str(text: &str) -> Result<ApplicationManifest, CodecError> {
  parse_document(text, encoding::Encoding::Utf8.name())
}

fn parse_document(text: &str, declared: &str) -> Result<ApplicationManifest, CodecError> {
  let mut reader = Reader::from_str(text);
  reader.config_mut().trim_text(true);

  let mut manifest = ApplicationManifest {
    xml_encoding: String::new(),
    ..ApplicationManifest::default()
  };
  let mut depth = 0usize;
  let mut saw_root = false;
  let mut scalar: Option<(String, String)> = None;

  loop {
    match reader.read_event().map_err(xml_error)? {
      Event::Start(element) => {
        depth += 1;
        if depth == 1 {
          saw_root = true;
        } else if depth == 2 {
          let name = element_name(&element)?;
          if is_structured(&name) {
            read_structured(&mut manifest, &name, &element)?;
          } else {
            scalar = Some((name, String::new()));
          }
        }
      }
      Event::Empty(element) => {
        if depth == 0 {
          saw_root = true;
        } else if depth == 1 {
          let name = element_name(&element)?;
          if is_structured(&name) {
            read_structured(&mut manifest, &name, &element)?;
          } else {
            apply_scalar(&mut manifest, &name, "")?;
          }
        }
      }
      Event::Text(text) if depth == 2 => {
        if let Some((_, value)) = scalar.as_mut() {
          value.push_str(&text.unescape().map_err(xml_error)?);
        }
      }
      Event::CData(data) if depth == 2 => {
        if let Some((_, value)) = scalar.as_mut() {
          let raw = data.into_inner();
          value.push_str(std::str::from_utf8(&raw).map_err(xml_error)?);
        }
      }
      Event::End(_) => {
        if depth == 2 {
          if let Some((name, value)) = scalar.take() {
            apply_scalar(&mut manifest, &name, &value)?;
          }
        }
        depth = depth.saturating_sub(1);
      }
      Event::Eof => break,
      _ => {}
    }
  }

  if !saw_root {
    return Err(CodecError::MissingRoot);
  }
  if let Some(key) = manifest.duplicate_key() {
    return Err(CodecError::DuplicateFile { key: key.to_string() });
  }
  if manifest.xml_encoding.is_empty() {
    manifest.xml_encoding = declared.to_string();
  }
  Ok(manifest)
}

fn xml_error(err: impl std::fmt::Display) -> CodecError {
  CodecError::Xml(err.to_string())
}

fn element_name(element: &BytesStart<'_>) -> Result<String, CodecError> {
  std::str::from_utf8(element.name().as_ref())
    .map(str::to_string)
    .map_err(xml_error)
}

fn is_structured(name: &str) -> bool {
  matches!(name, "file" | "mkdir" | "dir")
}

/// Attributes of one structured element.
struct Attrs {
  element: String,
  values: BTreeMap<String, String>,
}

impl Attrs {
  fn read(element_name: &str, element: &BytesStart<'_>) -> Result<Self, CodecError> {
    let mut values = BTreeMap::new();
    for attr in element.attributes() {
      let attr = attr.map_err(xml_error)?;
      let key = std::str::from_utf8(attr.key.as_ref()).map_err(xml_error)?.to_string();
      let value = attr.unescape_value().map_err(xml_error)?.trim().to_string();
      values.insert(key, value);
    }
    Ok(Self {
      element: element_name.to_string(),
      values,
    })
  }

  fn optional(&self, name: &str) -> Option<&str> {
    self.values.get(name).map(String::as_str).filter(|v| !v.is_empty())
  }

  fn required(&self, name: &str) -> Result<&str, CodecError> {
    self.optional(name).ok_or_else(|| CodecError::MissingAttribute {
      element: self.element.clone(),
      attribute: name.to_string(),
    })
  }

  /// Like `required`, but an empty value is accepted.
  fn present(&self, name: &str) -> Result<&str, CodecError> {
    self.values.get(name).map(String::as_str).ok_or_else(|| CodecError::MissingAttribute {
      element: self.element.clone(),
      attribute: name.to_string(),
    })
  }

  fn flag(&self, name: &str) -> Result<bool, CodecError> {
    match self.optional(name) {
      None => Ok(false),
      Some(value) => parse_bool(value).ok_or_else(|| self.invalid(name, value, "true or false")),
    }
  }

  fn number<T: std::str::FromStr>(&self, name: &str, default: T) -> Result<T, CodecError> {
    match self.optional(name) {
      None => Ok(default),
      Some(value) => value.parse().map_err(|_| self.invalid(name, value, "an integer")),
    }
  }

  fn invalid(&self, attribute: &str, value: &str, expected: &'static str) -> CodecError {
    CodecError::InvalidAttribute {
      element: self.element.clone(),
      attribute: attribute.to_string(),
      value: value.to_string(),
      expected,
    }
  }
}

fn parse_bool(value: &str) -> Option<bool> {
  if value.eq_ignore_ascii_case("true") {
    Some(true)
  } else if value.eq_ignore_ascii_case("false") {
    Some(false)
  } else {
    None
  }
}

fn read_structured(manifest: &mut ApplicationManifest, name: &str, element: &BytesStart<'_>) -> Result<(), CodecError> {
  let attrs = Attrs::read(name, element)?;
  match name {
    "file" => {
      let raw_size = attrs.required("size")?;
      let size = raw_size
        .parse::<u64>()
        .map_err(|_| attrs.invalid("size", raw_size, "an integer"))?;
      let entry = FileEntry::new(
        attrs.present("path")?,
        attrs.required("file")?,
        attrs.required("hash")?,
        size,
        attrs.required("srcFileUrl")?,
      )?
      .with_archive_expand(attrs.flag("unzip")?)
      .with_always_load(attrs.flag("loadAlways")?)
      .with_on_classpath(attrs.flag("addToClasspath")?)
      .with_rollout_order(attrs.number("order", 0i32)?);
      manifest.files.push(entry);
    }
    "mkdir" => {
      manifest.directories.push(DirectoryEntry::new(attrs.required("path")?)?);
    }
    "dir" => {
      manifest.source_directories.push(SourceDirectoryEntry::new(
        attrs.present("path")?,
        attrs.required("srcPathUrl")?,
      )?);
    }
    _ => {}
  }
  Ok(())
}

fn apply_scalar(manifest: &mut ApplicationManifest, name: &str, raw: &str) -> Result<(), CodecError> {
  let value = raw.trim();
  let text = (!value.is_empty()).then(|| value.to_string());
  let invalid = |expected: &'static str| CodecError::InvalidValue {
    element: name.to_string(),
    value: value.to_string(),
    expected,
  };
  let flag = |default: bool| -> Result<bool, CodecError> {
    if value.is_empty() {
      Ok(default)
    } else {
      parse_bool(value).ok_or_else(|| invalid("true or false"))
    }
  };

  match name {
    "title" => manifest.title = text,
    "vendor" => manifest.vendor = text,
    "description" => manifest.description = text,
    "version" => manifest.version = text,
    "locale" => manifest.locale = Locale::parse(value),
    "destPath" => manifest.dest_path = text,
    "idFilename" => manifest.id_filename = text,
    "launchExe" | "javaExe" => manifest.launch_executable = text,
    "launchArgs" | "javaArgs" => manifest.launch_arguments = text,
    "logFilename" => manifest.log_path = text,
    "msgFileUrl" => manifest.msg_file_url = text,
    "configFileUrl" => manifest.config_file_url = text,
    "lookAndFeelClassName" => manifest.look_and_feel = text,
    "xmlEncoding" => {
      if let Some(label) = text {
        manifest.xml_encoding = label;
      }
    }
    "exitAfterExecute" => manifest.exit_after_execute = flag(true)?,
    "silentInstall" => manifest.silent_install = flag(false)?,
    "silentUpdate" => manifest.silent_update = flag(false)?,
    "lazyLoading" => manifest.lazy_loading = flag(false)?,
    "showStartFrame" => manifest.show_start_frame = flag(true)?,
    "startFrameDelaySeconds" => {
      manifest.start_frame_delay_seconds = if value.is_empty() {
        2
      } else {
        value.parse().map_err(|_| invalid("a non-negative integer"))?
      };
    }
    other => debug!(element = %other, "ignoring unknown manifest setting"),
  }
  Ok(())
}
