//! Declared-encoding detection and decoding of raw manifest bytes.

use super::CodecError;

/// Encodings a manifest may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
  Utf8,
  UsAscii,
  Latin1,
}

impl Encoding {
  /// Looks up an encoding by any of its common names.
  pub fn from_label(label: &str) -> Option<Self> {
    let normalized: String = label
      .trim()
      .chars()
      .filter(|c| *c != '-' && *c != '_')
      .collect::<String>()
      .to_ascii_lowercase();
    match normalized.as_str() {
      "utf8" => Some(Encoding::Utf8),
      "usascii" | "ascii" => Some(Encoding::UsAscii),
      "iso88591" | "latin1" | "l1" => Some(Encoding::Latin1),
      _ => None,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Encoding::Utf8 => "UTF-8",
      Encoding::UsAscii => "US-ASCII",
      Encoding::Latin1 => "ISO-8859-1",
    }
  }

  pub fn decode(self, bytes: &[u8]) -> Result<String, CodecError> {
    match self {
      Encoding::Utf8 | Encoding::UsAscii => {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::Decode { encoding: self.name() })
      }
      Encoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
    }
  }
}

/// Number of leading lines searched for an encoding declaration.
const DECLARATION_LINES: usize = 3;

/// Finds the `encoding="..."` declaration in the first lines of the document.
pub fn declared_encoding(bytes: &[u8]) -> Option<String> {
  for line in bytes.split(|b| *b == b'\n').take(DECLARATION_LINES) {
    let line = String::from_utf8_lossy(line);
    let Some(pos) = line.find("encoding=") else {
      continue;
    };
    let rest = &line[pos + "encoding=".len()..];
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
      return None;
    }
    let value = &rest[1..];
    return value.find(quote).map(|end| value[..end].to_string());
  }
  None
}

/// Detects the declared encoding of `bytes`, defaulting to UTF-8.
pub fn detect(bytes: &[u8]) -> Result<Encoding, CodecError> {
  match declared_encoding(bytes) {
    Some(label) => Encoding::from_label(&label).ok_or(CodecError::UnsupportedEncoding(label)),
    None => Ok(Encoding::Utf8),
  }
}
