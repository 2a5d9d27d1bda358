use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::USER_HOME_VARIABLE;
use crate::placeholder::Resolver;

/// Named string values used to substitute `${name}` variables.
///
/// Populated from the environment (`userHome`), from command-line overrides and
/// by an install session (`destDir`, `classpath`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionMap(BTreeMap<String, String>);

impl OptionMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// An option map pre-seeded with the user's home directory.
  pub fn with_user_home(home: &Path) -> Self {
    let mut map = Self::new();
    map.set(USER_HOME_VARIABLE, home.display().to_string());
    map
  }

  pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
    self.0.insert(key.into(), value.into());
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.0.get(key).map(String::as_str)
  }

  pub fn remove(&mut self, key: &str) -> Option<String> {
    self.0.remove(key)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl Resolver for OptionMap {
  fn resolve(&self, name: &str) -> Option<&str> {
    self.get(name)
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OptionMap {
  fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
    Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
  }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for OptionMap {
  fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
    for (k, v) in iter {
      self.set(k, v);
    }
  }
}

/// A user interface locale, written as `language[,country[,variant]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
  pub language: String,
  pub country: Option<String>,
  pub variant: Option<String>,
}

impl Locale {
  /// Parses the comma form. Returns `None` when no language is given.
  pub fn parse(raw: &str) -> Option<Self> {
    let mut parts = raw.split(',').map(str::trim);
    let language = parts.next().filter(|s| !s.is_empty())?.to_string();
    let mut next = || parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    let country = next();
    let variant = next();
    Some(Self {
      language,
      country,
      variant,
    })
  }
}

impl std::fmt::Display for Locale {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.language)?;
    if let Some(country) = &self.country {
      write!(f, ",{}", country)?;
    }
    if let Some(variant) = &self.variant {
      if self.country.is_none() {
        write!(f, ",")?;
      }
      write!(f, ",{}", variant)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::placeholder::substitute;

  #[test]
  fn user_home_is_seeded() {
    let map = OptionMap::with_user_home(Path::new("/home/ada"));
    assert_eq!(map.get("userHome"), Some("/home/ada"));
    assert_eq!(substitute("${userHome}/.app", &map), "/home/ada/.app");
  }

  #[test]
  fn later_values_override_earlier_ones() {
    let mut map: OptionMap = [("a", "1")].into_iter().collect();
    map.extend([("a", "2"), ("b", "3")]);
    assert_eq!(map.get("a"), Some("2"));
    assert_eq!(map.len(), 2);
  }

  #[test]
  fn locale_parse_and_display() {
    let locale = Locale::parse("de, DE").unwrap();
    assert_eq!(locale.language, "de");
    assert_eq!(locale.country.as_deref(), Some("DE"));
    assert_eq!(locale.to_string(), "de,DE");

    let variant_only = Locale::parse("en,,POSIX").unwrap();
    assert_eq!(variant_only.country, None);
    assert_eq!(variant_only.to_string(), "en,,POSIX");

    assert_eq!(Locale::parse(""), None);
    assert_eq!(Locale::parse(" ,US"), None);
  }
}
