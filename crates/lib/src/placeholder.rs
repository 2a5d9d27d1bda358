//! Variable parsing and substitution for manifest settings.
//!
//! Manifest values such as the destination path, launch arguments and source
//! locations may reference variables of the form `${name}`. Values are stored
//! raw and only substituted against an explicit [`Resolver`] at the point of use.
//!
//! # Rules
//!
//! - `${name}` is replaced by the resolver's value for `name`.
//! - A variable the resolver does not know is left in the output verbatim.
//! - An unclosed `${` and a lone `$` pass through as literal text.
//! - Substituted values are not scanned again.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use appsync_lib::placeholder::substitute;
//!
//! let mut vars = BTreeMap::new();
//! vars.insert("userHome".to_string(), "/home/ada".to_string());
//! assert_eq!(substitute("${userHome}/app/${missing}", &vars), "/home/ada/app/${missing}");
//! ```

use std::collections::{BTreeMap, HashMap};

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no variables)
  Literal(String),

  /// `${name}` reference
  Variable(String),
}

/// Looks up variable values during substitution.
pub trait Resolver {
  fn resolve(&self, name: &str) -> Option<&str>;
}

impl Resolver for BTreeMap<String, String> {
  fn resolve(&self, name: &str) -> Option<&str> {
    self.get(name).map(String::as_str)
  }
}

impl Resolver for HashMap<String, String> {
  fn resolve(&self, name: &str) -> Option<&str> {
    self.get(name).map(String::as_str)
  }
}

impl<R: Resolver + ?Sized> Resolver for &R {
  fn resolve(&self, name: &str) -> Option<&str> {
    (**self).resolve(name)
  }
}

/// Parse a string into literal and variable segments.
pub fn parse(input: &str) -> Vec<Segment> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut rest = input;

  while let Some(start) = rest.find("${") {
    let after = &rest[start + 2..];
    match after.find('}') {
      Some(end) => {
        literal.push_str(&rest[..start]);
        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Variable(after[..end].to_string()));
        rest = &after[end + 1..];
      }
      None => break,
    }
  }

  literal.push_str(rest);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  segments
}

/// Names of all variables referenced by `input`, in order of appearance.
pub fn variables(input: &str) -> Vec<String> {
  parse(input)
    .into_iter()
    .filter_map(|segment| match segment {
      Segment::Variable(name) => Some(name),
      Segment::Literal(_) => None,
    })
    .collect()
}

/// Substitute all variables in a string using the provided resolver.
pub fn substitute(input: &str, resolver: &impl Resolver) -> String {
  if !input.contains("${") {
    return input.to_string();
  }
  substitute_segments(&parse(input), resolver)
}

/// Substitute variables in pre-parsed segments.
pub fn substitute_segments(segments: &[Segment], resolver: &impl Resolver) -> String {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Variable(name) => match resolver.resolve(name) {
        Some(value) => result.push_str(value),
        None => {
          result.push_str("${");
          result.push_str(name);
          result.push('}');
        }
      },
    }
  }

  result
}

#[cfg(test)]
mod tests {
  use super::*;

  fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn destination_under_user_home() {
    let resolver = vars(&[("userHome", "/home/ada")]);
    assert_eq!(substitute("${userHome}/.myapp", &resolver), "/home/ada/.myapp");
  }

  #[test]
  fn launch_arguments_with_classpath() {
    let resolver = vars(&[("classpath", "\"lib/a.jar\":\"app.jar\""), ("destDir", "/opt/app")]);
    let args = "-cp ${classpath} -Dhome=${destDir} org.example.Main";
    assert_eq!(
      substitute(args, &resolver),
      "-cp \"lib/a.jar\":\"app.jar\" -Dhome=/opt/app org.example.Main"
    );
  }

  #[test]
  fn unknown_variables_are_left_verbatim() {
    let resolver = vars(&[("a", "1")]);
    assert_eq!(substitute("${a}-${b}-$c", &resolver), "1-${b}-$c");
  }

  #[test]
  fn unclosed_variable_is_literal() {
    let resolver = vars(&[("a", "1")]);
    assert_eq!(substitute("x${a", &resolver), "x${a");
    assert_eq!(parse("x${a"), vec![Segment::Literal("x${a".to_string())]);
  }

  #[test]
  fn substituted_values_are_not_rescanned() {
    let resolver = vars(&[("a", "${b}"), ("b", "nope")]);
    assert_eq!(substitute("${a}", &resolver), "${b}");
  }

  #[test]
  fn source_directory_template() {
    let resolver = vars(&[("filename", "readme.txt")]);
    assert_eq!(
      substitute("https://example.com/docs/${filename}", &resolver),
      "https://example.com/docs/readme.txt"
    );
  }

  #[test]
  fn parse_segments() {
    assert_eq!(
      parse("a${x}b${y}"),
      vec![
        Segment::Literal("a".to_string()),
        Segment::Variable("x".to_string()),
        Segment::Literal("b".to_string()),
        Segment::Variable("y".to_string()),
      ]
    );
    assert_eq!(variables("${x}/${y}/z"), vec!["x".to_string(), "y".to_string()]);
    assert!(parse("").is_empty());
  }
}
