use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The process an install session hands over to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchCommand {
  pub program: String,
  pub args: Vec<String>,
  pub working_dir: PathBuf,
}

impl LaunchCommand {
  /// Builds a command from a resolved executable and argument string.
  pub fn new(program: &str, arguments: Option<&str>, working_dir: &Path) -> Self {
    Self {
      program: program.trim().to_string(),
      args: arguments.map(split_args).unwrap_or_default(),
      working_dir: working_dir.to_path_buf(),
    }
  }

  /// A process builder for this command, not yet spawned.
  pub fn command(&self) -> std::process::Command {
    let mut command = std::process::Command::new(&self.program);
    command.args(&self.args).current_dir(&self.working_dir);
    command
  }
}

impl fmt::Display for LaunchCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", quote(&self.program))?;
    for arg in &self.args {
      write!(f, " {}", quote(arg))?;
    }
    Ok(())
  }
}

fn quote(arg: &str) -> String {
  if arg.is_empty() || arg.contains(char::is_whitespace) {
    format!("\"{}\"", arg)
  } else {
    arg.to_string()
  }
}

/// Splits an argument string at whitespace. Single or double quotes group
/// text into one argument and are removed; adjacent quoted and unquoted parts
/// join, so `"a.jar":"b.jar"` is one argument.
pub fn split_args(input: &str) -> Vec<String> {
  let mut args = Vec::new();
  let mut current = String::new();
  let mut in_arg = false;
  let mut quote: Option<char> = None;

  for c in input.chars() {
    match quote {
      Some(q) if c == q => quote = None,
      Some(_) => current.push(c),
      None if c == '"' || c == '\'' => {
        quote = Some(c);
        in_arg = true;
      }
      None if c.is_whitespace() => {
        if in_arg {
          args.push(std::mem::take(&mut current));
          in_arg = false;
        }
      }
      None => {
        current.push(c);
        in_arg = true;
      }
    }
  }
  if in_arg {
    args.push(current);
  }
  args
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn splits_on_whitespace_and_groups_quotes() {
    assert_eq!(
      split_args("  -Xmx512m   -cp \"lib/a.jar\":\"my app.jar\" 'two words' Main "),
      vec!["-Xmx512m", "-cp", "lib/a.jar:my app.jar", "two words", "Main"]
    );
    assert_eq!(split_args("\"\""), vec![""]);
    assert!(split_args("   ").is_empty());
  }

  #[test]
  fn unterminated_quote_runs_to_the_end() {
    assert_eq!(split_args("-jar \"my app.jar"), vec!["-jar", "my app.jar"]);
  }

  #[test]
  fn renders_a_readable_command_line() {
    let command = LaunchCommand::new(
      "/opt/jre/bin/java",
      Some("-cp \"lib/a.jar\" -Dtitle='My App' Main"),
      Path::new("/opt/app"),
    );
    assert_eq!(command.args, vec!["-cp", "lib/a.jar", "-Dtitle=My App", "Main"]);
    assert_eq!(command.to_string(), "/opt/jre/bin/java -cp lib/a.jar \"-Dtitle=My App\" Main");
    assert_eq!(command.command().get_current_dir(), Some(Path::new("/opt/app")));
  }
}
