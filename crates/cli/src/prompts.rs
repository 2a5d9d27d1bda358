use anyhow::{Result, bail};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use appsync_lib::install::Consent;
use appsync_lib::reconcile::ReconciliationPlan;

use crate::output::{format_bytes, print_warning};

fn ensure_interactive() -> Result<()> {
  if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
    bail!("Cannot prompt in non-interactive mode. Use --yes to proceed.");
  }
  Ok(())
}

pub fn confirm(message: &str, force: bool) -> Result<bool> {
  if force {
    return Ok(true);
  }
  ensure_interactive()?;

  write!(io::stderr(), "{} [y/N] ", message)?;
  io::stderr().flush()?;

  let mut input = String::new();
  io::stdin().read_line(&mut input)?;

  Ok(matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Asks for a directory, offering `suggested`. An empty answer accepts the
/// suggestion, a single `-` cancels.
pub fn ask_directory(message: &str, suggested: &Path) -> Result<Option<PathBuf>> {
  ensure_interactive()?;

  write!(io::stderr(), "{} [{}] ", message, suggested.display())?;
  io::stderr().flush()?;

  let mut input = String::new();
  io::stdin().read_line(&mut input)?;

  Ok(match input.trim() {
    "" => Some(suggested.to_path_buf()),
    "-" => None,
    answer => Some(PathBuf::from(answer)),
  })
}

/// Terminal prompts for install sessions.
pub struct PromptConsent {
  pub assume_yes: bool,
}

impl Consent for PromptConsent {
  fn choose_destination(&self, suggested: &Path) -> Option<PathBuf> {
    if self.assume_yes {
      return Some(suggested.to_path_buf());
    }
    ask_directory("Install to", suggested).unwrap_or_else(|e| {
      print_warning(&e.to_string());
      None
    })
  }

  fn confirm_update(&self, plan: &ReconciliationPlan) -> bool {
    let message = format!(
      "An update is available ({} new, {} changed, {} deleted, {}). Install it now?",
      plan.new_files.len(),
      plan.changed_files.len(),
      plan.deleted.len(),
      format_bytes(plan.transfer_bytes())
    );
    confirm(&message, self.assume_yes).unwrap_or_else(|e| {
      print_warning(&e.to_string());
      false
    })
  }
}
