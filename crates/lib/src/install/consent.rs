use std::path::{Path, PathBuf};

use crate::reconcile::ReconciliationPlan;

/// Decisions an install session delegates to the user.
pub trait Consent: Send + Sync {
  /// Picks the destination for a first installation. `None` cancels the session.
  fn choose_destination(&self, suggested: &Path) -> Option<PathBuf>;

  /// Whether an available update should be applied.
  fn confirm_update(&self, plan: &ReconciliationPlan) -> bool;
}

/// Accepts the suggested destination and every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentConsent;

impl Consent for SilentConsent {
  fn choose_destination(&self, suggested: &Path) -> Option<PathBuf> {
    Some(suggested.to_path_buf())
  }

  fn confirm_update(&self, _plan: &ReconciliationPlan) -> bool {
    true
  }
}
