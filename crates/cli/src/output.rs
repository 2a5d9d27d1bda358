//! CLI output formatting utilities.
//!
//! Colored status lines, human-readable sizes and durations, and the rendering
//! of plans and transfer events.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use appsync_lib::manifest::FileEntry;
use appsync_lib::reconcile::ReconciliationPlan;
use appsync_lib::transfer::TransferEvent;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const ADD: &str = "+";
  pub const MODIFY: &str = "~";
  pub const REMOVE: &str = "-";
}

pub fn truncate_hash(hash: &str) -> &str {
  let len = hash.len().min(12);
  &hash[..len]
}

pub fn format_bytes(bytes: u64) -> String {
  const KB: u64 = 1024;
  const MB: u64 = KB * 1024;
  const GB: u64 = MB * 1024;

  if bytes >= GB {
    format!("{:.1} GB", bytes as f64 / GB as f64)
  } else if bytes >= MB {
    format!("{:.1} MB", bytes as f64 / MB as f64)
  } else if bytes >= KB {
    format!("{:.1} KB", bytes as f64 / KB as f64)
  } else {
    format!("{} B", bytes)
  }
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    format!("{}m {}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

fn print_entry(symbol: &str, entry: &FileEntry, verbose: bool) {
  let colored = match symbol {
    symbols::ADD => symbol.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
    symbols::MODIFY => symbol.if_supports_color(Stream::Stdout, |s| s.yellow()).to_string(),
    _ => symbol.if_supports_color(Stream::Stdout, |s| s.red()).to_string(),
  };
  let mut line = format!("  {} {} ({})", colored, entry.relative_path(), format_bytes(entry.size_bytes));
  if entry.rollout_order != 0 {
    line.push_str(&format!(" [order {}]", entry.rollout_order));
  }
  println!("{}", line);
  if verbose {
    println!(
      "      {} {} {}",
      truncate_hash(&entry.content_hash).if_supports_color(Stream::Stdout, |s| s.dimmed()),
      symbols::ARROW,
      entry.source_location
    );
  }
}

/// Human-readable listing of a plan.
pub fn print_plan(plan: &ReconciliationPlan, verbose: bool) {
  for entry in &plan.new_files {
    print_entry(symbols::ADD, entry, verbose);
  }
  for entry in &plan.changed_files {
    print_entry(symbols::MODIFY, entry, verbose);
  }
  for deleted in &plan.deleted {
    println!(
      "  {} {}",
      symbols::REMOVE.if_supports_color(Stream::Stdout, |s| s.red()),
      deleted.key
    );
  }
  if verbose {
    for entry in &plan.unchanged_files {
      println!(
        "    {}",
        entry.relative_path().if_supports_color(Stream::Stdout, |s| s.dimmed())
      );
    }
  }

  println!();
  print_stat("Destination", &plan.destination.display().to_string());
  print_stat("New", &plan.new_files.len().to_string());
  print_stat("Changed", &plan.changed_files.len().to_string());
  print_stat("Deleted", &plan.deleted.len().to_string());
  print_stat("Unchanged", &plan.unchanged_files.len().to_string());
  print_stat("To expand", &plan.decompress_files.len().to_string());
  print_stat("Download size", &format_bytes(plan.transfer_bytes()));
  let phases: Vec<String> = plan.phases.iter().map(i32::to_string).collect();
  print_stat("Phases", &phases.join(", "));
}

/// One line per noteworthy transfer event. Byte progress is not printed.
pub fn print_event(event: &TransferEvent) {
  match event {
    TransferEvent::PhaseStarted { order, transfers } if *transfers > 0 => {
      print_info(&format!("Phase {}: {} transfer(s)", order, transfers));
    }
    TransferEvent::DirectoryCreated { path } => {
      print_info(&format!("Created {}", path.display()));
    }
    TransferEvent::DirectoryFailed { path, message } => {
      print_warning(&format!("Could not create {}: {}", path.display(), message));
    }
    TransferEvent::FileCopied { key, bytes, .. } => {
      println!(
        "  {} {} ({})",
        symbols::ADD.if_supports_color(Stream::Stdout, |s| s.green()),
        key,
        format_bytes(*bytes)
      );
    }
    TransferEvent::NotFound { source, .. } => {
      print_error(&format!("Not found: {}", source));
    }
    TransferEvent::IntegrityWarning { key, expected, actual } => {
      print_warning(&format!(
        "{}: expected {}, got {}",
        key,
        truncate_hash(expected),
        truncate_hash(actual)
      ));
    }
    TransferEvent::FileDeleted { key } => {
      println!("  {} {}", symbols::REMOVE.if_supports_color(Stream::Stdout, |s| s.red()), key);
    }
    TransferEvent::DeleteFailed { key, message } => {
      print_warning(&format!("Could not delete {}: {}", key, message));
    }
    TransferEvent::Decompressed { key, entries } => {
      print_info(&format!("Expanded {} ({} file(s))", key, entries));
    }
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_hash() {
    assert_eq!(truncate_hash("abcdef123456789"), "abcdef123456");
    assert_eq!(truncate_hash("short"), "short");
    assert_eq!(truncate_hash(""), "");
  }

  #[test]
  fn test_format_bytes() {
    assert_eq!(format_bytes(500), "500 B");
    assert_eq!(format_bytes(1024), "1.0 KB");
    assert_eq!(format_bytes(1536), "1.5 KB");
    assert_eq!(format_bytes(1048576), "1.0 MB");
    assert_eq!(format_bytes(1073741824), "1.0 GB");
  }

  #[test]
  fn test_format_duration() {
    assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
    assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
  }
}
