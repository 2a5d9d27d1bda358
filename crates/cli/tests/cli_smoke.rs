//! CLI smoke tests for appsync.
//!
//! These tests run the binary against local directories only, so no network
//! access is needed.

use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

/// Get a Command for the appsync binary.
fn appsync_cmd() -> Command {
  cargo_bin_cmd!("appsync")
}

fn write(dir: &Path, rel: &str, content: &str) {
  let path = dir.join(rel);
  std::fs::create_dir_all(path.parent().unwrap()).unwrap();
  std::fs::write(path, content).unwrap();
}

/// A published application directory plus a manifest describing it.
fn published_app(temp: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
  let app = temp.path().join("release");
  write(&app, "lib/app.jar", "application");
  write(&app, "readme.txt", "hello");

  let manifest = temp.path().join("application.xml");
  std::fs::write(
    &manifest,
    r#"<?xml version="1.0" encoding="UTF-8"?>
<application>
  <title>Smoke</title>
  <destPath>${userHome}/installed</destPath>
  <idFilename>.smoke-app</idFilename>
  <silentInstall>true</silentInstall>
</application>
"#,
  )
  .unwrap();

  appsync_cmd()
    .arg("generate")
    .arg("--manifest")
    .arg(&manifest)
    .arg("--dir")
    .arg(&app)
    .arg("--base-url")
    .arg(app.display().to_string())
    .assert()
    .success()
    .stdout(predicate::str::contains("Added: 2"));

  (app, manifest)
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  appsync_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  appsync_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("appsync"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["sync", "plan", "fetch", "generate"] {
    appsync_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// generate / plan
// =============================================================================

#[test]
fn generate_writes_file_entries() {
  let temp = TempDir::new().unwrap();
  let (_, manifest) = published_app(&temp);

  let content = std::fs::read_to_string(&manifest).unwrap();
  assert!(content.contains("file=\"app.jar\""));
  assert!(content.contains("srcFileUrl="));
  assert!(content.contains("${userHome}/installed"));
  assert!(temp.path().join("application.xml.bak").exists());
}

#[test]
fn plan_lists_new_files_for_empty_destination() {
  let temp = TempDir::new().unwrap();
  let (_, manifest) = published_app(&temp);
  let dest = temp.path().join("dest");

  appsync_cmd()
    .arg("plan")
    .arg("--manifest")
    .arg(&manifest)
    .arg("--dest")
    .arg(&dest)
    .assert()
    .success()
    .stdout(predicate::str::contains("New: 2"))
    .stdout(predicate::str::contains("lib/app.jar"));
}

#[test]
fn plan_json_output() {
  let temp = TempDir::new().unwrap();
  let (_, manifest) = published_app(&temp);

  appsync_cmd()
    .arg("--output")
    .arg("json")
    .arg("plan")
    .arg("--manifest")
    .arg(&manifest)
    .arg("--dest")
    .arg(temp.path().join("dest"))
    .assert()
    .success()
    .stdout(predicate::str::contains("\"new_files\""));
}

// =============================================================================
// sync / fetch
// =============================================================================

#[test]
#[serial]
fn sync_installs_and_second_sync_is_up_to_date() {
  let temp = TempDir::new().unwrap();
  let (_, manifest) = published_app(&temp);
  let home = temp.path().join("home");
  std::fs::create_dir_all(&home).unwrap();
  let user_home = format!("userHome={}", temp.path().display());

  let sync = || {
    let mut cmd = appsync_cmd();
    cmd
      .arg("sync")
      .arg("--manifest")
      .arg(&manifest)
      .arg("--marker-dir")
      .arg(&home)
      .arg("-o")
      .arg(&user_home)
      .arg("--yes")
      .arg("--no-launch")
      .env("HOME", &home);
    cmd
  };

  sync()
    .assert()
    .success()
    .stdout(predicate::str::contains("Installation complete!"));

  let installed = temp.path().join("installed");
  assert_eq!(std::fs::read_to_string(installed.join("lib/app.jar")).unwrap(), "application");
  assert!(installed.join("application.xml").exists());
  assert!(home.join(".smoke-app").exists());

  sync()
    .assert()
    .success()
    .stdout(predicate::str::contains("up to date"));
}

#[test]
#[serial]
fn fetch_and_delete_single_file() {
  let temp = TempDir::new().unwrap();
  let (_, manifest) = published_app(&temp);
  let dest = temp.path().join("dest");

  appsync_cmd()
    .arg("fetch")
    .arg("--manifest")
    .arg(&manifest)
    .arg("--dest")
    .arg(&dest)
    .arg("readme.txt")
    .assert()
    .success();
  assert_eq!(std::fs::read_to_string(dest.join("readme.txt")).unwrap(), "hello");

  appsync_cmd()
    .arg("fetch")
    .arg("--manifest")
    .arg(&manifest)
    .arg("--dest")
    .arg(&dest)
    .arg("--delete")
    .arg("readme.txt")
    .assert()
    .success()
    .stdout(predicate::str::contains("Deleted readme.txt"));
  assert!(!dest.join("readme.txt").exists());
}

// =============================================================================
// Error Handling
// =============================================================================

#[test]
fn missing_manifest_fails() {
  let temp = TempDir::new().unwrap();

  appsync_cmd()
    .arg("plan")
    .arg("--manifest")
    .arg(temp.path().join("nope.xml"))
    .arg("--dest")
    .arg(temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load manifest"));
}

#[test]
fn undeclared_file_fetch_fails() {
  let temp = TempDir::new().unwrap();
  let (_, manifest) = published_app(&temp);

  appsync_cmd()
    .arg("fetch")
    .arg("--manifest")
    .arg(&manifest)
    .arg("--dest")
    .arg(temp.path().join("dest"))
    .arg("lib/unknown.jar")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Unknown file! lib/unknown.jar"));
}

#[test]
fn delete_outside_destination_is_rejected() {
  let temp = TempDir::new().unwrap();
  let (_, manifest) = published_app(&temp);
  let dest = temp.path().join("dest");
  std::fs::create_dir_all(&dest).unwrap();
  write(temp.path(), "outside.txt", "keep");

  appsync_cmd()
    .arg("fetch")
    .arg("--manifest")
    .arg(&manifest)
    .arg("--dest")
    .arg(&dest)
    .arg("--delete")
    .arg("../outside.txt")
    .assert()
    .failure()
    .stderr(predicate::str::contains("escapes the destination directory"));
  assert!(temp.path().join("outside.txt").exists());
}

#[test]
fn malformed_option_is_rejected() {
  appsync_cmd()
    .arg("plan")
    .arg("--manifest")
    .arg("x.xml")
    .arg("-o")
    .arg("novalue")
    .assert()
    .failure()
    .stderr(predicate::str::contains("expected key=value"));
}
