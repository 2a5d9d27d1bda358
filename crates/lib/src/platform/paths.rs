use crate::consts::APP_NAME;
use std::path::PathBuf;

fn env_dir(key: &str) -> Option<PathBuf> {
  std::env::var_os(key).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  env_dir("USERPROFILE")
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  env_dir("HOME")
}

/// Returns the directory for data files for the application
#[cfg(windows)]
pub fn data_dir() -> Option<PathBuf> {
  env_dir("APPDATA").map(|appdata| appdata.join(APP_NAME))
}

/// Returns the directory for data files for the application
#[cfg(not(windows))]
pub fn data_dir() -> Option<PathBuf> {
  env_dir("XDG_DATA_HOME")
    .or_else(|| home_dir().map(|home| home.join(".local").join("share")))
    .map(|data_home| data_home.join(APP_NAME))
}

/// Directory that holds install markers: the home directory, or the data
/// directory when no home is set.
pub fn marker_dir() -> Option<PathBuf> {
  home_dir().or_else(data_dir)
}
