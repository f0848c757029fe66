//! Configuration module for SavedSearch-RS
//!
//! Handles loading settings from YAML or `.splunkrc` files and environment variables.

mod settings;

pub use settings::*;

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Load settings from the first file found, falling back to defaults.
///
/// `SAVEDSEARCH_SETTINGS_PATH` wins over the default locations. A file named
/// `.splunkrc` (or ending in `.splunkrc`) is read as key=value lines, anything
/// else as YAML. Environment overrides are applied last.
pub fn load() -> Result<Settings> {
    if let Ok(path) = std::env::var("SAVEDSEARCH_SETTINGS_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return load_path(&path);
        }
    }

    for path in default_paths() {
        if path.exists() {
            return load_path(&path);
        }
    }

    info!("No settings file found, using defaults");
    let mut settings = Settings::default();
    settings.merge_env();
    Ok(settings)
}

/// Load settings from a specific file and apply environment overrides
pub fn load_path(path: &Path) -> Result<Settings> {
    info!("Loading settings from: {}", path.display());
    let mut settings = if is_rc_file(path) {
        Settings::from_rc_file(path)?
    } else {
        Settings::from_file(path)?
    };
    settings.merge_env();
    Ok(settings)
}

fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("settings.yml"),
        PathBuf::from("config/settings.yml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("savedsearch-rs/settings.yml"));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".splunkrc"));
    }
    paths
}

fn is_rc_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(".splunkrc"))
        .unwrap_or(false)
}
