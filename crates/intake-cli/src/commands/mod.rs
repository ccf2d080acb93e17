//! CLI subcommands.

pub mod catalog;
pub mod config;
pub mod process;
pub mod unmatched;
pub mod watch;

use std::path::{Path, PathBuf};

use intake_core::IntakeConfig;

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("intake")
        .join("config.json")
}

/// The `--config` path, or the default location.
pub fn config_path(config_path: Option<&str>) -> PathBuf {
    config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

/// Load the configuration, falling back to defaults when no file exists.
///
/// An explicit `--config` path must exist.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<IntakeConfig> {
    if let Some(path) = config_path {
        return IntakeConfig::from_file(Path::new(path))
            .map_err(|e| anyhow::anyhow!("Cannot load config {}: {}", path, e));
    }

    let path = default_config_path();
    if path.exists() {
        Ok(IntakeConfig::from_file(&path)?)
    } else {
        Ok(IntakeConfig::default())
    }
}
