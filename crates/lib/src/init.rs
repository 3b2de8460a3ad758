//! Initialize the configuration directory: create ~/.relay, a default config and the
//! credentials directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with every default spelled out if missing.
/// - Creates the credentials directory (from the config, or `credentials` next to it).
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        let default_config = serde_json::to_string_pretty(&config::Config::default())
            .context("serializing default config")?;
        std::fs::write(config_path, default_config)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, skipping", config_path.display());
    }

    let (config, _) = config::load_config(Some(config_path.to_path_buf()))?;
    let credentials = config::resolve_credentials_dir(&config, config_path);
    if !credentials.exists() {
        std::fs::create_dir_all(&credentials).with_context(|| {
            format!("creating credentials directory {}", credentials.display())
        })?;
        log::info!("created credentials directory at {}", credentials.display());
    }

    Ok(config_dir.to_path_buf())
}
