mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./config.toml",
        "./heicforge.toml",
        "~/.config/heicforge/config.toml",
        "/etc/heicforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Write `config` as TOML, creating parent directories
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}

/// Expand a leading `~` in a configured path
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.batch.capacity == 0 {
        anyhow::bail!("Batch capacity must be at least 1");
    }

    if config.batch.concurrency == 0 {
        anyhow::bail!("Batch concurrency must be at least 1");
    }

    if config.batch.codec_timeout_secs == Some(0) {
        anyhow::bail!("Codec timeout must be at least 1 second");
    }

    if !(1..=100).contains(&config.output.quality) {
        anyhow::bail!("JPEG quality must be between 1 and 100");
    }

    if config.output.extension.trim_start_matches('.').is_empty() {
        anyhow::bail!("Output extension cannot be empty");
    }

    if let Some(ref url) = config.remote.url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("Remote URL must start with http:// or https://: {}", url);
        }
    }

    for path in &config.watch.paths {
        let expanded = expand_path(path);
        if config.watch.enabled && !expanded.exists() {
            tracing::warn!("Watch path does not exist: {:?}", expanded);
        }
    }

    Ok(())
}
