mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;
use vidpress_common::ProfileId;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    parse_config(&content).with_context(|| format!("Invalid config file: {:?}", path))
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./vidpress.toml",
        "./config.toml",
        "~/.config/vidpress/config.toml",
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

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes must be greater than 0");
    }

    if config.server.request_timeout_secs == 0 {
        anyhow::bail!("server.request_timeout_secs must be at least 1");
    }

    if config.server.upload_threads == 0 {
        anyhow::bail!("server.upload_threads must be at least 1");
    }

    if config.server.max_concurrent_jobs == 0 {
        anyhow::bail!("server.max_concurrent_jobs must be at least 1");
    }

    if config.defaults.concurrency == 0 {
        anyhow::bail!("defaults.concurrency must be at least 1");
    }

    if config.defaults.threads == Some(0) {
        anyhow::bail!("defaults.threads must be at least 1");
    }

    if config.defaults.level.parse::<ProfileId>().is_err() {
        tracing::warn!(
            "Unknown compression level '{}' in config; using normal",
            config.defaults.level
        );
    }

    if let Some(ref ffmpeg) = config.tools.ffmpeg_path {
        if !ffmpeg.exists() {
            tracing::warn!("Configured ffmpeg path does not exist: {:?}", ffmpeg);
        }
    }

    Ok(())
}
