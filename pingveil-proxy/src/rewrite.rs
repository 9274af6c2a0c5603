//! Loading the ping rewrite settings from their TOML file.

use std::path::{Path, PathBuf};

use pingveil_core::ConfigView;
use thiserror::Error;
use tracing::{info, warn};

/// Written on first start when no config file exists.
pub const DEFAULT_REWRITE_CONFIG: &str = r#"# Ping rewrite settings. Reload with `POST /reload` or SIGHUP.

# live_mirror: relay the backend's status
# static_config: answer from the values below
mode = "live_mirror"

# backend_reported: advertise the backend's protocol (or `protocol` below)
# client_reported: echo each client's own protocol
protocol_source = "backend_reported"

# MiniMessage-style markup, e.g. "<gold>My <bold>Server</bold>"
motd = "A Minecraft Server"
version = "Spigot 1.8.8"
protocol = 47
online_players = 0
max_players = 1

# Base64 PNG (or JPEG/GIF/BMP), with or without a data:image/...;base64, header
favicon = ""
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    ConfigUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    ConfigInvalid {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Parse rewrite settings from TOML text. Missing keys take their defaults.
pub fn parse(raw: &str) -> Result<ConfigView, toml::de::Error> {
    toml::from_str(raw)
}

/// Read and parse the config file.
pub async fn load(path: &Path) -> Result<ConfigView, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::ConfigUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
    let view = parse(&raw).map_err(|source| ConfigError::ConfigInvalid {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        mode = ?view.mode,
        protocol_source = ?view.protocol_source,
        "loaded ping rewrite config"
    );
    Ok(view)
}

/// Load the config file, writing the default one first if it does not exist.
pub async fn load_or_init(path: &Path) -> Result<ConfigView, ConfigError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        warn!(path = %path.display(), "config file not found, writing defaults");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::ConfigUnreadable {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(path, DEFAULT_REWRITE_CONFIG)
            .await
            .map_err(|source| ConfigError::ConfigUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
    }
    load(path).await
}
