use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const SERVER_FILE: &str = "server.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Server configuration loaded from server.json.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_room_id_length")]
    pub room_id_length: usize,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_port() -> u16 {
    3000
}

fn default_room_id_length() -> usize {
    20
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            base_url: None,
            room_id_length: default_room_id_length(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl ServerConfig {
    /// Base URL used for shareable room links.
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }

    pub fn room_link(&self, room_id: &str) -> String {
        format!("{}/room/{}", self.base_url().trim_end_matches('/'), room_id)
    }
}

/// The config directory, `CONFIG_PATH` or `config`.
pub fn config_dir() -> PathBuf {
    PathBuf::from(std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string()))
}

fn io_err(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Initialize the config directory with defaults if missing.
pub fn init(base: &Path) -> Result<(), ConfigError> {
    if !base.exists() {
        fs::create_dir_all(base).map_err(|e| io_err(base, e))?;
    }

    let server_path = base.join(SERVER_FILE);
    if !server_path.exists() {
        let default_config = serde_json::json!({
            "port": default_port(),
            "roomIdLength": default_room_id_length(),
            "channelCapacity": default_channel_capacity(),
        });
        let text = serde_json::to_string_pretty(&default_config).map_err(|source| {
            ConfigError::Parse {
                path: server_path.clone(),
                source,
            }
        })?;
        fs::write(&server_path, text).map_err(|e| io_err(&server_path, e))?;
        tracing::info!("Wrote default config to {}", server_path.display());
    }

    Ok(())
}

/// Load server.json from `base`, then apply `PORT` / `BASE_URL` overrides.
pub fn load(base: &Path) -> Result<ServerConfig, ConfigError> {
    let mut config = load_file(base)?;

    if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
        config.port = port;
    }
    if let Ok(base_url) = std::env::var("BASE_URL") {
        config.base_url = Some(base_url);
    }

    Ok(config)
}

fn load_file(base: &Path) -> Result<ServerConfig, ConfigError> {
    let path = base.join(SERVER_FILE);
    if !path.exists() {
        return Ok(ServerConfig::default());
    }
    let data = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_json::from_str(&data).map_err(|source| ConfigError::Parse { path, source })
}
