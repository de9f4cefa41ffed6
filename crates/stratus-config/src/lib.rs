pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "STRATUS_CONFIG_PATH";
pub const ENDPOINT_ENV: &str = "STRATUS_ENDPOINT";
pub const TOKEN_ENV: &str = "STRATUS_TOKEN";

/// `~/.config/stratus`, created when missing
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("stratus");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the client config file
///
/// Lookup order:
/// 1. `STRATUS_CONFIG_PATH`
/// 2. current directory: `stratus.yaml`, `.stratus.yaml`
/// 3. `~/.config/stratus/config.yaml`
pub fn find_client_config() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    for filename in ["stratus.yaml", ".stratus.yaml"] {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("stratus").join("config.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Connection settings of the API client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl ClientConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply `STRATUS_ENDPOINT` / `STRATUS_TOKEN` on top of the file values
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV)
            && !endpoint.is_empty()
        {
            self.endpoint = endpoint;
        }
        if let Ok(token) = std::env::var(TOKEN_ENV)
            && !token.is_empty()
        {
            self.token = Some(token);
        }
        self
    }

    /// Discovered config file (if any) plus environment overrides
    pub fn load() -> Result<Self> {
        let config = match find_client_config() {
            Ok(path) => Self::from_file(&path)?,
            Err(ConfigError::ConfigFileNotFound) => Self::default(),
            Err(e) => return Err(e),
        }
        .with_env_overrides();

        if config.endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        Ok(config)
    }
}
