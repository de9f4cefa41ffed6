use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Config file not found. Looked in:\n\
        - STRATUS_CONFIG_PATH\n\
        - current directory: stratus.yaml, .stratus.yaml\n\
        - ~/.config/stratus/config.yaml"
    )]
    ConfigFileNotFound,

    #[error("No endpoint configured; set `endpoint` in the config file or STRATUS_ENDPOINT")]
    MissingEndpoint,

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
