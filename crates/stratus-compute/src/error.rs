//! Compute error types

use stratus_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("Host agent returned {status}: {message}")]
    HostAgent { status: u16, message: String },

    #[error("Host agent response is not JSON: {0}")]
    InvalidResponse(String),

    #[error("Storage {0} has no master host")]
    NoMasterHost(String),

    #[error("Invalid storage conf: {0}")]
    InvalidConf(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] CloudError),
}

impl From<ComputeError> for CloudError {
    fn from(err: ComputeError) -> Self {
        match err {
            ComputeError::CloudError(inner) => inner,
            ComputeError::NoMasterHost(_) => CloudError::NotFound(err.to_string()),
            other => CloudError::InternalError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ComputeError>;
