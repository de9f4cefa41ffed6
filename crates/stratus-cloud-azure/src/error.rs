//! Azure provider error types

use stratus_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Azure API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid address prefix on {0}: {1}")]
    InvalidPrefix(String, String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] CloudError),
}

impl From<AzureError> for CloudError {
    fn from(err: AzureError) -> Self {
        match err {
            AzureError::NotFound(_) => CloudError::NotFound(err.to_string()),
            AzureError::MissingEnvVar(name) => CloudError::MissingParameter(name),
            AzureError::CloudError(inner) => inner,
            other => CloudError::InternalError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AzureError>;
