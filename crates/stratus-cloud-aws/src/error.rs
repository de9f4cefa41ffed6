//! AWS provider error types

use stratus_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("EC2 {operation} failed: {message}")]
    Api { operation: String, message: String },

    #[error("Elastic IP not found: {0}")]
    EipNotFound(String),

    #[error("Elastic IP {0} is missing field {1}")]
    IncompleteAddress(String, &'static str),

    #[error("Elastic IP {eip} is associated with another instance {instance}")]
    AssociatedElsewhere { eip: String, instance: String },

    #[error("Not supported by AWS: {0}")]
    Unsupported(String),

    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),
}

impl From<AwsError> for CloudError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::EipNotFound(_) => CloudError::NotFound(err.to_string()),
            AwsError::AssociatedElsewhere { .. } => CloudError::Conflict(err.to_string()),
            AwsError::Unsupported(_) => CloudError::UnsupportedOperation(err.to_string()),
            AwsError::Cloud(inner) => inner,
            AwsError::Api { .. } | AwsError::IncompleteAddress(..) => {
                CloudError::InternalError(err.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;
