//! Cloud resource error types

use thiserror::Error;

/// Canonical error kind reported by every driver, store and task operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingParameter,
    DuplicateResource,
    NotFound,
    NotEmpty,
    Conflict,
    Timeout,
    UnsupportedOperation,
    InternalError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::MissingParameter => write!(f, "missing parameter"),
            ErrorKind::DuplicateResource => write!(f, "duplicate resource"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::NotEmpty => write!(f, "not empty"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::UnsupportedOperation => write!(f, "unsupported operation"),
            ErrorKind::InternalError => write!(f, "internal error"),
        }
    }
}

/// Cloud resource errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Resource already exists: {0}")]
    DuplicateResource(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource is still in use: {0}")]
    NotEmpty(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("{operation} {resource}: {source}")]
    Context {
        operation: String,
        resource: String,
        #[source]
        source: Box<CloudError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Kind of the innermost cause; context wrappers are transparent
    pub fn kind(&self) -> ErrorKind {
        match self {
            CloudError::MissingParameter(_) => ErrorKind::MissingParameter,
            CloudError::DuplicateResource(_) => ErrorKind::DuplicateResource,
            CloudError::NotFound(_) => ErrorKind::NotFound,
            CloudError::NotEmpty(_) => ErrorKind::NotEmpty,
            CloudError::Conflict(_) => ErrorKind::Conflict,
            CloudError::Timeout(_) => ErrorKind::Timeout,
            CloudError::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            CloudError::Context { source, .. } => source.kind(),
            CloudError::InternalError(_) | CloudError::Io(_) | CloudError::Json(_) => {
                ErrorKind::InternalError
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Wrap this error with the operation and resource it happened on
    pub fn with_context(self, operation: impl Into<String>, resource: impl Into<String>) -> Self {
        CloudError::Context {
            operation: operation.into(),
            resource: resource.into(),
            source: Box::new(self),
        }
    }
}

/// Attach operation context to fallible calls
pub trait ResultExt<T> {
    fn context(self, operation: &str, resource: &str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<CloudError>,
{
    fn context(self, operation: &str, resource: &str) -> Result<T> {
        self.map_err(|e| e.into().with_context(operation, resource))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
