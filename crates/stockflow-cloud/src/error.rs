//! Cloud provisioning error types

use thiserror::Error;

/// Cloud provisioning errors
///
/// Platform adapters normalize their native error shapes into these variants,
/// so the engines never inspect error text.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource not ready: {0}")]
    Pending(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Dependency unmet: {0}")]
    DependencyUnmet(String),

    #[error("Packaging failed: {0}")]
    PackagingFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure classes used to decide how a step recovers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Expected on re-run; switch to the reuse path
    AlreadyExists,
    /// Expected during teardown; log and continue
    NotFound,
    /// Resource is still activating; keep polling
    TransientPending,
    /// Operator-side problem; abort before side effects
    Misconfiguration,
    /// Anything else the platform rejected
    PlatformFailure,
}

impl CloudError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CloudError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            CloudError::NotFound(_) => ErrorKind::NotFound,
            CloudError::Pending(_) => ErrorKind::TransientPending,
            CloudError::InvalidConfig(_)
            | CloudError::DependencyUnmet(_)
            | CloudError::PackagingFailed(_) => ErrorKind::Misconfiguration,
            CloudError::ApiError(_)
            | CloudError::Timeout(_)
            | CloudError::Io(_)
            | CloudError::Json(_) => ErrorKind::PlatformFailure,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind() == ErrorKind::AlreadyExists
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
