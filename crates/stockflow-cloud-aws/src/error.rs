//! AWS error normalization
//!
//! Every SDK failure passes through [`AwsError`] once, which maps the
//! service error code onto the provisioning taxonomy.

use aws_sdk_s3::error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError};
use stockflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("{message}")]
    Service {
        code: Option<String>,
        message: String,
    },

    #[error("Request could not be built: {0}")]
    Build(#[from] BuildError),
}

impl AwsError {
    pub fn from_sdk<E, R>(err: SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: std::fmt::Debug + 'static,
    {
        AwsError::Service {
            code: err.code().map(str::to_string),
            message: DisplayErrorContext(&err).to_string(),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            AwsError::Service { code, .. } => code.as_deref(),
            AwsError::Build(_) => None,
        }
    }

    /// Map onto the provisioning taxonomy. `resource` names what the call
    /// was about.
    pub fn into_cloud(self, resource: &str) -> CloudError {
        match self.code() {
            Some(
                "BucketAlreadyOwnedByYou"
                | "ResourceInUseException"
                | "ResourceConflictException"
                | "ConflictException",
            ) => CloudError::AlreadyExists(resource.to_string()),
            Some(
                "NoSuchBucket"
                | "NotFound"
                | "NotFoundException"
                | "ResourceNotFoundException",
            ) => CloudError::NotFound(resource.to_string()),
            Some("BucketAlreadyExists") => CloudError::ApiError(format!(
                "bucket name {} is owned by another account; choose a different UNIQUE_PREFIX",
                resource
            )),
            _ => match self {
                AwsError::Build(e) => CloudError::InvalidConfig(e.to_string()),
                AwsError::Service { message, .. } => {
                    CloudError::ApiError(format!("{}: {}", resource, message))
                }
            },
        }
    }
}

/// Classify a failed SDK call
pub(crate) fn classify<E, R>(err: SdkError<E, R>, resource: &str) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug + 'static,
{
    let err = AwsError::from_sdk(err);
    tracing::debug!("{} failed: {}", resource, err);
    err.into_cloud(resource)
}

/// Classify a request builder failure
pub(crate) fn invalid(err: BuildError) -> CloudError {
    AwsError::from(err).into_cloud("request")
}
