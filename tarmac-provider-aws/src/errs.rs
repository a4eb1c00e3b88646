//! Errors returned by AWS APIs

use aws_sdk_cloudcontrol::error::{DisplayErrorContext, ProvideErrorMetadata};
use tarmac_core::id::IdError;
use tarmac_core::provider::ProviderError;
use tarmac_core::waiter::{StateChangeError, WaitError};
use thiserror::Error;

pub const ERR_CODE_RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
pub const ERR_CODE_THROTTLING: &str = "ThrottlingException";
pub const ERR_CODE_CONCURRENT_OPERATION: &str = "ConcurrentOperationException";
pub const ERR_CODE_CONFLICT: &str = "ConflictException";

#[derive(Debug, Error)]
pub enum AwsError {
    /// Error returned by a remote API, classified by its error code
    #[error("{code}: {message}")]
    Api { code: String, message: String },

    /// The remote API answered with something we cannot use
    #[error("unexpected response: {0}")]
    Response(String),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    Wait(#[from] WaitError),
}

impl AwsError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Keep the error code and message of an SDK error
    pub fn from_sdk<E>(err: E) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error,
    {
        let code = err.code().unwrap_or("Unknown").to_string();
        let message = match err.message() {
            Some(message) => message.to_string(),
            None => DisplayErrorContext(&err).to_string(),
        };
        Self::Api { code, message }
    }

    /// Remote error code, if the error came from an API
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_code(&self, code: &str) -> bool {
        self.code() == Some(code)
    }

    pub fn is_not_found(&self) -> bool {
        self.is_code(ERR_CODE_RESOURCE_NOT_FOUND)
    }
}

impl<T> From<StateChangeError<T>> for AwsError {
    fn from(err: StateChangeError<T>) -> Self {
        Self::Wait(err.error)
    }
}

impl From<AwsError> for ProviderError {
    fn from(err: AwsError) -> Self {
        ProviderError::new(err.to_string()).with_cause(err)
    }
}
