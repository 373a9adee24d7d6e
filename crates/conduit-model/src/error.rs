use thiserror::Error;

use crate::types::{
    CANCELLED_CODE, INTERNAL_ERROR_CODE, INVALID_REQUEST_CODE, ResponseEvent, STREAM_ERROR_CODE, UPSTREAM_ERROR_CODE,
};

/// Errors raised while adapting a conversation to a provider
#[derive(Debug, Error)]
pub enum ModelError {
    /// A generation knob has no equivalent in the provider protocol
    #[error("unsupported parameter: {0}")]
    UnsupportedParameter(String),

    /// Only plain-text responses can be requested
    #[error("unsupported response MIME type: {0}")]
    UnsupportedResponseFormat(String),

    /// The conversation cannot be expressed in the provider protocol
    #[error("translation failed: {0}")]
    Translation(String),

    /// Transport failure or provider-side rejection
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Failure while reading a response stream
    #[error("streaming error: {0}")]
    Streaming(String),

    /// The caller cancelled the call
    #[error("request cancelled")]
    Cancelled,

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ModelError {
    /// Whether the error was raised before any network call
    ///
    /// Configuration errors are the caller's to fix and are never worth
    /// retrying.
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedParameter(_) | Self::UnsupportedResponseFormat(_) | Self::Translation(_)
        )
    }

    /// Stable code reported on error events
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedParameter(_) | Self::UnsupportedResponseFormat(_) | Self::Translation(_) => {
                INVALID_REQUEST_CODE
            }
            Self::Upstream(_) => UPSTREAM_ERROR_CODE,
            Self::Streaming(_) => STREAM_ERROR_CODE,
            Self::Cancelled => CANCELLED_CODE,
            Self::Internal(_) => INTERNAL_ERROR_CODE,
        }
    }
}

impl From<&ModelError> for ResponseEvent {
    fn from(error: &ModelError) -> Self {
        Self::error(error.code(), error.to_string())
    }
}
