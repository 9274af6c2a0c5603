use std::time::Duration;

use thiserror::Error;

/// Failures of a single backend status fetch. None of them are retried.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("backend '{0}' is not registered")]
    BackendUnavailable(String),

    #[error("backend '{backend}' did not answer within {timeout:?}")]
    FetchTimeout { backend: String, timeout: Duration },

    #[error("backend connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("backend sent an invalid status response: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    /// Whether the query reached the backend at all.
    pub fn was_issued(&self) -> bool {
        !matches!(self, FetchError::BackendUnavailable(_))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum IconError {
    #[error("favicon is not valid base64: {0}")]
    MalformedBase64(#[from] base64::DecodeError),

    #[error("favicon is not a supported image: {0}")]
    UnsupportedImageFormat(String),
}
