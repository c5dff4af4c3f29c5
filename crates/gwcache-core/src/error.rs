//! Error types for gwcache.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Input errors
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Stage update errors
    #[error("Stage update failed on batch {batch}/{batches} ({operations} operations): {message}")]
    StageUpdateFailed {
        batch: usize,
        batches: usize,
        operations: usize,
        message: String,
    },

    #[error(
        "Stage update on batch {batch}/{batches} ({operations} operations) still conflicting after {attempts} attempts: {message}"
    )]
    RetriesExhausted {
        batch: usize,
        batches: usize,
        operations: usize,
        attempts: u32,
        message: String,
    },

    #[error("Stage update exceeded its deadline of {millis} ms")]
    DeadlineExceeded { millis: u128 },

    // Infrastructure errors
    #[error("Provider call failed: {0}")]
    Provider(#[from] InvokeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::InvalidManifest(err.to_string())
    }
}

/// Failure reported by the cloud provider SDK bridge.
///
/// `code` is the provider's error code (for example `ConflictException`) when
/// the bridge reports one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{service}.{method} failed ({}): {message}", code.as_deref().unwrap_or("unknown"))]
pub struct InvokeError {
    pub service: String,
    pub method: String,
    pub code: Option<String>,
    pub status: Option<u16>,
    pub message: String,
}

impl InvokeError {
    pub fn new(service: impl Into<String>, method: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            code: None,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}
