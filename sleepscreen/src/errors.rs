//! Error types for the sleep screen manager

use thiserror::Error;

/// Main error type for the sleep screen manager
#[derive(Error, Debug)]
pub enum ManagerError {
    /// Host unreachable, authentication rejected or connect timeout
    #[error("Connection error: {0}")]
    ConnectError(String),

    /// An upload or remote filesystem call failed
    #[error("Transfer error: {0}")]
    TransferError(String),

    /// A remote command could not be run or reported failure
    #[error("Command error: {0}")]
    CommandError(String),

    /// The bundled default image is missing or unreadable
    #[error("Resource error: {0}")]
    ResourceError(String),

    /// Missing or invalid user input (no image, no folder)
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Gallery error: {0}")]
    GalleryError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Workflow error: {0}")]
    WorkflowError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<russh::Error> for ManagerError {
    fn from(err: russh::Error) -> Self {
        ManagerError::ConnectError(err.to_string())
    }
}

impl From<russh_sftp::client::error::Error> for ManagerError {
    fn from(err: russh_sftp::client::error::Error) -> Self {
        ManagerError::TransferError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ManagerError {
    fn from(err: tokio::task::JoinError) -> Self {
        ManagerError::Internal(err.to_string())
    }
}

impl ManagerError {
    /// Whether the failure happened before any device contact was attempted
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ManagerError::ResourceError(_) | ManagerError::ValidationError(_)
        )
    }
}
