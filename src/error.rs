//! Error type shared by the capture pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::permission::RemediationCommands;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// No capturable screen source, or the OS refused the capture itself.
    #[error("screen capture permission denied: {0}")]
    PermissionDenied(String),

    /// The synthetic advance key press was rejected.
    #[error("failed to send keyboard input: {0}")]
    InputInjectionFailed(String),

    #[error("no images to convert")]
    EmptyInput,

    /// The output directory is missing or not writable. The captured images
    /// are still valid and assembly may be retried elsewhere.
    #[error("cannot write to directory {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("capture cancelled")]
    Cancelled,

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("settings file error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, CaptureError>;

impl CaptureError {
    /// Only a failed PDF write may be retried without capturing again.
    pub fn is_retryable_write(&self) -> bool {
        matches!(self, CaptureError::WriteFailed { .. })
    }

    /// OS settings shortcuts for the two permission failures, where the
    /// platform has any.
    pub fn remediation(&self) -> Option<RemediationCommands> {
        match self {
            CaptureError::PermissionDenied(_) | CaptureError::InputInjectionFailed(_) => {
                RemediationCommands::for_current_platform()
            }
            _ => None,
        }
    }
}

impl From<tokio::task::JoinError> for CaptureError {
    fn from(err: tokio::task::JoinError) -> Self {
        CaptureError::Runtime(format!("background task failed: {err}"))
    }
}
