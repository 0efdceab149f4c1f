use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failure while turning input bytes into page texts. Aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("document is not a readable PDF: {0}")]
    Corrupt(String),
    #[error("document has no extractable text; possibly a scanned image")]
    NoText,
}

/// Per-chunk translation failure class. Never aborts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    Transport,
    Unsupported,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Transport => "transport",
            FailureKind::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error signal returned by a translation capability, already classified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct CapabilityError {
    pub kind: FailureKind,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl CapabilityError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FailureKind::RateLimited, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unsupported, message)
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconstructionError {
    #[error("failed to serialize output document: {0}")]
    SerializationFailed(String),
}

/// Run-level failure surfaced as `PipelineResult::Failure`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),
    #[error("translation cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Corrupt,
    NoText,
    SerializationFailed,
    Cancelled,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Extraction(ExtractionError::Corrupt(_)) => ErrorKind::Corrupt,
            PipelineError::Extraction(ExtractionError::NoText) => ErrorKind::NoText,
            PipelineError::Reconstruction(ReconstructionError::SerializationFailed(_)) => {
                ErrorKind::SerializationFailed
            }
            PipelineError::Cancelled => ErrorKind::Cancelled,
        }
    }
}
