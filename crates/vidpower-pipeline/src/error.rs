//! Pipeline Error Types
//!
//! Configuration and resolution failures are returned from
//! [`PipelineHandle::reset_with_model`](crate::PipelineHandle::reset_with_model).
//! Per-frame failures never surface as errors: they are counted in
//! [`PipelineStats`](crate::PipelineStats) and streaming continues.

use thiserror::Error;
use vidpower_decoder::DecodeError;

/// Errors raised by a presenter or its compositor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresentError {
    /// Operation not valid in the current layer state
    #[error("Invalid presenter state: {0}")]
    InvalidState(String),

    /// The compositor refused an operation
    #[error("Compositor error: {0}")]
    Compositor(String),
}

/// Errors returned by pipeline operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The config cannot be presented (e.g. raw surfaces without a format)
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// The config failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The video source could not be resolved
    #[error("Asset resolution failed: {0}")]
    AssetResolution(#[source] DecodeError),

    /// A presenter operation failed
    #[error("Presenter error: {0}")]
    Present(#[from] PresentError),

    /// The coordinator task is gone
    #[error("Pipeline command channel closed")]
    ChannelClosed,
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Broad classification of a [`PipelineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied a config that will never work; fix the config
    Configuration,

    /// The asset could not be opened; pick another source
    Asset,

    /// Layer detach/reattach misuse or compositor failure
    Presentation,

    /// The pipeline has shut down
    Shutdown,
}

impl PipelineError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedConfiguration(_) | Self::InvalidConfig(_) => ErrorKind::Configuration,
            Self::AssetResolution(_) => ErrorKind::Asset,
            Self::Present(_) => ErrorKind::Presentation,
            Self::ChannelClosed => ErrorKind::Shutdown,
        }
    }

    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration(reason.into())
    }
}

impl PresentError {
    pub(crate) fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState(reason.into())
    }
}
