//! Error types for the data model
//!
//! Covers configuration validation, integer tag decoding and surface pool
//! pressure. None of these are fatal: the pipeline turns them into a refused
//! configuration or a dropped frame.

use thiserror::Error;

use crate::format::PixelFormat;

/// Errors raised by model types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The configuration failed validation
    ///
    /// Carries every issue found, joined into one message.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An integer tag from the configuration surface has no mapping
    ///
    /// Tags are shared with an external declarative resource; an unknown tag
    /// means the two sides drifted apart.
    #[error("Unknown {option} tag: {tag}")]
    UnknownTag {
        /// Name of the option set (e.g. "LayerClass")
        option: &'static str,
        /// The tag that was received
        tag: i64,
    },

    /// No surface is available
    ///
    /// Direct pools are exhausted when every surface is still leased; recreated
    /// pools when the in-flight bound is reached.
    #[error("Surface pool exhausted ({capacity} surfaces in flight)")]
    PoolExhausted {
        /// Pool capacity or in-flight bound
        capacity: usize,
    },

    /// A surface does not carry the pixel format the session expects
    #[error("Pixel format mismatch: expected {expected:?}, got {actual:?}")]
    FormatMismatch {
        /// Format of the active session
        expected: PixelFormat,
        /// Format carried by the frame
        actual: PixelFormat,
    },
}

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

impl ModelError {
    /// Create an invalid config error
    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an unknown tag error
    pub(crate) fn unknown_tag(option: &'static str, tag: i64) -> Self {
        Self::UnknownTag { option, tag }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::unknown_tag("Buffering", 7);
        assert_eq!(err.to_string(), "Unknown Buffering tag: 7");

        let err = ModelError::PoolExhausted { capacity: 3 };
        assert_eq!(err.to_string(), "Surface pool exhausted (3 surfaces in flight)");
    }

    #[test]
    fn test_error_helpers() {
        let err = ModelError::invalid_config("direct_pool_size must be at least 2");
        assert!(matches!(err, ModelError::InvalidConfig(_)));
    }
}
