//! Decoder Error Types
//!
//! Resolution failures end a session before it starts and are reported once
//! through the ready handle. Per-frame failures are absorbed: the frame is
//! reported as dropped and production continues.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use vidpower_model::ModelError;

/// Errors that can occur while resolving an asset or producing frames
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The session config has no video source
    #[error("No video source configured")]
    NoSource,

    /// The asset cannot be read
    #[error("Asset {path} is unreadable: {reason}")]
    AssetUnreadable {
        /// Path of the asset
        path: PathBuf,
        /// Underlying reason
        reason: String,
    },

    /// The asset is readable but no decoder handles it
    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),

    /// The asset has no usable video track
    #[error("Asset has no usable video track")]
    NoVideoTrack,

    /// Asset resolution did not complete in time
    #[error("Asset resolution timed out after {0:?}")]
    Timeout(Duration),

    /// A single sample could not be read or decoded
    #[error("Frame {index} is corrupt: {reason}")]
    CorruptFrame {
        /// Decode order index
        index: u64,
        /// What went wrong
        reason: String,
    },

    /// No surface available for a decoded frame
    #[error("Surface unavailable: {0}")]
    Pool(#[from] ModelError),
}

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecodeError>;

impl DecodeError {
    /// Create an unreadable asset error
    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::AssetUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a corrupt frame error
    pub fn corrupt(index: u64, reason: impl Into<String>) -> Self {
        Self::CorruptFrame {
            index,
            reason: reason.into(),
        }
    }

    /// Whether this error prevents a session from starting
    ///
    /// Everything except per-frame failures is a resolution failure.
    pub fn is_resolution_failure(&self) -> bool {
        !matches!(self, Self::CorruptFrame { .. } | Self::Pool(_))
    }
}
